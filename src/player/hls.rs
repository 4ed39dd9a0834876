//! HLS media backend
//!
//! Validates the playlist over HTTP and runs a clock-driven position for the
//! session. No segment is downloaded or decoded.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

use super::backend::{MediaBackend, MediaEvents, MediaHandle, MediaRequest};
use super::machine::MediaEvent;
use crate::error::PlaybackError;

const TICK: Duration = Duration::from_millis(500);

/// Total duration of a media playlist in milliseconds, from its `#EXTINF` tags.
///
/// `None` when the text is not an HLS playlist or lists no segments (a master
/// playlist, for instance).
pub fn playlist_duration_ms(playlist: &str) -> Option<u64> {
    let mut lines = playlist.lines().map(str::trim);
    if lines.next()? != "#EXTM3U" {
        return None;
    }

    let total_secs: f64 = lines
        .filter_map(|line| line.strip_prefix("#EXTINF:"))
        .filter_map(|rest| rest.split(',').next()?.trim().parse::<f64>().ok())
        .sum();

    (total_secs > 0.0).then(|| (total_secs * 1000.0).round() as u64)
}

pub fn is_playlist(body: &str) -> bool {
    body.trim_start_matches('\u{feff}').trim_start().starts_with("#EXTM3U")
}

#[derive(Clone)]
pub struct HlsBackend {
    http: reqwest::Client,
}

impl HlsBackend {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug)]
enum Control {
    Play,
    Pause,
    Seek(u64),
}

struct HlsHandle {
    control: mpsc::UnboundedSender<Control>,
    task: tokio::task::JoinHandle<()>,
}

impl HlsHandle {
    fn send(&self, control: Control) -> Result<(), PlaybackError> {
        self.control
            .send(control)
            .map_err(|_| PlaybackError::Retryable("media task stopped".into()))
    }
}

#[async_trait]
impl MediaHandle for HlsHandle {
    async fn play(&mut self) -> Result<(), PlaybackError> {
        self.send(Control::Play)
    }

    async fn pause(&mut self) -> Result<(), PlaybackError> {
        self.send(Control::Pause)
    }

    async fn seek(&mut self, position_ms: u64) -> Result<(), PlaybackError> {
        self.send(Control::Seek(position_ms))
    }

    async fn release(self: Box<Self>) {
        self.task.abort();
    }
}

#[async_trait]
impl MediaBackend for HlsBackend {
    async fn open(&self, request: MediaRequest, events: MediaEvents) -> Result<Box<dyn MediaHandle>, PlaybackError> {
        let (control, control_rx) = mpsc::unbounded_channel();
        let http = self.http.clone();
        tracing::debug!(handle = events.handle(), url = %request.url, "Opening HLS stream");

        let task = tokio::spawn(async move {
            match fetch_duration(&http, &request).await {
                Ok(duration_ms) => run_clock(duration_ms, control_rx, events).await,
                Err(err) => {
                    tracing::warn!(handle = events.handle(), error = %err, "HLS stream failed to open");
                    events.emit(MediaEvent::Error(err));
                }
            }
        });

        Ok(Box::new(HlsHandle { control, task }))
    }
}

async fn fetch_duration(http: &reqwest::Client, request: &MediaRequest) -> Result<u64, PlaybackError> {
    let response = http
        .get(&request.url)
        .send()
        .await
        .map_err(|e| PlaybackError::Retryable(e.to_string()))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
        return Err(PlaybackError::Terminal(format!("stream not found (HTTP {})", status.as_u16())));
    }
    if !status.is_success() {
        return Err(PlaybackError::Retryable(format!("HTTP {}", status.as_u16())));
    }

    let body = response.text().await.map_err(|e| PlaybackError::Retryable(e.to_string()))?;
    if !is_playlist(&body) {
        return Err(PlaybackError::Terminal("response is not an HLS playlist".into()));
    }

    Ok(playlist_duration_ms(&body).unwrap_or(request.duration_hint_ms))
}

/// Position clock; stops when the session stops listening or the handle is dropped.
async fn run_clock(duration_ms: u64, mut control: mpsc::UnboundedReceiver<Control>, events: MediaEvents) {
    if !events.emit(MediaEvent::Ready { duration_ms }) {
        return;
    }

    let mut position_ms = 0u64;
    let mut playing = false;
    let mut last_tick = Instant::now();
    let mut ticker = interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = control.recv() => {
                let Some(msg) = msg else { break };
                match msg {
                    Control::Play => {
                        playing = true;
                        last_tick = Instant::now();
                    }
                    Control::Pause => playing = false,
                    Control::Seek(target) => {
                        position_ms = if duration_ms > 0 { target.min(duration_ms) } else { target };
                        last_tick = Instant::now();
                        if !events.emit(MediaEvent::SeekComplete(position_ms)) {
                            break;
                        }
                    }
                }
            }
            _ = ticker.tick(), if playing => {
                let now = Instant::now();
                position_ms += now.duration_since(last_tick).as_millis() as u64;
                last_tick = now;

                if duration_ms > 0 && position_ms >= duration_ms {
                    position_ms = duration_ms;
                    playing = false;
                    events.emit(MediaEvent::Position(position_ms));
                    if !events.emit(MediaEvent::Ended) {
                        break;
                    }
                } else if !events.emit(MediaEvent::Position(position_ms)) {
                    break;
                }
            }
        }
    }
}
