//! Playback session actor
//!
//! Owns the media handle and the retry timer, runs [`dispatch`] for every
//! command, media event and timer expiry in one task, and publishes each new
//! snapshot on a watch channel before carrying out its effects. A receiver
//! that reads less often than the session publishes sees only the latest one.

use std::collections::VecDeque;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::backend::{MediaBackend, MediaEvents, MediaHandle, MediaRequest};
use super::machine::{dispatch, Effect, MediaEvent, PlaybackEvent, PlaybackSnapshot, PlaybackState};
use super::retry::RetryTimer;
use super::stream::Quality;
use crate::api::Episode;
use crate::config::PlayerConfig;
use crate::error::PlaybackError;

/// Cloneable front of a running [`PlaybackSession`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<PlaybackEvent>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
}

impl SessionHandle {
    fn send(&self, event: PlaybackEvent) {
        if self.commands.send(event).is_err() {
            tracing::warn!("Playback session is gone, command dropped");
        }
    }

    pub fn request_episode(&self, episode: Episode) {
        self.send(PlaybackEvent::RequestEpisode(episode));
    }

    pub fn set_quality(&self, quality: Quality) {
        self.send(PlaybackEvent::SetQuality(quality));
    }

    pub fn play(&self) {
        self.send(PlaybackEvent::Play);
    }

    pub fn pause(&self) {
        self.send(PlaybackEvent::Pause);
    }

    pub fn toggle_play_pause(&self) {
        self.send(PlaybackEvent::TogglePlayPause);
    }

    pub fn seek(&self, position_ms: u64) {
        self.send(PlaybackEvent::Seek(position_ms));
    }

    pub fn skip(&self, delta_ms: i64) {
        self.send(PlaybackEvent::Skip(delta_ms));
    }

    pub fn retry(&self) {
        self.send(PlaybackEvent::Retry);
    }

    pub fn stop(&self) {
        self.send(PlaybackEvent::Stop);
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.clone()
    }
}

pub struct PlaybackSession<B: MediaBackend> {
    backend: B,
    config: PlayerConfig,
    snapshot: PlaybackSnapshot,
    media: Option<Box<dyn MediaHandle>>,
    media_tx: mpsc::UnboundedSender<(u64, MediaEvent)>,
    retry: RetryTimer,
    updates: watch::Sender<PlaybackSnapshot>,
}

impl<B: MediaBackend> PlaybackSession<B> {
    /// Spawn the session task. It ends, releasing its handle, when every
    /// [`SessionHandle`] has been dropped.
    pub fn spawn(backend: B, config: PlayerConfig) -> (SessionHandle, JoinHandle<()>) {
        let snapshot = PlaybackSnapshot::new(config.default_quality, config.max_retries);
        let (updates, snapshots) = watch::channel(snapshot.clone());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (media_tx, media_rx) = mpsc::unbounded_channel();

        let session = Self { backend, config, snapshot, media: None, media_tx, retry: RetryTimer::new(), updates };
        let task = tokio::spawn(session.run(command_rx, media_rx));

        (SessionHandle { commands, snapshots }, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<PlaybackEvent>,
        mut media_events: mpsc::UnboundedReceiver<(u64, MediaEvent)>,
    ) {
        tracing::info!("Playback session started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                Some((handle, event)) = media_events.recv() => {
                    self.handle(PlaybackEvent::Media { handle, event }).await;
                }
                () = self.retry.fired() => {
                    tracing::debug!(retry_count = self.snapshot.retry_count, "Retry timer fired");
                    self.handle(PlaybackEvent::RetryTimerFired).await;
                }
            }
        }

        self.handle(PlaybackEvent::Stop).await;
        tracing::info!("Playback session stopped");
    }

    async fn handle(&mut self, event: PlaybackEvent) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            if let PlaybackEvent::Media { handle, event: media } = &event {
                if *handle != self.snapshot.handle || !self.snapshot.has_handle {
                    tracing::trace!(handle, current = self.snapshot.handle, ?media, "Dropping event from released handle");
                    continue;
                }
            }

            let from = self.snapshot.state;
            let transition = dispatch(&self.snapshot, event);
            self.snapshot = transition.snapshot;
            let to = self.snapshot.state;
            self.publish();

            for effect in transition.effects {
                if let Some(follow_up) = self.execute(effect).await {
                    queue.push_back(follow_up);
                }
            }

            if from != to {
                tracing::info!(
                    from = ?from,
                    to = ?to,
                    handle = self.snapshot.handle,
                    retry_count = self.snapshot.retry_count,
                    error = self.snapshot.error.as_deref().unwrap_or(""),
                    "Playback state changed"
                );
                if to == PlaybackState::Ready && self.config.autoplay {
                    queue.push_back(PlaybackEvent::Autoplay);
                }
            }
        }
    }

    /// Carry out one effect; a failing media call comes back as an event.
    async fn execute(&mut self, effect: Effect) -> Option<PlaybackEvent> {
        let handle = self.snapshot.handle;
        let failed = |err: PlaybackError| PlaybackEvent::Media { handle, event: MediaEvent::Error(err) };

        match effect {
            Effect::Acquire { handle, url, duration_hint_ms } => {
                let events = MediaEvents::new(handle, self.media_tx.clone());
                let request = MediaRequest { url, duration_hint_ms };
                match self.backend.open(request, events).await {
                    Ok(media) => {
                        self.media = Some(media);
                        None
                    }
                    Err(err) => Some(failed(err)),
                }
            }
            Effect::Release => {
                if let Some(media) = self.media.take() {
                    media.release().await;
                }
                None
            }
            Effect::Play => self.media.as_mut()?.play().await.err().map(failed),
            Effect::Pause => self.media.as_mut()?.pause().await.err().map(failed),
            Effect::SeekMedia(position_ms) => self.media.as_mut()?.seek(position_ms).await.err().map(failed),
            Effect::ScheduleRetry => {
                if self.retry.is_scheduled() {
                    tracing::debug!("Replacing the pending retry");
                }
                tracing::info!(delay = ?self.config.retry_delay, retry_count = self.snapshot.retry_count, "Scheduling retry");
                self.retry.schedule(self.config.retry_delay);
                None
            }
            Effect::CancelRetry => {
                if self.retry.cancel() {
                    tracing::debug!("Cancelled pending retry");
                }
                None
            }
        }
    }

    fn publish(&self) {
        let snapshot = &self.snapshot;
        self.updates.send_if_modified(|current| {
            if current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
    }
}
