//! Playback state machine
//!
//! [`dispatch`] is a pure function from the current snapshot and one event to
//! the next snapshot plus the effects the session must carry out. It never
//! touches the media handle or the clock itself.
//!
//! ```text
//! Idle --request--> Loading --ready--> Ready --autoplay/play--> Playing
//! Playing <--pause/play--> Paused
//! Playing/Paused --seek--> Seeking --seek complete--> Playing
//! Playing/Paused --buffering--> Buffering --buffer ready--> previous
//! any active --media error--> Error --retry timer [retries < max]--> Loading
//! any --request/quality change--> Loading (retries reset, old handle released)
//! ```

use crate::api::Episode;
use crate::error::PlaybackError;

use super::stream::{resolve_stream, Quality};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Buffering,
    Seeking,
    Error,
}

impl PlaybackState {
    /// States in which a media handle is expected to be alive
    pub fn is_active(self) -> bool {
        !matches!(self, PlaybackState::Idle | PlaybackState::Error)
    }
}

/// Everything the UI needs to render the player.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub episode: Option<Episode>,
    /// Quality the user asked for
    pub quality: Quality,
    /// Quality actually streamed, after fallback
    pub stream_quality: Option<Quality>,
    pub stream_url: Option<String>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error: Option<String>,
    /// The error cannot be fixed by retrying the same source
    pub terminal: bool,
    /// Id of the most recently acquired media handle
    pub handle: u64,
    pub has_handle: bool,
    resume_at_ms: Option<u64>,
    return_to: Option<PlaybackState>,
}

impl PlaybackSnapshot {
    pub fn new(quality: Quality, max_retries: u32) -> Self {
        Self {
            state: PlaybackState::Idle,
            episode: None,
            quality,
            stream_quality: None,
            stream_url: None,
            position_ms: 0,
            duration_ms: 0,
            retry_count: 0,
            max_retries,
            error: None,
            terminal: false,
            handle: 0,
            has_handle: false,
            resume_at_ms: None,
            return_to: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Position to restore once the current handle is ready, if any
    pub fn resume_at_ms(&self) -> Option<u64> {
        self.resume_at_ms
    }

    pub fn progress_ratio(&self) -> f64 {
        if self.duration_ms == 0 {
            0.0
        } else {
            (self.position_ms as f64 / self.duration_ms as f64).clamp(0.0, 1.0)
        }
    }

    /// Unknown duration (0) leaves the position unclamped.
    fn clamp_position(&self, position_ms: u64) -> u64 {
        if self.duration_ms == 0 {
            position_ms
        } else {
            position_ms.min(self.duration_ms)
        }
    }

    fn release(&mut self, effects: &mut Vec<Effect>) {
        if self.has_handle {
            self.has_handle = false;
            effects.push(Effect::Release);
        }
    }

    /// Release the current handle and acquire one for the current episode and quality.
    fn load(&mut self, effects: &mut Vec<Effect>) {
        self.release(effects);
        self.error = None;
        self.terminal = false;
        self.return_to = None;

        let resolved = self.episode.as_ref().map(|episode| resolve_stream(episode, self.quality));
        match resolved {
            None => {
                self.state = PlaybackState::Idle;
            }
            Some(Some((quality, url))) => {
                self.handle += 1;
                self.has_handle = true;
                self.stream_quality = Some(quality);
                self.stream_url = Some(url.clone());
                self.state = PlaybackState::Loading;
                effects.push(Effect::Acquire { handle: self.handle, url, duration_hint_ms: self.duration_ms });
            }
            Some(None) => {
                self.stream_quality = None;
                self.stream_url = None;
                self.state = PlaybackState::Error;
                self.terminal = true;
                self.error = Some(PlaybackError::Terminal("no stream available for this episode".into()).to_string());
            }
        }
    }

    fn capture_resume_point(&mut self) {
        if self.resume_at_ms.is_none() && self.position_ms > 0 {
            self.resume_at_ms = Some(self.position_ms);
        }
    }

    fn seek_to(&mut self, target_ms: u64, effects: &mut Vec<Effect>) {
        let target = self.clamp_position(target_ms);
        self.position_ms = target;
        self.state = PlaybackState::Seeking;
        effects.push(Effect::SeekMedia(target));
    }
}

/// Notifications from a media handle.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaEvent {
    Ready { duration_ms: u64 },
    Position(u64),
    BufferingStarted,
    BufferReady,
    SeekComplete(u64),
    Ended,
    Error(PlaybackError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    RequestEpisode(Episode),
    SetQuality(Quality),
    Play,
    Pause,
    TogglePlayPause,
    Seek(u64),
    /// Relative seek in milliseconds
    Skip(i64),
    /// Start playback of a freshly ready stream
    Autoplay,
    /// User-initiated retry; resets the automatic retry budget
    Retry,
    RetryTimerFired,
    Stop,
    /// Event from the media handle with id `handle`
    Media { handle: u64, event: MediaEvent },
}

/// Work the session performs on behalf of a transition, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Acquire { handle: u64, url: String, duration_hint_ms: u64 },
    Release,
    Play,
    Pause,
    SeekMedia(u64),
    ScheduleRetry,
    CancelRetry,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub snapshot: PlaybackSnapshot,
    pub effects: Vec<Effect>,
}

pub fn dispatch(current: &PlaybackSnapshot, event: PlaybackEvent) -> Transition {
    use PlaybackState::*;

    let mut next = current.clone();
    let mut effects = Vec::new();

    match event {
        PlaybackEvent::RequestEpisode(episode) => {
            effects.push(Effect::CancelRetry);
            next.retry_count = 0;
            next.position_ms = 0;
            next.resume_at_ms = None;
            next.duration_ms = episode.duration_ms();
            next.episode = Some(episode);
            next.load(&mut effects);
        }

        PlaybackEvent::SetQuality(quality) => {
            if quality != next.quality {
                next.quality = quality;
                if next.episode.is_some() && next.state != Idle {
                    effects.push(Effect::CancelRetry);
                    next.capture_resume_point();
                    next.retry_count = 0;
                    next.load(&mut effects);
                }
            }
        }

        PlaybackEvent::Autoplay => {
            if next.state == Ready {
                next.state = Playing;
                effects.push(Effect::Play);
            }
        }

        PlaybackEvent::Play => {
            if matches!(next.state, Ready | Paused) {
                next.state = Playing;
                effects.push(Effect::Play);
            }
        }

        PlaybackEvent::Pause => {
            if next.state == Playing {
                next.state = Paused;
                effects.push(Effect::Pause);
            }
        }

        PlaybackEvent::TogglePlayPause => match next.state {
            Playing => {
                next.state = Paused;
                effects.push(Effect::Pause);
            }
            Ready | Paused => {
                next.state = Playing;
                effects.push(Effect::Play);
            }
            _ => {}
        },

        PlaybackEvent::Seek(target_ms) => {
            if matches!(next.state, Playing | Paused | Seeking) {
                next.seek_to(target_ms, &mut effects);
            }
        }

        PlaybackEvent::Skip(delta_ms) => {
            if matches!(next.state, Playing | Paused | Seeking) {
                let target = next.position_ms.saturating_add_signed(delta_ms);
                next.seek_to(target, &mut effects);
            }
        }

        PlaybackEvent::Retry => {
            if next.state == Error {
                effects.push(Effect::CancelRetry);
                next.retry_count = 0;
                next.load(&mut effects);
            }
        }

        PlaybackEvent::RetryTimerFired => {
            if next.state == Error && !next.terminal && next.retry_count < next.max_retries {
                next.retry_count += 1;
                next.load(&mut effects);
            }
        }

        PlaybackEvent::Stop => {
            effects.push(Effect::CancelRetry);
            next.release(&mut effects);
            next = PlaybackSnapshot { handle: next.handle, ..PlaybackSnapshot::new(next.quality, next.max_retries) };
        }

        PlaybackEvent::Media { handle, event } => {
            if handle != next.handle || !next.has_handle {
                return Transition { snapshot: next, effects };
            }
            media_event(&mut next, event, &mut effects);
        }
    }

    Transition { snapshot: next, effects }
}

fn media_event(next: &mut PlaybackSnapshot, event: MediaEvent, effects: &mut Vec<Effect>) {
    use PlaybackState::*;

    match event {
        MediaEvent::Ready { duration_ms } => {
            if next.state == Loading {
                next.state = Ready;
                next.retry_count = 0;
                next.error = None;
                if duration_ms > 0 {
                    next.duration_ms = duration_ms;
                }
                if let Some(resume_at) = next.resume_at_ms.take() {
                    let target = next.clamp_position(resume_at);
                    next.position_ms = target;
                    effects.push(Effect::SeekMedia(target));
                }
            }
        }

        MediaEvent::Position(position_ms) => {
            if matches!(next.state, Playing | Paused | Buffering) {
                next.position_ms = next.clamp_position(position_ms);
            }
        }

        MediaEvent::BufferingStarted => {
            if matches!(next.state, Playing | Paused) {
                next.return_to = Some(next.state);
                next.state = Buffering;
            }
        }

        MediaEvent::BufferReady => {
            if next.state == Buffering {
                next.state = next.return_to.take().unwrap_or(Playing);
            }
        }

        MediaEvent::SeekComplete(position_ms) => {
            if next.state == Seeking {
                next.position_ms = next.clamp_position(position_ms);
                next.state = Playing;
                effects.push(Effect::Play);
            } else if matches!(next.state, Ready | Playing | Paused) {
                next.position_ms = next.clamp_position(position_ms);
            }
        }

        MediaEvent::Ended => {
            if matches!(next.state, Playing | Buffering) {
                next.position_ms = next.duration_ms;
                next.return_to = None;
                next.state = Paused;
            }
        }

        MediaEvent::Error(err) => {
            if next.state.is_active() {
                next.release(effects);
                next.capture_resume_point();
                next.return_to = None;
                next.state = Error;
                next.terminal = err.is_terminal();
                next.error = Some(err.to_string());
                if !next.terminal && next.retry_count < next.max_retries {
                    effects.push(Effect::ScheduleRetry);
                }
            }
        }
    }
}
