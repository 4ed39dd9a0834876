//! Seam between the playback session and whatever actually plays the stream

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::machine::MediaEvent;
use crate::error::PlaybackError;

/// Parameters for acquiring one media handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRequest {
    pub url: String,
    /// Duration known from the episode metadata, 0 when unknown
    pub duration_hint_ms: u64,
}

/// Sender for the events of one media handle, tagged with its id.
#[derive(Clone, Debug)]
pub struct MediaEvents {
    handle: u64,
    tx: mpsc::UnboundedSender<(u64, MediaEvent)>,
}

impl MediaEvents {
    pub fn new(handle: u64, tx: mpsc::UnboundedSender<(u64, MediaEvent)>) -> Self {
        Self { handle, tx }
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Returns false once the session is gone.
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.tx.send((self.handle, event)).is_ok()
    }
}

/// Factory for media handles.
#[async_trait]
pub trait MediaBackend: Send + Sync + 'static {
    /// Start opening `request`. Readiness and failures after this call are
    /// reported through `events`.
    async fn open(&self, request: MediaRequest, events: MediaEvents) -> Result<Box<dyn MediaHandle>, PlaybackError>;
}

/// One open stream. Exclusively owned by the session.
#[async_trait]
pub trait MediaHandle: Send {
    async fn play(&mut self) -> Result<(), PlaybackError>;
    async fn pause(&mut self) -> Result<(), PlaybackError>;

    /// Completion is reported as [`MediaEvent::SeekComplete`].
    async fn seek(&mut self, position_ms: u64) -> Result<(), PlaybackError>;

    async fn release(self: Box<Self>);
}
