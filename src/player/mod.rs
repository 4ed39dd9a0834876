//! Episode playback: a pure state machine driven by a session actor

mod backend;
mod hls;
mod machine;
mod retry;
mod session;
mod stream;

pub use backend::{MediaBackend, MediaEvents, MediaHandle, MediaRequest};
pub use hls::{is_playlist, playlist_duration_ms, HlsBackend};
pub use machine::{dispatch, Effect, MediaEvent, PlaybackEvent, PlaybackSnapshot, PlaybackState, Transition};
pub use retry::RetryTimer;
pub use session::{PlaybackSession, SessionHandle};
pub use stream::{resolve_stream, Quality};
