//! Client library for the AniLiberty anime catalog
//!
//! - [`store`]: favorites and collections with optimistic updates, and the
//!   paginated catalog loader
//! - [`player`]: the playback session state machine and its actor
//! - [`api`]: the HTTP client and wire types
//! - [`auth`]: login, token restore and logout

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod player;
pub mod storage;
pub mod store;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult, PlaybackError, StorageError};
