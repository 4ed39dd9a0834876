//! Model module - UI state of the terminal front end
//!
//! - `types`: Core type definitions (sections, library entries, UI state)
//! - `app_model`: Main application model with state management methods

mod types;
mod app_model;

pub use types::{ActiveSection, LibraryItem, UiState};

pub use app_model::AppModel;
