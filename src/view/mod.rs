//! View module - UI rendering
//!
//! This module handles all UI rendering for the application using ratatui.
//! It is organized into submodules by component type:
//!
//! - `utils`: Shared utility functions (formatting, scrollable lists)
//! - `layout`: Main layout structure (top bar, sidebar)
//! - `content`: Release list and episode list
//! - `progress`: Player status bar
//! - `overlays`: Modal overlays (error, help)

mod utils;
mod layout;
mod content;
mod progress;
mod overlays;

use std::collections::{BTreeMap, BTreeSet};

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use aniliberty_rs::api::{CollectionType, ReleaseId};
use aniliberty_rs::player::PlaybackSnapshot;
use aniliberty_rs::store::{CatalogSnapshot, CollectionMap};

use crate::model::UiState;

/// Everything one frame shows, copied out of the services before drawing.
pub struct Screen {
    pub ui_state: UiState,
    pub catalog: CatalogSnapshot,
    pub playback: PlaybackSnapshot,
    pub favorites: BTreeSet<ReleaseId>,
    pub collections: CollectionMap,
    /// Releases per collection, for the sidebar
    pub collection_counts: BTreeMap<CollectionType, usize>,
}

pub struct AppView;

impl AppView {
    pub fn render(frame: &mut Frame, screen: &Screen) {
        let ui_state = &screen.ui_state;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Search bar + account
                Constraint::Min(0),    // Main content (sidebar + content)
                Constraint::Length(3), // Player status
            ])
            .split(frame.area());

        layout::render_top_bar(frame, chunks[0], ui_state);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(25), // Library
                Constraint::Percentage(75), // Releases / episodes
            ])
            .split(chunks[1]);

        layout::render_sidebar(frame, main_chunks[0], screen);
        content::render_main_content(frame, main_chunks[1], screen);
        progress::render_progress_bar(frame, chunks[2], &screen.playback);

        if ui_state.error_message.is_some() {
            overlays::render_error_notification(frame, ui_state);
        }

        if ui_state.show_help_popup {
            overlays::render_help_popup(frame);
        }
    }
}
