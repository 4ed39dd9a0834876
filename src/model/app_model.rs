//! Main application model with UI state management

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use super::types::{ActiveSection, LibraryItem, UiState};

const ERROR_DISPLAY_SECS: u64 = 5;

/// UI-only state. Catalog, favorites, collections and playback state live in
/// their own services; the model keeps what the user is looking at.
pub struct AppModel {
    pub ui_state: Arc<Mutex<UiState>>,
    pub should_quit: Arc<Mutex<bool>>,
}

impl AppModel {
    pub fn new() -> Self {
        Self {
            ui_state: Arc::new(Mutex::new(UiState::default())),
            should_quit: Arc::new(Mutex::new(false)),
        }
    }

    pub async fn should_quit(&self) -> bool {
        *self.should_quit.lock().await
    }

    pub async fn set_should_quit(&self, quit: bool) {
        *self.should_quit.lock().await = quit;
    }

    pub async fn get_ui_state(&self) -> UiState {
        self.ui_state.lock().await.clone()
    }

    pub async fn set_account(&self, account: Option<String>) {
        self.ui_state.lock().await.account = account;
    }

    // ========================================================================
    // Sections & selection
    // ========================================================================

    pub async fn cycle_section_forward(&self) {
        let mut state = self.ui_state.lock().await;
        state.active_section = state.active_section.next();
    }

    pub async fn cycle_section_backward(&self) {
        let mut state = self.ui_state.lock().await;
        state.active_section = state.active_section.prev();
    }

    pub async fn set_active_section(&self, section: ActiveSection) {
        let mut state = self.ui_state.lock().await;
        state.active_section = section;
    }

    pub async fn move_selection_up(&self) {
        let mut state = self.ui_state.lock().await;
        let section = state.active_section;
        let selected = match section {
            ActiveSection::Library => &mut state.library_selected,
            ActiveSection::Releases => &mut state.release_selected,
            ActiveSection::Episodes => &mut state.episode_selected,
            ActiveSection::Search => return,
        };
        *selected = selected.saturating_sub(1);
    }

    /// Move down within a list of `len` items; returns true when the last item is selected.
    pub async fn move_selection_down(&self, len: usize) -> bool {
        let mut state = self.ui_state.lock().await;
        let section = state.active_section;
        let selected = match section {
            ActiveSection::Library => &mut state.library_selected,
            ActiveSection::Releases => &mut state.release_selected,
            ActiveSection::Episodes => &mut state.episode_selected,
            ActiveSection::Search => return false,
        };
        if *selected + 1 < len {
            *selected += 1;
        }
        *selected + 1 >= len
    }

    pub async fn selected_library_item(&self) -> LibraryItem {
        let state = self.ui_state.lock().await;
        LibraryItem::ALL[state.library_selected.min(LibraryItem::ALL.len() - 1)]
    }

    /// A new listing starts at its top.
    pub async fn reset_release_selection(&self) {
        let mut state = self.ui_state.lock().await;
        state.release_selected = 0;
        state.active_section = ActiveSection::Releases;
    }

    pub async fn open_episodes(&self) {
        let mut state = self.ui_state.lock().await;
        state.episode_selected = 0;
        state.active_section = ActiveSection::Episodes;
    }

    pub async fn close_episodes(&self) {
        self.ui_state.lock().await.active_section = ActiveSection::Releases;
    }

    // ========================================================================
    // Search input
    // ========================================================================

    pub async fn update_search_query(&self, query: String) {
        self.ui_state.lock().await.search_query = query;
    }

    pub async fn append_to_search(&self, c: char) {
        self.ui_state.lock().await.search_query.push(c);
    }

    pub async fn backspace_search(&self) {
        self.ui_state.lock().await.search_query.pop();
    }

    // ========================================================================
    // Errors & overlays
    // ========================================================================

    pub async fn set_error(&self, message: String) {
        let mut state = self.ui_state.lock().await;
        state.error_message = Some(message);
        state.error_timestamp = Some(Instant::now());
    }

    pub async fn clear_error(&self) {
        let mut state = self.ui_state.lock().await;
        state.error_message = None;
        state.error_timestamp = None;
    }

    pub async fn has_error(&self) -> bool {
        self.ui_state.lock().await.error_message.is_some()
    }

    pub async fn auto_clear_old_errors(&self) {
        let mut state = self.ui_state.lock().await;
        if let Some(timestamp) = state.error_timestamp {
            if timestamp.elapsed().as_secs() > ERROR_DISPLAY_SECS {
                state.error_message = None;
                state.error_timestamp = None;
            }
        }
    }

    pub async fn show_help_popup(&self) {
        self.ui_state.lock().await.show_help_popup = true;
    }

    pub async fn hide_help_popup(&self) {
        self.ui_state.lock().await.show_help_popup = false;
    }

    pub async fn is_help_popup_open(&self) -> bool {
        self.ui_state.lock().await.show_help_popup
    }
}

impl Default for AppModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn selection_stays_inside_the_list() {
        let model = AppModel::new();

        assert!(!model.move_selection_down(3).await);
        assert!(model.move_selection_down(3).await);
        assert!(model.move_selection_down(3).await);
        assert_eq!(model.get_ui_state().await.release_selected, 2);

        for _ in 0..5 {
            model.move_selection_up().await;
        }
        assert_eq!(model.get_ui_state().await.release_selected, 0);
    }

    #[tokio::test]
    async fn library_selection_maps_to_items() {
        let model = AppModel::new();
        model.set_active_section(ActiveSection::Library).await;
        model.move_selection_down(LibraryItem::ALL.len()).await;
        assert_eq!(model.selected_library_item().await, LibraryItem::Popular);

        for _ in 0..4 {
            model.move_selection_down(LibraryItem::ALL.len()).await;
        }
        assert_eq!(model.selected_library_item().await, LibraryItem::Favorites);
        assert!(LibraryItem::Favorites.needs_account());

        for _ in 0..20 {
            model.move_selection_down(LibraryItem::ALL.len()).await;
        }
        let last = model.selected_library_item().await;
        assert_eq!(last, LibraryItem::Collection(aniliberty_rs::api::CollectionType::Abandoned));
        assert_eq!(last.name(), "Abandoned");
    }
}
