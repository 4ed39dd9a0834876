//! Key event handling

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use aniliberty_rs::api::QuickFilter;

use crate::model::{ActiveSection, LibraryItem};
use super::AppController;

impl AppController {
    pub async fn handle_key_event(&self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        let model = self.model.lock().await;

        // Handle error message first (blocks all other interactions)
        if model.has_error().await {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                model.clear_error().await;
            }
            return Ok(());
        }

        if model.is_help_popup_open().await {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('H')) {
                model.hide_help_popup().await;
            }
            return Ok(());
        }

        let ui_state = model.get_ui_state().await;

        // Handle search input when in search section
        if ui_state.active_section == ActiveSection::Search {
            match key.code {
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        model.cycle_section_backward().await;
                    } else {
                        model.cycle_section_forward().await;
                    }
                    return Ok(());
                }
                KeyCode::BackTab => {
                    model.cycle_section_backward().await;
                    return Ok(());
                }
                KeyCode::Enter => {
                    let query = ui_state.search_query.clone();
                    drop(model);
                    let controller = self.clone();
                    tokio::spawn(async move {
                        controller.perform_search(&query).await;
                    });
                    return Ok(());
                }
                KeyCode::Esc => {
                    model.update_search_query(String::new()).await;
                    return Ok(());
                }
                KeyCode::Backspace => {
                    model.backspace_search().await;
                    return Ok(());
                }
                KeyCode::Char(c) => {
                    // Q still quits even in search mode when Ctrl is pressed
                    if (c == 'q' || c == 'Q') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        model.set_should_quit(true).await;
                        return Ok(());
                    }
                    model.append_to_search(c).await;
                    return Ok(());
                }
                _ => {}
            }
        }

        if ui_state.active_section == ActiveSection::Episodes
            && matches!(key.code, KeyCode::Esc | KeyCode::Backspace)
        {
            drop(model);
            self.close_release().await;
            return Ok(());
        }

        // Global keybindings
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                model.set_should_quit(true).await;
            }
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    model.cycle_section_backward().await;
                } else {
                    model.cycle_section_forward().await;
                }
            }
            KeyCode::BackTab => {
                model.cycle_section_backward().await;
            }
            KeyCode::Up => {
                model.move_selection_up().await;
            }
            KeyCode::Down => {
                let len = match ui_state.active_section {
                    ActiveSection::Library => LibraryItem::ALL.len(),
                    ActiveSection::Releases => self.services.catalog.releases().len(),
                    ActiveSection::Episodes => self
                        .services
                        .catalog
                        .current_release()
                        .map_or(0, |release| release.episodes.len()),
                    ActiveSection::Search => 0,
                };
                let at_end = model.move_selection_down(len).await;
                // Reaching the bottom of the release list pulls the next page (in background)
                if at_end && ui_state.active_section == ActiveSection::Releases && self.services.catalog.has_more() {
                    let controller = self.clone();
                    tokio::spawn(async move {
                        controller.load_more().await;
                    });
                }
            }
            KeyCode::Enter => match ui_state.active_section {
                // Listings load in background so the loading state gets drawn
                ActiveSection::Library => {
                    let item = model.selected_library_item().await;
                    drop(model);
                    let controller = self.clone();
                    tokio::spawn(async move {
                        controller.open_library_item(item).await;
                    });
                }
                ActiveSection::Releases => {
                    drop(model);
                    let controller = self.clone();
                    tokio::spawn(async move {
                        controller.open_selected_release().await;
                    });
                }
                ActiveSection::Episodes => {
                    drop(model);
                    self.play_selected_episode().await;
                }
                ActiveSection::Search => {}
            },
            // Play/Pause toggle
            KeyCode::Char(' ') => {
                self.toggle_playback();
            }
            KeyCode::Char('[') => {
                self.skip(-1);
            }
            KeyCode::Char(']') => {
                self.skip(1);
            }
            KeyCode::Char('v') | KeyCode::Char('V') => {
                self.cycle_quality();
            }
            KeyCode::Char('r') => {
                self.retry_playback();
            }
            // Reload the current listing
            KeyCode::Char('R') => {
                drop(model);
                let controller = self.clone();
                tokio::spawn(async move {
                    controller.refresh().await;
                });
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.stop_playback();
            }
            // Favorites and collections update optimistically; the request runs in background
            KeyCode::Char('f') | KeyCode::Char('F') => {
                drop(model);
                let controller = self.clone();
                tokio::spawn(async move {
                    controller.toggle_favorite().await;
                });
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                drop(model);
                let controller = self.clone();
                tokio::spawn(async move {
                    controller.cycle_collection().await;
                });
            }
            KeyCode::Char('x') | KeyCode::Char('X') => {
                drop(model);
                let controller = self.clone();
                tokio::spawn(async move {
                    controller.remove_from_collection().await;
                });
            }
            // Filter presets apply to the current list; 0 clears them
            KeyCode::Char(c @ '0'..='6') => {
                let preset = c
                    .to_digit(10)
                    .and_then(|digit| (digit as usize).checked_sub(1))
                    .map(|index| QuickFilter::ALL[index]);
                drop(model);
                let controller = self.clone();
                tokio::spawn(async move {
                    controller.apply_quick_filter(preset).await;
                });
            }
            // Focus search
            KeyCode::Char('g') | KeyCode::Char('G') | KeyCode::Char('/') => {
                model.set_active_section(ActiveSection::Search).await;
            }
            KeyCode::Char('l') | KeyCode::Char('L') => {
                model.set_active_section(ActiveSection::Library).await;
            }
            KeyCode::Char('h') | KeyCode::Char('H') => {
                model.show_help_popup().await;
            }
            _ => {}
        }
        Ok(())
    }
}
