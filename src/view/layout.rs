//! Layout rendering (top bar, sidebar)

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};
use ratatui::widgets::Padding;

use crate::model::{ActiveSection, LibraryItem, UiState};
use super::Screen;

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    }
}

pub fn render_top_bar(frame: &mut Frame, area: Rect, ui_state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),     // Search input
            Constraint::Length(28), // Account
        ])
        .split(area);

    let searching = ui_state.active_section == ActiveSection::Search;
    let search_text = if ui_state.search_query.is_empty() && !searching {
        "Press / to search..."
    } else {
        &ui_state.search_query
    };

    let search = Paragraph::new(search_text)
        .style(if searching { Style::default().fg(Color::Green) } else { Style::default().fg(Color::White) })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Search ")
                .padding(Padding::horizontal(1))
                .border_style(focus_style(searching)),
        );
    frame.render_widget(search, chunks[0]);

    let (account, style) = match &ui_state.account {
        Some(name) => (format!("👤 {name}"), Style::default().fg(Color::Cyan)),
        None => ("Guest".to_string(), Style::default().fg(Color::DarkGray)),
    };
    let account = Paragraph::new(account)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(" Account "));
    frame.render_widget(account, chunks[1]);
}

/// Sidebar entry text; account listings show how many releases they hold.
fn library_label(item: LibraryItem, screen: &Screen) -> String {
    let count = match item {
        LibraryItem::Favorites => Some(screen.favorites.len()),
        LibraryItem::Collection(collection) => Some(screen.collection_counts.get(&collection).copied().unwrap_or(0)),
        _ => None,
    };
    match count {
        Some(count) if count > 0 => format!("{} ({count})", item.name()),
        _ => item.name().to_string(),
    }
}

pub fn render_sidebar(frame: &mut Frame, area: Rect, screen: &Screen) {
    let ui_state = &screen.ui_state;
    let focused = ui_state.active_section == ActiveSection::Library;

    let items: Vec<ListItem> = LibraryItem::ALL
        .iter()
        .enumerate()
        .map(|(i, &item)| {
            let style = if i == ui_state.library_selected && focused {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if i == ui_state.library_selected {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else if item.needs_account() && ui_state.account.is_none() {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(library_label(item, screen)).style(style)
        })
        .collect();

    let library = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Library ")
            .padding(Padding::horizontal(1))
            .border_style(focus_style(focused)),
    );
    frame.render_widget(library, area);
}
