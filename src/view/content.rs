//! Main content area rendering (release listing, episode list)

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, ListItem, Paragraph},
    Frame,
};
use ratatui::widgets::Padding;

use aniliberty_rs::api::{QuickFilter, Release};
use aniliberty_rs::store::CatalogSnapshot;

use crate::model::ActiveSection;
use super::utils::{format_duration, render_scrollable_list, truncate_string};
use super::Screen;

pub fn render_main_content(frame: &mut Frame, area: Rect, screen: &Screen) {
    match (&screen.catalog.current_release, screen.ui_state.active_section) {
        (Some(release), ActiveSection::Episodes) => render_episodes(frame, area, screen, release),
        _ => render_releases(frame, area, screen),
    }
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    }
}

/// Listing name followed by the active filter presets.
fn listing_title(catalog: &CatalogSnapshot) -> String {
    let mut title = format!(" {} ", catalog.listing.title());
    if catalog.listing.is_paged() {
        let active: Vec<&str> = QuickFilter::ALL
            .iter()
            .filter(|preset| preset.is_active(&catalog.filters))
            .map(|preset| preset.label())
            .collect();
        if !active.is_empty() {
            title.push_str(&format!("[{}] ", active.join(", ")));
        }
    }
    title
}

fn render_releases(frame: &mut Frame, area: Rect, screen: &Screen) {
    let catalog = &screen.catalog;
    let focused = screen.ui_state.active_section == ActiveSection::Releases;

    let mut title = listing_title(catalog);
    if catalog.is_loading {
        title.push_str("(loading...) ");
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .padding(Padding::horizontal(1))
        .border_style(border_style(focused));

    if catalog.releases.is_empty() {
        let message = if catalog.is_loading { "Loading..." } else { "Nothing here. Pick a list in Library or search." };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let title_width = (area.width as usize).saturating_sub(32).max(10);
    let mut items: Vec<ListItem> = catalog
        .releases
        .iter()
        .enumerate()
        .map(|(i, release)| {
            let selected = i == screen.ui_state.release_selected;
            let favorite = if screen.favorites.contains(&release.id) { "★" } else { " " };
            let collection = screen
                .collections
                .get(&release.id)
                .map(|c| format!("[{}]", c.as_str()))
                .unwrap_or_default();
            let year = release.year.map(|y| y.to_string()).unwrap_or_default();

            let style = if selected && focused {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if selected {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{favorite} "), Style::default().fg(Color::Yellow)),
                Span::styled(truncate_string(&release.title(), title_width), style),
                Span::styled(format!(" {year:>4} "), Style::default().fg(Color::DarkGray)),
                Span::styled(collection, Style::default().fg(Color::Cyan)),
            ]))
        })
        .collect();

    if catalog.has_more {
        items.push(ListItem::new("  ↓ more").style(Style::default().fg(Color::DarkGray)));
    }

    render_scrollable_list(frame, area, items, screen.ui_state.release_selected, block);
}

fn render_episodes(frame: &mut Frame, area: Rect, screen: &Screen, release: &Release) {
    let playing_id = screen.playback.episode.as_ref().map(|e| e.id.as_str());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", release.title()))
        .title_bottom(Line::from(" Esc back ").right_aligned())
        .padding(Padding::horizontal(1))
        .border_style(border_style(true));

    if release.episodes.is_empty() {
        let empty = Paragraph::new("No episodes published yet.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let name_width = (area.width as usize).saturating_sub(20).max(10);
    let items: Vec<ListItem> = release
        .episodes
        .iter()
        .enumerate()
        .map(|(i, episode)| {
            let is_playing = playing_id == Some(episode.id.as_str());
            let marker = if is_playing { "▶" } else { " " };
            let style = if i == screen.ui_state.episode_selected {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if is_playing {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            let duration = match episode.duration_ms() {
                0 => String::new(),
                ms => format_duration(ms),
            };
            ListItem::new(format!(
                "{marker} {} {duration:>8}",
                truncate_string(&episode.display_name(), name_width)
            ))
            .style(style)
        })
        .collect();

    render_scrollable_list(frame, area, items, screen.ui_state.episode_selected, block);
}
