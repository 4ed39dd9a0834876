//! Player status bar rendering

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Gauge},
    Frame,
};

use aniliberty_rs::player::{PlaybackSnapshot, PlaybackState};
use super::utils::format_duration;

fn state_label(playback: &PlaybackSnapshot) -> String {
    match playback.state {
        PlaybackState::Idle => "■".to_string(),
        PlaybackState::Loading => "… Loading".to_string(),
        PlaybackState::Ready => "● Ready".to_string(),
        PlaybackState::Playing => "▶".to_string(),
        PlaybackState::Paused => "⏸".to_string(),
        PlaybackState::Buffering => "… Buffering".to_string(),
        PlaybackState::Seeking => "» Seeking".to_string(),
        PlaybackState::Error if playback.terminal => "✖ Unavailable".to_string(),
        PlaybackState::Error if playback.retry_count < playback.max_retries => {
            format!("✖ Retrying ({}/{})", playback.retry_count + 1, playback.max_retries)
        }
        PlaybackState::Error => "✖ Failed (r to retry)".to_string(),
    }
}

pub fn render_progress_bar(frame: &mut Frame, area: Rect, playback: &PlaybackSnapshot) {
    let title = match &playback.episode {
        Some(episode) => format!(" {} {} ", state_label(playback), episode.display_name()),
        None => " Nothing playing ".to_string(),
    };

    let quality = match playback.stream_quality {
        Some(streamed) if streamed != playback.quality => format!("{} (asked {})", streamed, playback.quality),
        Some(streamed) => streamed.to_string(),
        None => playback.quality.to_string(),
    };
    let mut info = format!(" Quality: {quality} ");
    if let Some(error) = &playback.error {
        info = format!(" {error} |{info}");
    }

    let color = if playback.state == PlaybackState::Error { Color::Red } else { Color::Green };
    let time_str = format!(
        "{} / {}",
        format_duration(playback.position_ms),
        format_duration(playback.duration_ms)
    );

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_bottom(Line::from(info).right_aligned()),
        )
        .gauge_style(Style::default().fg(color))
        .ratio(playback.progress_ratio())
        .label(time_str);

    frame.render_widget(gauge, area);
}
