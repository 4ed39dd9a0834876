//! Stream quality and episode URL resolution

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::Episode;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::Low, Quality::Medium, Quality::High];

    /// Vertical resolution in pixels
    pub fn height(self) -> u32 {
        match self {
            Quality::Low => 480,
            Quality::Medium => 720,
            Quality::High => 1080,
        }
    }

    /// Next quality in the cycle used by the quality key.
    pub fn next(self) -> Self {
        match self {
            Quality::Low => Quality::Medium,
            Quality::Medium => Quality::High,
            Quality::High => Quality::Low,
        }
    }

    fn url(self, episode: &Episode) -> Option<&str> {
        let url = match self {
            Quality::Low => episode.hls_480.as_deref(),
            Quality::Medium => episode.hls_720.as_deref(),
            Quality::High => episode.hls_1080.as_deref(),
        };
        url.filter(|u| !u.is_empty())
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.height())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "480" | "480p" => Ok(Quality::Low),
            "medium" | "720" | "720p" => Ok(Quality::Medium),
            "high" | "1080" | "1080p" => Ok(Quality::High),
            other => Err(format!("unknown quality: {other} (expected 480p, 720p or 1080p)")),
        }
    }
}

/// Stream URL for `wanted`, or for the nearest quality the episode has.
///
/// Ties go to the lower quality.
pub fn resolve_stream(episode: &Episode, wanted: Quality) -> Option<(Quality, String)> {
    let mut candidates = Quality::ALL;
    candidates.sort_by_key(|q| (q.height().abs_diff(wanted.height()), q.height()));

    candidates
        .into_iter()
        .find_map(|q| q.url(episode).map(|url| (q, url.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(low: Option<&str>, medium: Option<&str>, high: Option<&str>) -> Episode {
        Episode {
            id: "ep".to_string(),
            hls_480: low.map(str::to_string),
            hls_720: medium.map(str::to_string),
            hls_1080: high.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn exact_quality_wins() {
        let ep = episode(Some("l"), Some("m"), Some("h"));
        assert_eq!(resolve_stream(&ep, Quality::High), Some((Quality::High, "h".to_string())));
    }

    #[test]
    fn missing_quality_falls_back_to_nearest() {
        let ep = episode(Some("l"), None, Some("h"));
        assert_eq!(resolve_stream(&ep, Quality::Medium), Some((Quality::Low, "l".to_string())));

        let ep = episode(Some("l"), Some(""), None);
        assert_eq!(resolve_stream(&ep, Quality::High), Some((Quality::Low, "l".to_string())));
    }

    #[test]
    fn episode_without_streams_resolves_to_none() {
        assert_eq!(resolve_stream(&episode(None, None, None), Quality::Medium), None);
    }

    #[test]
    fn quality_parses_labels_and_heights() {
        assert_eq!("1080p".parse::<Quality>(), Ok(Quality::High));
        assert_eq!(" Low ".parse::<Quality>(), Ok(Quality::Low));
        assert_eq!("720".parse::<Quality>(), Ok(Quality::Medium));
        assert!("4k".parse::<Quality>().is_err());
        assert_eq!(Quality::Medium.to_string(), "720p");
    }
}
