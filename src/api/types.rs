//! Wire types of the AniLiberty API

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type ReleaseId = u64;

/// `{ value, description }` pairs the API uses for enumerations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labelled {
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseName {
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub english: Option<String>,
    #[serde(default)]
    pub alternative: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

/// Opening/ending range in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRange {
    pub start: Option<u64>,
    pub stop: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ordinal: f64,
    /// Seconds
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub hls_480: Option<String>,
    #[serde(default)]
    pub hls_720: Option<String>,
    #[serde(default)]
    pub hls_1080: Option<String>,
    #[serde(default)]
    pub opening: Option<SkipRange>,
    #[serde(default)]
    pub ending: Option<SkipRange>,
    #[serde(default)]
    pub release_id: Option<ReleaseId>,
}

impl Episode {
    pub fn duration_ms(&self) -> u64 {
        self.duration.unwrap_or(0).saturating_mul(1000)
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => format!("{} · {}", self.ordinal, name),
            _ => format!("Episode {}", self.ordinal),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: ReleaseId,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub name: Option<ReleaseName>,
    #[serde(rename = "type", default)]
    pub release_type: Option<Labelled>,
    #[serde(default)]
    pub season: Option<Labelled>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_ongoing: Option<bool>,
    #[serde(default)]
    pub episodes_total: Option<u32>,
    #[serde(default)]
    pub added_in_users_favorites: Option<u64>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

impl Release {
    /// Best human-readable title: main name, then English, then alias.
    pub fn title(&self) -> String {
        self.name
            .as_ref()
            .map(|n| n.main.clone())
            .filter(|t| !t.is_empty())
            .or_else(|| self.name.as_ref().and_then(|n| n.english.clone()))
            .unwrap_or_else(|| self.alias.clone())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub per_page: u64,
    pub current_page: u32,
    pub total_pages: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Paginated listing envelope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogPage {
    pub data: Vec<Release>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

impl CatalogPage {
    pub fn pagination(&self) -> Option<Pagination> {
        self.meta.as_ref().and_then(|m| m.pagination)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub from_year: Option<u32>,
    pub to_year: Option<u32>,
}

/// Catalog filter set; the key of the loader's page cursor.
///
/// Serializes to the `f` object of the account listing bodies; unset fields are left out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogFilters {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years: Option<YearRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorting: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub age_ratings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub publish_statuses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub production_statuses: Vec<String>,
}

impl CatalogFilters {
    pub fn sorted_by(sorting: &str) -> Self {
        Self { sorting: Some(sorting.to_string()), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Encode as `f[key]=a,b` and `f[key][sub]=v` query parameters.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        let mut push_list = |key: &str, values: Vec<String>| {
            if !values.is_empty() {
                params.push((format!("f[{key}]"), values.join(",")));
            }
        };
        push_list("genres", self.genres.iter().map(|g| g.to_string()).collect());
        push_list("types", self.types.clone());
        push_list("seasons", self.seasons.clone());
        push_list("age_ratings", self.age_ratings.clone());
        push_list("publish_statuses", self.publish_statuses.clone());
        push_list("production_statuses", self.production_statuses.clone());

        if let Some(years) = self.years {
            if let Some(from) = years.from_year {
                params.push(("f[years][from_year]".to_string(), from.to_string()));
            }
            if let Some(to) = years.to_year {
                params.push(("f[years][to_year]".to_string(), to.to_string()));
            }
        }
        if let Some(search) = self.search.as_ref().filter(|s| !s.is_empty()) {
            params.push(("f[search]".to_string(), search.clone()));
        }
        if let Some(sorting) = &self.sorting {
            params.push(("f[sorting]".to_string(), sorting.clone()));
        }

        params
    }
}

/// One-key filter presets shown above the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuickFilter {
    Latest,
    Popular,
    Ongoing,
    Completed,
    Movies,
    Tv,
}

impl QuickFilter {
    pub const ALL: [QuickFilter; 6] = [
        QuickFilter::Latest,
        QuickFilter::Popular,
        QuickFilter::Ongoing,
        QuickFilter::Completed,
        QuickFilter::Movies,
        QuickFilter::Tv,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Latest => "Latest",
            Self::Popular => "Popular",
            Self::Ongoing => "Ongoing",
            Self::Completed => "Completed",
            Self::Movies => "Movies",
            Self::Tv => "TV",
        }
    }

    pub fn is_active(self, filters: &CatalogFilters) -> bool {
        match self {
            Self::Latest => filters.sorting.as_deref() == Some("FRESH_AT_DESC"),
            Self::Popular => filters.sorting.as_deref() == Some("RATING_DESC"),
            Self::Ongoing => filters.publish_statuses == ["IS_ONGOING"],
            Self::Completed => filters.publish_statuses == ["IS_COMPLETED"],
            Self::Movies => filters.types == ["MOVIE"],
            Self::Tv => filters.types == ["TV"],
        }
    }

    /// Merge the preset into `filters`, or take it back out when already active.
    ///
    /// Presets on the same field replace each other; other fields are kept.
    pub fn toggle(self, filters: &CatalogFilters) -> CatalogFilters {
        let mut next = filters.clone();
        let active = self.is_active(filters);
        let list = |value: &str| if active { Vec::new() } else { vec![value.to_string()] };
        match self {
            Self::Latest => next.sorting = (!active).then(|| "FRESH_AT_DESC".to_string()),
            Self::Popular => next.sorting = (!active).then(|| "RATING_DESC".to_string()),
            Self::Ongoing => next.publish_statuses = list("IS_ONGOING"),
            Self::Completed => next.publish_statuses = list("IS_COMPLETED"),
            Self::Movies => next.types = list("MOVIE"),
            Self::Tv => next.types = list("TV"),
        }
        next
    }
}

/// The five user collections; a release sits in at most one of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionType {
    Planned,
    Watching,
    Watched,
    Postponed,
    Abandoned,
}

impl CollectionType {
    pub const ALL: [CollectionType; 5] = [
        CollectionType::Planned,
        CollectionType::Watching,
        CollectionType::Watched,
        CollectionType::Postponed,
        CollectionType::Abandoned,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::Watching => "WATCHING",
            Self::Watched => "WATCHED",
            Self::Postponed => "POSTPONED",
            Self::Abandoned => "ABANDONED",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Planned => "Planned",
            Self::Watching => "Watching",
            Self::Watched => "Watched",
            Self::Postponed => "Postponed",
            Self::Abandoned => "Abandoned",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Planned => Self::Watching,
            Self::Watching => Self::Watched,
            Self::Watched => Self::Postponed,
            Self::Postponed => Self::Abandoned,
            Self::Abandoned => Self::Planned,
        }
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown collection type: {s}"))
    }
}

/// `/collections/ids` returns `[[release_id, "TYPE"], ...]`; malformed rows are skipped.
pub fn parse_collection_ids(rows: &[serde_json::Value]) -> BTreeMap<ReleaseId, CollectionType> {
    rows.iter()
        .filter_map(|row| {
            let pair = row.as_array().filter(|a| a.len() == 2)?;
            let id = pair[0].as_u64()?;
            let kind = pair[1].as_str()?.parse().ok()?;
            Some((id, kind))
        })
        .collect()
}

/// `/favorites/ids` answers either a bare array or `{ "data": [...] }`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum IdList {
    Wrapped { data: Vec<ReleaseId> },
    Bare(Vec<ReleaseId>),
}

impl IdList {
    pub fn into_ids(self) -> Vec<ReleaseId> {
        match self {
            IdList::Wrapped { data } => data,
            IdList::Bare(ids) => ids,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ReleaseRef {
    pub release_id: ReleaseId,
}

/// Body of the favorites and collection listing endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct ListingRequest {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_of_collection: Option<CollectionType>,
    #[serde(skip_serializing_if = "CatalogFilters::is_empty")]
    pub f: CatalogFilters,
}

#[derive(Clone, Debug, Serialize)]
pub struct CollectionEntry {
    pub release_id: ReleaseId,
    pub type_of_collection: CollectionType,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthTokenResponse {
    pub token: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct OtpRequest {
    pub device_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct OtpLoginRequest {
    pub code: u32,
    pub device_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Otp {
    pub code: String,
    #[serde(default)]
    pub expired_at: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OtpResponse {
    pub otp: Otp,
    #[serde(default)]
    pub remaining_time: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        self.nickname
            .clone()
            .or_else(|| self.login.clone())
            .unwrap_or_else(|| format!("user #{}", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_encode_as_bracketed_query_keys() {
        let filters = CatalogFilters {
            genres: vec![1, 5],
            years: Some(YearRange { from_year: Some(2010), to_year: None }),
            sorting: Some("RATING_DESC".to_string()),
            search: Some(String::new()),
            ..Default::default()
        };

        assert_eq!(
            filters.to_query(),
            vec![
                ("f[genres]".to_string(), "1,5".to_string()),
                ("f[years][from_year]".to_string(), "2010".to_string()),
                ("f[sorting]".to_string(), "RATING_DESC".to_string()),
            ]
        );
        assert!(CatalogFilters::default().to_query().is_empty());
    }

    #[test]
    fn collection_rows_skip_malformed_entries() {
        let rows: Vec<serde_json::Value> = serde_json::from_str(
            r#"[[1, "PLANNED"], [2, "WATCHED"], [3], ["x", "PLANNED"], [4, "NOPE"], [5, "abandoned"]]"#,
        )
        .unwrap();

        let parsed = parse_collection_ids(&rows);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[&1], CollectionType::Planned);
        assert_eq!(parsed[&2], CollectionType::Watched);
        assert_eq!(parsed[&5], CollectionType::Abandoned);
    }

    #[test]
    fn favorite_ids_accept_both_shapes() {
        let bare: IdList = serde_json::from_str("[1, 2]").unwrap();
        let wrapped: IdList = serde_json::from_str(r#"{"data": [3]}"#).unwrap();
        assert_eq!(bare.into_ids(), vec![1, 2]);
        assert_eq!(wrapped.into_ids(), vec![3]);
    }

    #[test]
    fn catalog_page_parses_pagination_and_release_type() {
        let page: CatalogPage = serde_json::from_str(
            r#"{
                "data": [{"id": 9, "alias": "frieren", "type": {"value": "TV", "description": "TV"},
                          "name": {"main": "Фрирен", "english": "Frieren"}}],
                "meta": {"pagination": {"total": 41, "count": 20, "per_page": 20,
                                        "current_page": 1, "total_pages": 3}}
            }"#,
        )
        .unwrap();

        assert_eq!(page.data[0].title(), "Фрирен");
        assert_eq!(page.data[0].release_type.as_ref().unwrap().value, "TV");
        assert_eq!(page.pagination().unwrap().total_pages, 3);
    }

    #[test]
    fn quick_filters_merge_and_toggle_off() {
        let ongoing = QuickFilter::Ongoing.toggle(&CatalogFilters::default());
        let ongoing_movies = QuickFilter::Movies.toggle(&ongoing);
        assert_eq!(ongoing_movies.publish_statuses, vec!["IS_ONGOING"]);
        assert_eq!(ongoing_movies.types, vec!["MOVIE"]);

        // Same field: the newer preset wins
        let completed_movies = QuickFilter::Completed.toggle(&ongoing_movies);
        assert!(!QuickFilter::Ongoing.is_active(&completed_movies));
        assert!(QuickFilter::Completed.is_active(&completed_movies));

        let movies = QuickFilter::Completed.toggle(&completed_movies);
        assert!(movies.publish_statuses.is_empty());
        assert_eq!(QuickFilter::Movies.toggle(&movies), CatalogFilters::default());
    }

    #[test]
    fn filter_body_leaves_out_unset_fields() {
        let filters = QuickFilter::Popular.toggle(&CatalogFilters::default());
        assert_eq!(serde_json::to_value(&filters).unwrap(), serde_json::json!({"sorting": "RATING_DESC"}));
        assert_eq!(serde_json::to_value(CatalogFilters::default()).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn huge_episode_duration_saturates() {
        let episode = Episode { duration: Some(u64::MAX), ..Default::default() };
        assert_eq!(episode.duration_ms(), u64::MAX);
        assert_eq!(Episode { duration: Some(24 * 60), ..Default::default() }.duration_ms(), 1_440_000);
    }

    #[test]
    fn listing_request_body_matches_the_account_endpoints() {
        let body = ListingRequest {
            page: 2,
            limit: 20,
            type_of_collection: Some(CollectionType::Watching),
            f: QuickFilter::Tv.toggle(&CatalogFilters::default()),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"page": 2, "limit": 20, "type_of_collection": "WATCHING", "f": {"types": ["TV"]}})
        );

        let favorites = ListingRequest { page: 1, limit: 20, type_of_collection: None, f: CatalogFilters::default() };
        assert_eq!(serde_json::to_value(&favorites).unwrap(), serde_json::json!({"page": 1, "limit": 20}));
    }
}
