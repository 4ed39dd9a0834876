//! Remote catalog/authentication API
//!
//! - `types`: serde wire types (releases, episodes, pagination, filters)
//! - `client`: reqwest-based client with bearer-token handling

mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{
    CatalogFilters, CatalogPage, CollectionType, Episode, Pagination, QuickFilter, Release, ReleaseId, User,
};
