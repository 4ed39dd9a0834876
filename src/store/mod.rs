//! Client-side state kept in sync with the API
//!
//! - [`OptimisticStore`]: membership with optimistic updates, used for
//!   favorites and collections
//! - [`CatalogLoader`]: paginated release listings

mod catalog;
mod collections;
mod favorites;
mod optimistic;

pub use catalog::{CatalogLoader, CatalogSnapshot, CatalogSource, Listing, POPULAR_SORTING};
pub use collections::{CollectionMap, CollectionOp, CollectionsRemote};
pub use favorites::{FavoriteOp, FavoritesRemote};
pub use optimistic::{Membership, MembershipRemote, Mutation, OptimisticStore};

pub type FavoritesStore = OptimisticStore<FavoritesRemote>;
pub type CollectionsStore = OptimisticStore<CollectionsRemote>;
