//! Core type definitions for the terminal front end

use std::time::Instant;

use aniliberty_rs::api::CollectionType;

/// Which section of the UI is currently active/focused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveSection {
    Search,
    Library,
    Releases,
    Episodes,
}

impl ActiveSection {
    pub fn next(self) -> Self {
        match self {
            ActiveSection::Search => ActiveSection::Library,
            ActiveSection::Library => ActiveSection::Releases,
            ActiveSection::Releases => ActiveSection::Episodes,
            ActiveSection::Episodes => ActiveSection::Search,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            ActiveSection::Search => ActiveSection::Episodes,
            ActiveSection::Library => ActiveSection::Search,
            ActiveSection::Releases => ActiveSection::Library,
            ActiveSection::Episodes => ActiveSection::Releases,
        }
    }
}

/// An entry of the Library sidebar; each opens one listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryItem {
    Catalog,
    Popular,
    Latest,
    Random,
    Recommended,
    Favorites,
    Collection(CollectionType),
}

impl LibraryItem {
    pub const ALL: [LibraryItem; 11] = [
        LibraryItem::Catalog,
        LibraryItem::Popular,
        LibraryItem::Latest,
        LibraryItem::Random,
        LibraryItem::Recommended,
        LibraryItem::Favorites,
        LibraryItem::Collection(CollectionType::Planned),
        LibraryItem::Collection(CollectionType::Watching),
        LibraryItem::Collection(CollectionType::Watched),
        LibraryItem::Collection(CollectionType::Postponed),
        LibraryItem::Collection(CollectionType::Abandoned),
    ];

    pub fn name(self) -> &'static str {
        match self {
            LibraryItem::Catalog => "Catalog",
            LibraryItem::Popular => "Popular",
            LibraryItem::Latest => "Latest",
            LibraryItem::Random => "Random",
            LibraryItem::Recommended => "Recommended",
            LibraryItem::Favorites => "Favorites",
            LibraryItem::Collection(collection) => collection.label(),
        }
    }

    /// Account listings need a logged-in session.
    pub fn needs_account(self) -> bool {
        matches!(self, LibraryItem::Favorites | LibraryItem::Collection(_))
    }
}

/// UI state for the application
#[derive(Clone)]
pub struct UiState {
    pub active_section: ActiveSection,
    pub search_query: String,
    pub library_selected: usize,
    pub release_selected: usize,
    pub episode_selected: usize,
    pub account: Option<String>,
    pub error_message: Option<String>,
    pub error_timestamp: Option<Instant>,
    pub show_help_popup: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            active_section: ActiveSection::Releases,
            search_query: String::new(),
            library_selected: 0,
            release_selected: 0,
            episode_selected: 0,
            account: None,
            error_message: None,
            error_timestamp: None,
            show_help_popup: false,
        }
    }
}
