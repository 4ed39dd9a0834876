//! Navigation-related controller methods (library, search, paging, release detail)

use aniliberty_rs::api::QuickFilter;

use crate::model::LibraryItem;
use super::AppController;

impl AppController {
    /// Fetch the first listing and the membership stores from the server.
    pub async fn initial_load(&self) {
        let services = &self.services;
        let (catalog, favorites, collections) = futures::join!(
            services.catalog.load_page(1, Default::default()),
            services.favorites.load(),
            services.collections.load(),
        );
        self.report("catalog", catalog).await;
        self.report("favorites", favorites).await;
        self.report("collections", collections).await;
    }

    pub async fn open_library_item(&self, item: LibraryItem) {
        tracing::debug!(item = item.name(), "Opening library item");
        if item.needs_account() && !self.require_account(item.name()).await {
            return;
        }
        {
            let model = self.model.lock().await;
            model.reset_release_selection().await;
        }

        let catalog = &self.services.catalog;
        let result = match item {
            LibraryItem::Catalog => catalog.load_page(1, Default::default()).await,
            LibraryItem::Popular => catalog.load_popular().await,
            LibraryItem::Latest => catalog.load_latest().await,
            LibraryItem::Random => catalog.load_random().await,
            LibraryItem::Recommended => {
                let around = catalog.current_release().map(|release| release.id);
                catalog.load_recommended(around).await
            }
            LibraryItem::Favorites => catalog.load_favorites().await,
            LibraryItem::Collection(collection) => catalog.load_collection(collection).await,
        };
        self.report(item.name(), result).await;
    }

    /// Toggle a filter preset on the current listing, or clear all filters.
    pub async fn apply_quick_filter(&self, preset: Option<QuickFilter>) {
        {
            let model = self.model.lock().await;
            model.reset_release_selection().await;
        }
        let catalog = &self.services.catalog;
        let result = match preset {
            Some(preset) => {
                tracing::debug!(preset = preset.label(), "Toggling quick filter");
                catalog.toggle_quick_filter(preset).await
            }
            None => catalog.clear_filters().await,
        };
        self.report("filters", result).await;
    }

    pub async fn perform_search(&self, query: &str) {
        tracing::debug!(query, "Performing search");
        {
            let model = self.model.lock().await;
            model.reset_release_selection().await;
        }
        let result = self.services.catalog.search(query).await;
        if result.is_ok() {
            tracing::info!(query, results = self.services.catalog.releases().len(), "Search completed");
        }
        self.report("search", result).await;
    }

    /// Next catalog page; a call while a page is in flight is ignored.
    pub async fn load_more(&self) {
        match self.services.catalog.load_more().await {
            Ok(true) => {
                tracing::debug!(page = self.services.catalog.current_page(), "Loaded more releases");
            }
            Ok(false) => {}
            Err(e) => self.show_error("load_more", &e).await,
        }
    }

    pub async fn refresh(&self) {
        let result = self.services.catalog.refresh().await;
        self.report("refresh", result).await;
    }

    /// Load the selected release with its episodes and focus the episode list.
    pub async fn open_selected_release(&self) {
        let Some(release) = self.selected_release().await else {
            return;
        };
        tracing::debug!(release_id = release.id, alias = %release.alias, "Opening release");

        let key = if release.alias.is_empty() { release.id.to_string() } else { release.alias.clone() };
        match self.services.catalog.load_release(&key).await {
            Ok(_) => {
                let model = self.model.lock().await;
                model.open_episodes().await;
            }
            Err(e) => self.show_error("release", &e).await,
        }
    }

    pub async fn close_release(&self) {
        self.services.catalog.close_release();
        let model = self.model.lock().await;
        model.close_episodes().await;
    }
}
