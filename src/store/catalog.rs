//! Paginated release listings and the release detail view

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::api::{CatalogFilters, CatalogPage, CollectionType, QuickFilter, Release, ReleaseId};
use crate::config::CatalogConfig;
use crate::error::ApiResult;

/// Sort key of the "popular" listing.
pub const POPULAR_SORTING: &str = "RATING_DESC";

/// Read side of the release endpoints.
#[async_trait]
pub trait CatalogSource: Send + Sync + 'static {
    async fn catalog_page(&self, page: u32, limit: u32, filters: &CatalogFilters) -> ApiResult<CatalogPage>;
    async fn favorite_releases(&self, page: u32, limit: u32, filters: &CatalogFilters) -> ApiResult<CatalogPage>;
    async fn collection_releases(
        &self,
        collection: CollectionType,
        page: u32,
        limit: u32,
        filters: &CatalogFilters,
    ) -> ApiResult<CatalogPage>;
    async fn latest(&self, limit: u32) -> ApiResult<Vec<Release>>;
    async fn random(&self, limit: u32) -> ApiResult<Vec<Release>>;
    async fn recommended(&self, limit: u32, release_id: Option<ReleaseId>) -> ApiResult<Vec<Release>>;
    async fn search(&self, query: &str) -> ApiResult<Vec<Release>>;
    async fn release(&self, id_or_alias: &str) -> ApiResult<Release>;
}

/// What the current list shows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Listing {
    #[default]
    Catalog,
    Latest,
    Random,
    Recommended,
    Search(String),
    Favorites,
    Collection(CollectionType),
}

impl Listing {
    /// Fetched page by page, with filters.
    pub fn is_paged(&self) -> bool {
        matches!(self, Listing::Catalog | Listing::Favorites | Listing::Collection(_))
    }

    pub fn title(&self) -> String {
        match self {
            Listing::Catalog => "Catalog".to_string(),
            Listing::Favorites => "Favorites".to_string(),
            Listing::Collection(collection) => format!("Collection: {}", collection.label()),
            Listing::Latest => "Latest".to_string(),
            Listing::Random => "Random".to_string(),
            Listing::Recommended => "Recommended".to_string(),
            Listing::Search(query) => format!("Search: {query}"),
        }
    }
}

/// Copy of the loader state for rendering.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    pub listing: Listing,
    pub releases: Vec<Release>,
    pub filters: CatalogFilters,
    pub current_page: u32,
    pub has_more: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub current_release: Option<Release>,
}

#[derive(Default)]
struct LoaderState {
    listing: Listing,
    releases: Vec<Release>,
    filters: CatalogFilters,
    current_page: u32,
    has_more: bool,
    generation: u64,
    /// Generation of the request holding the in-flight guard
    in_flight: Option<u64>,
    error: Option<String>,
    current_release: Option<Release>,
    release_generation: u64,
}

impl LoaderState {
    fn begin(&mut self, fresh: bool) -> u64 {
        if fresh {
            self.generation += 1;
        }
        self.in_flight = Some(self.generation);
        self.error = None;
        self.generation
    }

    /// Release the guard if `generation` holds it; true when the response is current.
    fn finish(&mut self, generation: u64) -> bool {
        if self.in_flight == Some(generation) {
            self.in_flight = None;
        }
        generation == self.generation
    }
}

/// Listing state with a page cursor, fed by a [`CatalogSource`].
pub struct CatalogLoader<S: CatalogSource> {
    source: S,
    config: CatalogConfig,
    state: RwLock<LoaderState>,
}

impl<S: CatalogSource> CatalogLoader<S> {
    pub fn new(source: S, config: CatalogConfig) -> Self {
        Self { source, config, state: RwLock::new(LoaderState::default()) }
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.state.read();
        CatalogSnapshot {
            listing: state.listing.clone(),
            releases: state.releases.clone(),
            filters: state.filters.clone(),
            current_page: state.current_page,
            has_more: state.has_more,
            is_loading: state.in_flight.is_some(),
            error: state.error.clone(),
            current_release: state.current_release.clone(),
        }
    }

    pub fn releases(&self) -> Vec<Release> {
        self.state.read().releases.clone()
    }

    pub fn has_more(&self) -> bool {
        self.state.read().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().in_flight.is_some()
    }

    pub fn current_page(&self) -> u32 {
        self.state.read().current_page
    }

    pub fn filters(&self) -> CatalogFilters {
        self.state.read().filters.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn current_release(&self) -> Option<Release> {
        self.state.read().current_release.clone()
    }

    // ========================================================================
    // Paginated listings
    // ========================================================================

    /// Load one catalog page. Page 1 replaces the list and starts a new
    /// generation; later pages append to it.
    pub async fn load_page(&self, page: u32, filters: CatalogFilters) -> ApiResult<()> {
        self.load_listing_page(Listing::Catalog, page, filters).await
    }

    /// First page of the account's favorite releases.
    pub async fn load_favorites(&self) -> ApiResult<()> {
        self.load_listing_page(Listing::Favorites, 1, CatalogFilters::default()).await
    }

    /// First page of the releases in one of the account's collections.
    pub async fn load_collection(&self, collection: CollectionType) -> ApiResult<()> {
        self.load_listing_page(Listing::Collection(collection), 1, CatalogFilters::default()).await
    }

    async fn load_listing_page(&self, listing: Listing, page: u32, filters: CatalogFilters) -> ApiResult<()> {
        let page = page.max(1);
        let generation = {
            let mut state = self.state.write();
            let fresh = page == 1 || filters != state.filters || state.listing != listing;
            state.filters = filters.clone();
            state.listing = listing.clone();
            state.begin(fresh)
        };
        self.fetch_page(&listing, page, filters, generation).await
    }

    /// Load the page after the current one with the same filters.
    ///
    /// Returns `Ok(false)` without a request when there is nothing more or a
    /// load is already running.
    pub async fn load_more(&self) -> ApiResult<bool> {
        let (listing, page, filters, generation) = {
            let mut state = self.state.write();
            if !state.has_more || state.in_flight.is_some() || !state.listing.is_paged() {
                return Ok(false);
            }
            let page = state.current_page + 1;
            (state.listing.clone(), page, state.filters.clone(), state.begin(false))
        };
        self.fetch_page(&listing, page, filters, generation).await?;
        Ok(true)
    }

    /// Replace the filters and reload from page 1.
    ///
    /// Applies to the current paged listing; after a feed it goes back to the catalog.
    pub async fn set_filters(&self, filters: CatalogFilters) -> ApiResult<()> {
        let mut listing = self.state.read().listing.clone();
        if !listing.is_paged() {
            listing = Listing::Catalog;
        }
        tracing::debug!(listing = ?listing, ?filters, "Filters changed");
        self.load_listing_page(listing, 1, filters).await
    }

    pub async fn clear_filters(&self) -> ApiResult<()> {
        self.set_filters(CatalogFilters::default()).await
    }

    /// Switch a filter preset on, or off when it is already active.
    pub async fn toggle_quick_filter(&self, preset: QuickFilter) -> ApiResult<()> {
        let filters = preset.toggle(&self.filters());
        self.set_filters(filters).await
    }

    /// Reload the current listing from its first page.
    pub async fn refresh(&self) -> ApiResult<()> {
        let listing = self.state.read().listing.clone();
        match listing {
            Listing::Catalog | Listing::Favorites | Listing::Collection(_) => {
                self.load_listing_page(listing, 1, self.filters()).await
            }
            Listing::Latest => self.load_latest().await,
            Listing::Random => self.load_random().await,
            Listing::Recommended => self.load_recommended(None).await,
            Listing::Search(query) => self.search(&query).await,
        }
    }

    /// The catalog sorted by rating, from its first page.
    pub async fn load_popular(&self) -> ApiResult<()> {
        self.load_page(1, CatalogFilters::sorted_by(POPULAR_SORTING)).await
    }

    async fn fetch_page(&self, listing: &Listing, page: u32, filters: CatalogFilters, generation: u64) -> ApiResult<()> {
        tracing::debug!(listing = ?listing, page, generation, "Loading page");
        let limit = self.config.page_size;
        let result = match listing {
            Listing::Favorites => self.source.favorite_releases(page, limit, &filters).await,
            Listing::Collection(collection) => {
                self.source.collection_releases(*collection, page, limit, &filters).await
            }
            _ => self.source.catalog_page(page, limit, &filters).await,
        };

        let mut state = self.state.write();
        if !state.finish(generation) {
            tracing::debug!(listing = ?listing, page, generation, current = state.generation, "Discarding stale page");
            return Ok(());
        }

        match result {
            Ok(response) => {
                let has_more = match response.pagination() {
                    Some(p) => p.current_page < p.total_pages,
                    None => response.data.len() as u32 >= limit,
                };

                if page == 1 {
                    state.releases = response.data;
                } else {
                    let before = state.releases.len();
                    for release in response.data {
                        if !state.releases.iter().any(|r| r.id == release.id) {
                            state.releases.push(release);
                        }
                    }
                    tracing::trace!(page, appended = state.releases.len() - before, "Appended page");
                }
                state.current_page = page;
                state.has_more = has_more;
                tracing::info!(listing = ?listing, page, total = state.releases.len(), has_more, "Page loaded");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(listing = ?listing, page, error = %err, "Page failed, keeping current list");
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    // ========================================================================
    // Feeds
    // ========================================================================

    pub async fn load_latest(&self) -> ApiResult<()> {
        let limit = self.config.latest_limit;
        self.load_feed(Listing::Latest, self.source.latest(limit)).await
    }

    pub async fn load_random(&self) -> ApiResult<()> {
        let limit = self.config.feed_limit;
        self.load_feed(Listing::Random, self.source.random(limit)).await
    }

    /// Recommendations, optionally relative to one release.
    pub async fn load_recommended(&self, release_id: Option<ReleaseId>) -> ApiResult<()> {
        let limit = self.config.feed_limit;
        self.load_feed(Listing::Recommended, self.source.recommended(limit, release_id)).await
    }

    /// An empty query clears the list without a request.
    pub async fn search(&self, query: &str) -> ApiResult<()> {
        let query = query.trim();
        if query.is_empty() {
            let mut state = self.state.write();
            state.generation += 1;
            state.in_flight = None;
            state.listing = Listing::Search(String::new());
            state.releases.clear();
            state.has_more = false;
            state.error = None;
            return Ok(());
        }
        self.load_feed(Listing::Search(query.to_string()), self.source.search(query)).await
    }

    async fn load_feed<F>(&self, listing: Listing, request: F) -> ApiResult<()>
    where
        F: std::future::Future<Output = ApiResult<Vec<Release>>>,
    {
        let generation = {
            let mut state = self.state.write();
            state.listing = listing.clone();
            state.begin(true)
        };
        tracing::debug!(listing = ?listing, generation, "Loading feed");

        let result = request.await;

        let mut state = self.state.write();
        if !state.finish(generation) {
            tracing::debug!(listing = ?listing, generation, "Discarding stale feed");
            return Ok(());
        }
        match result {
            Ok(releases) => {
                tracing::info!(listing = ?listing, count = releases.len(), "Feed loaded");
                state.releases = releases;
                state.current_page = 1;
                state.has_more = false;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(listing = ?listing, error = %err, "Feed failed, keeping current list");
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    // ========================================================================
    // Release detail
    // ========================================================================

    pub async fn load_release(&self, id_or_alias: &str) -> ApiResult<Release> {
        let generation = {
            let mut state = self.state.write();
            state.release_generation += 1;
            state.release_generation
        };

        let result = self.source.release(id_or_alias).await;

        let mut state = self.state.write();
        match result {
            Ok(release) => {
                if generation == state.release_generation {
                    tracing::debug!(release_id = release.id, episodes = release.episodes.len(), "Release loaded");
                    state.current_release = Some(release.clone());
                }
                Ok(release)
            }
            Err(err) => {
                if generation == state.release_generation {
                    state.error = Some(err.to_string());
                }
                Err(err)
            }
        }
    }

    pub fn close_release(&self) {
        let mut state = self.state.write();
        state.release_generation += 1;
        state.current_release = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Pagination;
    use crate::api::types::PageMeta;
    use crate::error::ApiError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    enum Reply {
        Now(ApiResult<CatalogPage>),
        Deferred(oneshot::Receiver<ApiResult<CatalogPage>>),
    }

    #[derive(Default)]
    struct ScriptedCatalog {
        pages: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<(Listing, u32, CatalogFilters)>>,
        feed_calls: AtomicUsize,
    }

    impl ScriptedCatalog {
        fn push(&self, reply: ApiResult<CatalogPage>) {
            self.pages.lock().push_back(Reply::Now(reply));
        }

        fn defer(&self) -> oneshot::Sender<ApiResult<CatalogPage>> {
            let (tx, rx) = oneshot::channel();
            self.pages.lock().push_back(Reply::Deferred(rx));
            tx
        }

        async fn next_page(&self, listing: Listing, page: u32, filters: &CatalogFilters) -> ApiResult<CatalogPage> {
            self.requests.lock().push((listing, page, filters.clone()));
            let next = self.pages.lock().pop_front();
            match next {
                Some(Reply::Now(reply)) => reply,
                Some(Reply::Deferred(rx)) => rx.await.unwrap_or(Err(ApiError::Network { reason: "dropped".into() })),
                None => Err(ApiError::Network { reason: "unscripted".into() }),
            }
        }

        fn requested(&self) -> Vec<(Listing, u32)> {
            self.requests.lock().iter().map(|(listing, page, _)| (listing.clone(), *page)).collect()
        }
    }

    #[async_trait]
    impl CatalogSource for ScriptedCatalog {
        async fn catalog_page(&self, page: u32, _limit: u32, filters: &CatalogFilters) -> ApiResult<CatalogPage> {
            self.next_page(Listing::Catalog, page, filters).await
        }

        async fn favorite_releases(&self, page: u32, _limit: u32, filters: &CatalogFilters) -> ApiResult<CatalogPage> {
            self.next_page(Listing::Favorites, page, filters).await
        }

        async fn collection_releases(
            &self,
            collection: CollectionType,
            page: u32,
            _limit: u32,
            filters: &CatalogFilters,
        ) -> ApiResult<CatalogPage> {
            self.next_page(Listing::Collection(collection), page, filters).await
        }

        async fn latest(&self, limit: u32) -> ApiResult<Vec<Release>> {
            self.feed_calls.fetch_add(1, Ordering::SeqCst);
            Ok((1..=limit as u64).map(release).collect())
        }

        async fn random(&self, _limit: u32) -> ApiResult<Vec<Release>> {
            Err(ApiError::Server { status: 502, message: "bad gateway".into() })
        }

        async fn recommended(&self, _limit: u32, _release_id: Option<ReleaseId>) -> ApiResult<Vec<Release>> {
            Ok(vec![release(99)])
        }

        async fn search(&self, query: &str) -> ApiResult<Vec<Release>> {
            self.feed_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Release { alias: query.to_string(), ..release(500) }])
        }

        async fn release(&self, id_or_alias: &str) -> ApiResult<Release> {
            match id_or_alias.parse() {
                Ok(id) => Ok(release(id)),
                Err(_) => Err(ApiError::Server { status: 404, message: "not found".into() }),
            }
        }
    }

    fn release(id: ReleaseId) -> Release {
        Release { id, alias: format!("release-{id}"), ..Default::default() }
    }

    fn page(ids: &[ReleaseId], current_page: u32, total_pages: u32) -> CatalogPage {
        CatalogPage {
            data: ids.iter().copied().map(release).collect(),
            meta: Some(PageMeta {
                pagination: Some(Pagination { current_page, total_pages, ..Default::default() }),
            }),
        }
    }

    fn loader(page_size: u32) -> CatalogLoader<ScriptedCatalog> {
        let config = CatalogConfig { page_size, latest_limit: 3, feed_limit: 2 };
        CatalogLoader::new(ScriptedCatalog::default(), config)
    }

    fn ids(loader: &CatalogLoader<ScriptedCatalog>) -> Vec<ReleaseId> {
        loader.releases().iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn second_page_appends_without_duplicates() {
        let catalog = loader(3);
        catalog.source.push(Ok(page(&[1, 2, 3], 1, 3)));
        catalog.source.push(Ok(page(&[3, 4, 5], 2, 3)));

        catalog.load_page(1, CatalogFilters::default()).await.unwrap();
        assert!(catalog.has_more());
        assert!(catalog.load_more().await.unwrap());

        assert_eq!(ids(&catalog), vec![1, 2, 3, 4, 5]);
        assert_eq!(catalog.current_page(), 2);
        assert!(catalog.has_more());
    }

    #[tokio::test]
    async fn last_page_stops_load_more() {
        let catalog = loader(2);
        catalog.source.push(Ok(page(&[1, 2], 1, 1)));

        catalog.load_page(1, CatalogFilters::default()).await.unwrap();

        assert!(!catalog.has_more());
        assert!(!catalog.load_more().await.unwrap());
        assert_eq!(catalog.source.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn without_pagination_a_short_page_ends_the_list() {
        let catalog = loader(3);
        catalog.source.push(Ok(CatalogPage { data: vec![release(1), release(2), release(3)], meta: None }));
        catalog.source.push(Ok(CatalogPage { data: vec![release(4)], meta: None }));

        catalog.load_page(1, CatalogFilters::default()).await.unwrap();
        assert!(catalog.has_more());
        catalog.load_more().await.unwrap();
        assert!(!catalog.has_more());
    }

    #[tokio::test]
    async fn concurrent_load_more_fetches_once() {
        let catalog = loader(2);
        catalog.source.push(Ok(page(&[1, 2], 1, 5)));
        catalog.load_page(1, CatalogFilters::default()).await.unwrap();

        let tx = catalog.source.defer();
        let first = catalog.load_more();
        let second = async {
            tokio::task::yield_now().await;
            let started = catalog.load_more().await;
            tx.send(Ok(page(&[3, 4], 2, 5))).unwrap();
            started
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.unwrap());
        assert!(!second.unwrap());
        assert_eq!(catalog.source.requests.lock().len(), 2);
        assert_eq!(ids(&catalog), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn response_for_old_filters_is_discarded() {
        let catalog = loader(2);
        let old = catalog.source.defer();
        catalog.source.push(Ok(page(&[20, 21], 1, 1)));

        let anime_movies = CatalogFilters { types: vec!["MOVIE".to_string()], ..Default::default() };
        let stale = catalog.load_page(1, CatalogFilters::default());
        let newer = async {
            tokio::task::yield_now().await;
            catalog.set_filters(anime_movies.clone()).await.unwrap();
            old.send(Ok(page(&[1, 2], 1, 9))).unwrap();
        };
        let (stale, ()) = tokio::join!(stale, newer);

        assert!(stale.is_ok());
        assert_eq!(ids(&catalog), vec![20, 21]);
        assert_eq!(catalog.filters(), anime_movies);
        assert!(!catalog.has_more());
        assert!(!catalog.is_loading());
    }

    #[tokio::test]
    async fn failure_keeps_the_previous_list() {
        let catalog = loader(2);
        catalog.source.push(Ok(page(&[1, 2], 1, 3)));
        catalog.source.push(Err(ApiError::Network { reason: "timeout".into() }));

        catalog.load_page(1, CatalogFilters::default()).await.unwrap();
        assert!(catalog.load_more().await.is_err());

        assert_eq!(ids(&catalog), vec![1, 2]);
        assert_eq!(catalog.current_page(), 1);
        assert!(catalog.has_more());
        assert_eq!(catalog.error().as_deref(), Some("Network error: timeout"));
        assert!(!catalog.is_loading());
    }

    #[tokio::test]
    async fn popular_sorts_by_rating() {
        let catalog = loader(2);
        catalog.source.push(Ok(page(&[7], 1, 1)));

        catalog.load_popular().await.unwrap();

        let requests = catalog.source.requests.lock();
        assert_eq!(requests[0].2.sorting.as_deref(), Some(POPULAR_SORTING));
    }

    #[tokio::test]
    async fn feeds_replace_the_list_and_end_pagination() {
        let catalog = loader(2);
        catalog.source.push(Ok(page(&[1, 2], 1, 4)));
        catalog.load_page(1, CatalogFilters::default()).await.unwrap();

        catalog.load_latest().await.unwrap();
        assert_eq!(ids(&catalog), vec![1, 2, 3]);
        assert!(!catalog.has_more());
        assert_eq!(catalog.snapshot().listing, Listing::Latest);
        assert!(!catalog.load_more().await.unwrap());

        assert!(catalog.load_random().await.is_err());
        assert_eq!(ids(&catalog), vec![1, 2, 3]);

        catalog.search("  frieren ").await.unwrap();
        assert_eq!(catalog.releases()[0].alias, "frieren");
        assert_eq!(catalog.snapshot().listing.title(), "Search: frieren");

        catalog.search("   ").await.unwrap();
        assert!(catalog.releases().is_empty());
        assert_eq!(catalog.source.feed_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn release_detail_is_kept_until_closed() {
        let catalog = loader(2);

        let release = catalog.load_release("42").await.unwrap();
        assert_eq!(release.id, 42);
        assert_eq!(catalog.current_release().map(|r| r.id), Some(42));

        assert!(catalog.load_release("missing").await.is_err());
        assert_eq!(catalog.current_release().map(|r| r.id), Some(42));

        catalog.close_release();
        assert!(catalog.current_release().is_none());
    }

    #[tokio::test]
    async fn favorites_and_collections_page_through_their_own_endpoints() {
        let catalog = loader(2);
        catalog.source.push(Ok(page(&[1, 2], 1, 2)));
        catalog.source.push(Ok(page(&[2, 3], 2, 2)));
        catalog.source.push(Ok(page(&[9], 1, 1)));

        catalog.load_favorites().await.unwrap();
        assert!(catalog.load_more().await.unwrap());
        assert_eq!(ids(&catalog), vec![1, 2, 3]);
        assert!(!catalog.has_more());

        catalog.load_collection(CollectionType::Watching).await.unwrap();
        assert_eq!(ids(&catalog), vec![9]);
        assert_eq!(catalog.snapshot().listing.title(), "Collection: Watching");

        assert_eq!(
            catalog.source.requested(),
            vec![
                (Listing::Favorites, 1),
                (Listing::Favorites, 2),
                (Listing::Collection(CollectionType::Watching), 1),
            ]
        );
    }

    #[tokio::test]
    async fn quick_filters_reload_the_current_paged_listing() {
        let catalog = loader(2);
        catalog.source.push(Ok(page(&[1, 2], 1, 3)));
        catalog.source.push(Ok(page(&[5], 1, 1)));
        catalog.source.push(Ok(page(&[1, 2], 1, 3)));
        catalog.source.push(Ok(page(&[7], 1, 1)));

        catalog.load_collection(CollectionType::Planned).await.unwrap();
        catalog.toggle_quick_filter(QuickFilter::Movies).await.unwrap();
        assert_eq!(ids(&catalog), vec![5]);
        assert!(QuickFilter::Movies.is_active(&catalog.filters()));

        catalog.toggle_quick_filter(QuickFilter::Movies).await.unwrap();
        assert!(catalog.filters().is_empty());

        // After a feed, filters go back to the catalog
        catalog.load_latest().await.unwrap();
        catalog.toggle_quick_filter(QuickFilter::Ongoing).await.unwrap();
        assert_eq!(catalog.snapshot().listing, Listing::Catalog);

        let requests = catalog.source.requests.lock();
        let planned = Listing::Collection(CollectionType::Planned);
        assert_eq!(requests[1].0, planned);
        assert_eq!(requests[1].2.types, vec!["MOVIE"]);
        assert_eq!(requests[2].0, planned);
        assert!(requests[2].2.is_empty());
        assert_eq!(requests[3].0, Listing::Catalog);
        assert_eq!(requests[3].2.publish_statuses, vec!["IS_ONGOING"]);
    }

    #[tokio::test]
    async fn switching_listing_discards_the_older_page() {
        let catalog = loader(2);
        let favorites = catalog.source.defer();
        catalog.source.push(Ok(page(&[30], 1, 1)));

        let stale = catalog.load_favorites();
        let newer = async {
            tokio::task::yield_now().await;
            catalog.load_collection(CollectionType::Watched).await.unwrap();
            favorites.send(Ok(page(&[1, 2], 1, 4))).unwrap();
        };
        let (stale, ()) = tokio::join!(stale, newer);

        assert!(stale.is_ok());
        assert_eq!(ids(&catalog), vec![30]);
        assert_eq!(catalog.snapshot().listing, Listing::Collection(CollectionType::Watched));
        assert!(!catalog.has_more());
    }
}
