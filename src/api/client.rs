//! AniLiberty API client with bearer-token handling

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{
    AuthTokenResponse, CatalogFilters, CatalogPage, CollectionType, IdList, ListingRequest, LoginRequest, OtpLoginRequest,
    OtpRequest, OtpResponse, Release, ReleaseId, User,
};
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::storage::{AUTH_TOKEN_KEY, KeyValueStore};
use crate::store::CatalogSource;
use crate::{log_api_request, log_api_result};

/// HTTP client for the catalog, account and collection endpoints.
///
/// Cheap to clone; clones share the token.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    token: Arc<RwLock<Option<String>>>,
    storage: Arc<dyn KeyValueStore>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, storage: Arc<dyn KeyValueStore>) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Network { reason: e.to_string() })?;

        Ok(Self {
            http,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            token: Arc::new(RwLock::new(None)),
            storage,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========================================================================
    // Token
    // ========================================================================

    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    /// Load the persisted token, if any, into memory.
    pub async fn restore_token(&self) -> Option<String> {
        match self.storage.get(AUTH_TOKEN_KEY).await {
            Ok(Some(raw)) => {
                let token = serde_json::from_str::<String>(&raw).unwrap_or(raw);
                *self.token.write() = Some(token.clone());
                Some(token)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored token");
                None
            }
        }
    }

    pub async fn store_token(&self, token: String) {
        *self.token.write() = Some(token.clone());
        if let Err(e) = crate::storage::write_json(self.storage.as_ref(), AUTH_TOKEN_KEY, &token).await {
            tracing::warn!(error = %e, "Could not persist token");
        }
    }

    pub async fn clear_token(&self) {
        self.token.write().take();
        if let Err(e) = self.storage.remove(AUTH_TOKEN_KEY).await {
            tracing::warn!(error = %e, "Could not remove stored token");
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match self.token.read().as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_raw(&self, builder: RequestBuilder) -> ApiResult<String> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        if status == StatusCode::UNAUTHORIZED {
            tracing::info!("Server rejected token, clearing it");
            self.clear_token().await;
        }
        Err(ApiError::from_status(status.as_u16(), &body))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let body = self.send_raw(builder).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.send(self.request(method, path).json(body)).await
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub async fn login(&self, login: &str, password: &str) -> ApiResult<String> {
        log_api_request!("login", login);
        let request = LoginRequest { login: login.to_string(), password: password.to_string() };
        let result: ApiResult<AuthTokenResponse> =
            self.send_json(Method::POST, "/accounts/users/auth/login", &request).await;
        log_api_result!("login", result);
        Ok(result?.token)
    }

    pub async fn logout(&self) -> ApiResult<()> {
        log_api_request!("logout");
        self.send_raw(self.request(Method::POST, "/accounts/users/auth/logout")).await?;
        Ok(())
    }

    pub async fn request_otp(&self, device_id: &str) -> ApiResult<OtpResponse> {
        log_api_request!("request_otp", device_id);
        let request = OtpRequest { device_id: device_id.to_string() };
        self.send_json(Method::POST, "/accounts/otp/get", &request).await
    }

    pub async fn login_with_otp(&self, code: u32, device_id: &str) -> ApiResult<String> {
        log_api_request!("login_with_otp", device_id);
        let request = OtpLoginRequest { code, device_id: device_id.to_string() };
        let response: AuthTokenResponse = self.send_json(Method::POST, "/accounts/otp/login", &request).await?;
        Ok(response.token)
    }

    pub async fn profile(&self) -> ApiResult<User> {
        self.send(self.request(Method::GET, "/accounts/users/me/profile")).await
    }

    // ========================================================================
    // Releases
    // ========================================================================

    pub async fn get_catalog_releases(
        &self,
        page: u32,
        limit: u32,
        filters: &CatalogFilters,
    ) -> ApiResult<CatalogPage> {
        log_api_request!("catalog_releases", page, limit);
        let mut query = vec![("page".to_string(), page.to_string()), ("limit".to_string(), limit.to_string())];
        query.extend(filters.to_query());

        let result = self.send(self.request(Method::GET, "/anime/catalog/releases").query(&query)).await;
        log_api_result!("catalog_releases", result);
        result
    }

    pub async fn get_release(&self, id_or_alias: &str) -> ApiResult<Release> {
        log_api_request!("release", id_or_alias);
        self.send(self.request(Method::GET, &format!("/anime/releases/{id_or_alias}"))).await
    }

    async fn get_release_list(&self, path: &str, query: &[(&str, String)]) -> ApiResult<Vec<Release>> {
        let releases: Option<Vec<Release>> = self.send(self.request(Method::GET, path).query(query)).await?;
        Ok(releases.unwrap_or_default())
    }

    pub async fn get_latest_releases(&self, limit: u32) -> ApiResult<Vec<Release>> {
        self.get_release_list("/anime/releases/latest", &[("limit", limit.to_string())]).await
    }

    pub async fn get_random_releases(&self, limit: u32) -> ApiResult<Vec<Release>> {
        self.get_release_list("/anime/releases/random", &[("limit", limit.to_string())]).await
    }

    pub async fn get_recommended_releases(&self, limit: u32, release_id: Option<ReleaseId>) -> ApiResult<Vec<Release>> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(id) = release_id {
            query.push(("release_id", id.to_string()));
        }
        self.get_release_list("/anime/releases/recommended", &query).await
    }

    pub async fn search_releases(&self, query: &str) -> ApiResult<Vec<Release>> {
        log_api_request!("search", query);
        let result = self.get_release_list("/app/search/releases", &[("query", query.to_string())]).await;
        log_api_result!("search", result);
        result
    }

    // ========================================================================
    // Favorites
    // ========================================================================

    pub async fn get_favorite_ids(&self) -> ApiResult<Vec<ReleaseId>> {
        let ids: IdList = self.send(self.request(Method::GET, "/accounts/users/me/favorites/ids")).await?;
        Ok(ids.into_ids())
    }

    /// Returns the authoritative favorite ids after the change.
    pub async fn add_favorites(&self, ids: &[ReleaseId]) -> ApiResult<Vec<ReleaseId>> {
        let items: Vec<_> = ids.iter().map(|&release_id| super::types::ReleaseRef { release_id }).collect();
        let result: ApiResult<IdList> = self.send_json(Method::POST, "/accounts/users/me/favorites", &items).await;
        log_api_result!("add_favorites", result);
        Ok(result?.into_ids())
    }

    pub async fn remove_favorites(&self, ids: &[ReleaseId]) -> ApiResult<Vec<ReleaseId>> {
        let items: Vec<_> = ids.iter().map(|&release_id| super::types::ReleaseRef { release_id }).collect();
        let result: ApiResult<IdList> = self.send_json(Method::DELETE, "/accounts/users/me/favorites", &items).await;
        log_api_result!("remove_favorites", result);
        Ok(result?.into_ids())
    }

    /// Favorite releases, one page at a time.
    pub async fn get_favorite_releases(&self, page: u32, limit: u32, filters: &CatalogFilters) -> ApiResult<CatalogPage> {
        log_api_request!("favorite_releases", page, limit);
        let body = ListingRequest { page, limit, type_of_collection: None, f: filters.clone() };
        let result = self.send_json(Method::POST, "/accounts/users/me/favorites/releases", &body).await;
        log_api_result!("favorite_releases", result);
        result
    }

    // ========================================================================
    // Collections
    // ========================================================================

    pub async fn get_collection_releases(
        &self,
        collection: CollectionType,
        page: u32,
        limit: u32,
        filters: &CatalogFilters,
    ) -> ApiResult<CatalogPage> {
        log_api_request!("collection_releases", %collection, page, limit);
        let body = ListingRequest { page, limit, type_of_collection: Some(collection), f: filters.clone() };
        let result = self.send_json(Method::POST, "/accounts/users/me/collections/releases", &body).await;
        log_api_result!("collection_releases", result);
        result
    }

    pub async fn get_collection_ids(&self) -> ApiResult<Vec<serde_json::Value>> {
        self.send(self.request(Method::GET, "/accounts/users/me/collections/ids")).await
    }

    pub async fn add_to_collection(&self, entries: &[super::types::CollectionEntry]) -> ApiResult<()> {
        let result = self
            .send_raw(self.request(Method::POST, "/accounts/users/me/collections").json(entries))
            .await;
        log_api_result!("add_to_collection", result);
        result.map(|_| ())
    }

    pub async fn remove_from_collection(&self, ids: &[ReleaseId]) -> ApiResult<()> {
        let items: Vec<_> = ids.iter().map(|&release_id| super::types::ReleaseRef { release_id }).collect();
        let result = self
            .send_raw(self.request(Method::DELETE, "/accounts/users/me/collections").json(&items))
            .await;
        log_api_result!("remove_from_collection", result);
        result.map(|_| ())
    }
}

#[async_trait]
impl CatalogSource for ApiClient {
    async fn catalog_page(&self, page: u32, limit: u32, filters: &CatalogFilters) -> ApiResult<CatalogPage> {
        self.get_catalog_releases(page, limit, filters).await
    }

    async fn favorite_releases(&self, page: u32, limit: u32, filters: &CatalogFilters) -> ApiResult<CatalogPage> {
        self.get_favorite_releases(page, limit, filters).await
    }

    async fn collection_releases(
        &self,
        collection: CollectionType,
        page: u32,
        limit: u32,
        filters: &CatalogFilters,
    ) -> ApiResult<CatalogPage> {
        self.get_collection_releases(collection, page, limit, filters).await
    }

    async fn latest(&self, limit: u32) -> ApiResult<Vec<Release>> {
        self.get_latest_releases(limit).await
    }

    async fn random(&self, limit: u32) -> ApiResult<Vec<Release>> {
        self.get_random_releases(limit).await
    }

    async fn recommended(&self, limit: u32, release_id: Option<ReleaseId>) -> ApiResult<Vec<Release>> {
        self.get_recommended_releases(limit, release_id).await
    }

    async fn search(&self, query: &str) -> ApiResult<Vec<Release>> {
        self.search_releases(query).await
    }

    async fn release(&self, id_or_alias: &str) -> ApiResult<Release> {
        self.get_release(id_or_alias).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn client() -> ApiClient {
        let config = ApiConfig { base_url: "http://127.0.0.1:9/api/v1/".to_string(), ..Default::default() };
        ApiClient::new(&config, Arc::new(MemoryStore::new())).unwrap()
    }

    #[tokio::test]
    async fn token_survives_restore_and_is_cleared() {
        let api = client();
        assert_eq!(api.base_url(), "http://127.0.0.1:9/api/v1");
        assert!(!api.has_token());

        api.store_token("secret".to_string()).await;
        assert!(api.has_token());

        let fresh = ApiClient { token: Arc::new(RwLock::new(None)), ..api.clone() };
        assert_eq!(fresh.restore_token().await.as_deref(), Some("secret"));

        fresh.clear_token().await;
        assert!(!fresh.has_token());
        assert_eq!(api.restore_token().await, None);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let api = client();
        let result = api.get_favorite_ids().await;
        assert!(matches!(result, Err(ApiError::Network { .. })));
    }
}
