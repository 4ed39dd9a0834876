//! Controller module - Application logic and event handling
//!
//! This module contains the application controller that handles user input
//! and drives the catalog, the membership stores and the playback session.
//! It is organized into submodules by responsibility:
//!
//! - `input`: Key event handling
//! - `playback`: Playback session commands, favorites and collections
//! - `navigation`: Listings, search, paging and the release detail view

mod input;
mod navigation;
mod playback;

use std::sync::Arc;
use tokio::sync::Mutex;

use aniliberty_rs::api::{ApiClient, Release};
use aniliberty_rs::auth::AuthSession;
use aniliberty_rs::config::AppConfig;
use aniliberty_rs::player::SessionHandle;
use aniliberty_rs::store::{CatalogLoader, CollectionsStore, FavoritesStore};
use aniliberty_rs::ApiError;

use crate::model::AppModel;

/// Long-lived services, built once in `main`.
pub struct AppServices {
    pub config: AppConfig,
    pub auth: AuthSession,
    pub catalog: CatalogLoader<ApiClient>,
    pub favorites: FavoritesStore,
    pub collections: CollectionsStore,
    pub player: SessionHandle,
}

#[derive(Clone)]
pub struct AppController {
    pub(crate) model: Arc<Mutex<AppModel>>,
    pub(crate) services: Arc<AppServices>,
}

impl AppController {
    pub fn new(model: Arc<Mutex<AppModel>>, services: Arc<AppServices>) -> Self {
        Self { model, services }
    }

    pub(crate) fn format_error(error: &ApiError) -> String {
        match error {
            ApiError::Unauthorized => "Not logged in. Restart with --login or --otp.".to_string(),
            ApiError::Network { .. } => "Network error. Check your connection and try again.".to_string(),
            ApiError::Server { status: 429, .. } => "Rate limited. Please wait a moment.".to_string(),
            ApiError::Server { status, message } => format!("Server error {status}: {message}"),
            ApiError::Decode { .. } => "Unexpected response from the server.".to_string(),
        }
    }

    /// Show the error of a failed background operation.
    pub(crate) async fn report<T>(&self, operation: &str, result: Result<T, ApiError>) {
        if let Err(e) = result {
            self.show_error(operation, &e).await;
        }
    }

    pub(crate) async fn show_error(&self, operation: &str, error: &ApiError) {
        tracing::warn!(operation, error = %error, "Operation failed");
        let model = self.model.lock().await;
        model.set_error(Self::format_error(error)).await;
    }

    /// Favorites and collections live on the account; without one, say so instead.
    pub(crate) async fn require_account(&self, operation: &str) -> bool {
        if self.services.auth.is_logged_in() {
            return true;
        }
        tracing::debug!(operation, "Skipped, not logged in");
        self.show_error(operation, &ApiError::Unauthorized).await;
        false
    }

    pub(crate) async fn selected_release(&self) -> Option<Release> {
        let index = self.model.lock().await.get_ui_state().await.release_selected;
        self.services.catalog.releases().into_iter().nth(index)
    }
}
