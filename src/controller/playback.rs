//! Playback control methods, favorites and collections

use aniliberty_rs::api::CollectionType;

use super::AppController;

impl AppController {
    /// Start the selected episode of the open release.
    pub async fn play_selected_episode(&self) {
        let Some(release) = self.services.catalog.current_release() else {
            return;
        };
        let index = self.model.lock().await.get_ui_state().await.episode_selected;
        let Some(mut episode) = release.episodes.get(index).cloned() else {
            return;
        };
        if episode.release_id.is_none() {
            episode.release_id = Some(release.id);
        }
        tracing::info!(release_id = release.id, episode = %episode.display_name(), "Requesting episode");
        self.services.player.request_episode(episode);
    }

    pub fn toggle_playback(&self) {
        self.services.player.toggle_play_pause();
    }

    /// Relative seek by whole skip steps.
    pub fn skip(&self, steps: i64) {
        let step = self.services.config.player.skip_step_ms as i64;
        self.services.player.skip(steps * step);
    }

    pub fn cycle_quality(&self) {
        let next = self.services.player.snapshot().quality.next();
        tracing::debug!(quality = %next, "Switching quality");
        self.services.player.set_quality(next);
    }

    pub fn retry_playback(&self) {
        self.services.player.retry();
    }

    pub fn stop_playback(&self) {
        self.services.player.stop();
    }

    // ========================================================================
    // Favorites & collections
    // ========================================================================

    pub async fn toggle_favorite(&self) {
        let Some(release) = self.selected_release().await else {
            return;
        };
        if !self.require_account("favorites").await {
            return;
        }
        let result = self.services.favorites.toggle(release.id).await;
        self.report("favorites", result).await;
    }

    /// Put the selected release into the next collection, starting from
    /// the first one for a release in none.
    pub async fn cycle_collection(&self) {
        let Some(release) = self.selected_release().await else {
            return;
        };
        if !self.require_account("collections").await {
            return;
        }
        let collections = &self.services.collections;
        let result = match collections.collection_of(release.id) {
            Some(current) => collections.move_to_collection(release.id, current.next()).await,
            None => collections.add_to_collection(release.id, CollectionType::ALL[0]).await,
        };
        self.report("collections", result).await;
    }

    pub async fn remove_from_collection(&self) {
        let Some(release) = self.selected_release().await else {
            return;
        };
        if !self.require_account("collections").await {
            return;
        }
        if self.services.collections.collection_of(release.id).is_none() {
            return;
        }
        let result = self.services.collections.remove_from_collection(release.id).await;
        self.report("collections", result).await;
    }
}
