//! Favorite releases of the logged-in user

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::optimistic::{MembershipRemote, Mutation, OptimisticStore};
use crate::api::{ApiClient, ReleaseId};
use crate::error::ApiResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FavoriteOp {
    Add(ReleaseId),
    Remove(ReleaseId),
}

impl Mutation for FavoriteOp {
    type State = BTreeSet<ReleaseId>;

    fn key(&self) -> ReleaseId {
        match *self {
            FavoriteOp::Add(id) | FavoriteOp::Remove(id) => id,
        }
    }

    fn apply(&self, state: &mut BTreeSet<ReleaseId>) {
        match *self {
            FavoriteOp::Add(id) => {
                state.insert(id);
            }
            FavoriteOp::Remove(id) => {
                state.remove(&id);
            }
        }
    }
}

/// Favorites endpoints of the API.
pub struct FavoritesRemote {
    api: ApiClient,
}

impl FavoritesRemote {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MembershipRemote for FavoritesRemote {
    type State = BTreeSet<ReleaseId>;
    type Op = FavoriteOp;

    async fn fetch(&self) -> ApiResult<BTreeSet<ReleaseId>> {
        Ok(self.api.get_favorite_ids().await?.into_iter().collect())
    }

    async fn mutate(&self, op: &FavoriteOp) -> ApiResult<BTreeSet<ReleaseId>> {
        let ids = match *op {
            FavoriteOp::Add(id) => self.api.add_favorites(&[id]).await?,
            FavoriteOp::Remove(id) => self.api.remove_favorites(&[id]).await?,
        };
        Ok(ids.into_iter().collect())
    }
}

impl<R> OptimisticStore<R>
where
    R: MembershipRemote<State = BTreeSet<ReleaseId>, Op = FavoriteOp>,
{
    pub async fn add(&self, id: ReleaseId) -> ApiResult<()> {
        self.mutate(FavoriteOp::Add(id)).await
    }

    pub async fn remove(&self, id: ReleaseId) -> ApiResult<()> {
        self.mutate(FavoriteOp::Remove(id)).await
    }

    /// Add if absent, remove if present, judged by the local state.
    pub async fn toggle(&self, id: ReleaseId) -> ApiResult<()> {
        if self.is_member(&id) {
            self.remove(id).await
        } else {
            self.add(id).await
        }
    }

    pub fn ids(&self) -> BTreeSet<ReleaseId> {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::storage::{self, MemoryStore, FAVORITES_KEY};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// In-process stand-in for the favorites endpoints.
    #[derive(Default)]
    struct FakeFavorites {
        server: Mutex<BTreeSet<ReleaseId>>,
        failures: Mutex<VecDeque<ApiError>>,
        calls: Mutex<Vec<FavoriteOp>>,
    }

    impl FakeFavorites {
        fn with(ids: &[ReleaseId]) -> Self {
            let fake = Self::default();
            fake.server.lock().extend(ids.iter().copied());
            fake
        }

        fn fail_next(&self, err: ApiError) {
            self.failures.lock().push_back(err);
        }
    }

    #[async_trait]
    impl MembershipRemote for FakeFavorites {
        type State = BTreeSet<ReleaseId>;
        type Op = FavoriteOp;

        async fn fetch(&self) -> ApiResult<BTreeSet<ReleaseId>> {
            if let Some(err) = self.failures.lock().pop_front() {
                return Err(err);
            }
            Ok(self.server.lock().clone())
        }

        async fn mutate(&self, op: &FavoriteOp) -> ApiResult<BTreeSet<ReleaseId>> {
            self.calls.lock().push(*op);
            if let Some(err) = self.failures.lock().pop_front() {
                return Err(err);
            }
            let mut server = self.server.lock();
            op.apply(&mut server);
            Ok(server.clone())
        }
    }

    fn store(fake: FakeFavorites) -> OptimisticStore<FakeFavorites> {
        OptimisticStore::new(FAVORITES_KEY, fake, Arc::new(MemoryStore::new()))
    }

    fn ids(list: &[ReleaseId]) -> BTreeSet<ReleaseId> {
        list.iter().copied().collect()
    }

    #[tokio::test]
    async fn add_to_empty_then_fail_leaves_it_empty() {
        let fake = FakeFavorites::default();
        fake.fail_next(ApiError::Network { reason: "timeout".into() });
        let favorites = store(fake);

        let result = favorites.add(42).await;

        assert!(result.is_err());
        assert!(!favorites.is_member(&42));
        assert!(favorites.ids().is_empty());
        assert!(favorites.error().is_some());
    }

    #[tokio::test]
    async fn add_then_load_keeps_server_state() {
        let favorites = store(FakeFavorites::with(&[7]));
        favorites.load().await.unwrap();

        favorites.add(42).await.unwrap();

        assert_eq!(favorites.ids(), ids(&[7, 42]));
        favorites.load().await.unwrap();
        assert_eq!(favorites.ids(), ids(&[7, 42]));
    }

    #[tokio::test]
    async fn toggle_uses_local_membership() {
        let favorites = store(FakeFavorites::with(&[3]));
        favorites.load().await.unwrap();

        favorites.toggle(3).await.unwrap();
        favorites.toggle(4).await.unwrap();

        assert_eq!(*favorites.remote().calls.lock(), vec![FavoriteOp::Remove(3), FavoriteOp::Add(4)]);
        assert_eq!(favorites.ids(), ids(&[4]));
    }

    #[tokio::test]
    async fn logged_out_load_empties_favorites_silently() {
        let favorites = store(FakeFavorites::with(&[1, 2]));
        favorites.load().await.unwrap();

        favorites.remote().fail_next(ApiError::Unauthorized);
        favorites.load().await.unwrap();

        assert!(favorites.ids().is_empty());
        assert_eq!(favorites.error(), None);
    }

    #[tokio::test]
    async fn confirmed_favorites_reach_storage() {
        let storage = Arc::new(MemoryStore::new());
        let favorites = OptimisticStore::new(FAVORITES_KEY, FakeFavorites::with(&[1]), storage.clone());
        favorites.add(9).await.unwrap();

        let persisted: Option<BTreeSet<ReleaseId>> =
            storage::read_json(storage.as_ref(), FAVORITES_KEY).await.unwrap();
        assert_eq!(persisted, Some(ids(&[1, 9])));
    }
}
