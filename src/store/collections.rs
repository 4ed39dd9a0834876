//! Which user collection (planned, watching, ...) each release belongs to

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::optimistic::{MembershipRemote, Mutation, OptimisticStore};
use crate::api::types::{parse_collection_ids, CollectionEntry};
use crate::api::{ApiClient, CollectionType, ReleaseId};
use crate::error::ApiResult;

pub type CollectionMap = BTreeMap<ReleaseId, CollectionType>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionOp {
    Add { release_id: ReleaseId, collection: CollectionType },
    Remove(ReleaseId),
    /// Same request as `Add`; the server keeps one collection per release.
    Move { release_id: ReleaseId, to: CollectionType },
}

impl Mutation for CollectionOp {
    type State = CollectionMap;

    fn key(&self) -> ReleaseId {
        match *self {
            CollectionOp::Add { release_id, .. }
            | CollectionOp::Move { release_id, .. }
            | CollectionOp::Remove(release_id) => release_id,
        }
    }

    fn apply(&self, state: &mut CollectionMap) {
        match *self {
            CollectionOp::Add { release_id, collection } | CollectionOp::Move { release_id, to: collection } => {
                state.insert(release_id, collection);
            }
            CollectionOp::Remove(release_id) => {
                state.remove(&release_id);
            }
        }
    }
}

/// Collection endpoints of the API.
///
/// The write endpoints do not echo the membership back, so every change is
/// followed by a fetch of `/collections/ids`.
pub struct CollectionsRemote {
    api: ApiClient,
}

impl CollectionsRemote {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MembershipRemote for CollectionsRemote {
    type State = CollectionMap;
    type Op = CollectionOp;

    async fn fetch(&self) -> ApiResult<CollectionMap> {
        let rows = self.api.get_collection_ids().await?;
        Ok(parse_collection_ids(&rows))
    }

    async fn mutate(&self, op: &CollectionOp) -> ApiResult<CollectionMap> {
        match *op {
            CollectionOp::Add { release_id, collection } | CollectionOp::Move { release_id, to: collection } => {
                let entry = CollectionEntry { release_id, type_of_collection: collection };
                self.api.add_to_collection(&[entry]).await?;
            }
            CollectionOp::Remove(release_id) => {
                self.api.remove_from_collection(&[release_id]).await?;
            }
        }
        self.fetch().await
    }
}

impl<R> OptimisticStore<R>
where
    R: MembershipRemote<State = CollectionMap, Op = CollectionOp>,
{
    pub fn collection_of(&self, release_id: ReleaseId) -> Option<CollectionType> {
        self.entry(&release_id)
    }

    pub async fn add_to_collection(&self, release_id: ReleaseId, collection: CollectionType) -> ApiResult<()> {
        self.mutate(CollectionOp::Add { release_id, collection }).await
    }

    pub async fn remove_from_collection(&self, release_id: ReleaseId) -> ApiResult<()> {
        self.mutate(CollectionOp::Remove(release_id)).await
    }

    pub async fn move_to_collection(&self, release_id: ReleaseId, to: CollectionType) -> ApiResult<()> {
        self.mutate(CollectionOp::Move { release_id, to }).await
    }

    /// Releases in `collection`, in id order.
    pub fn releases_in(&self, collection: CollectionType) -> Vec<ReleaseId> {
        self.snapshot()
            .into_iter()
            .filter_map(|(id, kind)| (kind == collection).then_some(id))
            .collect()
    }
}
