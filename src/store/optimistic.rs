//! Optimistic-update-then-reconcile membership store
//!
//! A mutation is applied to the local state before the remote call is made.
//! On success the remote's answer replaces the local state; on failure the
//! touched item goes back to what it was before the mutation.
//!
//! Every load and mutation takes a generation from a store-wide counter:
//!
//! - a mutation on an item that already has a pending mutation supersedes it;
//!   the older response is then ignored for that item,
//! - a full-state replacement is applied only if its generation is newer than
//!   the last one applied, so a slow response never overwrites a newer one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, ApiResult, StorageError};
use crate::storage::{self, KeyValueStore};

/// A keyed membership that can be read and written one item at a time.
pub trait Membership: Clone + Default + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    type Key: Clone + Eq + Hash + Debug + Send + Sync;
    type Entry: Clone + PartialEq + Debug + Send + Sync;

    fn entry(&self, key: &Self::Key) -> Option<Self::Entry>;
    fn set_entry(&mut self, key: &Self::Key, entry: Option<Self::Entry>);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Membership for BTreeSet<K>
where
    K: Ord + Clone + Hash + Debug + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    type Key = K;
    type Entry = ();

    fn entry(&self, key: &K) -> Option<()> {
        self.contains(key).then_some(())
    }

    fn set_entry(&mut self, key: &K, entry: Option<()>) {
        match entry {
            Some(()) => {
                self.insert(key.clone());
            }
            None => {
                self.remove(key);
            }
        }
    }

    fn len(&self) -> usize {
        BTreeSet::len(self)
    }
}

impl<K, V> Membership for BTreeMap<K, V>
where
    K: Ord + Clone + Hash + Debug + Send + Sync + Serialize + DeserializeOwned + 'static,
    V: Clone + PartialEq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    type Key = K;
    type Entry = V;

    fn entry(&self, key: &K) -> Option<V> {
        self.get(key).cloned()
    }

    fn set_entry(&mut self, key: &K, entry: Option<V>) {
        match entry {
            Some(value) => {
                self.insert(key.clone(), value);
            }
            None => {
                self.remove(key);
            }
        }
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }
}

/// A mutation of one item, with its optimistic effect.
pub trait Mutation: Clone + Debug + Send + Sync + 'static {
    type State: Membership;

    fn key(&self) -> <Self::State as Membership>::Key;

    /// The intended end state, applied locally before the remote confirms it.
    fn apply(&self, state: &mut Self::State);
}

/// The remote source of truth behind a store.
#[async_trait]
pub trait MembershipRemote: Send + Sync + 'static {
    type State: Membership;
    type Op: Mutation<State = Self::State>;

    /// Fetch the authoritative membership.
    async fn fetch(&self) -> ApiResult<Self::State>;

    /// Apply `op` remotely and return the authoritative membership after it.
    async fn mutate(&self, op: &Self::Op) -> ApiResult<Self::State>;
}

type KeyOf<R> = <<R as MembershipRemote>::State as Membership>::Key;
type EntryOf<R> = <<R as MembershipRemote>::State as Membership>::Entry;

struct PendingMutation<R: MembershipRemote> {
    generation: u64,
    op: R::Op,
    /// Last known-good entry of the item, from before the first unconfirmed mutation
    baseline: Option<EntryOf<R>>,
}

struct StoreState<R: MembershipRemote> {
    items: R::State,
    pending: HashMap<KeyOf<R>, PendingMutation<R>>,
    generation: u64,
    applied_generation: u64,
    loads_in_flight: usize,
    error: Option<String>,
}

impl<R: MembershipRemote> StoreState<R> {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Replace with an authoritative state and keep unconfirmed mutations on top.
    fn replace(&mut self, authoritative: R::State, generation: u64) {
        // Unconfirmed mutations now roll back to what the server just said
        for (key, p) in self.pending.iter_mut() {
            p.baseline = authoritative.entry(key);
        }
        self.items = authoritative;
        self.applied_generation = generation;

        let mut pending: Vec<_> = self.pending.values().collect();
        pending.sort_by_key(|p| p.generation);
        for p in pending {
            p.op.apply(&mut self.items);
        }
    }

    /// The membership without any unconfirmed mutation.
    fn known_good(&self) -> R::State {
        let mut state = self.items.clone();
        for (key, p) in &self.pending {
            state.set_entry(key, p.baseline.clone());
        }
        state
    }
}

/// Locally cached membership kept in sync with a [`MembershipRemote`].
pub struct OptimisticStore<R: MembershipRemote> {
    name: &'static str,
    remote: R,
    storage: Arc<dyn KeyValueStore>,
    state: RwLock<StoreState<R>>,
    /// Serializes writes so the last one to land carries the newest state
    persist_lock: tokio::sync::Mutex<()>,
}

impl<R: MembershipRemote> OptimisticStore<R> {
    /// `name` is used as the storage key and in log fields.
    pub fn new(name: &'static str, remote: R, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            name,
            remote,
            storage,
            state: RwLock::new(StoreState {
                items: R::State::default(),
                pending: HashMap::new(),
                generation: 0,
                applied_generation: 0,
                loads_in_flight: 0,
                error: None,
            }),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Local lookup, including unconfirmed optimistic changes.
    pub fn is_member(&self, key: &KeyOf<R>) -> bool {
        self.state.read().items.entry(key).is_some()
    }

    pub fn entry(&self, key: &KeyOf<R>) -> Option<EntryOf<R>> {
        self.state.read().items.entry(key)
    }

    pub fn snapshot(&self) -> R::State {
        self.state.read().items.clone()
    }

    pub fn has_pending(&self, key: &KeyOf<R>) -> bool {
        self.state.read().pending.contains_key(key)
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loads_in_flight > 0
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.write().error = None;
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Read the persisted state once at startup.
    ///
    /// Ignored if anything has already been applied from the remote.
    pub async fn restore(&self) -> Result<bool, StorageError> {
        let Some(items) = storage::read_json::<R::State>(self.storage.as_ref(), self.name).await? else {
            return Ok(false);
        };

        let mut state = self.state.write();
        if state.applied_generation > 0 || !state.pending.is_empty() {
            return Ok(false);
        }
        tracing::debug!(store = self.name, count = items.len(), "Restored persisted state");
        state.items = items;
        Ok(true)
    }

    async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;
        let known_good = self.state.read().known_good();
        if let Err(e) = storage::write_json(self.storage.as_ref(), self.name, &known_good).await {
            tracing::warn!(store = self.name, error = %e, "Could not persist store state");
        }
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Replace local state with the remote's.
    ///
    /// Not being logged in is not an error: the state becomes empty. Any other
    /// failure keeps the previous state and is returned.
    pub async fn load(&self) -> ApiResult<()> {
        let generation = {
            let mut state = self.state.write();
            state.loads_in_flight += 1;
            state.error = None;
            state.next_generation()
        };
        tracing::debug!(store = self.name, generation, "Loading");

        let result = self.remote.fetch().await;

        let outcome = {
            let mut state = self.state.write();
            state.loads_in_flight -= 1;

            match result {
                Ok(items) if generation > state.applied_generation => {
                    tracing::info!(store = self.name, generation, count = items.len(), "Loaded");
                    state.replace(items, generation);
                    Ok(true)
                }
                Ok(_) => {
                    tracing::debug!(
                        store = self.name,
                        generation,
                        applied = state.applied_generation,
                        "Discarding stale load response"
                    );
                    Ok(false)
                }
                Err(err) if err.is_unauthorized() => {
                    tracing::info!(store = self.name, "Not logged in, clearing local state");
                    state.items = R::State::default();
                    state.pending.clear();
                    state.applied_generation = state.applied_generation.max(generation);
                    Ok(true)
                }
                Err(err) => {
                    tracing::warn!(store = self.name, error = %err, "Load failed, keeping local state");
                    state.error = Some(err.to_string());
                    Err(err)
                }
            }
        };

        if outcome? {
            self.persist().await;
        }
        Ok(())
    }

    // ========================================================================
    // Mutate
    // ========================================================================

    /// Apply `op` optimistically, then reconcile with the remote's answer.
    pub async fn mutate(&self, op: R::Op) -> ApiResult<()> {
        let key = op.key();
        let generation = {
            let mut state = self.state.write();
            let generation = state.next_generation();
            let baseline = match state.pending.get(&key) {
                Some(previous) => previous.baseline.clone(),
                None => state.items.entry(&key),
            };
            state.pending.insert(key.clone(), PendingMutation { generation, op: op.clone(), baseline });
            op.apply(&mut state.items);
            generation
        };
        tracing::debug!(store = self.name, ?op, generation, "Applied optimistic mutation");

        match self.remote.mutate(&op).await {
            Ok(authoritative) => {
                if self.reconcile(&key, generation, authoritative) {
                    self.persist().await;
                }
                Ok(())
            }
            Err(err) => {
                self.rollback(&key, generation, &err);
                Err(err)
            }
        }
    }

    /// Returns whether the local state changed to a new known-good state.
    fn reconcile(&self, key: &KeyOf<R>, generation: u64, authoritative: R::State) -> bool {
        let mut state = self.state.write();

        let current = state.pending.get(key).map(|p| p.generation);
        if current != Some(generation) {
            // Superseded: the newer mutation will reconcile this item. Its
            // rollback target is what the server now says.
            if let Some(newer) = state.pending.get_mut(key) {
                newer.baseline = authoritative.entry(key);
            }
            tracing::debug!(store = self.name, ?key, generation, "Ignoring superseded mutation response");
            return false;
        }

        state.pending.remove(key);
        state.error = None;
        if generation > state.applied_generation {
            state.replace(authoritative, generation);
        } else {
            // A newer full state already landed; only this item is news.
            state.items.set_entry(key, authoritative.entry(key));
        }
        tracing::info!(store = self.name, ?key, generation, count = state.items.len(), "Mutation confirmed");
        true
    }

    fn rollback(&self, key: &KeyOf<R>, generation: u64, err: &ApiError) {
        let mut state = self.state.write();
        state.error = Some(err.to_string());

        let current = state.pending.get(key).map(|p| p.generation);
        if current != Some(generation) {
            tracing::warn!(store = self.name, ?key, generation, error = %err, "Superseded mutation failed");
            return;
        }

        if let Some(pending) = state.pending.remove(key) {
            state.items.set_entry(key, pending.baseline);
        }
        tracing::warn!(store = self.name, ?key, generation, error = %err, "Mutation failed, rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    #[derive(Clone, Debug)]
    pub enum SetOp {
        Add(u64),
        Remove(u64),
    }

    impl Mutation for SetOp {
        type State = BTreeSet<u64>;

        fn key(&self) -> u64 {
            match self {
                SetOp::Add(id) | SetOp::Remove(id) => *id,
            }
        }

        fn apply(&self, state: &mut BTreeSet<u64>) {
            match self {
                SetOp::Add(id) => {
                    state.insert(*id);
                }
                SetOp::Remove(id) => {
                    state.remove(id);
                }
            }
        }
    }

    type Reply = ApiResult<BTreeSet<u64>>;

    /// Answers from a queue; a queued `Deferred` waits for the test to release it.
    pub enum Scripted {
        Now(Reply),
        Deferred(oneshot::Receiver<Reply>),
    }

    #[derive(Default)]
    pub struct ScriptedRemote {
        pub fetches: Mutex<VecDeque<Scripted>>,
        pub mutations: Mutex<VecDeque<Scripted>>,
    }

    async fn answer(next: Option<Scripted>) -> Reply {
        match next {
            Some(Scripted::Now(reply)) => reply,
            Some(Scripted::Deferred(rx)) => rx.await.unwrap_or(Err(ApiError::Network { reason: "dropped".into() })),
            None => Err(ApiError::Network { reason: "no scripted reply".into() }),
        }
    }

    #[async_trait]
    impl MembershipRemote for ScriptedRemote {
        type State = BTreeSet<u64>;
        type Op = SetOp;

        async fn fetch(&self) -> Reply {
            let next = self.fetches.lock().pop_front();
            answer(next).await
        }

        async fn mutate(&self, _op: &SetOp) -> Reply {
            let next = self.mutations.lock().pop_front();
            answer(next).await
        }
    }

    pub fn set(ids: &[u64]) -> BTreeSet<u64> {
        ids.iter().copied().collect()
    }

    fn network_error() -> ApiError {
        ApiError::Network { reason: "offline".into() }
    }

    fn store_with(remote: ScriptedRemote) -> (OptimisticStore<ScriptedRemote>, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        (OptimisticStore::new("test", remote, storage.clone()), storage)
    }

    #[tokio::test]
    async fn failed_mutations_restore_the_previous_membership() {
        let remote = ScriptedRemote::default();
        remote.fetches.lock().push_back(Scripted::Now(Ok(set(&[1, 2, 3]))));
        let (store, _) = store_with(remote);
        store.load().await.unwrap();

        let ops = [SetOp::Add(4), SetOp::Remove(2), SetOp::Add(1), SetOp::Remove(9)];
        for op in ops {
            store.remote().mutations.lock().push_back(Scripted::Now(Err(network_error())));
            let before = store.snapshot();
            let result = store.mutate(op).await;
            assert!(result.is_err());
            assert_eq!(store.snapshot(), before);
        }
        assert_eq!(store.error().as_deref(), Some("Network error: offline"));
    }

    #[tokio::test]
    async fn success_adopts_the_remote_answer_not_the_guess() {
        let remote = ScriptedRemote::default();
        remote.mutations.lock().push_back(Scripted::Now(Ok(set(&[5, 8]))));
        let (store, _) = store_with(remote);

        store.mutate(SetOp::Add(5)).await.unwrap();
        assert_eq!(store.snapshot(), set(&[5, 8]));
        assert!(!store.has_pending(&5));
    }

    #[tokio::test]
    async fn optimistic_change_is_visible_while_in_flight() {
        let (tx, rx) = oneshot::channel();
        let remote = ScriptedRemote::default();
        remote.mutations.lock().push_back(Scripted::Deferred(rx));
        let (store, _) = store_with(remote);

        let mutation = store.mutate(SetOp::Add(3));
        let check = async {
            tokio::task::yield_now().await;
            assert!(store.is_member(&3));
            assert!(store.has_pending(&3));
            tx.send(Err(network_error())).unwrap();
        };
        let (result, ()) = tokio::join!(mutation, check);

        assert!(result.is_err());
        assert!(!store.is_member(&3));
    }

    #[tokio::test]
    async fn superseded_response_does_not_clobber_newer_mutation() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let remote = ScriptedRemote::default();
        remote.mutations.lock().push_back(Scripted::Deferred(first_rx));
        remote.mutations.lock().push_back(Scripted::Deferred(second_rx));
        let (store, _) = store_with(remote);

        let add = store.mutate(SetOp::Add(7));
        let remove = async {
            tokio::task::yield_now().await;
            store.mutate(SetOp::Remove(7)).await
        };
        let drive = async {
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            assert!(!store.is_member(&7));
            // The add lands after the remove was issued: ignored for item 7
            first_tx.send(Ok(set(&[7]))).unwrap();
            tokio::task::yield_now().await;
            assert!(!store.is_member(&7));
            // The remove fails: roll back to what the server last said
            second_tx.send(Err(network_error())).unwrap();
        };
        let (add, remove, ()) = tokio::join!(add, remove, drive);

        assert!(add.is_ok());
        assert!(remove.is_err());
        assert!(store.is_member(&7));
        assert!(!store.has_pending(&7));
    }

    #[tokio::test]
    async fn stale_load_does_not_overwrite_confirmed_mutation() {
        let (load_tx, load_rx) = oneshot::channel();
        let remote = ScriptedRemote::default();
        remote.fetches.lock().push_back(Scripted::Deferred(load_rx));
        remote.mutations.lock().push_back(Scripted::Now(Ok(set(&[1, 2]))));
        let (store, _) = store_with(remote);

        let load = store.load();
        let drive = async {
            tokio::task::yield_now().await;
            store.mutate(SetOp::Add(2)).await.unwrap();
            load_tx.send(Ok(set(&[1]))).unwrap();
        };
        let (load, ()) = tokio::join!(load, drive);

        assert!(load.is_ok());
        assert_eq!(store.snapshot(), set(&[1, 2]));
    }

    #[tokio::test]
    async fn unauthorized_load_clears_without_error() {
        let remote = ScriptedRemote::default();
        remote.fetches.lock().push_back(Scripted::Now(Ok(set(&[4]))));
        remote.fetches.lock().push_back(Scripted::Now(Err(ApiError::Unauthorized)));
        let (store, _) = store_with(remote);

        store.load().await.unwrap();
        assert!(store.is_member(&4));

        store.load().await.unwrap();
        assert!(store.snapshot().is_empty());
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_state_and_reports() {
        let remote = ScriptedRemote::default();
        remote.fetches.lock().push_back(Scripted::Now(Ok(set(&[4]))));
        remote.fetches.lock().push_back(Scripted::Now(Err(ApiError::Server {
            status: 500,
            message: "boom".into(),
        })));
        let (store, _) = store_with(remote);

        store.load().await.unwrap();
        assert!(store.load().await.is_err());
        assert_eq!(store.snapshot(), set(&[4]));
        assert!(store.error().is_some());
        assert!(!store.is_loading());

        store.clear_error();
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn reconciled_state_is_persisted_and_restored() {
        let remote = ScriptedRemote::default();
        remote.mutations.lock().push_back(Scripted::Now(Ok(set(&[7, 42]))));
        let (store, storage) = store_with(remote);
        store.mutate(SetOp::Add(42)).await.unwrap();

        let restored = OptimisticStore::new("test", ScriptedRemote::default(), storage);
        assert!(restored.restore().await.unwrap());
        assert_eq!(restored.snapshot(), set(&[7, 42]));
    }

    #[tokio::test]
    async fn restore_without_persisted_state_is_a_no_op() {
        let (store, _) = store_with(ScriptedRemote::default());
        assert!(!store.restore().await.unwrap());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn rollback_after_a_fresh_load_returns_to_the_loaded_entry() {
        let (remove_tx, remove_rx) = oneshot::channel();
        let remote = ScriptedRemote::default();
        remote.fetches.lock().push_back(Scripted::Now(Ok(set(&[1, 2]))));
        remote.fetches.lock().push_back(Scripted::Now(Ok(set(&[2]))));
        remote.mutations.lock().push_back(Scripted::Deferred(remove_rx));
        let (store, _) = store_with(remote);
        store.load().await.unwrap();

        let remove = store.mutate(SetOp::Remove(1));
        let drive = async {
            tokio::task::yield_now().await;
            // Item 1 was removed elsewhere in the meantime
            store.load().await.unwrap();
            assert!(store.has_pending(&1));
            remove_tx.send(Err(network_error())).unwrap();
        };
        let (remove, ()) = tokio::join!(remove, drive);

        assert!(remove.is_err());
        assert_eq!(store.snapshot(), set(&[2]));
    }

    /// A server-side set shared by concurrent callers.
    #[derive(Default)]
    struct SharedServer {
        ids: Mutex<BTreeSet<u64>>,
    }

    #[async_trait]
    impl MembershipRemote for SharedServer {
        type State = BTreeSet<u64>;
        type Op = SetOp;

        async fn fetch(&self) -> Reply {
            Ok(self.ids.lock().clone())
        }

        async fn mutate(&self, op: &SetOp) -> Reply {
            tokio::task::yield_now().await;
            let answer = {
                let mut ids = self.ids.lock();
                op.apply(&mut ids);
                ids.clone()
            };
            tokio::task::yield_now().await;
            Ok(answer)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_confirmations_persist_the_final_state() {
        use crate::storage::FileStore;

        for _ in 0..50 {
            let dir = tempfile::tempdir().unwrap();
            let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));
            let store = Arc::new(OptimisticStore::new("favorites", SharedServer::default(), storage.clone()));

            let adds: Vec<_> = (1..=4u64)
                .map(|id| {
                    let store = store.clone();
                    tokio::spawn(async move { store.mutate(SetOp::Add(id)).await })
                })
                .collect();
            for add in adds {
                add.await.unwrap().unwrap();
            }

            let persisted: Option<BTreeSet<u64>> = storage::read_json(storage.as_ref(), "favorites").await.unwrap();
            assert_eq!(store.snapshot(), set(&[1, 2, 3, 4]));
            assert_eq!(persisted, Some(store.snapshot()));
        }
    }
}
