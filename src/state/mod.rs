pub mod match_aggregate;
/// Viewer connections per match.
pub mod registry;
pub mod score;
/// Match lifecycle transitions.
pub mod state_machine;

use std::{future::Future, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use tracing::debug;

use crate::{
    config::AppConfig,
    dao::{match_store::MatchStore, storage::StorageResult},
    error::ServiceError,
    pubsub::UpdateBus,
    services::publisher::UpdatePublisher,
    state::{
        match_aggregate::{MatchAggregate, MatchId},
        registry::ConnectionRegistry,
        state_machine::TransitionError,
    },
};

/// Handle to the application state shared across tasks.
pub type SharedState = Arc<AppState>;

/// Long-lived objects built once at start and shared by every request and session.
pub struct AppState {
    config: AppConfig,
    match_store: RwLock<Option<Arc<dyn MatchStore>>>,
    registry: ConnectionRegistry,
    bus: Arc<dyn UpdateBus>,
    publisher: UpdatePublisher,
    writer_locks: DashMap<MatchId, Arc<Mutex<()>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a match store is installed.
    pub fn new(config: AppConfig, bus: Arc<dyn UpdateBus>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let publisher = UpdatePublisher::new(bus.clone(), config.publish_timeout);
        Arc::new(Self {
            config,
            match_store: RwLock::new(None),
            registry: ConnectionRegistry::new(),
            bus,
            publisher,
            writer_locks: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current match store, if one is installed.
    pub async fn match_store(&self) -> Option<Arc<dyn MatchStore>> {
        let guard = self.match_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current match store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_match_store(&self) -> Result<Arc<dyn MatchStore>, ServiceError> {
        self.match_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new match store implementation and leave degraded mode.
    pub async fn install_match_store(&self, store: Arc<dyn MatchStore>) {
        {
            let mut guard = self.match_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current match store and enter degraded mode.
    pub async fn clear_match_store(&self) {
        {
            let mut guard = self.match_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.match_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Viewer connections grouped by match.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Transport shared by the publisher and the subscription bridge.
    pub fn bus(&self) -> Arc<dyn UpdateBus> {
        self.bus.clone()
    }

    /// Publisher of committed updates.
    pub fn publisher(&self) -> &UpdatePublisher {
        &self.publisher
    }

    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Run a store call under the configured store timeout.
    pub async fn bounded<T>(
        &self,
        call: impl Future<Output = StorageResult<T>>,
    ) -> Result<T, ServiceError> {
        timeout(self.config.store_timeout, call)
            .await
            .map_err(|_| ServiceError::Timeout)?
            .map_err(ServiceError::from)
    }

    /// Load a match or fail with [`ServiceError::MatchNotFound`].
    pub async fn load_match(&self, id: MatchId) -> Result<MatchAggregate, ServiceError> {
        let store = self.require_match_store().await?;
        self.bounded(store.find_match(id))
            .await?
            .ok_or(ServiceError::MatchNotFound(id))
    }

    /// Load, mutate, commit and publish one match while holding its single-writer lock.
    ///
    /// `work` mutates a private copy of the aggregate. The copy is committed only when
    /// `work` succeeds; on any error it is discarded and the stored match is untouched.
    /// The committed score document is published before the lock is released, so viewers
    /// receive updates of one match in commit order. Publish failures are logged by the
    /// publisher and never fail the call.
    pub async fn with_match_mut<T, F>(
        &self,
        id: MatchId,
        work: F,
    ) -> Result<(T, MatchAggregate), ServiceError>
    where
        F: FnOnce(&mut MatchAggregate) -> Result<T, TransitionError>,
    {
        let store = self.require_match_store().await?;
        let slot = WriterSlot::acquire(&self.writer_locks, id);
        let _writer = slot.lock.lock().await;

        let (value, committed) = self.mutate(store.as_ref(), id, work).await?;
        if let Some(score) = &committed.score {
            let _ = self.publisher.publish_score(id, score).await;
        }
        Ok((value, committed))
    }

    async fn mutate<T, F>(
        &self,
        store: &dyn MatchStore,
        id: MatchId,
        work: F,
    ) -> Result<(T, MatchAggregate), ServiceError>
    where
        F: FnOnce(&mut MatchAggregate) -> Result<T, TransitionError>,
    {
        let mut aggregate = self
            .bounded(store.find_match(id))
            .await?
            .ok_or(ServiceError::MatchNotFound(id))?;
        let read_version = aggregate.version;

        let value = match work(&mut aggregate) {
            Ok(value) => value,
            Err(err) => {
                debug!(match_id = id, error = %err, "mutation rejected; nothing committed");
                return Err(ServiceError::from_transition(id, err));
            }
        };

        let committed = self
            .bounded(store.commit_match(aggregate, read_version))
            .await?;
        Ok((value, committed))
    }

    /// Number of per-match writer locks currently held or awaited.
    pub fn active_writers(&self) -> usize {
        self.writer_locks.len()
    }
}

/// Per-match writer lock entry. Dropping the slot removes the entry from the map once
/// no other writer holds or awaits it, including when the owning future is cancelled.
struct WriterSlot<'a> {
    locks: &'a DashMap<MatchId, Arc<Mutex<()>>>,
    id: MatchId,
    lock: Arc<Mutex<()>>,
}

impl<'a> WriterSlot<'a> {
    fn acquire(locks: &'a DashMap<MatchId, Arc<Mutex<()>>>, id: MatchId) -> Self {
        let lock = locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self { locks, id, lock }
    }
}

impl Drop for WriterSlot<'_> {
    fn drop(&mut self) {
        // The map and this slot are the only owners left.
        self.locks.remove_if(&self.id, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::{
        StreamExt,
        future::{BoxFuture, pending},
    };

    use super::*;
    use crate::{
        dao::match_store::memory::MemoryMatchStore,
        pubsub::{BusError, MessageStream, TopicKey, memory::MemoryBus},
        state::{
            match_aggregate::NewMatch,
            score::{BallEvent, ExtraType},
        },
    };

    struct StalledBus;

    impl UpdateBus for StalledBus {
        fn publish(&self, _topic: TopicKey, _payload: String) -> BoxFuture<'static, Result<(), BusError>> {
            Box::pin(pending())
        }

        fn psubscribe(&self, _pattern: String) -> BoxFuture<'static, Result<MessageStream, BusError>> {
            Box::pin(async { Ok(futures::stream::empty().boxed()) })
        }

        fn health_check(&self) -> BoxFuture<'static, Result<(), BusError>> {
            Box::pin(async { Ok(()) })
        }
    }

    async fn state_with_match() -> (SharedState, MatchId) {
        state_with_match_on(Arc::new(MemoryBus::default())).await
    }

    async fn state_with_match_on(bus: Arc<dyn UpdateBus>) -> (SharedState, MatchId) {
        let state = AppState::new(AppConfig::default(), bus);
        let store = MemoryMatchStore::new();
        let created = store
            .create_match(NewMatch {
                tournament_id: 1,
                team1_id: 10,
                team2_id: 20,
            })
            .await
            .unwrap();
        state.install_match_store(Arc::new(store)).await;
        (state, created.id)
    }

    fn dot_ball() -> BallEvent {
        BallEvent {
            runs: 1,
            is_wicket: false,
            extra_type: ExtraType::None,
            batsman_name: "A".into(),
            bowler_name: "X".into(),
            commentary: "single".into(),
        }
    }

    #[tokio::test]
    async fn starts_degraded_until_store_installed() {
        let state = AppState::new(AppConfig::default(), Arc::new(MemoryBus::default()));
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.load_match(1).await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_match_store(Arc::new(MemoryMatchStore::new()))
            .await;
        assert!(!state.is_degraded().await);
        assert!(!*state.degraded_watcher().borrow());

        state.clear_match_store().await;
        assert!(state.is_degraded().await);
    }

    #[tokio::test]
    async fn successful_work_is_committed() {
        let (state, id) = state_with_match().await;
        let (_, committed) = state
            .with_match_mut(id, |aggregate| aggregate.initialize(10, 20).map(|_| ()))
            .await
            .unwrap();

        assert_eq!(committed.version, 1);
        assert_eq!(state.load_match(id).await.unwrap(), committed);
        assert_eq!(state.active_writers(), 0);
    }

    #[tokio::test]
    async fn rejected_work_is_rolled_back() {
        let (state, id) = state_with_match().await;
        let err = state
            .with_match_mut(id, |aggregate| aggregate.apply_ball(&dot_ball()).map(|_| ()))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::ScoreNotInitialized(found) if found == id));
        let stored = state.load_match(id).await.unwrap();
        assert_eq!(stored.version, 0);
        assert!(stored.score.is_none());
        assert_eq!(state.active_writers(), 0);
    }

    #[tokio::test]
    async fn missing_match_is_reported() {
        let (state, _) = state_with_match().await;
        let err = state
            .with_match_mut(404, |aggregate| aggregate.complete())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MatchNotFound(404)));
    }

    #[tokio::test]
    async fn concurrent_writers_on_one_match_lose_no_updates() {
        let (state, id) = state_with_match().await;
        state
            .with_match_mut(id, |aggregate| aggregate.initialize(10, 20).map(|_| ()))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..24)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move {
                    state
                        .with_match_mut(id, |aggregate| {
                            aggregate.apply_ball(&dot_ball()).map(|_| ())
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = state.load_match(id).await.unwrap();
        assert_eq!(stored.score.map(|score| score.runs), Some(24));
        assert_eq!(stored.version, 25);
        assert_eq!(state.active_writers(), 0);
    }

    #[tokio::test]
    async fn cancelled_writers_release_their_lock_entry() {
        let (state, id) = state_with_match_on(Arc::new(StalledBus)).await;

        // Commits, then parks on the publish while still holding the writer lock.
        let holder = {
            let state = state.clone();
            tokio::spawn(async move {
                state
                    .with_match_mut(id, |aggregate| aggregate.initialize(10, 20).map(|_| ()))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(state.active_writers(), 1);

        let waiter = timeout(
            Duration::from_millis(20),
            state.with_match_mut(id, |aggregate| aggregate.complete()),
        )
        .await;
        assert!(waiter.is_err());
        assert_eq!(state.active_writers(), 1);

        holder.abort();
        assert!(holder.await.unwrap_err().is_cancelled());
        assert_eq!(state.active_writers(), 0);
        assert_eq!(state.load_match(id).await.unwrap().version, 1);
    }
}
