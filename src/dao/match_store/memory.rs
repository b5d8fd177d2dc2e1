//! Process-local match store used for development and tests.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use dashmap::DashMap;
use futures::future::{BoxFuture, ready};

use super::MatchStore;
use crate::{
    dao::storage::{StorageError, StorageResult},
    state::match_aggregate::{MatchAggregate, MatchId, NewMatch},
};

/// Process-local match store. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    matches: DashMap<MatchId, MatchAggregate>,
    last_id: AtomicI64,
}

impl MemoryMatchStore {
    /// Empty store; ids start at 1.
    pub fn new() -> Self {
        Self::default()
    }

    fn commit(&self, mut aggregate: MatchAggregate, expected_version: u64) -> StorageResult<MatchAggregate> {
        let id = aggregate.id;
        let conflict = StorageError::VersionConflict {
            id,
            expected: expected_version,
        };
        let mut stored = self.inner.matches.get_mut(&id).ok_or(conflict)?;
        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                id,
                expected: expected_version,
            });
        }

        aggregate.version = expected_version + 1;
        *stored = aggregate.clone();
        Ok(aggregate)
    }
}

impl MatchStore for MemoryMatchStore {
    fn create_match(&self, new_match: NewMatch) -> BoxFuture<'static, StorageResult<MatchAggregate>> {
        let id = self.inner.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let aggregate = MatchAggregate::scheduled(id, new_match);
        self.inner.matches.insert(id, aggregate.clone());
        Box::pin(ready(Ok(aggregate)))
    }

    fn find_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchAggregate>>> {
        let found = self.inner.matches.get(&id).map(|entry| entry.value().clone());
        Box::pin(ready(Ok(found)))
    }

    fn commit_match(
        &self,
        aggregate: MatchAggregate,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<MatchAggregate>> {
        Box::pin(ready(self.commit(aggregate, expected_version)))
    }

    fn list_by_tournament(
        &self,
        tournament_id: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchAggregate>>> {
        let mut matches: Vec<MatchAggregate> = self
            .inner
            .matches
            .iter()
            .filter(|entry| entry.tournament_id == tournament_id)
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by_key(|aggregate| aggregate.id);
        Box::pin(ready(Ok(matches)))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }
}
