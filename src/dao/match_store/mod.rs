pub mod memory;
/// MongoDB-backed store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::{
    dao::storage::StorageResult,
    state::match_aggregate::{MatchAggregate, MatchId, NewMatch},
};

/// Durable home of match aggregates, keyed by match id.
pub trait MatchStore: Send + Sync {
    /// Persist a new scheduled match under a store-assigned id.
    fn create_match(&self, new_match: NewMatch) -> BoxFuture<'static, StorageResult<MatchAggregate>>;
    /// Load one match, `None` when the id is unknown.
    fn find_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchAggregate>>>;
    /// Commit a mutated aggregate if the stored copy is still at `expected_version`.
    ///
    /// The committed aggregate carries `expected_version + 1`. A mismatch yields
    /// [`StorageError::VersionConflict`](crate::dao::storage::StorageError::VersionConflict)
    /// and leaves the stored copy untouched.
    fn commit_match(
        &self,
        aggregate: MatchAggregate,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<MatchAggregate>>;
    /// All matches of a tournament ordered by id.
    fn list_by_tournament(
        &self,
        tournament_id: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchAggregate>>>;
    /// Cheap liveness probe used by health reporting and supervision.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
