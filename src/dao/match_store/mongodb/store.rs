use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::{Document, doc},
    options::{IndexOptions, ReturnDocument},
};

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoMatchDocument, doc_id, doc_id_at_version},
};
use crate::{
    dao::{
        match_store::MatchStore,
        storage::{StorageError, StorageResult},
    },
    state::match_aggregate::{MatchAggregate, MatchId, NewMatch},
};

const MATCH_COLLECTION_NAME: &str = "matches";
const COUNTER_COLLECTION_NAME: &str = "counters";
const MATCH_COUNTER_ID: &str = "matches";

/// Match store persisting aggregates in MongoDB.
#[derive(Clone)]
pub struct MongoMatchStore {
    database: Arc<Database>,
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            database: Arc::new(database),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    fn collection(&self) -> Collection<MongoMatchDocument> {
        self.database
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection();
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"tournament_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("match_tournament_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION_NAME,
                index: "tournament_id",
                source,
            })?;

        Ok(())
    }

    async fn ping(&self) -> MongoResult<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    /// Atomically bump the shared counter to obtain the next numeric match id.
    async fn next_id(&self) -> MongoResult<MatchId> {
        let counters = self
            .database
            .collection::<Document>(COUNTER_COLLECTION_NAME);

        let counter = counters
            .find_one_and_update(
                doc! {"_id": MATCH_COUNTER_ID},
                doc! {"$inc": {"seq": 1_i64}},
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::AllocateId { source })?;

        counter
            .and_then(|document| document.get_i64("seq").ok())
            .ok_or(MongoDaoError::MissingCounter)
    }

    async fn create_match(&self, new_match: NewMatch) -> MongoResult<MatchAggregate> {
        let id = self.next_id().await?;
        let aggregate = MatchAggregate::scheduled(id, new_match);
        let document: MongoMatchDocument = aggregate.clone().into();

        self.collection()
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveMatch { id, source })?;

        Ok(aggregate)
    }

    async fn find_match(&self, id: MatchId) -> MongoResult<Option<MatchAggregate>> {
        let document = self
            .collection()
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadMatch { id, source })?;

        Ok(document.map(Into::into))
    }

    /// Replace the document only when it is still at `expected_version`.
    ///
    /// Returns `Ok(None)` when the version filter matched nothing.
    async fn commit_match(
        &self,
        mut aggregate: MatchAggregate,
        expected_version: u64,
    ) -> MongoResult<Option<MatchAggregate>> {
        let id = aggregate.id;
        aggregate.version = expected_version + 1;
        let document: MongoMatchDocument = aggregate.clone().into();

        let result = self
            .collection()
            .replace_one(doc_id_at_version(id, expected_version), &document)
            .await
            .map_err(|source| MongoDaoError::SaveMatch { id, source })?;

        Ok((result.matched_count > 0).then_some(aggregate))
    }

    async fn list_by_tournament(&self, tournament_id: i64) -> MongoResult<Vec<MatchAggregate>> {
        let documents: Vec<MongoMatchDocument> = self
            .collection()
            .find(doc! {"tournament_id": tournament_id})
            .sort(doc! {"_id": 1})
            .await
            .map_err(|source| MongoDaoError::ListMatches {
                tournament_id,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMatches {
                tournament_id,
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl MatchStore for MongoMatchStore {
    fn create_match(&self, new_match: NewMatch) -> BoxFuture<'static, StorageResult<MatchAggregate>> {
        let store = self.clone();
        Box::pin(async move { store.create_match(new_match).await.map_err(Into::into) })
    }

    fn find_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchAggregate>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(id).await.map_err(Into::into) })
    }

    fn commit_match(
        &self,
        aggregate: MatchAggregate,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<MatchAggregate>> {
        let store = self.clone();
        Box::pin(async move {
            let id = aggregate.id;
            store
                .commit_match(aggregate, expected_version)
                .await?
                .ok_or(StorageError::VersionConflict {
                    id,
                    expected: expected_version,
                })
        })
    }

    fn list_by_tournament(
        &self,
        tournament_id: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchAggregate>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_by_tournament(tournament_id)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
