use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::state::match_aggregate::MatchId;

/// Result alias for MongoDB store operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB match store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending connection string.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The client could not be built from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings attempted before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The id counter could not be incremented.
    #[error("failed to allocate a match id")]
    AllocateId {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The counter upsert returned no document.
    #[error("match id counter returned no value")]
    MissingCounter,
    /// Writing a match failed.
    #[error("failed to save match `{id}`")]
    SaveMatch {
        /// Match being written.
        id: MatchId,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a match failed.
    #[error("failed to load match `{id}`")]
    LoadMatch {
        /// Match being read.
        id: MatchId,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Listing a tournament's matches failed.
    #[error("failed to list matches of tournament `{tournament_id}`")]
    ListMatches {
        /// Tournament being listed.
        tournament_id: i64,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
