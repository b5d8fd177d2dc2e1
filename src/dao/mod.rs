/// Match aggregate persistence.
pub mod match_store;
/// Storage abstraction layer for database operations.
pub mod storage;
