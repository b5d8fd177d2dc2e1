//! Library crate for pitch-pulse, exposing modules for binaries and integration tests.

pub mod config;
/// Persistence layer.
pub mod dao;
/// Request, response and wire types.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Pub/sub transports and topic keys.
pub mod pubsub;
/// Axum routers.
pub mod routes;
/// Business logic and background tasks.
pub mod services;
/// Shared state and the match domain model.
pub mod state;
