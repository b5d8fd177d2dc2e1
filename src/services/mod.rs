/// Subscription bridge from the pub/sub transport to the viewer registry.
pub mod bridge;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match lifecycle and scoring operations.
pub mod match_service;
/// Publishing of committed updates to the pub/sub transport.
pub mod publisher;
/// Viewer WebSocket session handling.
pub mod session;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
