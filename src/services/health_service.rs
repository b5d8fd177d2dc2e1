use tokio::time::timeout;
use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the store and the pub/sub transport, logging whichever is unreachable.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let probe_timeout = state.config().store_timeout;

    let store_ok = match state.require_match_store().await {
        Ok(store) => match timeout(probe_timeout, store.health_check()).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "storage health check failed");
                false
            }
            Err(_) => {
                warn!("storage health check timed out");
                false
            }
        },
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            false
        }
    };

    let bus_ok = match timeout(probe_timeout, state.bus().health_check()).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!(error = %err, "pub/sub health check failed");
            false
        }
        Err(_) => {
            warn!("pub/sub health check timed out");
            false
        }
    };

    HealthResponse::from_probes(store_ok, bus_ok)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::match_store::memory::MemoryMatchStore, pubsub::memory::MemoryBus,
        state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let state = AppState::new(AppConfig::default(), Arc::new(MemoryBus::default()));
        let health = health_status(&state).await;
        assert_eq!(health.status, "degraded");
        assert_eq!(health.store, "unavailable");
        assert_eq!(health.bus, "connected");

        state
            .install_match_store(Arc::new(MemoryMatchStore::new()))
            .await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.store, "connected");
    }
}
