use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::{
    dao::{match_store::MatchStore, storage::StorageError},
    state::SharedState,
};

/// Retry and polling cadence of the supervisor.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorTiming {
    /// First reconnect delay.
    pub initial_delay: Duration,
    /// Cap on the reconnect delay.
    pub max_delay: Duration,
    /// Interval between health probes of an installed store.
    pub health_poll_interval: Duration,
    /// Consecutive failed probes before the connection is rebuilt from scratch.
    pub max_failed_probes: u32,
}

impl Default for SupervisorTiming {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(10),
            health_poll_interval: Duration::from_secs(5),
            max_failed_probes: 3,
        }
    }
}

/// Connect to the match store and keep the shared state in degraded mode while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, timing: SupervisorTiming, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn MatchStore>, StorageError>> + Send,
{
    let mut delay = timing.initial_delay;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_match_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = timing.initial_delay;

                monitor(&state, &timing, store).await;
                warn!("exhausted storage health probes; reconnecting");
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(timing.max_delay);
    }
}

/// Poll an installed store until it fails too many probes in a row.
async fn monitor(state: &SharedState, timing: &SupervisorTiming, store: Arc<dyn MatchStore>) {
    let probe_timeout = state.config().store_timeout;
    let mut failures: u32 = 0;

    loop {
        sleep(timing.health_poll_interval).await;

        let probe = match timeout(probe_timeout, store.health_check()).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::unavailable(
                "health check timed out".into(),
                std::io::Error::from(std::io::ErrorKind::TimedOut),
            )),
        };

        match probe {
            Ok(()) => {
                if failures > 0 {
                    info!("storage healthy again; leaving degraded mode");
                    state.install_match_store(store.clone()).await;
                }
                failures = 0;
            }
            Err(err) => {
                if failures == 0 {
                    warn!(error = %err, "storage health check failed; entering degraded mode");
                    state.clear_match_store().await;
                } else {
                    warn!(attempt = failures, error = %err, "storage health check failed again");
                }
                failures += 1;
                if failures >= timing.max_failed_probes {
                    return;
                }
            }
        }
    }
}
