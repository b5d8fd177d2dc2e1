use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/health` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Store connectivity ("connected" or "unavailable").
    pub store: String,
    /// Pub/sub connectivity ("connected" or "unavailable").
    pub bus: String,
}

impl HealthResponse {
    /// Build the payload from the two connectivity probes.
    pub fn from_probes(store_ok: bool, bus_ok: bool) -> Self {
        let label = |ok: bool| if ok { "connected" } else { "unavailable" };
        Self {
            status: if store_ok && bus_ok { "ok" } else { "degraded" }.to_string(),
            store: label(store_ok).to_string(),
            bus: label(bus_ok).to_string(),
        }
    }
}
