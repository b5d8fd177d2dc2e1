use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Tournament event envelopes.
pub mod events;
/// Health check payloads.
pub mod health;
/// Match request and response bodies.
pub mod matches;
pub mod validation;
/// Viewer channel frames.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
