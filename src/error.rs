use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    pubsub::BusError,
    state::{
        match_aggregate::MatchId,
        state_machine::{InvalidTransition, TransitionError},
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No match exists with the requested id.
    #[error("match `{0}` not found")]
    MatchNotFound(MatchId),
    /// Scoring was attempted before the score document was created.
    #[error("score for match `{0}` has not been initialized")]
    ScoreNotInitialized(MatchId),
    /// Operation is not allowed from the current match status.
    #[error(transparent)]
    InvalidTransition(InvalidTransition),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    Validation(String),
    /// The store rejected or failed the commit.
    #[error("persistence failure")]
    Persistence(#[source] StorageError),
    /// Another writer committed first.
    #[error("match `{0}` was modified concurrently")]
    Conflict(MatchId),
    /// Application is running without a store.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl ServiceError {
    /// Map a lifecycle refusal for the given match.
    pub fn from_transition(match_id: MatchId, err: TransitionError) -> Self {
        match err {
            TransitionError::ScoreNotInitialized => ServiceError::ScoreNotInitialized(match_id),
            TransitionError::InvalidTransition(invalid) => ServiceError::InvalidTransition(invalid),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::VersionConflict { id, .. } => ServiceError::Conflict(id),
            other => ServiceError::Persistence(other),
        }
    }
}

/// Failures while pushing an update out. Never surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The viewer's writer task has stopped.
    #[error("viewer connection closed")]
    ConnectionClosed,
    /// Payload could not be serialized.
    #[error("failed to serialize update")]
    Serialize(#[from] serde_json::Error),
    /// Transport rejected the publish.
    #[error("publish failed")]
    Publish(#[from] BusError),
    /// Transport did not answer in time.
    #[error("publish timed out")]
    Timeout,
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            err @ ServiceError::MatchNotFound(_) => AppError::NotFound(err.to_string()),
            err @ ServiceError::ScoreNotInitialized(_) => AppError::Conflict(err.to_string()),
            err @ ServiceError::InvalidTransition(_) => AppError::Conflict(err.to_string()),
            err @ ServiceError::Conflict(_) => AppError::Conflict(err.to_string()),
            ServiceError::Validation(message) => AppError::BadRequest(message),
            ServiceError::Persistence(source) => {
                tracing::error!(error = %source, "persistence failure");
                AppError::Internal("failed to persist match".into())
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::{MatchEvent, MatchStatus};

    #[test]
    fn transition_errors_map_to_domain_kinds() {
        assert!(matches!(
            ServiceError::from_transition(3, TransitionError::ScoreNotInitialized),
            ServiceError::ScoreNotInitialized(3)
        ));
        let invalid = InvalidTransition {
            from: MatchStatus::Completed,
            event: MatchEvent::Ball,
        };
        assert!(matches!(
            ServiceError::from_transition(3, TransitionError::InvalidTransition(invalid)),
            ServiceError::InvalidTransition(_)
        ));
    }

    #[test]
    fn service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::MatchNotFound(1), StatusCode::NOT_FOUND),
            (ServiceError::ScoreNotInitialized(1), StatusCode::CONFLICT),
            (ServiceError::Conflict(1), StatusCode::CONFLICT),
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Degraded, StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn persistence_failures_hide_backend_details() {
        let source = std::io::Error::other("connection reset by peer at 10.0.0.3");
        let err = ServiceError::from(StorageError::unavailable("write failed".into(), source));
        let app_err = AppError::from(err);
        assert!(matches!(&app_err, AppError::Internal(message) if !message.contains("10.0.0.3")));
    }

    #[test]
    fn version_conflicts_become_conflicts() {
        let err = ServiceError::from(StorageError::VersionConflict {
            id: 8,
            expected: 2,
        });
        assert!(matches!(err, ServiceError::Conflict(8)));
    }
}
