use axum::{Json, extract::rejection::QueryRejection, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use crate::{
    dao::{assets::ObjectStorageError, media::MediaError, persistence::PersistenceError},
    dto::cron::ErrorResponse,
    services::pipeline::{PipelineError, PipelineStep},
};

/// A user whose streak could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFailure {
    pub user_id: String,
    pub reason: String,
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Persistent store read or write failed.
    #[error("persistence failure")]
    Unavailable(#[source] PersistenceError),
    /// Application is running in degraded mode without a store.
    #[error("store unavailable (degraded mode)")]
    Degraded,
    /// Requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Records exist but are in a state the operation cannot proceed from.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Duration lookup or clip fetch failed.
    #[error("media failure")]
    Media(#[source] MediaError),
    /// Clip upload or URL signing failed.
    #[error("object storage failure")]
    ObjectStorage(#[source] ObjectStorageError),
    /// Some users could not be reconciled; nothing past reconciliation ran.
    #[error("reconciliation failed for {} user(s)", failures.len())]
    Reconciliation { failures: Vec<UserFailure> },
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// Run aborted by a shutdown signal.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<PersistenceError> for ServiceError {
    fn from(err: PersistenceError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<MediaError> for ServiceError {
    fn from(err: MediaError) -> Self {
        ServiceError::Media(err)
    }
}

impl From<ObjectStorageError> for ServiceError {
    fn from(err: ObjectStorageError) -> Self {
        ServiceError::ObjectStorage(err)
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Upstream collaborator (media or object storage) failed.
    #[error("bad gateway: {0}")]
    BadGateway(String),
    /// Upstream collaborator did not answer in time.
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
    /// Failure inside a rotation pipeline, tagged with the failing step.
    #[error("{cause}")]
    Step {
        step: PipelineStep,
        cause: Box<AppError>,
    },
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Render an error and its source chain on one line.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = describe(&err);
        match err {
            ServiceError::Unavailable(_) => AppError::ServiceUnavailable(message),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::NotFound(reason) => AppError::NotFound(reason),
            ServiceError::InvalidState(reason) => AppError::Conflict(reason),
            ServiceError::Media(_) | ServiceError::ObjectStorage(_) => {
                AppError::BadGateway(message)
            }
            ServiceError::Reconciliation { failures } => {
                let users = failures
                    .iter()
                    .map(|failure| format!("{} ({})", failure.user_id, failure.reason))
                    .collect::<Vec<_>>()
                    .join(", ");
                AppError::Internal(format!("{message}: {users}"))
            }
            ServiceError::Timeout => AppError::GatewayTimeout(message),
            ServiceError::Cancelled => AppError::ServiceUnavailable(message),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Step {
            step: err.step,
            cause: Box::new(err.source.into()),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Step { cause, .. } => cause.status(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let step = match &self {
            AppError::Step { step, .. } => Some(*step),
            _ => None,
        };

        let payload = Json(ErrorResponse {
            error: self.to_string(),
            step,
        });

        (status, payload).into_response()
    }
}
