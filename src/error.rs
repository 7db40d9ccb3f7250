use crate::provider::ProviderError;
use crate::store::EventLogError;
use crate::types::ValidationError;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, warn};

/// Every failure an HTTP handler can report. Rendered as a plain-text body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("An API Key must be provided")]
    MissingApiKey,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    EventLog(#[from] EventLogError),
    #[error("event log task failed: {0}")]
    EventLogTask(#[from] JoinError),
    #[error("Unable to POST the message to Mailjet: {0}")]
    SendFailed(#[source] ProviderError),
    #[error("Unable to set up the eventcallbackurl at Mailjet: {0}")]
    SetupFailed(#[source] ProviderError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(Method),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingApiKey | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::EventLog(EventLogError::InvalidKey { .. }) => StatusCode::BAD_REQUEST,
            ApiError::EventLog(_) | ApiError::EventLogTask(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::SendFailed(_) | ApiError::SetupFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), "{message}");
        } else {
            warn!(status = status.as_u16(), "{message}");
        }
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn maps_store_errors_by_kind() {
        let invalid = ApiError::from(EventLogError::InvalidKey { reason: "key is empty" });
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let storage = ApiError::from(EventLogError::Storage {
            path: PathBuf::from("events_k.json"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        });
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(storage.to_string().contains("events_k.json"));
    }

    #[test]
    fn validation_message_is_passed_through() {
        let err = ApiError::from(ValidationError("Subject is mandatory"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Subject is mandatory");
    }

    #[test]
    fn unsupported_method_names_the_method() {
        let err = ApiError::UnsupportedMethod(Method::DELETE);
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.to_string(), "Unsupported method: DELETE");
    }
}
