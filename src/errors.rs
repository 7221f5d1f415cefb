use reqwest::StatusCode;
use serde::Serialize;

/// Errors surfaced by the workflow engine and its persistence-API client.
///
/// Two families share this enum: decisions made before any network call
/// (guard denials, payload validation) and failures reported by the external
/// collaborator (HTTP status or transport). Every error is terminal for the
/// current user action; nothing here triggers an automatic retry unless the
/// client was explicitly configured with one.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum WorkflowError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Transition denied: {0}")]
    TransitionDenied(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error ({status}): {message}")]
    UpstreamStatus {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Network error: {message}")]
    Network { message: String, retryable: bool },

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<validator::ValidationErrors> for WorkflowError {
    fn from(err: validator::ValidationErrors) -> Self {
        WorkflowError::ValidationError(err.to_string())
    }
}

impl WorkflowError {
    /// Maps a collaborator response status to an error variant.
    /// This is the single source of truth for status-to-error mapping.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::UNAUTHORIZED => WorkflowError::SessionExpired,
            StatusCode::FORBIDDEN => WorkflowError::AccessDenied(message),
            StatusCode::NOT_FOUND => WorkflowError::NotFound(message),
            StatusCode::CONFLICT => WorkflowError::Conflict(message),
            _ => WorkflowError::UpstreamStatus {
                status: status.as_u16(),
                message,
                retryable: false,
            },
        }
    }

    /// Wraps a transport failure from the HTTP client.
    pub fn network(err: &reqwest::Error) -> Self {
        WorkflowError::Network {
            message: err.to_string(),
            retryable: false,
        }
    }

    /// Whether re-triggering the action might succeed without operator
    /// intervention. False for everything except transient upstream failures
    /// that the retry policy marked as such.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::UpstreamStatus { retryable, .. }
            | WorkflowError::Network { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Marks a transient error as retryable. No-op for other variants.
    pub fn mark_retryable(mut self) -> Self {
        match &mut self {
            WorkflowError::UpstreamStatus { retryable, .. }
            | WorkflowError::Network { retryable, .. } => *retryable = true,
            _ => {}
        }
        self
    }

    /// Returns the message shown to the person who triggered the action.
    /// Upstream and transport details are collapsed into a generic retry-later
    /// line; pre-network denials keep their specific wording.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::SessionExpired => {
                "Authentication failed. Please login again.".to_string()
            }
            WorkflowError::AccessDenied(_) => {
                "Access denied. You do not have permission to perform this action.".to_string()
            }
            WorkflowError::NotFound(what) => format!("{} not found.", what),
            WorkflowError::UpstreamStatus { .. } | WorkflowError::Network { .. } => {
                "Server error. Please try again later.".to_string()
            }
            WorkflowError::ValidationError(msg)
            | WorkflowError::TransitionDenied(msg)
            | WorkflowError::Conflict(msg)
            | WorkflowError::ExternalApiError(msg) => msg.clone(),
            WorkflowError::SerializationError(_) => {
                "Server error. Please try again later.".to_string()
            }
        }
    }
}
