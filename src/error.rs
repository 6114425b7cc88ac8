//! Error types for the onboarding client.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Session storage errors.
///
/// These never reach the user: the wizard logs them and carries on with
/// whatever is in memory.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Backend API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("{endpoint} returned {status}: {detail}")]
    Status {
        endpoint: String,
        status: u16,
        detail: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Admin key is not configured")]
    MissingAdminKey,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// A single human-readable message suitable for a toast or form banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { detail, .. } if !detail.is_empty() => detail.clone(),
            Self::Status { status, .. } => format!("Request failed ({status})."),
            Self::RequestFailed { .. } => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            Self::InvalidUpload(reason) | Self::InvalidRequest(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status code, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from saving a step or submitting the wizard.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Raised before any network call; the user corrects and resubmits.
    #[error("{0}")]
    Validation(String),

    /// The backend rejected or failed the request.
    #[error("{0}")]
    Backend(String),

    #[error("A submission is already in progress")]
    InProgress,
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        Self::Backend(err.user_message())
    }
}
