use serde::Serialize;
use std::collections::BTreeMap;

/// Classified failure of a backend call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found (status {status})")]
    NotFound { status: u16 },

    #[error("server error (status {status})")]
    Server { status: u16 },

    #[error("unexpected status {status}")]
    Status { status: u16 },

    #[error("rejected: {message}")]
    Rejected { message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Coarse failure categories shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Server,
    NotFound,
    Timeout,
    Unknown,
}

impl ApiError {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ApiError::Unauthorized,
            500..=599 => ApiError::Server { status },
            400..=499 => ApiError::NotFound { status },
            _ => ApiError::Status { status },
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Malformed(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Network(_) => FailureKind::Network,
            ApiError::Timeout => FailureKind::Timeout,
            ApiError::Server { .. } => FailureKind::Server,
            ApiError::NotFound { .. } => FailureKind::NotFound,
            ApiError::Unauthorized
            | ApiError::Status { .. }
            | ApiError::Rejected { .. }
            | ApiError::Malformed(_) => FailureKind::Unknown,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Network connection issue. Please check your internet connection and try again."
                    .to_string()
            }
            ApiError::Server { .. } => {
                "Server is experiencing issues. Please try again later.".to_string()
            }
            ApiError::NotFound { .. } => {
                "Movie service is temporarily unavailable. Please try again later.".to_string()
            }
            ApiError::Timeout => "Request timed out. Please try again.".to_string(),
            ApiError::Unauthorized => "Session expired. Please log in again.".to_string(),
            ApiError::Rejected { message } if !message.trim().is_empty() => message.clone(),
            _ => "An unexpected error occurred while loading movies.".to_string(),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Inline per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}
