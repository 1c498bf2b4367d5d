//! Error types for the archival-auth crate.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Authentication-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Credentials rejected by server")]
    Rejected,

    #[error("Username and password are required")]
    MissingCredentials,

    #[error("Server response did not contain a JWT")]
    MissingToken,

    #[error("Token refresh failed")]
    RefreshExhausted,

    #[error("Token refresh timed out")]
    RefreshTimedOut,

    #[error("Token refresh was cancelled")]
    RefreshCancelled,
}

/// Credential store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to access credential file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential file is corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),
}

/// API-related errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse API response: {0}")]
    ParseFailed(String),

    #[error("Unauthorized (401): Token may be expired")]
    Unauthorized,

    #[error("Forbidden (403): Insufficient permissions")]
    Forbidden,

    #[error("Request failed: HTTP {0}")]
    Status(u16),

    #[error("Session could not be restored: {0}")]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// Map a non-success HTTP status to its error variant.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            other => Self::Status(other),
        }
    }

    /// Returns true if this error ended the session.
    pub fn requires_sign_out(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::RefreshExhausted | AuthError::RefreshTimedOut)
        )
    }
}

impl AppError {
    /// Returns a user-friendly message for display in the UI.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Auth(AuthError::Rejected) => "Invalid username or password.",
            Self::Auth(AuthError::MissingCredentials) => "Enter a username and password.",
            Self::Auth(AuthError::Network(_)) => "Network error. Check your connection.",
            Self::Auth(AuthError::RefreshExhausted | AuthError::RefreshTimedOut) => {
                "Session expired. Please sign in again."
            }
            Self::Store(_) => "Failed to save credentials.",
            Self::Api(ApiError::Unauthorized) => "Authentication expired. Sign in again.",
            Self::Api(ApiError::Forbidden) => "Insufficient permissions for this operation.",
            Self::Api(ApiError::Network(_)) => "Network error. Check your connection.",
            Self::Api(ApiError::Auth(AuthError::RefreshCancelled)) => {
                "Request interrupted. Please try again."
            }
            Self::Api(ApiError::Auth(_)) => "Session expired. Please sign in again.",
            Self::Config(_) => "Configuration error. Please check settings.",
            _ => "An error occurred. Please try again.",
        }
    }

    /// Returns true if this error should trigger a sign-out.
    pub fn requires_sign_out(&self) -> bool {
        match self {
            Self::Auth(AuthError::RefreshExhausted | AuthError::RefreshTimedOut) => true,
            Self::Api(e) => e.requires_sign_out(),
            _ => false,
        }
    }
}
