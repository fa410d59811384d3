use std::fmt;

use thiserror::Error;

/// Failures of the interactive authorization flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    UserCancelled,
    ProviderDenied(String),
    Timeout,
    NetworkError(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserCancelled => write!(f, "authorization cancelled by user"),
            Self::ProviderDenied(reason) => write!(f, "authorization denied: {}", reason),
            Self::Timeout => write!(f, "timed out waiting for authorization"),
            Self::NetworkError(msg) => write!(f, "network error during authorization: {}", msg),
        }
    }
}

/// Failures around the persisted credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    NotFound,
    Corrupt(String),
    ExpiredNoRefresh,
    RefreshFailed(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no saved credential"),
            Self::Corrupt(msg) => write!(f, "saved credential is unreadable: {}", msg),
            Self::ExpiredNoRefresh => write!(f, "credential expired and cannot be refreshed"),
            Self::RefreshFailed(msg) => write!(f, "credential refresh failed: {}", msg),
        }
    }
}

/// Classified outcome of a failed remote API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    NotFound(String),
    Forbidden(String),
    RateLimited,
    ServerError(u16),
    Generic { status: u16, message: String },
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::RateLimited => 429,
            Self::ServerError(status) => *status,
            Self::Generic { status, .. } => *status,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not found: {}", msg),
            Self::Forbidden(msg) => write!(f, "permission denied: {}", msg),
            Self::RateLimited => write!(f, "rate limited by the server"),
            Self::ServerError(status) => write!(f, "server error (HTTP {})", status),
            Self::Generic { status, message } => write!(f, "API error {}: {}", status, message),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Auth(AuthError),

    #[error("{0}")]
    Token(TokenError),

    #[error("{0}")]
    Api(ApiError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the only way forward is a fresh `auth login`.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Error::Token(_))
    }

    /// Only rate limiting and server-side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Api(ApiError::RateLimited) | Error::Api(ApiError::ServerError(_))
        )
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Auth(e)
    }
}

impl From<TokenError> for Error {
    fn from(e: TokenError) -> Self {
        Error::Token(e)
    }
}

impl From<ApiError> for Error {
    fn from(e: ApiError) -> Self {
        Error::Api(e)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
