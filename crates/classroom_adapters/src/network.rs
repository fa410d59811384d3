//! Shared HTTP client configuration for network operations.
//!
//! Provides factory functions for creating HTTP clients with the timeouts
//! and user agent used against the classroom and OAuth endpoints.

use std::time::Duration;

use classroom_core::Error;
use reqwest::Client;

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const USER_AGENT: &str = concat!("gc-cli/", env!("CARGO_PKG_VERSION"));

/// Build a configured HTTP client for classroom API requests.
pub fn build_api_client(timeout: Duration) -> Result<Client, Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| Error::Network(format!("failed to create API HTTP client: {}", e)))
}

/// Build a configured HTTP client for token endpoint requests.
///
/// Redirects are not followed: the token endpoint answers directly.
pub fn build_oauth_client() -> Result<Client, Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| Error::Network(format!("failed to create OAuth HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_api_client() {
        let client = build_api_client(Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_oauth_client() {
        let client = build_oauth_client();
        assert!(client.is_ok());
    }

    #[test]
    fn test_timeout_constants() {
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(30));
        assert_eq!(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs(10));
    }
}
