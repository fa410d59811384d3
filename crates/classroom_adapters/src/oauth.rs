use async_trait::async_trait;
use classroom_core::config::AuthSettings;
use classroom_core::entities::{AuthorizationCode, Credential, TokenGrant};
use classroom_core::ports::OAuthProvider;
use classroom_core::{AuthError, Error, TokenError};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::network::build_oauth_client;

/// Error body returned by the token endpoint
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenErrorBody {
    fn describe(&self) -> String {
        match &self.error_description {
            Some(desc) if !desc.is_empty() => format!("{}: {}", self.error, desc),
            _ => self.error.clone(),
        }
    }
}

/// OAuth 2.0 authorization-code client for Google accounts
pub struct GoogleOAuthProvider {
    client: Client,
    client_id: String,
    client_secret: Option<String>,
    auth_url: Url,
    token_url: String,
    scopes: Vec<String>,
}

impl GoogleOAuthProvider {
    pub fn new(settings: &AuthSettings) -> Result<Self, Error> {
        let client_id = settings.resolved_client_id().ok_or_else(|| {
            Error::Config(
                "no OAuth client id configured; set auth.client_id or GC_CLI__AUTH__CLIENT_ID"
                    .to_string(),
            )
        })?;
        let auth_url = Url::parse(&settings.auth_url)
            .map_err(|e| Error::Config(format!("invalid auth_url: {}", e)))?;

        Ok(Self {
            client: build_oauth_client()?,
            client_id,
            client_secret: settings.resolved_client_secret(),
            auth_url,
            token_url: settings.token_url.clone(),
            scopes: settings.scopes.clone(),
        })
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<Response, Error> {
        let mut params: Vec<(&str, &str)> = form.to_vec();
        params.push(("client_id", self.client_id.as_str()));
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        self.client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Network(format!("token request failed: {}", e)))
    }
}

async fn read_grant(response: Response) -> Result<TokenGrant, Error> {
    response
        .json::<TokenGrant>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("malformed token response: {}", e)))
}

async fn read_error(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<TokenErrorBody>(&body)
        .map(|e| e.describe())
        .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()))
}

#[async_trait]
impl OAuthProvider for GoogleOAuthProvider {
    fn authorization_url(&self, state: &str, redirect_uri: &str) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        url.to_string()
    }

    #[instrument(skip(self, code), fields(redirect_uri = %code.redirect_uri))]
    async fn exchange_code(&self, code: &AuthorizationCode) -> Result<TokenGrant, Error> {
        let response = self
            .post_form(&[
                ("grant_type", "authorization_code"),
                ("code", code.code.as_str()),
                ("redirect_uri", code.redirect_uri.as_str()),
            ])
            .await
            .map_err(|e| match e {
                Error::Network(msg) => Error::Auth(AuthError::NetworkError(msg)),
                other => other,
            })?;

        if !response.status().is_success() {
            let reason = read_error(response).await;
            warn!(%reason, "authorization code rejected");
            return Err(AuthError::ProviderDenied(reason).into());
        }

        let grant = read_grant(response).await?;
        info!("authorization code exchanged");
        Ok(grant)
    }

    #[instrument(skip(self, credential))]
    async fn refresh(&self, credential: &Credential) -> Result<TokenGrant, Error> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(Error::Token(TokenError::ExpiredNoRefresh))?;

        let response = self
            .post_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Error::Network(format!(
                "token endpoint unavailable (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let reason = read_error(response).await;
            return Err(TokenError::RefreshFailed(reason).into());
        }

        debug!("refresh grant received");
        read_grant(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GoogleOAuthProvider {
        let settings = AuthSettings {
            client_id: Some("client-123".to_string()),
            client_secret: Some("shh".to_string()),
            token_url: format!("{}/token", server.uri()),
            ..AuthSettings::default()
        };
        GoogleOAuthProvider::new(&settings).unwrap()
    }

    fn expired_credential() -> Credential {
        Credential {
            access_token: "old".to_string(),
            refresh_token: Some("refresh-abc".to_string()),
            expiry: Utc::now() - Duration::minutes(5),
            token_type: "Bearer".to_string(),
            scopes: vec!["scope.a".to_string()],
        }
    }

    #[test]
    fn test_missing_client_id_is_config_error() {
        let settings = AuthSettings {
            client_id: None,
            ..AuthSettings::default()
        };
        if option_env!("GC_CLI_CLIENT_ID").is_none() {
            assert!(matches!(
                GoogleOAuthProvider::new(&settings),
                Err(Error::Config(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_authorization_url_parameters() {
        let server = MockServer::start().await;
        let url = provider(&server).authorization_url("st4te", "http://127.0.0.1:5555/");
        let parsed = Url::parse(&url).unwrap();
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["state"], "st4te");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:5555/");
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["response_type"], "code");
        assert!(pairs["scope"].contains("classroom.courses.readonly"));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.new",
                "refresh_token": "1//new",
                "expires_in": 3599,
                "token_type": "Bearer",
                "scope": "scope.a scope.b"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = provider(&server)
            .exchange_code(&AuthorizationCode {
                code: "the-code".to_string(),
                redirect_uri: "http://127.0.0.1:5555/".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(grant.access_token, "ya29.new");
        assert_eq!(grant.refresh_token.as_deref(), Some("1//new"));
        assert_eq!(grant.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_exchange_rejected_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .exchange_code(&AuthorizationCode {
                code: "stale".to_string(),
                redirect_uri: "http://127.0.0.1:5555/".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Auth(AuthError::ProviderDenied(ref reason)) if reason.starts_with("invalid_grant")
        ));
    }

    #[tokio::test]
    async fn test_refresh_round_trip_keeps_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let old = expired_credential();
        let grant = provider(&server).refresh(&old).await.unwrap();
        let refreshed = old.refreshed(grant, Utc::now());

        assert_eq!(refreshed.access_token, "ya29.refreshed");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-abc"));
        assert!(!refreshed.is_expired());
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .refresh(&expired_credential())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Token(TokenError::RefreshFailed(ref reason)) if reason == "invalid_grant"
        ));
    }

    #[tokio::test]
    async fn test_refresh_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider(&server)
            .refresh(&expired_credential())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network(_)));
    }
}
