use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use classroom_core::entities::AuthorizationCode;
use classroom_core::ports::{Authorizer, OAuthProvider};
use classroom_core::{AuthError, Error};
use rand::RngCore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use url::Url;

use crate::callback_listener::{CallbackListener, CallbackParams};

/// Redirect target for the manual flow, where no listener answers
pub const MANUAL_REDIRECT_URI: &str = "http://localhost";

/// Terminal interaction needed by the authorization flow
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Show the consent URL to the user
    fn present_url(&self, url: &str);

    /// Ask the user to paste the URL their browser was redirected to
    async fn read_redirect_url(&self) -> Result<String, Error>;
}

/// Random, URL-safe anti-forgery token for the `state` parameter
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Extract the authorization code from a pasted redirect URL.
pub fn parse_redirect_url(input: &str, expected_state: &str) -> Result<String, AuthError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AuthError::UserCancelled);
    }

    let url = Url::parse(input)
        .map_err(|e| AuthError::ProviderDenied(format!("malformed redirect URL: {}", e)))?;

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "error_description" => params.error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    params.outcome(expected_state).unwrap_or_else(|| {
        Err(AuthError::ProviderDenied(
            "no authorization code in redirect".to_string(),
        ))
    })
}

/// Authorization-code flow through the system browser.
///
/// Prefers a loopback listener for the redirect; falls back to asking the
/// user to paste the redirect URL when no local port can be bound.
pub struct LoopbackAuthorizer<P, U>
where
    P: OAuthProvider,
    U: UserPrompt,
{
    provider: Arc<P>,
    prompt: Arc<U>,
    timeout: Duration,
    cancel: CancellationToken,
    open_browser: bool,
}

impl<P, U> LoopbackAuthorizer<P, U>
where
    P: OAuthProvider,
    U: UserPrompt,
{
    pub fn new(provider: Arc<P>, prompt: Arc<U>, timeout: Duration) -> Self {
        Self {
            provider,
            prompt,
            timeout,
            cancel: CancellationToken::new(),
            open_browser: true,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    fn present(&self, url: &str) {
        self.prompt.present_url(url);
        if self.open_browser {
            if let Err(e) = open::that(url) {
                warn!(error = %e, "could not open browser");
            }
        }
    }

    async fn via_loopback(
        &self,
        listener: CallbackListener,
        callback: tokio::sync::oneshot::Receiver<Result<String, AuthError>>,
        state: &str,
    ) -> Result<AuthorizationCode, Error> {
        let redirect_uri = listener.redirect_uri();
        self.present(&self.provider.authorization_url(state, &redirect_uri));

        let outcome = tokio::select! {
            received = callback => received
                .unwrap_or_else(|_| Err(AuthError::NetworkError("callback listener stopped".to_string()))),
            _ = self.cancel.cancelled() => Err(AuthError::UserCancelled),
            _ = tokio::time::sleep(self.timeout) => Err(AuthError::Timeout),
        };

        listener.shutdown().await;

        let code = outcome?;
        Ok(AuthorizationCode { code, redirect_uri })
    }

    async fn via_paste(&self, state: &str) -> Result<AuthorizationCode, Error> {
        self.present(&self.provider.authorization_url(state, MANUAL_REDIRECT_URI));

        let pasted = tokio::select! {
            input = self.prompt.read_redirect_url() => input?,
            _ = self.cancel.cancelled() => return Err(AuthError::UserCancelled.into()),
        };

        let code = parse_redirect_url(&pasted, state)?;
        Ok(AuthorizationCode {
            code,
            redirect_uri: MANUAL_REDIRECT_URI.to_string(),
        })
    }
}

#[async_trait]
impl<P, U> Authorizer for LoopbackAuthorizer<P, U>
where
    P: OAuthProvider,
    U: UserPrompt,
{
    #[instrument(skip(self))]
    async fn authorize(&self) -> Result<AuthorizationCode, Error> {
        let state = generate_state();

        match CallbackListener::bind(&state).await {
            Ok((listener, callback)) => self.via_loopback(listener, callback, &state).await,
            Err(e) => {
                info!(error = %e, "loopback listener unavailable, using manual flow");
                self.via_paste(&state).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classroom_core::entities::{Credential, TokenGrant};
    use std::sync::Mutex;

    struct StubProvider;

    #[async_trait]
    impl OAuthProvider for StubProvider {
        fn authorization_url(&self, state: &str, redirect_uri: &str) -> String {
            let mut url = Url::parse("https://accounts.test/auth").unwrap();
            url.query_pairs_mut()
                .append_pair("state", state)
                .append_pair("redirect_uri", redirect_uri);
            url.to_string()
        }

        async fn exchange_code(&self, _: &AuthorizationCode) -> Result<TokenGrant, Error> {
            Err(Error::Other("unused".into()))
        }

        async fn refresh(&self, _: &Credential) -> Result<TokenGrant, Error> {
            Err(Error::Other("unused".into()))
        }
    }

    /// Records the presented URL and, when told to, follows it like a browser.
    #[derive(Default)]
    struct ScriptedPrompt {
        presented: Mutex<Option<String>>,
        follow_with_code: Option<String>,
    }

    impl ScriptedPrompt {
        fn presented(&self) -> Url {
            Url::parse(self.presented.lock().unwrap().as_deref().unwrap()).unwrap()
        }
    }

    #[async_trait]
    impl UserPrompt for ScriptedPrompt {
        fn present_url(&self, url: &str) {
            *self.presented.lock().unwrap() = Some(url.to_string());

            if let Some(code) = self.follow_with_code.clone() {
                let consent = Url::parse(url).unwrap();
                let pairs: std::collections::HashMap<_, _> =
                    consent.query_pairs().into_owned().collect();
                let redirect = format!(
                    "{}?code={}&state={}",
                    pairs["redirect_uri"], code, pairs["state"]
                );
                tokio::spawn(async move {
                    let _ = reqwest::get(redirect).await;
                });
            }
        }

        async fn read_redirect_url(&self) -> Result<String, Error> {
            Ok(String::new())
        }
    }

    fn authorizer(
        prompt: Arc<ScriptedPrompt>,
        timeout: Duration,
    ) -> LoopbackAuthorizer<StubProvider, ScriptedPrompt> {
        LoopbackAuthorizer::new(Arc::new(StubProvider), prompt, timeout).open_browser(false)
    }

    fn redirect_port(prompt: &ScriptedPrompt) -> u16 {
        let pairs: std::collections::HashMap<_, _> =
            prompt.presented().query_pairs().into_owned().collect();
        Url::parse(&pairs["redirect_uri"]).unwrap().port().unwrap()
    }

    #[test]
    fn test_state_is_random_and_url_safe() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_parse_redirect_url() {
        assert_eq!(
            parse_redirect_url("http://localhost/?state=s&code=abc", "s"),
            Ok("abc".to_string())
        );
        assert_eq!(parse_redirect_url("   ", "s"), Err(AuthError::UserCancelled));
        assert!(matches!(
            parse_redirect_url("not a url", "s"),
            Err(AuthError::ProviderDenied(_))
        ));
        assert!(matches!(
            parse_redirect_url("http://localhost/?state=evil&code=abc", "s"),
            Err(AuthError::ProviderDenied(_))
        ));
        assert!(matches!(
            parse_redirect_url("http://localhost/", "s"),
            Err(AuthError::ProviderDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_loopback_flow_returns_code() {
        let prompt = Arc::new(ScriptedPrompt {
            follow_with_code: Some("granted".to_string()),
            ..ScriptedPrompt::default()
        });

        let code = authorizer(prompt.clone(), Duration::from_secs(10))
            .authorize()
            .await
            .unwrap();

        assert_eq!(code.code, "granted");
        assert!(code.redirect_uri.starts_with("http://127.0.0.1:"));
        assert_eq!(
            prompt.presented().query_pairs().find(|(k, _)| k == "redirect_uri").map(|(_, v)| v.into_owned()),
            Some(code.redirect_uri)
        );
    }

    #[tokio::test]
    async fn test_timeout_releases_port() {
        let prompt = Arc::new(ScriptedPrompt::default());

        let err = authorizer(prompt.clone(), Duration::from_millis(100))
            .authorize()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::Timeout)));
        let port = redirect_port(&prompt);
        assert!(tokio::net::TcpListener::bind(("127.0.0.1", port)).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancellation_releases_port() {
        let prompt = Arc::new(ScriptedPrompt::default());
        let cancel = CancellationToken::new();
        let authorizer = authorizer(prompt.clone(), Duration::from_secs(30))
            .with_cancellation(cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let err = authorizer.authorize().await.unwrap_err();
        trigger.await.unwrap();

        assert!(matches!(err, Error::Auth(AuthError::UserCancelled)));
        let port = redirect_port(&prompt);
        assert!(tokio::net::TcpListener::bind(("127.0.0.1", port)).await.is_ok());
    }

    #[tokio::test]
    async fn test_manual_flow_empty_input_cancels() {
        let prompt = Arc::new(ScriptedPrompt::default());
        let authorizer = authorizer(prompt, Duration::from_secs(1));

        let err = authorizer.via_paste("s").await.unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::UserCancelled)));
    }
}
