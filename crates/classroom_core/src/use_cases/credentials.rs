use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entities::{AuthStatus, Credential};
use crate::error::{Error, TokenError};
use crate::ports::{AccessTokenSource, Authorizer, OAuthProvider, TokenStore};

/// Owns the lifecycle of the saved credential:
/// - Interactive authorization and first persist
/// - Expiry checks with refresh and write-back
/// - Logout and status reporting
///
/// Refreshes are serialized, so concurrent callers holding an expired
/// credential trigger a single refresh.
pub struct CredentialManager<S, P>
where
    S: TokenStore,
    P: OAuthProvider,
{
    store: Arc<S>,
    provider: Arc<P>,
    current: Mutex<Option<Credential>>,
}

impl<S, P> CredentialManager<S, P>
where
    S: TokenStore,
    P: OAuthProvider,
{
    pub fn new(store: Arc<S>, provider: Arc<P>) -> Self {
        Self {
            store,
            provider,
            current: Mutex::new(None),
        }
    }

    /// Run the interactive flow, exchange the code, and save the result.
    pub async fn authorize<A>(&self, authorizer: &A) -> Result<Credential, Error>
    where
        A: Authorizer + ?Sized,
    {
        let code = authorizer.authorize().await?;
        let grant = self.provider.exchange_code(&code).await?;
        let credential = Credential::from_grant(grant, Utc::now());

        if !credential.can_refresh() {
            warn!("provider issued no refresh token; re-login will be needed after expiry");
        }

        self.persist(&credential).await?;
        info!(expiry = %credential.expiry, "authorization complete");
        Ok(credential)
    }

    pub async fn load(&self) -> Result<Credential, Error> {
        let credential = self.store.load().await?;
        *self.current.lock().await = Some(credential.clone());
        Ok(credential)
    }

    /// Return a non-expired credential, refreshing and saving it when needed.
    pub async fn ensure_valid(&self) -> Result<Credential, Error> {
        let mut current = self.current.lock().await;

        let credential = match current.take() {
            Some(credential) => credential,
            None => self.store.load().await?,
        };

        if !credential.is_expired() {
            *current = Some(credential.clone());
            return Ok(credential);
        }

        if !credential.can_refresh() {
            return Err(TokenError::ExpiredNoRefresh.into());
        }

        debug!(expiry = %credential.expiry, "access token expired, refreshing");
        match self.provider.refresh(&credential).await {
            Ok(grant) => {
                let refreshed = credential.refreshed(grant, Utc::now());
                self.store.persist(&refreshed).await?;
                info!(expiry = %refreshed.expiry, "access token refreshed");
                *current = Some(refreshed.clone());
                Ok(refreshed)
            }
            Err(Error::Token(TokenError::RefreshFailed(reason))) => {
                warn!(%reason, "refresh token rejected, removing saved credential");
                if let Err(e) = self.store.delete().await {
                    warn!(error = %e, "failed to remove rejected credential");
                }
                Err(TokenError::RefreshFailed(reason).into())
            }
            Err(Error::Network(reason)) => {
                warn!(%reason, "refresh failed in transit, keeping saved credential");
                *current = Some(credential);
                Err(Error::Network(reason))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn persist(&self, credential: &Credential) -> Result<(), Error> {
        self.store.persist(credential).await?;
        *self.current.lock().await = Some(credential.clone());
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), Error> {
        let mut current = self.current.lock().await;
        self.store.delete().await?;
        *current = None;
        info!("saved credential removed");
        Ok(())
    }

    /// Describe the saved credential without refreshing it.
    pub async fn status(&self) -> Result<AuthStatus, Error> {
        let credential = match self.store.load().await {
            Ok(credential) => credential,
            Err(Error::Token(TokenError::NotFound)) => return Ok(AuthStatus::NotLoggedIn),
            Err(Error::Token(TokenError::Corrupt(reason))) => {
                return Ok(AuthStatus::Corrupt(reason))
            }
            Err(e) => return Err(e),
        };

        let expiry = credential.expiry;
        Ok(if !credential.is_expired() {
            AuthStatus::Valid { expiry }
        } else if credential.can_refresh() {
            AuthStatus::ExpiredRefreshable { expiry }
        } else {
            AuthStatus::Expired { expiry }
        })
    }
}

#[async_trait]
impl<S, P> AccessTokenSource for CredentialManager<S, P>
where
    S: TokenStore,
    P: OAuthProvider,
{
    async fn access_token(&self) -> Result<String, Error> {
        self.ensure_valid().await.map(|c| c.access_token)
    }
}
