use std::sync::Arc;
use std::time::Duration;

use classroom_core::config::ApiSettings;
use classroom_core::ports::AccessTokenSource;
use classroom_core::{ApiError, Error};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use super::pages::Paginated;
use crate::network::build_api_client;

/// Backoff schedule shared by every request of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &ApiSettings) -> Self {
        Self {
            retries: settings.retries,
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
        }
    }

    /// Delay before retry number `retry` (zero-based): doubles each time, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&ApiSettings::default())
    }
}

/// Classified result of a single HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Retryable(ApiError),
    Terminal(ApiError),
}

/// One HTTP call within a logical operation
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub number: u32,
    /// Delay before the next attempt, when one follows
    pub backoff: Option<Duration>,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Best human-readable message from an error body
fn error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error)
        .or_else(|_| serde_json::from_str::<ErrorDetail>(body));

    match detail {
        Ok(detail) if !detail.message.is_empty() => detail.message,
        Ok(ErrorDetail {
            status: Some(s), ..
        }) => s,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unknown error")
            .to_string(),
    }
}

/// Map a status code and body to an attempt outcome.
pub fn classify(status: u16, body: &str) -> AttemptOutcome {
    match status {
        s if s < 400 => AttemptOutcome::Success,
        404 => AttemptOutcome::Terminal(ApiError::NotFound(error_message(status, body))),
        403 => AttemptOutcome::Terminal(ApiError::Forbidden(error_message(status, body))),
        429 => AttemptOutcome::Retryable(ApiError::RateLimited),
        s if s >= 500 => AttemptOutcome::Retryable(ApiError::ServerError(s)),
        s => AttemptOutcome::Terminal(ApiError::Generic {
            status: s,
            message: error_message(status, body),
        }),
    }
}

/// Authenticated client for the classroom REST API.
///
/// The token source is consulted before every attempt, so a refresh
/// performed elsewhere is picked up mid-operation.
pub struct ClassroomClient<T>
where
    T: AccessTokenSource + ?Sized,
{
    http: Client,
    base_url: Url,
    tokens: Arc<T>,
    policy: RetryPolicy,
    page_size: u32,
    cancel: CancellationToken,
}

impl<T> ClassroomClient<T>
where
    T: AccessTokenSource + ?Sized,
{
    pub fn new(settings: &ApiSettings, tokens: Arc<T>) -> Result<Self, Error> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| Error::Config(format!("invalid api base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "api base_url cannot be a base: {}",
                settings.base_url
            )));
        }

        Ok(Self {
            http: build_api_client(settings.request_timeout())?,
            base_url,
            tokens,
            policy: RetryPolicy::from_settings(settings),
            page_size: settings.page_size.max(1),
            cancel: CancellationToken::new(),
        })
    }

    /// Abort in-flight and future operations when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Base URL extended by the given path segments, each percent-encoded
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Execute one logical request with retry, returning the success body.
    #[instrument(skip_all, fields(%method, path = url.path()))]
    async fn execute(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<String, Error> {
        let mut number = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            number += 1;

            let token = self.tokens.access_token().await?;
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(token)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = tokio::select! {
                sent = request.send() => sent.map_err(|e| Error::Network(e.to_string()))?,
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            };
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

            let outcome = classify(status, &text);
            let retry = number - 1;
            let backoff = match &outcome {
                AttemptOutcome::Retryable(_) if retry < self.policy.retries => {
                    Some(self.policy.delay_for(retry))
                }
                _ => None,
            };
            let attempt = RequestAttempt {
                number,
                backoff,
                outcome,
            };
            debug!(?attempt, status, "request attempt finished");

            match (attempt.outcome, attempt.backoff) {
                (AttemptOutcome::Success, _) => return Ok(text),
                (AttemptOutcome::Terminal(err), _) => return Err(err.into()),
                (AttemptOutcome::Retryable(err), None) => {
                    warn!(attempts = number, error = %err, "retry budget exhausted");
                    return Err(err.into());
                }
                (AttemptOutcome::Retryable(err), Some(delay)) => {
                    warn!(
                        attempt = number,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying request"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                    }
                }
            }
        }
    }

    pub(crate) async fn get_json<R>(&self, url: Url, query: &[(&str, String)]) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        let text = self.execute(Method::GET, url, query, None).await?;
        parse_body(&text)
    }

    pub(crate) async fn patch_json<B, R>(
        &self,
        url: Url,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<R, Error>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_value(body)
            .map_err(|e| Error::Other(format!("failed to serialize request: {}", e)))?;
        let text = self.execute(Method::PATCH, url, query, Some(&body)).await?;
        parse_body(&text)
    }

    /// Fetch every page and concatenate the items in server order.
    ///
    /// Each page gets a fresh retry budget; any failing page fails the
    /// whole listing and nothing collected so far is returned.
    pub(crate) async fn list_all<P>(
        &self,
        url: Url,
        extra_query: &[(&str, String)],
    ) -> Result<Vec<P::Item>, Error>
    where
        P: Paginated,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let mut query: Vec<(&str, String)> = extra_query.to_vec();
            query.push(("pageSize", self.page_size.to_string()));
            if let Some(token) = &cursor {
                query.push(("pageToken", token.clone()));
            }

            let page: P = self.get_json(url.clone(), &query).await?;
            let (mut batch, next) = page.into_page();
            pages += 1;
            items.append(&mut batch);

            match next {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    return Err(Error::InvalidResponse(format!(
                        "server repeated page token after {} pages",
                        pages
                    )));
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(pages, items = items.len(), "listing complete");
        Ok(items)
    }
}

fn parse_body<R: DeserializeOwned>(text: &str) -> Result<R, Error> {
    // Some endpoints answer 204 or an empty body.
    let text = if text.trim().is_empty() { "{}" } else { text };
    serde_json::from_str(text).map_err(|e| Error::InvalidResponse(e.to_string()))
}
