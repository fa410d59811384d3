use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use classroom_core::{AuthError, Error};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a graceful shutdown may take before the server task is aborted
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Query parameters the provider appends to the redirect URI
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Interpret a redirect. `None` means the request carries no
    /// authorization response at all and should be ignored.
    pub fn outcome(&self, expected_state: &str) -> Option<Result<String, AuthError>> {
        if let Some(error) = &self.error {
            let reason = match &self.error_description {
                Some(desc) => format!("{}: {}", error, desc),
                None => error.clone(),
            };
            return Some(Err(AuthError::ProviderDenied(reason)));
        }

        if self.code.is_none() && self.state.is_none() {
            return None;
        }

        if self.state.as_deref() != Some(expected_state) {
            return Some(Err(AuthError::ProviderDenied("state mismatch".to_string())));
        }

        Some(match self.code.as_deref() {
            Some(code) if !code.is_empty() => Ok(code.to_string()),
            _ => Err(AuthError::ProviderDenied(
                "no authorization code in redirect".to_string(),
            )),
        })
    }
}

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<Result<String, AuthError>>>>>;

#[derive(Clone)]
struct ListenerState {
    expected_state: Arc<str>,
    sender: CallbackSender,
}

async fn handle_callback(
    State(state): State<ListenerState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    let Some(outcome) = params.outcome(&state.expected_state) else {
        return (
            StatusCode::BAD_REQUEST,
            Html("<p>Waiting for an authorization response.</p>"),
        );
    };

    let accepted = outcome.is_ok();
    match state.sender.lock().await.take() {
        Some(tx) => {
            info!(accepted, "authorization callback received");
            let _ = tx.send(outcome);
        }
        None => debug!("duplicate authorization callback ignored"),
    }

    if accepted {
        (
            StatusCode::OK,
            Html("<h3>Authorization complete.</h3><p>You can close this window.</p>"),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Html("<h3>Authorization failed.</h3><p>Return to the terminal for details.</p>"),
        )
    }
}

/// One-shot HTTP listener on 127.0.0.1 receiving the OAuth redirect.
///
/// The listener is bound to an ephemeral port and released by
/// [`CallbackListener::shutdown`], or aborted on drop as a backstop.
pub struct CallbackListener {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Bind and start serving. The receiver yields the first authorization
    /// response: the code, or the reason it was refused.
    pub async fn bind(
        expected_state: &str,
    ) -> Result<(Self, oneshot::Receiver<Result<String, AuthError>>), Error> {
        Self::bind_to(SocketAddr::from(([127, 0, 0, 1], 0)), expected_state).await
    }

    pub async fn bind_to(
        addr: SocketAddr,
        expected_state: &str,
    ) -> Result<(Self, oneshot::Receiver<Result<String, AuthError>>), Error> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let (callback_tx, callback_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route("/", get(handle_callback))
            .with_state(ListenerState {
                expected_state: Arc::from(expected_state),
                sender: Arc::new(Mutex::new(Some(callback_tx))),
            });

        info!(port = addr.port(), "starting authorization callback listener");

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                    debug!("callback listener shutting down");
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "callback listener stopped with error");
            }
        });

        Ok((
            Self {
                addr,
                shutdown_tx: Some(shutdown_tx),
                task: Some(task),
            },
            callback_rx,
        ))
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.addr.port())
    }

    /// Stop serving and wait until the port is released.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                debug!("graceful shutdown timed out, aborting listener");
                task.abort();
                let _ = task.await;
            }
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
