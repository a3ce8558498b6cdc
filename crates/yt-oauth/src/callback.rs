use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use crate::{AuthError, Result};

const SUCCESS_HTML: &str = "<html><head><title>Authorization Successful</title></head><body>\
    <h1>Authorization Successful!</h1>\
    <p>The authentication flow has completed. You may close this window.</p></body></html>";

const FAILURE_HTML: &str = "<html><head><title>Authorization Failed</title></head><body>\
    <h1>Authorization Failed</h1>\
    <p>Return to the terminal for details. You may close this window.</p></body></html>";

const ALREADY_HANDLED_HTML: &str = "<html><body>\
    <p>This authorization request has already been handled. You may close this window.</p>\
    </body></html>";

/// How long to let the browser's response drain after the code arrives
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

struct CallbackState {
    tx: Mutex<Option<oneshot::Sender<Result<String>>>>,
    expected_state: String,
}

/// Local HTTP listener that lives for exactly one authorization attempt.
///
/// The first request to `/` resolves [`CallbackListener::wait`]. Dropping the
/// listener before that stops the server task.
pub struct CallbackListener {
    port: u16,
    rx: oneshot::Receiver<Result<String>>,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind on `127.0.0.1:port` (`0` lets the OS pick) and start serving.
    pub async fn bind(port: u16, expected_state: impl Into<String>) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| {
                AuthError::CallbackServer(format!("Failed to bind to 127.0.0.1:{}: {}", port, e))
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::CallbackServer(format!("Failed to get local address: {}", e)))?
            .port();

        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(CallbackState {
            tx: Mutex::new(Some(tx)),
            expected_state: expected_state.into(),
        });
        let app = Router::new()
            .route("/", get(handle_callback))
            .with_state(state);

        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                })
                .await;
            if let Err(e) = result {
                tracing::warn!(error = %e, "callback server stopped with error");
            }
        });

        tracing::debug!(port, "callback listener bound");

        Ok(Self {
            port,
            rx,
            shutdown: Some(shutdown_tx),
            server,
        })
    }

    /// Port the listener is bound to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Redirect URI to register with the authorization request
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Wait for the redirect and return the authorization code.
    pub async fn wait(mut self) -> Result<String> {
        let result = match (&mut self.rx).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::CallbackServer(
                "Server shut down unexpectedly".to_string(),
            )),
        };

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.server)
            .await
            .is_err()
        {
            tracing::debug!("callback server did not drain in time");
        }

        result
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackQuery>,
) -> Html<&'static str> {
    let Some(tx) = state.tx.lock().await.take() else {
        return Html(ALREADY_HANDLED_HTML);
    };

    let outcome = check_callback(params, &state.expected_state);
    let page = if outcome.is_ok() {
        SUCCESS_HTML
    } else {
        FAILURE_HTML
    };
    let _ = tx.send(outcome);
    Html(page)
}

fn check_callback(params: CallbackQuery, expected_state: &str) -> Result<String> {
    if let Some(error) = params.error {
        return Err(AuthError::AuthorizationDenied {
            error,
            description: params.error_description,
        });
    }

    if params.state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }

    match params.code {
        Some(code) if !code.is_empty() => Ok(code),
        _ => Err(AuthError::MissingCode),
    }
}
