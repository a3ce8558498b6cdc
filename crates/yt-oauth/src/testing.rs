use axum::{Form, Json, Router, extract::State, http::StatusCode, routing::post};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::browser::Browser;
use crate::{AuthError, Result};

type FormLog = Arc<Mutex<Vec<HashMap<String, String>>>>;

/// In-process token endpoint answering every request with a fixed response
pub struct MockTokenEndpoint {
    token_uri: String,
    requests: FormLog,
    server: JoinHandle<()>,
}

impl MockTokenEndpoint {
    pub async fn start(status: u16, body: serde_json::Value) -> Self {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("bind mock token endpoint");
        let port = listener.local_addr().expect("local addr").port();

        let requests: FormLog = Arc::default();
        let status = StatusCode::from_u16(status).expect("valid status");
        let app = Router::new()
            .route(
                "/token",
                post(
                    move |State(log): State<FormLog>, Form(form): Form<HashMap<String, String>>| {
                        let body = body.clone();
                        async move {
                            log.lock().expect("request log").push(form);
                            (status, Json(body))
                        }
                    },
                ),
            )
            .with_state(requests.clone());

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            token_uri: format!("http://127.0.0.1:{}/token", port),
            requests,
            server,
        }
    }

    /// Form bodies received so far
    pub fn requests(&self) -> Vec<HashMap<String, String>> {
        self.requests.lock().expect("request log").clone()
    }

    /// Client secret document pointing at this endpoint
    pub fn client_secret_json(&self) -> String {
        client_secret_json(&self.token_uri)
    }
}

impl Drop for MockTokenEndpoint {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Installed-app client secret document with the given token endpoint
pub fn client_secret_json(token_uri: &str) -> String {
    serde_json::json!({
        "installed": {
            "client_id": "test-client.apps.googleusercontent.com",
            "client_secret": "test-secret",
            "auth_uri": "https://accounts.example.com/o/oauth2/auth",
            "token_uri": token_uri,
            "redirect_uris": ["http://localhost"]
        }
    })
    .to_string()
}

/// What the fake user does on the consent page
#[derive(Debug, Clone)]
pub enum Consent {
    /// Approve and redirect back with this code
    Grant(String),
    /// Deny and redirect back with this error
    Deny(String),
    /// Redirect back with a code but a forged state
    ForgeState(String),
}

/// Browser that immediately follows the redirect like a consenting user
pub struct RedirectingBrowser {
    consent: Consent,
    opened: Mutex<Vec<String>>,
}

impl RedirectingBrowser {
    pub fn new(consent: Consent) -> Self {
        Self {
            consent,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn granting(code: &str) -> Self {
        Self::new(Consent::Grant(code.to_string()))
    }

    /// URLs passed to [`Browser::open`]
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("opened log").clone()
    }
}

impl Browser for RedirectingBrowser {
    fn open(&self, url: &str) -> Result<()> {
        self.opened.lock().expect("opened log").push(url.to_string());

        let url = reqwest::Url::parse(url).map_err(|e| AuthError::Browser(e.to_string()))?;
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default()
        };
        let state = param("state");
        let mut redirect = reqwest::Url::parse(&param("redirect_uri"))
            .map_err(|e| AuthError::Browser(e.to_string()))?;
        redirect
            .set_host(Some("127.0.0.1"))
            .map_err(|e| AuthError::Browser(e.to_string()))?;

        {
            let mut query = redirect.query_pairs_mut();
            match &self.consent {
                Consent::Grant(code) => query.append_pair("code", code).append_pair("state", &state),
                Consent::Deny(error) => query.append_pair("error", error).append_pair("state", &state),
                Consent::ForgeState(code) => query
                    .append_pair("code", code)
                    .append_pair("state", "forged"),
            };
        }

        tokio::spawn(async move {
            if let Err(e) = reqwest::get(redirect).await {
                tracing::warn!(error = %e, "redirect request failed");
            }
        });
        Ok(())
    }
}

/// Browser that cannot be launched
pub struct BrokenBrowser;

impl Browser for BrokenBrowser {
    fn open(&self, _url: &str) -> Result<()> {
        Err(AuthError::Browser("no display".to_string()))
    }
}
