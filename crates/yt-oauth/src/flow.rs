use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use crate::browser::Browser;
use crate::callback::CallbackListener;
use crate::client_secret::ClientSecret;
use crate::pkce::{Pkce, generate_pkce, generate_state};
use crate::token::{Credentials, TokenErrorResponse, TokenResponse, parse_scopes};
use crate::{AuthError, Result};

/// Where a flow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Browser launched, waiting for the redirect
    AwaitingConsent,
    /// Authorization code received, talking to the token endpoint
    Exchanging,
    /// Credentials obtained
    Done,
    /// Terminal failure
    Failed,
}

/// Options for one run of the installed-app flow
#[derive(Debug, Clone, Default)]
pub struct FlowOptions {
    /// Local callback port, `0` for an OS-assigned one
    pub port: u16,
    /// Give up waiting for consent after this long
    pub timeout: Option<Duration>,
}

/// Authorization request that has been prepared but not yet answered
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// The URL the user should visit to authorize the application
    pub url: String,
    /// Redirect target registered with the request
    pub redirect_uri: String,
    /// CSRF state token
    pub state: String,
    pkce: Pkce,
}

/// Installed-application authorization code flow for one client and scope set
pub struct InstalledFlow {
    secret: ClientSecret,
    scopes: BTreeSet<String>,
    http: reqwest::Client,
    state: FlowState,
}

impl InstalledFlow {
    /// Create a flow requesting exactly `scopes`
    pub fn new(secret: ClientSecret, scopes: &[&str]) -> Self {
        Self {
            secret,
            scopes: scopes.iter().flat_map(|s| parse_scopes(s)).collect(),
            http: reqwest::Client::new(),
            state: FlowState::AwaitingConsent,
        }
    }

    /// Current state of the flow
    pub fn state(&self) -> FlowState {
        self.state
    }

    fn scope_param(&self) -> String {
        self.scopes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn build_request(
        &self,
        redirect_uri: &str,
        state: String,
        pkce: Pkce,
    ) -> AuthorizationRequest {
        let separator = if self.secret.auth_uri.contains('?') {
            '&'
        } else {
            '?'
        };
        let url = format!(
            "{}{}\
            response_type=code&\
            client_id={}&\
            redirect_uri={}&\
            scope={}&\
            state={}&\
            code_challenge={}&\
            code_challenge_method=S256&\
            access_type=offline",
            self.secret.auth_uri,
            separator,
            urlencoding::encode(&self.secret.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.scope_param()),
            urlencoding::encode(&state),
            urlencoding::encode(&pkce.challenge),
        );

        AuthorizationRequest {
            url,
            redirect_uri: redirect_uri.to_string(),
            state,
            pkce,
        }
    }

    /// Run the whole flow: listen, open the browser, wait, exchange.
    ///
    /// `on_prompt` receives the consent URL before the browser is opened so
    /// the caller can show it for manual use. A browser that fails to open is
    /// only logged. `cancel` resolving while waiting for consent ends the run
    /// with [`AuthError::Cancelled`].
    pub async fn run<B, F, C>(
        &mut self,
        browser: &B,
        options: &FlowOptions,
        on_prompt: F,
        cancel: C,
    ) -> Result<Credentials>
    where
        B: Browser + ?Sized,
        F: FnOnce(&str),
        C: Future<Output = ()>,
    {
        let result = self.run_inner(browser, options, on_prompt, cancel).await;
        self.state = match result {
            Ok(_) => FlowState::Done,
            Err(_) => FlowState::Failed,
        };
        result
    }

    async fn run_inner<B, F, C>(
        &mut self,
        browser: &B,
        options: &FlowOptions,
        on_prompt: F,
        cancel: C,
    ) -> Result<Credentials>
    where
        B: Browser + ?Sized,
        F: FnOnce(&str),
        C: Future<Output = ()>,
    {
        self.state = FlowState::AwaitingConsent;

        // The listener validates the state, so it is generated up front
        let state = generate_state();
        let listener = CallbackListener::bind(options.port, state.clone()).await?;
        let request = self.build_request(&listener.redirect_uri(), state, generate_pkce());

        on_prompt(&request.url);
        if let Err(e) = browser.open(&request.url) {
            tracing::warn!(error = %e, "could not open browser, continuing with manual URL");
        }

        tracing::info!(port = listener.port(), "waiting for authorization callback");
        let consent = async {
            match options.timeout {
                Some(limit) => tokio::time::timeout(limit, listener.wait())
                    .await
                    .unwrap_or_else(|_| Err(AuthError::Timeout(limit))),
                None => listener.wait().await,
            }
        };
        let code = tokio::select! {
            code = consent => code?,
            _ = cancel => return Err(AuthError::Cancelled),
        };

        self.state = FlowState::Exchanging;
        self.exchange_code(&code, &request).await
    }

    /// Exchange an authorization code for credentials
    pub async fn exchange_code(
        &self,
        code: &str,
        request: &AuthorizationRequest,
    ) -> Result<Credentials> {
        tracing::info!("exchanging authorization code for tokens");

        let params = [
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("code", code),
            ("code_verifier", request.pkce.verifier.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", request.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(e) => AuthError::TokenEndpoint {
                    status: status.as_u16(),
                    error: e.error,
                    description: e.error_description,
                },
                Err(_) => AuthError::TokenEndpoint {
                    status: status.as_u16(),
                    error: body,
                    description: None,
                },
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))?;
        let credentials = Credentials::from_response(token, &self.scopes)?;

        tracing::info!(
            has_refresh_token = credentials.refresh_token.is_some(),
            "obtained OAuth tokens"
        );
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::YOUTUBE_READONLY_SCOPE;
    use crate::browser::NoBrowser;
    use crate::testing::{BrokenBrowser, Consent, MockTokenEndpoint, RedirectingBrowser};
    use serde_json::json;
    use std::future::pending;

    fn flow_for(endpoint: &MockTokenEndpoint) -> InstalledFlow {
        let secret = ClientSecret::from_json(&endpoint.client_secret_json()).unwrap();
        InstalledFlow::new(secret, &[YOUTUBE_READONLY_SCOPE])
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        reqwest::Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    fn granted() -> serde_json::Value {
        json!({
            "access_token": "ya29.access",
            "refresh_token": "1//refresh",
            "expires_in": 3599,
            "scope": YOUTUBE_READONLY_SCOPE,
            "token_type": "Bearer"
        })
    }

    #[tokio::test]
    async fn consent_url_requests_only_readonly_scope() {
        let endpoint = MockTokenEndpoint::start(200, granted()).await;
        let mut flow = flow_for(&endpoint);
        let browser = RedirectingBrowser::granting("4/code");

        flow.run(&browser, &FlowOptions::default(), |_| {}, pending())
            .await
            .unwrap();

        let opened = browser.opened();
        assert_eq!(opened.len(), 1);
        let url = &opened[0];
        assert!(url.starts_with("https://accounts.example.com/o/oauth2/auth?"));
        assert_eq!(query_param(url, "scope").as_deref(), Some(YOUTUBE_READONLY_SCOPE));
        assert_eq!(
            query_param(url, "client_id").as_deref(),
            Some("test-client.apps.googleusercontent.com")
        );
        assert_eq!(query_param(url, "access_type").as_deref(), Some("offline"));
        assert_eq!(query_param(url, "response_type").as_deref(), Some("code"));
        assert_eq!(query_param(url, "code_challenge_method").as_deref(), Some("S256"));
        assert!(query_param(url, "state").is_some_and(|s| !s.is_empty()));

        // The exchange must use the same redirect target the consent page saw
        let redirect_uri = query_param(url, "redirect_uri").unwrap();
        assert!(redirect_uri.starts_with("http://127.0.0.1:"));
        assert_eq!(endpoint.requests()[0]["redirect_uri"], redirect_uri);
    }

    #[tokio::test]
    async fn each_run_gets_fresh_state_and_challenge() {
        let endpoint = MockTokenEndpoint::start(200, granted()).await;
        let mut flow = flow_for(&endpoint);
        let first = RedirectingBrowser::granting("4/one");
        let second = RedirectingBrowser::granting("4/two");

        flow.run(&first, &FlowOptions::default(), |_| {}, pending())
            .await
            .unwrap();
        flow.run(&second, &FlowOptions::default(), |_| {}, pending())
            .await
            .unwrap();

        let (first, second) = (&first.opened()[0], &second.opened()[0]);
        assert_ne!(query_param(first, "state"), query_param(second, "state"));
        assert_ne!(
            query_param(first, "code_challenge"),
            query_param(second, "code_challenge")
        );
    }

    #[tokio::test]
    async fn run_exchanges_code_for_credentials() {
        let endpoint = MockTokenEndpoint::start(200, granted()).await;
        let mut flow = flow_for(&endpoint);
        let browser = RedirectingBrowser::granting("4/code");

        let mut prompted = None;
        let creds = flow
            .run(
                &browser,
                &FlowOptions::default(),
                |url| prompted = Some(url.to_string()),
                pending(),
            )
            .await
            .unwrap();

        assert_eq!(creds.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(flow.state(), FlowState::Done);
        assert_eq!(prompted, browser.opened().first().cloned());

        let requests = endpoint.requests();
        assert_eq!(requests.len(), 1);
        let form = &requests[0];
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "4/code");
        assert_eq!(form["client_secret"], "test-secret");
        assert!(form["redirect_uri"].starts_with("http://127.0.0.1:"));
        assert_eq!(form["code_verifier"].len(), 64);
    }

    #[tokio::test]
    async fn denied_consent_fails_without_exchange() {
        let endpoint = MockTokenEndpoint::start(200, granted()).await;
        let mut flow = flow_for(&endpoint);
        let browser = RedirectingBrowser::new(Consent::Deny("access_denied".to_string()));

        let err = flow
            .run(&browser, &FlowOptions::default(), |_| {}, pending())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::AuthorizationDenied { .. }));
        assert_eq!(flow.state(), FlowState::Failed);
        assert!(endpoint.requests().is_empty());
    }

    #[tokio::test]
    async fn forged_state_is_rejected() {
        let endpoint = MockTokenEndpoint::start(200, granted()).await;
        let mut flow = flow_for(&endpoint);
        let browser = RedirectingBrowser::new(Consent::ForgeState("4/code".to_string()));

        let err = flow
            .run(&browser, &FlowOptions::default(), |_| {}, pending())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch));
    }

    #[tokio::test]
    async fn provider_error_response_is_surfaced() {
        let endpoint = MockTokenEndpoint::start(
            400,
            json!({"error": "invalid_grant", "error_description": "Bad Request"}),
        )
        .await;
        let mut flow = flow_for(&endpoint);
        let browser = RedirectingBrowser::granting("4/code");

        let err = flow
            .run(&browser, &FlowOptions::default(), |_| {}, pending())
            .await
            .unwrap_err();
        match err {
            AuthError::TokenEndpoint { status, error, .. } => {
                assert_eq!(status, 400);
                assert_eq!(error, "invalid_grant");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn times_out_when_no_callback_arrives() {
        let endpoint = MockTokenEndpoint::start(200, granted()).await;
        let mut flow = flow_for(&endpoint);
        let options = FlowOptions {
            port: 0,
            timeout: Some(Duration::from_millis(200)),
        };

        let err = flow
            .run(&NoBrowser, &options, |_| {}, pending())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Timeout(_)));
        assert_eq!(
            err.to_string(),
            "Timed out after 200ms waiting for authorization"
        );
        assert_eq!(flow.state(), FlowState::Failed);
    }

    #[tokio::test]
    async fn cancelled_run_ends_failed() {
        let endpoint = MockTokenEndpoint::start(200, granted()).await;
        let mut flow = flow_for(&endpoint);
        let cancel = tokio::time::sleep(Duration::from_millis(100));

        let err = flow
            .run(&NoBrowser, &FlowOptions::default(), |_| {}, cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Cancelled));
        assert_eq!(flow.state(), FlowState::Failed);
        assert!(endpoint.requests().is_empty());
    }

    #[tokio::test]
    async fn browser_failure_is_not_fatal() {
        let endpoint = MockTokenEndpoint::start(200, granted()).await;
        let mut flow = flow_for(&endpoint);
        let options = FlowOptions {
            port: 0,
            timeout: Some(Duration::from_millis(200)),
        };

        // The flow keeps waiting for a manual visit rather than failing on launch
        let err = flow
            .run(&BrokenBrowser, &options, |_| {}, pending())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Timeout(_)));
    }
}
