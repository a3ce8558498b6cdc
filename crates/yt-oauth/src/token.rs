use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{AuthError, Result};

/// Credentials issued by the token endpoint for one authorization
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Access token for API requests
    pub access_token: String,
    /// Refresh token, absent when the provider chose not to reissue one
    pub refresh_token: Option<String>,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// Scopes granted by the user
    pub scopes: BTreeSet<String>,
    /// Expiry time as Unix timestamp (seconds since epoch)
    pub expires_at: u64,
}

/// Successful body of the token endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body of the token endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Split a space-delimited scope string into a set
pub fn parse_scopes(scope: &str) -> BTreeSet<String> {
    scope.split_whitespace().map(str::to_string).collect()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl Credentials {
    /// Build credentials from a token response, checking the granted scopes.
    ///
    /// A response without a `scope` field is taken to grant exactly what was
    /// requested. Any other difference fails the exchange.
    pub(crate) fn from_response(
        response: TokenResponse,
        requested: &BTreeSet<String>,
    ) -> Result<Self> {
        if response.access_token.is_empty() {
            return Err(AuthError::InvalidTokenResponse(
                "access_token is empty".to_string(),
            ));
        }

        let scopes = match response.scope.as_deref() {
            Some(granted) => {
                let granted = parse_scopes(granted);
                if &granted != requested {
                    return Err(AuthError::ScopeChanged {
                        requested: join(requested),
                        granted: join(&granted),
                    });
                }
                granted
            }
            None => requested.clone(),
        };

        Ok(Credentials {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scopes,
            expires_at: now_secs() + response.expires_in.unwrap_or(3600),
        })
    }
}

fn join(scopes: &BTreeSet<String>) -> String {
    scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}
