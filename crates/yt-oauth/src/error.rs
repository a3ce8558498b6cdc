use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while obtaining YouTube credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The client secret file does not exist.
    #[error("Client secret file '{}' not found", .path.display())]
    ClientSecretNotFound { path: PathBuf },

    /// The client secret file exists but could not be read.
    #[error("Failed to read client secret file '{}': {source}", .path.display())]
    ClientSecretRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The client secret file is not a valid OAuth client descriptor.
    #[error("Invalid client secret file: {0}")]
    InvalidClientSecret(String),

    /// The local callback listener could not be started.
    #[error("Callback server error: {0}")]
    CallbackServer(String),

    /// The system browser could not be launched.
    #[error("Failed to open browser: {0}")]
    Browser(String),

    /// The provider redirected back with an error instead of a code.
    #[error("Authorization denied: {error}{}", detail(.description))]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    /// The `state` echoed by the provider does not match the one we sent.
    #[error("State mismatch in authorization callback - possible CSRF attack")]
    StateMismatch,

    /// The callback carried neither a code nor an error.
    #[error("No authorization code received in callback")]
    MissingCode,

    /// Network error while talking to the token endpoint.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The token endpoint answered with an error status.
    #[error("Token endpoint returned {status}: {error}{}", detail(.description))]
    TokenEndpoint {
        status: u16,
        error: String,
        description: Option<String>,
    },

    /// The token endpoint answered with a body we could not understand.
    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// The provider granted a different scope set than the one requested.
    #[error("Scope has changed from \"{requested}\" to \"{granted}\"")]
    ScopeChanged { requested: String, granted: String },

    /// No callback arrived within the configured timeout.
    #[error("Timed out after {0:?} waiting for authorization")]
    Timeout(Duration),

    /// The user interrupted the flow.
    #[error("Authorization cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AuthError>;

fn detail(description: &Option<String>) -> String {
    match description {
        Some(d) if !d.is_empty() => format!(" ({})", d),
        _ => String::new(),
    }
}
