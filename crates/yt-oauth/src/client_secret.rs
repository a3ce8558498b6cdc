use serde::Deserialize;
use std::path::Path;

use crate::{AuthError, Result};

/// Default file name of the downloaded client secret
pub const CLIENT_SECRET_FILE: &str = "client_secret.json";

/// OAuth client descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Authorization endpoint
    pub auth_uri: String,
    /// Token endpoint
    pub token_uri: String,
    /// Redirect URIs registered for the client
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Client secret files wrap the descriptor in an `installed` or `web` key.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Load a client secret from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AuthError::ClientSecretNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                AuthError::ClientSecretRead {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        tracing::debug!(path = %path.display(), "loaded client secret file");
        Self::from_json(&content)
    }

    /// Parse a client secret from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .map_err(|e| AuthError::InvalidClientSecret(e.to_string()))?;

        let secret = file.installed.or(file.web).ok_or_else(|| {
            AuthError::InvalidClientSecret(
                "Client secrets must be for a web or installed app".to_string(),
            )
        })?;

        secret.validate()?;
        Ok(secret)
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("auth_uri", &self.auth_uri),
            ("token_uri", &self.token_uri),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(AuthError::InvalidClientSecret(format!(
                    "'{}' is empty",
                    name
                )));
            }
        }
        Ok(())
    }
}
