mod error;

pub mod browser;
pub mod callback;
pub mod client_secret;
pub mod flow;
pub mod pkce;
pub mod token;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use browser::{Browser, NoBrowser, SystemBrowser};
pub use callback::CallbackListener;
pub use client_secret::{CLIENT_SECRET_FILE, ClientSecret};
pub use error::{AuthError, Result};
pub use flow::{AuthorizationRequest, FlowOptions, FlowState, InstalledFlow};
pub use token::Credentials;

/// Read-only access to the YouTube account
pub const YOUTUBE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";
