use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;

use yt_oauth::{
    AuthError, Browser, ClientSecret, FlowOptions, InstalledFlow, YOUTUBE_READONLY_SCOPE,
};

use crate::report;

/// Settings for one run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Client secret downloaded from the Google Cloud console
    pub client_secret_path: PathBuf,
    /// Callback port and consent timeout
    pub flow: FlowOptions,
}

/// How a run ended
#[derive(Debug)]
pub enum Outcome {
    /// A refresh token was issued and printed
    RefreshToken(String),
    /// The exchange succeeded but the provider did not reissue a refresh token
    NoRefreshToken,
    /// The client secret file does not exist
    MissingClientSecret(PathBuf),
    /// Anything else went wrong
    Failed(AuthError),
}

impl Outcome {
    /// Process exit status for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::RefreshToken(_) => 0,
            _ => 1,
        }
    }
}

/// Run one interactive authorization and report the result to `out`.
///
/// `cancel` resolving aborts the wait for consent. Only failures writing to
/// `out` are returned as errors.
pub async fn obtain_refresh_token<B, W, C>(
    config: &RunnerConfig,
    browser: &B,
    out: &mut W,
    cancel: C,
) -> io::Result<Outcome>
where
    B: Browser + ?Sized,
    W: Write,
    C: Future<Output = ()>,
{
    let outcome = authorize(config, browser, out, cancel).await;

    match &outcome {
        Outcome::RefreshToken(token) => report::refresh_token(out, token)?,
        Outcome::NoRefreshToken => report::missing_refresh_token(out)?,
        Outcome::MissingClientSecret(path) => report::missing_client_secret(out, path)?,
        Outcome::Failed(e) => report::failure(out, e)?,
    }

    Ok(outcome)
}

async fn authorize<B, W, C>(config: &RunnerConfig, browser: &B, out: &mut W, cancel: C) -> Outcome
where
    B: Browser + ?Sized,
    W: Write,
    C: Future<Output = ()>,
{
    let secret = match ClientSecret::load_from_file(&config.client_secret_path) {
        Ok(secret) => secret,
        Err(AuthError::ClientSecretNotFound { path }) => {
            return Outcome::MissingClientSecret(path);
        }
        Err(e) => return Outcome::Failed(e),
    };

    let mut flow = InstalledFlow::new(secret, &[YOUTUBE_READONLY_SCOPE]);

    let on_prompt = |url: &str| {
        if let Err(e) = report::prompt(out, url) {
            tracing::warn!(error = %e, "failed to print consent prompt");
        }
    };
    let result = flow.run(browser, &config.flow, on_prompt, cancel).await;

    tracing::info!(state = ?flow.state(), "authorization flow finished");

    match result {
        Ok(credentials) => match credentials.refresh_token {
            Some(token) => Outcome::RefreshToken(token),
            None => Outcome::NoRefreshToken,
        },
        Err(e) => Outcome::Failed(e),
    }
}
