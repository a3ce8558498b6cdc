use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use yt_oauth::{Browser, CLIENT_SECRET_FILE, FlowOptions, NoBrowser, SystemBrowser};

mod report;
mod runner;

use runner::{RunnerConfig, obtain_refresh_token};

/// YouTube Refresh Token Helper - Authorizes read-only YouTube access and prints the refresh token
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the OAuth client secret downloaded from the Google Cloud console
    #[arg(long, default_value = CLIENT_SECRET_FILE)]
    client_secret: PathBuf,

    /// Local port for the OAuth callback (default: 0, picked by the OS)
    #[arg(long, default_value = "0")]
    port: u16,

    /// Print the consent URL without launching a browser
    #[arg(long)]
    no_browser: bool,

    /// Give up waiting for consent after this many seconds (default: wait forever)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Log filter for diagnostics on stderr, e.g. "debug" or "yt_oauth=trace"
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{}': {}", filter, e);
        EnvFilter::new("warn")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received SIGINT, cancelling authorization");
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = RunnerConfig {
        client_secret_path: args.client_secret,
        flow: FlowOptions {
            port: args.port,
            timeout: args.timeout_secs.map(Duration::from_secs),
        },
    };

    let browser: Box<dyn Browser> = if args.no_browser {
        Box::new(NoBrowser)
    } else {
        Box::new(SystemBrowser)
    };

    let mut stdout = std::io::stdout().lock();
    match obtain_refresh_token(&config, browser.as_ref(), &mut stdout, interrupted()).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            tracing::error!(error = %e, "failed to write to stdout");
            ExitCode::FAILURE
        }
    }
}
