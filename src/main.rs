//! gw2ctx - Guild Wars 2 wiki and account data for language models
//!
//! Runs a single operation from the command line, or serves line-delimited
//! JSON requests on stdin. Results go to stdout, logs to stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use gw2ctx::cli::Cli;
use gw2ctx::server;
use gw2ctx::{App, Config};

/// How long to wait for background work when the runtime shuts down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Initializes logging; `--debug` turns on debug output for this crate
fn init_logging(debug: bool) {
    if debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Warn)
            .filter_module("gw2ctx", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }
}

/// Cancels `shutdown` on Ctrl-C
fn install_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutting down gracefully...");
            shutdown.cancel();
        }
    });
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_cli(&cli);
    let app = Arc::new(App::new(config).context("Failed to initialize")?);
    let sweeper = app.spawn_sweeper();

    let shutdown = CancellationToken::new();
    install_ctrl_c(shutdown.clone());

    let outcome = match cli.command.operation() {
        Some(operation) => {
            let output = app.dispatch(operation, &shutdown).await;
            if output.is_error {
                Err(anyhow::anyhow!(output.text))
            } else {
                println!("{}", output.text);
                Ok(())
            }
        }
        None => {
            log::info!("Serving requests on stdin");
            server::serve(
                Arc::clone(&app),
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                shutdown,
            )
            .await
            .context("Request loop failed")
        }
    };

    sweeper.shutdown().await;
    outcome
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let outcome = runtime.block_on(run(cli));
    // A pending stdin read would otherwise keep the runtime alive
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    outcome
}
