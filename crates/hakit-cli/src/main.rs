//! `hakit`: run HAKit sensor drivers from a TOML file and log what they
//! publish.

mod config;
mod host;

use anyhow::Context;
use clap::Parser;
use config::HostConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "hakit")]
#[command(about = "Run HAKit sensor drivers and log their outputs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Driver configuration file
    #[arg(short, long, env = "HAKIT_CONFIG", default_value = "hakit.toml")]
    config: PathBuf,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    duration: Option<u64>,
}

impl Cli {
    fn initialize_logging(&self) {
        let filter = match self.verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_thread_names(true))
            .init();
    }
}

async fn stop_signal(duration: Option<u64>) {
    match duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.initialize_logging();

    let config = HostConfig::load(&cli.config)?;
    info!(
        config = %cli.config.display(),
        drivers = config.drivers.len(),
        "hakit {}",
        hakit_core::VERSION
    );

    // One event loop thread for every driver; devices live on worker threads
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot create event loop")?;

    let results = runtime.block_on(host::run(&config.drivers, stop_signal(cli.duration)))?;
    for (name, stats) in results {
        info!(
            driver = %name,
            requests = stats.requests,
            published = stats.published,
            suppressed = stats.suppressed,
            invalid = stats.invalid,
            rejected = stats.rejected,
            "statistics"
        );
    }
    Ok(())
}
