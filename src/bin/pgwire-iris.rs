//! Binary entry point (spec §6): parse configuration, start the listener.
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pgwire_iris::config::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = pgwire_iris::server::run(cli).await {
        tracing::error!(error = %e, "pgwire-iris exited with an error");
        std::process::exit(1);
    }
}
