//! resq CLI entry point.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod handlers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::parse_cli();

    // RUST_LOG wins over --log-level
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    cli::run_with_cli(cli).await
}
