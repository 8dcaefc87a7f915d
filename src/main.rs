mod clickup;
mod cli;
mod config;
mod error;
mod history;
mod migrate;
mod model;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = cli::parse_args(&args)?;
    cli::run(invocation).await
}
