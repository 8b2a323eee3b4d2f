mod commands;
mod error;
mod opts;
mod store;

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use ubi_driver::UbiClientFactory;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = opts::parse_args();

    let result = match UbiClientFactory::new() {
        Ok(factory) => commands::run(args, Arc::new(factory), &mut std::io::stdout()).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
