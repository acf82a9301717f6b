use clap::Parser;
use std::process::ExitCode;
use structure_sync::cli::{run, Cli};
use structure_sync::load_config::ConfigError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing for the CLI, honouring RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => {
            tracing::info!("CLI completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "CLI exited with error");
            match e.downcast_ref::<ConfigError>() {
                Some(ConfigError::Missing(names)) => {
                    eprintln!("Missing required environment variables: {}", names.join(", "));
                }
                _ => eprintln!("Error: {e:?}"),
            }
            ExitCode::FAILURE
        }
    }
}
