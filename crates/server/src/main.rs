use clap::Parser;
use tacmap_server::config::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Cli::parse().into_config();
    tracing::info!("tacmap server starting on http://{}", config.addr);
    tacmap_server::serve(config).await
}
