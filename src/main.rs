use anyhow::Result;
use std::env;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cinebox::config::{self, Config};

const DEFAULT_LOG: &str = "cinebox=info,cinebox_server=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG)),
        )
        .compact()
        .init();

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Read .env"),
        Err(e) => debug!("No .env file ({}), using process environment", e),
    }

    let missing = config::missing_vars(|key| env::var(key).ok());
    if !missing.is_empty() {
        anyhow::bail!("Missing environment variables: {}", missing.join(", "));
    }

    let config = Config::from_env()?;
    info!(
        backend = %config.api_base,
        page_size = config.page_size,
        "Starting cinebox {}",
        env!("CARGO_PKG_VERSION")
    );
    cinebox::app::run_server(config).await
}
