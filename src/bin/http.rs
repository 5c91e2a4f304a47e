#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;

    use site_distributor::{DistributorConfig, SqliteStore, http_api};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("site_distributor=info")),
        )
        .init();

    let addr: SocketAddr = std::env::var("SITE_DISTRIBUTOR_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;

    let config = DistributorConfig::load(None)?;
    let store = SqliteStore::new(&config.database.path)?;

    tracing::info!(%addr, db = %config.database.path.display(), "site-distributor HTTP API listening");
    http_api::serve(addr, store, config).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
