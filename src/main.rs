use std::sync::Arc;

use anyhow::Result;
use entigraph::http::ApiServer;
use entigraph::store::SqliteStore;
use entigraph::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    log::info!("Starting entigraph v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());

    let store = Arc::new(SqliteStore::new(entigraph::db::Db::new(config.db_path())));
    store.init().await?;
    log::info!("Database initialized successfully");

    let server = ApiServer::new(store, &config).await?;
    server.run(config.http_server.port).await?;

    Ok(())
}
