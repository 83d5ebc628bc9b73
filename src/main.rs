use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use peptidex::auth::session;
use peptidex::config::{Cli, Config};
use peptidex::content::ContentIndex;
use peptidex::db;
use peptidex::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    if config.admin.token.is_some() {
        tracing::info!("Admin token configured for moderation automation");
    }
    if config.billing.webhook_secret.is_none() {
        tracing::info!("No billing webhook secret, webhook endpoint disabled");
    }

    // Initialize database; the UGC database opens lazily on first use
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    let pruned = session::prune_expired(&*pool.get()?)?;
    tracing::info!(pruned, "Expired sessions removed");

    let content = ContentIndex::load(&config.content_path())?;

    let state = AppState::new(pool, config.clone(), content);
    let app = peptidex::build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
