use tenant_admin_api::{app, config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, DATABASE_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    config.validate()?;
    tracing::info!("Starting Tenant Admin API in {:?} mode", config.environment);

    let store = app::build_store(&config.store).await?;
    app::spawn_session_purge(store.clone(), config.store.session_purge_interval_secs);
    let state = app::AppState::new(config.clone(), store);
    let router = app::app(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Tenant Admin API listening on http://{}", bind_addr);

    axum::serve(listener, router).await?;
    Ok(())
}
