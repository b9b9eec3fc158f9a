//! Atrium - content backend for an institutional website

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atrium::{
    api::{self, middleware::set_expose_errors, AppState},
    config::Config,
    db,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atrium=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Atrium...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    if config.uses_default_secret() {
        tracing::warn!(
            "security.id_secret is the development default; set ATRIUM_ID_SECRET before going live"
        );
    }
    set_expose_errors(config.server.expose_errors);
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!(driver = ?config.database.driver, "Database connected");

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    tokio::fs::create_dir_all(&config.upload.path).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let admin_seed = config.admin.clone();
    let state = AppState::new(pool, config)?;

    if let Some(seed) = admin_seed {
        state.user_service.seed_admin(&seed).await?;
    }
    let expired = state.user_service.cleanup_expired_sessions().await?;
    if expired > 0 {
        tracing::info!(expired, "Removed expired sessions");
    }

    // Build router
    let app = api::build_router(state)?;

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
