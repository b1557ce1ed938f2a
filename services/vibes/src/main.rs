use std::sync::Arc;

use anyhow::Result;
use common::{
    database,
    session::{PgTokenStore, SessionIssuer},
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vibes::{
    AppState, VibeLifecycle, config::Settings, create_router, repositories::PgVibeRepository,
    sweeper,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting vibes service");

    let settings = Settings::from_env()?;

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    let lifecycle = VibeLifecycle::new(Arc::new(PgVibeRepository::new(pool.clone())));

    // Keep the scheduler alive for the lifetime of the server
    let _sweeper = sweeper::start_expiry_sweep(lifecycle.clone(), &settings.expiry_schedule).await?;

    let app = create_router(AppState {
        lifecycle,
        sessions: SessionIssuer::new(Arc::new(PgTokenStore::new(pool.clone()))),
        db_pool: Some(pool),
    });

    let listener = TcpListener::bind(&settings.bind_address).await?;
    info!("Vibes service listening on {}", settings.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
