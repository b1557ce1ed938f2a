use std::sync::Arc;

use anyhow::Result;
use common::{
    database,
    session::{PgTokenStore, SessionIssuer},
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use accounts::{
    AccountService, AppState, avatar::AvatarStore, config::Settings, create_router,
    rate_limiter::RateLimiter, repositories::PgAccountRepository,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting accounts service");

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

    let service = AccountService::new(
        Arc::new(PgAccountRepository::new(pool.clone())),
        SessionIssuer::new(Arc::new(PgTokenStore::new(pool.clone()))),
        AvatarStore::new(&settings.media_root),
        RateLimiter::new(settings.rate_limiter()),
    );

    let app = create_router(AppState {
        service,
        db_pool: Some(pool),
    });

    let listener = TcpListener::bind(&settings.bind_address).await?;
    info!("Accounts service listening on {}", settings.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
