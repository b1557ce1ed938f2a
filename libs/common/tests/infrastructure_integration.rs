//! Integration tests for the infrastructure components
//!
//! These tests need a reachable PostgreSQL instance (`DATABASE_URL`) and are
//! ignored by default. Run them with `cargo test -- --ignored`.

use common::{
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    session::{PgTokenStore, SessionIssuer},
};
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

/// Verifies PostgreSQL is reachable and the schema migrations apply
#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");
    run_migrations(&pool).await?;

    let row = sqlx::query("SELECT COUNT(*) AS tables FROM information_schema.tables WHERE table_name IN ('users', 'profiles', 'auth_tokens', 'vibes')")
        .fetch_one(&pool)
        .await?;
    let tables: i64 = row.get("tables");
    assert_eq!(tables, 4, "Expected schema tables are missing");

    Ok(())
}

/// Verifies token get-or-create against the real unique constraint
#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_token_store_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let pool = init_pool(&DatabaseConfig::from_env()?).await?;
    run_migrations(&pool).await?;

    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, '!')")
        .bind(user_id)
        .bind(format!("it_{}", &user_id.simple().to_string()[..12]))
        .bind(format!("{}@example.com", user_id.simple()))
        .execute(&pool)
        .await?;

    let sessions = SessionIssuer::new(Arc::new(PgTokenStore::new(pool.clone())));
    let first = sessions.issue(user_id).await?;
    let second = sessions.issue(user_id).await?;
    assert_eq!(first.key, second.key);

    sessions.revoke(user_id).await?;
    assert!(sessions.authenticate(&first.key).await?.is_none());

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await?;

    Ok(())
}
