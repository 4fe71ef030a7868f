use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // One row per tracked event type
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cursors (
            event_type VARCHAR(255) PRIMARY KEY,
            tx_digest VARCHAR(255) NOT NULL,
            event_seq VARCHAR(64) NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only job audit trail keyed by the ledger job id
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id BIGINT PRIMARY KEY,
            creator VARCHAR(255) NOT NULL,
            pool_id BIGINT NOT NULL,
            price BIGINT NOT NULL,
            buyer_public_key BYTEA NOT NULL,
            epochs BIGINT NOT NULL,
            learning_rate BIGINT NOT NULL,
            status VARCHAR(32) NOT NULL,
            model_config_blob_id TEXT,
            completion_digest VARCHAR(255),
            failure_reason TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_pool_id ON jobs(pool_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
