//! Cursor repository
//!
//! Durable record of how far each tracked event type has been processed.
//! A cursor is written only by the poller, after the batch ending at that
//! position was fully handled.

use async_trait::async_trait;
use cloakx_core::domain::cursor::{Cursor, EventId};
use sqlx::PgPool;

use super::StoreError;

/// Repository trait for event cursors
#[async_trait]
pub trait CursorRepository: Send + Sync {
    /// Returns the saved position for `event_type`, `None` meaning genesis
    async fn get(&self, event_type: &str) -> Result<Option<EventId>, StoreError>;

    /// Upserts the position for `event_type`
    async fn set(&self, event_type: &str, position: &EventId) -> Result<(), StoreError>;

    /// Lists every saved cursor
    async fn list(&self) -> Result<Vec<Cursor>, StoreError>;

    /// Deletes every cursor so the next poll replays from genesis
    ///
    /// # Returns
    /// The number of removed cursors
    async fn reset_all(&self) -> Result<u64, StoreError>;
}

/// PostgreSQL implementation of CursorRepository
#[derive(Clone)]
pub struct PgCursorRepository {
    pool: PgPool,
}

impl PgCursorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CursorRepository for PgCursorRepository {
    async fn get(&self, event_type: &str) -> Result<Option<EventId>, StoreError> {
        let row = sqlx::query_as::<_, CursorRow>(
            r#"
            SELECT event_type, tx_digest, event_seq, updated_at
            FROM cursors
            WHERE event_type = $1
            "#,
        )
        .bind(event_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Cursor::from(r).position))
    }

    async fn set(&self, event_type: &str, position: &EventId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cursors (event_type, tx_digest, event_seq, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_type)
            DO UPDATE SET tx_digest = EXCLUDED.tx_digest,
                          event_seq = EXCLUDED.event_seq,
                          updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(event_type)
        .bind(&position.tx_digest)
        .bind(&position.event_seq)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Cursor>, StoreError> {
        let rows = sqlx::query_as::<_, CursorRow>(
            r#"
            SELECT event_type, tx_digest, event_seq, updated_at
            FROM cursors
            ORDER BY event_type ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Cursor::from).collect())
    }

    async fn reset_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cursors")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct CursorRow {
    event_type: String,
    tx_digest: String,
    event_seq: String,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<CursorRow> for Cursor {
    fn from(row: CursorRow) -> Self {
        Cursor {
            event_type: row.event_type,
            position: EventId {
                tx_digest: row.tx_digest,
                event_seq: row.event_seq,
            },
            updated_at: row.updated_at,
        }
    }
}
