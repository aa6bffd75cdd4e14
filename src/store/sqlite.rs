// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite-backed definition store.
//!
//! Definitions live in one table keyed by `(tenant, rewriter_id)`; a single-row counter
//! table holds the store generation. Every write and every delete that
//! removes a row bumps the counter in the same transaction, so a follower
//! that sees an unchanged generation can trust that nothing changed.
//!
//! # Sharing Between Processes
//!
//! Leader and followers can open the same database file. WAL mode lets
//! followers read while the leader commits.
//!
//! # SQLite Busy Handling
//!
//! SQLite can return SQLITE_BUSY/SQLITE_LOCKED when the database is
//! contended. Writes and deletes are retried with exponential backoff
//! before the error reaches the registry.

use super::{BoxFuture, DefinitionStore, Document, DocumentPage, EnumerationCursor, StoreError};
use crate::config::StoreConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for SQLite busy retry behavior
const SQLITE_RETRY_MAX_ATTEMPTS: u32 = 5;
const SQLITE_RETRY_BASE_DELAY_MS: u64 = 10;
const SQLITE_RETRY_MAX_DELAY_MS: u64 = 500;

/// Check if an error is a retryable SQLite busy/locked error
fn is_sqlite_busy_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: SQLITE_BUSY = 5, SQLITE_LOCKED = 6
            if let Some(code) = db_err.code() {
                return code == "5" || code == "6";
            }
            let msg = db_err.message().to_lowercase();
            msg.contains("database is locked") || msg.contains("database is busy")
        }
        _ => false,
    }
}

/// Execute a database operation with retry on SQLITE_BUSY/SQLITE_LOCKED
async fn execute_with_retry<F, Fut, T>(
    operation_name: &'static str,
    mut f: F,
) -> std::result::Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    let mut delay_ms = SQLITE_RETRY_BASE_DELAY_MS;

    loop {
        attempts += 1;
        match f().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts, "SQLite operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if is_sqlite_busy_error(&e) && attempts < SQLITE_RETRY_MAX_ATTEMPTS => {
                warn!(
                    operation = operation_name,
                    attempts,
                    max_attempts = SQLITE_RETRY_MAX_ATTEMPTS,
                    delay_ms,
                    "SQLite busy, retrying"
                );
                crate::metrics::record_store_retry(operation_name);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = (delay_ms * 2).min(SQLITE_RETRY_MAX_DELAY_MS);
            }
            Err(e) => {
                if is_sqlite_busy_error(&e) {
                    warn!(
                        operation = operation_name,
                        attempts, "SQLite busy, max retries exceeded"
                    );
                }
                return Err(e);
            }
        }
    }
}

type DocumentRow = (String, String, i64, Vec<u8>);

fn row_to_document(
    (rewriter_id, tenant, schema_version, payload): DocumentRow,
) -> Result<Document, StoreError> {
    let schema_version = u32::try_from(schema_version).map_err(|_| {
        StoreError::Corrupt(format!(
            "schema version {} out of range for {}#{}",
            schema_version, tenant, rewriter_id
        ))
    })?;
    Ok(Document {
        rewriter_id,
        tenant,
        schema_version,
        payload,
    })
}

/// Definition store persisted in a SQLite database.
pub struct SqliteDefinitionStore {
    pool: SqlitePool,
    page_size: usize,
    path: String,
}

impl SqliteDefinitionStore {
    /// Open (creating if needed) the store described by `config`.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let path = config.sqlite_path.clone();
        info!(path = %path, "Opening rewriter definition store");

        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", path)
        };

        let mut options = SqliteConnectOptions::from_str(&url)?
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        }

        // An in-memory database exists per connection; keep exactly one.
        let max_connections = if in_memory { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(if in_memory { 1 } else { 0 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rewriter_definitions (
                tenant TEXT NOT NULL,
                rewriter_id TEXT NOT NULL,
                schema_version INTEGER NOT NULL,
                data BLOB NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (tenant, rewriter_id)
            ) WITHOUT ROWID
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS store_generation (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                generation INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO store_generation (id, generation) VALUES (0, 0)")
            .execute(&pool)
            .await?;

        Ok(Self {
            pool,
            page_size: config.page_size.max(1),
            path,
        })
    }

    /// Get database path (for diagnostics).
    pub fn path(&self) -> &str {
        &self.path
    }

    async fn read_generation(&self) -> Result<u64, StoreError> {
        let generation: i64 =
            sqlx::query_scalar("SELECT generation FROM store_generation WHERE id = 0")
                .fetch_one(&self.pool)
                .await?;
        Ok(generation.max(0) as u64)
    }

    /// Force flush WAL to main database (for clean shutdown).
    pub async fn checkpoint(&self) -> Result<(), StoreError> {
        let pool = &self.pool;
        execute_with_retry("store_checkpoint", || async {
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(pool)
                .await
        })
        .await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoint and close the connection pool.
    pub async fn close(&self) {
        if let Err(e) = self.checkpoint().await {
            warn!(error = %e, "Failed to checkpoint WAL on close");
        }
        self.pool.close().await;
        info!(path = %self.path, "Rewriter definition store closed");
    }
}

impl DefinitionStore for SqliteDefinitionStore {
    fn current_generation(&self, _tenant: &str) -> BoxFuture<'_, u64> {
        Box::pin(async move { self.read_generation().await })
    }

    fn read_document(&self, tenant: &str, rewriter_id: &str) -> BoxFuture<'_, Option<Document>> {
        let tenant = tenant.to_string();
        let rewriter_id = rewriter_id.to_string();
        Box::pin(async move {
            let row: Option<DocumentRow> = sqlx::query_as(
                "SELECT rewriter_id, tenant, schema_version, data FROM rewriter_definitions WHERE tenant = ? AND rewriter_id = ?",
            )
            .bind(&tenant)
            .bind(&rewriter_id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(row_to_document).transpose()
        })
    }

    fn enumerate_page(
        &self,
        tenant: &str,
        cursor: &EnumerationCursor,
    ) -> BoxFuture<'_, DocumentPage> {
        let tenant = tenant.to_string();
        let cursor = cursor.clone();
        Box::pin(async move {
            let rows: Vec<DocumentRow> = sqlx::query_as(
                r#"
                SELECT rewriter_id, tenant, schema_version, data
                FROM rewriter_definitions
                WHERE tenant = ? AND rewriter_id > ?
                ORDER BY rewriter_id ASC
                LIMIT ?
                "#,
            )
            .bind(&tenant)
            .bind(cursor.as_str())
            .bind(self.page_size as i64)
            .fetch_all(&self.pool)
            .await?;

            let mut next_cursor = cursor;
            let mut documents = Vec::with_capacity(rows.len());
            for row in rows {
                let document = row_to_document(row)?;
                next_cursor = EnumerationCursor::new(document.rewriter_id.as_str());
                documents.push(document);
            }

            Ok(DocumentPage {
                documents,
                next_cursor,
            })
        })
    }

    fn write_document(&self, document: Document) -> BoxFuture<'_, u64> {
        Box::pin(async move {
            let pool = &self.pool;
            let now = chrono::Utc::now().timestamp_millis();

            let generation = execute_with_retry("store_write", || async {
                let mut tx = pool.begin().await?;
                sqlx::query(
                    r#"
                    INSERT INTO rewriter_definitions (tenant, rewriter_id, schema_version, data, updated_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT(tenant, rewriter_id) DO UPDATE SET
                        schema_version = excluded.schema_version,
                        data = excluded.data,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(&document.tenant)
                .bind(&document.rewriter_id)
                .bind(i64::from(document.schema_version))
                .bind(&document.payload)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                sqlx::query("UPDATE store_generation SET generation = generation + 1 WHERE id = 0")
                    .execute(&mut *tx)
                    .await?;
                let generation: i64 =
                    sqlx::query_scalar("SELECT generation FROM store_generation WHERE id = 0")
                        .fetch_one(&mut *tx)
                        .await?;
                tx.commit().await?;
                Ok(generation)
            })
            .await?;

            debug!(
                tenant = %document.tenant,
                rewriter_id = %document.rewriter_id,
                generation,
                "Stored rewriter definition"
            );
            Ok(generation.max(0) as u64)
        })
    }

    fn delete_document(&self, tenant: &str, rewriter_id: &str) -> BoxFuture<'_, u64> {
        let tenant = tenant.to_string();
        let rewriter_id = rewriter_id.to_string();
        Box::pin(async move {
            let pool = &self.pool;

            let generation = execute_with_retry("store_delete", || async {
                let mut tx = pool.begin().await?;
                let deleted = sqlx::query(
                    "DELETE FROM rewriter_definitions WHERE tenant = ? AND rewriter_id = ?",
                )
                .bind(&tenant)
                .bind(&rewriter_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

                if deleted > 0 {
                    sqlx::query("UPDATE store_generation SET generation = generation + 1 WHERE id = 0")
                        .execute(&mut *tx)
                        .await?;
                }
                let generation: i64 =
                    sqlx::query_scalar("SELECT generation FROM store_generation WHERE id = 0")
                        .fetch_one(&mut *tx)
                        .await?;
                tx.commit().await?;
                Ok(generation)
            })
            .await?;

            debug!(%tenant, %rewriter_id, generation, "Deleted rewriter definition");
            Ok(generation.max(0) as u64)
        })
    }
}
