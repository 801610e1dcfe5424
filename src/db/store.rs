use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};
use thiserror::Error;

use super::state::LedgerState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for the ledger document. The engine never talks to storage
/// directly; it hands a committed state to `save`.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load(&self) -> Result<Option<LedgerState>, StoreError>;
    async fn save(&self, state: &LedgerState) -> Result<(), StoreError>;
}

// Nothing is persisted; used by tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore;

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load(&self) -> Result<Option<LedgerState>, StoreError> {
        Ok(None)
    }

    async fn save(&self, _state: &LedgerState) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Whole document kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl LedgerStore for JsonFileStore {
    async fn load(&self) -> Result<Option<LedgerState>, StoreError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn save(&self, state: &LedgerState) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(state)?;
        // write next to the target and rename so readers never see half a file
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, payload).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

/// Document kept as a single JSONB row in PostgreSQL. Every save rewrites the
/// row, so write volume grows with the transaction and notification logs.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

const DOCUMENT_ID: i32 = 1;

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_conn_pool: u32) -> Result<Self, StoreError> {
        // create a connection pool
        let pool = PgPoolOptions::new()
            .max_connections(max_conn_pool)
            .connect(url)
            .await?;

        match sqlx::migrate!("./migrations").run(&pool).await {
            Ok(_) => {
                tracing::info!("Migrations run successfully");
            }
            Err(err) => {
                // if it fails we assume to continue believing that the database is already migrated
                tracing::warn!("Failed to run migrations: {err}");
            }
        }

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn load(&self) -> Result<Option<LedgerState>, StoreError> {
        let row = sqlx::query("SELECT document FROM ledger_documents WHERE id = $1")
            .bind(DOCUMENT_ID)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(state): Json<LedgerState> = row.try_get("document")?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, state: &LedgerState) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_documents (id, document, updated_at)
            VALUES ($1, $2, CURRENT_TIMESTAMP)
            ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(DOCUMENT_ID)
        .bind(Json(state))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
