/*!
SQLite-backed [`StateStore`] implementation.

Persists each step's opaque JSON state in a single key-value table:

- `step_state.step_id` — primary key
- `step_state.state_json` — serialized state
- `step_state.updated_at` — RFC3339 timestamp of the last save

Schema is created on connect; there is no migration history to manage for
a single upsert table. Connection URLs resolve from (in order) an explicit
argument, the `STEPWEAVE_SQLITE_URL` environment variable (after a
`dotenvy` pass), or the `stepweave.db` file in the working directory.
*/

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::instrument;

use super::state_store::{StateStore, StateStoreError};

const DEFAULT_DB_URL: &str = "sqlite://stepweave.db";

#[derive(Debug, Error, Diagnostic)]
pub enum SqliteStateStoreError {
    #[error("SQLx error: {0}")]
    #[diagnostic(
        code(stepweave::sqlite::sqlx),
        help("Ensure the SQLite database URL is valid and accessible.")
    )]
    Sqlx(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    #[diagnostic(code(stepweave::sqlite::serde))]
    Serde(#[from] serde_json::Error),
}

/// Durable step-state store backed by a SQLite pool.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Connect to the given `sqlite://` URL, creating the file and the
    /// `step_state` table if needed.
    #[instrument(err)]
    pub async fn connect(url: &str) -> Result<Self, SqliteStateStoreError> {
        if let Some(path) = url.strip_prefix("sqlite://") {
            let path = path.trim();
            if !path.is_empty() && path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if !p.exists() {
                    let _ = std::fs::File::create_new(p);
                }
            }
        }

        let pool = SqlitePool::connect(url).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS step_state (
                step_id    TEXT PRIMARY KEY,
                state_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Connect using `STEPWEAVE_SQLITE_URL` (via dotenv) or the default
    /// `stepweave.db` in the working directory.
    pub async fn connect_from_env() -> Result<Self, SqliteStateStoreError> {
        dotenvy::dotenv().ok();
        let url = std::env::var("STEPWEAVE_SQLITE_URL")
            .unwrap_or_else(|_| DEFAULT_DB_URL.to_string());
        Self::connect(&url).await
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self, step_id: &str) -> Result<Option<Value>, StateStoreError> {
        let row = sqlx::query("SELECT state_json FROM step_state WHERE step_id = ?1")
            .bind(step_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StateStoreError::Backend(e.to_string()))?;

        match row {
            None => Ok(None),
            Some(row) => {
                let raw: String = row
                    .try_get("state_json")
                    .map_err(|e| StateStoreError::Backend(e.to_string()))?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
        }
    }

    async fn save(&self, step_id: &str, state: Value) -> Result<(), StateStoreError> {
        let state_json = serde_json::to_string(&state)?;
        let updated_at = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO step_state (step_id, state_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(step_id) DO UPDATE SET
                 state_json = excluded.state_json,
                 updated_at = excluded.updated_at",
        )
        .bind(step_id)
        .bind(state_json)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StateStoreError::Backend(e.to_string()))?;
        Ok(())
    }
}
