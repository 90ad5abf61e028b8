//! Durable client-side storage for per-workflow settings.
//!
//! The backend never sees these: execution options and the last-used
//! edit-mode flag are purely client preferences, keyed by workflow id, read
//! when a workflow is opened and written on every change so they survive
//! reloads.
//!
//! Two backends implement the [`OptionsStore`] trait: a volatile in-memory
//! map for tests and ephemeral setups, and a SQLite-backed store (behind
//! the default-on `sqlite` feature) with schema bootstrap on connect.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ExecutionOptions;

/// Everything persisted client-side for one workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceOptions {
    pub execution: ExecutionOptions,
    /// Whether the workflow editor was last left in edit mode.
    pub edit_mode: bool,
}

/// Errors surfaced by options storage.
#[derive(Debug, Error, Diagnostic)]
pub enum OptionsStoreError {
    #[cfg(feature = "sqlite")]
    #[error("options database error: {source}")]
    #[diagnostic(code(flowdeck::options::database))]
    Database {
        #[from]
        source: sqlx::Error,
    },

    /// A stored blob no longer deserializes; treat as absent and rewrite.
    #[error("corrupt stored options for workflow {workflow_id}: {source}")]
    #[diagnostic(
        code(flowdeck::options::corrupt),
        help("Saving fresh options for this workflow overwrites the corrupt entry.")
    )]
    Corrupt {
        workflow_id: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, OptionsStoreError>;

/// Durable key-value storage for [`WorkspaceOptions`], keyed by workflow id.
#[async_trait]
pub trait OptionsStore: Send + Sync {
    async fn load(&self, workflow_id: &str) -> Result<Option<WorkspaceOptions>>;
    async fn save(&self, workflow_id: &str, options: &WorkspaceOptions) -> Result<()>;
    async fn remove(&self, workflow_id: &str) -> Result<()>;
}

/// Volatile in-memory implementation.
#[derive(Default)]
pub struct InMemoryOptionsStore {
    entries: std::sync::Mutex<rustc_hash::FxHashMap<String, WorkspaceOptions>>,
}

impl InMemoryOptionsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, rustc_hash::FxHashMap<String, WorkspaceOptions>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl OptionsStore for InMemoryOptionsStore {
    async fn load(&self, workflow_id: &str) -> Result<Option<WorkspaceOptions>> {
        Ok(self.lock().get(workflow_id).cloned())
    }

    async fn save(&self, workflow_id: &str, options: &WorkspaceOptions) -> Result<()> {
        self.lock()
            .insert(workflow_id.to_string(), options.clone());
        Ok(())
    }

    async fn remove(&self, workflow_id: &str) -> Result<()> {
        self.lock().remove(workflow_id);
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteOptionsStore;

#[cfg(feature = "sqlite")]
mod sqlite_store {
    use super::{OptionsStore, OptionsStoreError, Result, WorkspaceOptions};
    use async_trait::async_trait;
    use sqlx::{Row, SqlitePool};

    /// SQLite-backed implementation; the schema is bootstrapped on connect.
    pub struct SqliteOptionsStore {
        pool: SqlitePool,
    }

    impl SqliteOptionsStore {
        /// Connect to `database_url` (e.g. `sqlite://flowdeck.db`) and
        /// ensure the options table exists.
        pub async fn connect(database_url: &str) -> Result<Self> {
            let pool = SqlitePool::connect(database_url).await?;
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS workflow_options (
                     workflow_id TEXT PRIMARY KEY,
                     options_json TEXT NOT NULL,
                     updated_at TEXT NOT NULL
                 )",
            )
            .execute(&pool)
            .await?;
            Ok(Self { pool })
        }

        /// Connect using `FLOWDECK_SQLITE_DB` (default `flowdeck.db`),
        /// creating the database file when it does not exist yet.
        pub async fn connect_default() -> Result<Self> {
            dotenvy::dotenv().ok();
            let name =
                std::env::var("FLOWDECK_SQLITE_DB").unwrap_or_else(|_| "flowdeck.db".to_string());
            // SQLite refuses to open a missing file without create mode.
            let _ = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .append(true)
                .open(&name);
            Self::connect(&format!("sqlite://{name}")).await
        }
    }

    #[async_trait]
    impl OptionsStore for SqliteOptionsStore {
        async fn load(&self, workflow_id: &str) -> Result<Option<WorkspaceOptions>> {
            let row = sqlx::query("SELECT options_json FROM workflow_options WHERE workflow_id = ?1")
                .bind(workflow_id)
                .fetch_optional(&self.pool)
                .await?;
            let Some(row) = row else {
                return Ok(None);
            };
            let blob: String = row.get(0);
            let options =
                serde_json::from_str(&blob).map_err(|source| OptionsStoreError::Corrupt {
                    workflow_id: workflow_id.to_string(),
                    source,
                })?;
            Ok(Some(options))
        }

        async fn save(&self, workflow_id: &str, options: &WorkspaceOptions) -> Result<()> {
            let blob = serde_json::to_string(options).map_err(|source| {
                OptionsStoreError::Corrupt {
                    workflow_id: workflow_id.to_string(),
                    source,
                }
            })?;
            sqlx::query(
                "INSERT INTO workflow_options (workflow_id, options_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(workflow_id) DO UPDATE SET
                     options_json = excluded.options_json,
                     updated_at = excluded.updated_at",
            )
            .bind(workflow_id)
            .bind(blob)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn remove(&self, workflow_id: &str) -> Result<()> {
            sqlx::query("DELETE FROM workflow_options WHERE workflow_id = ?1")
                .bind(workflow_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }
}
