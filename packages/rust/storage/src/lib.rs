//! libSQL storage layer for ranking history.
//!
//! The [`Storage`] struct wraps a local libSQL database holding one row per
//! pipeline run plus the full ranking observed in it. The pipeline only sees
//! it through [`RankingSink`].
//!
//! **Access rules:**
//! - `check` / `serve`: read-write via [`Storage::open`]
//! - `history`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use serpwatch_shared::{PositionEntry, RankingSnapshot, Result, SerpwatchError};

/// Destination for completed ranking snapshots.
#[async_trait]
pub trait RankingSink: Send + Sync {
    /// Durably store one snapshot.
    async fn save(&self, snapshot: &RankingSnapshot) -> Result<()>;
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SerpwatchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SerpwatchError::Storage(format!(
                "no database at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    SerpwatchError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SerpwatchError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run operations
    // -----------------------------------------------------------------------

    /// Insert a run and its positions atomically.
    pub async fn insert_snapshot(&self, snapshot: &RankingSnapshot) -> Result<()> {
        self.check_writable()?;
        let run_id = snapshot.run_id.to_string();

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?;

        tx.execute(
            "INSERT INTO runs (id, keyword, domain, checked_at, our_position, analysis, results_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id.as_str(),
                snapshot.keyword_ref.as_str(),
                snapshot.domain.as_str(),
                snapshot.checked_at.to_rfc3339(),
                i64::from(snapshot.our_position),
                snapshot.analysis.as_str(),
                snapshot.results_hash.as_str(),
            ],
        )
        .await
        .map_err(|e| SerpwatchError::Storage(e.to_string()))?;

        for entry in &snapshot.positions {
            tx.execute(
                "INSERT INTO positions (run_id, position, url, title, is_our_site)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run_id.as_str(),
                    i64::from(entry.position),
                    entry.url.as_str(),
                    entry.title.as_deref(),
                    i64::from(entry.is_our_site),
                ],
            )
            .await
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?;

        tracing::debug!(
            run_id = %snapshot.run_id,
            positions = snapshot.positions.len(),
            "stored ranking snapshot"
        );
        Ok(())
    }

    /// List stored runs for a keyword, newest first.
    pub async fn list_runs(&self, keyword: &str, limit: u32) -> Result<Vec<RunSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, keyword, domain, checked_at, our_position, analysis, results_hash
                 FROM runs WHERE keyword = ?1
                 ORDER BY checked_at DESC, id DESC
                 LIMIT ?2",
                params![keyword, limit],
            )
            .await
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_run_summary(&row)?);
        }
        Ok(results)
    }

    /// The ranking stored for one run, in rank order.
    pub async fn list_positions(&self, run_id: &str) -> Result<Vec<PositionEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT position, url, title, is_our_site
                 FROM positions WHERE run_id = ?1 ORDER BY position",
                params![run_id],
            )
            .await
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(PositionEntry {
                position: row
                    .get::<u32>(0)
                    .map_err(|e| SerpwatchError::Storage(e.to_string()))?,
                url: row
                    .get::<String>(1)
                    .map_err(|e| SerpwatchError::Storage(e.to_string()))?,
                title: row.get::<String>(2).ok(),
                is_our_site: row
                    .get::<i64>(3)
                    .map_err(|e| SerpwatchError::Storage(e.to_string()))?
                    != 0,
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl RankingSink for Storage {
    async fn save(&self, snapshot: &RankingSnapshot) -> Result<()> {
        self.insert_snapshot(snapshot).await
    }
}

/// A stored run without its positions.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub keyword: String,
    pub domain: String,
    pub checked_at: DateTime<Utc>,
    /// `-1` when the domain was not in the scanned window.
    pub our_position: i32,
    pub analysis: String,
    pub results_hash: String,
}

/// Convert a database row to a [`RunSummary`].
fn row_to_run_summary(row: &libsql::Row) -> Result<RunSummary> {
    Ok(RunSummary {
        run_id: row
            .get::<String>(0)
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?,
        keyword: row
            .get::<String>(1)
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?,
        domain: row
            .get::<String>(2)
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?,
        checked_at: {
            let s: String = row
                .get(3)
                .map_err(|e| SerpwatchError::Storage(e.to_string()))?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| SerpwatchError::Storage(format!("invalid date: {e}")))?
        },
        our_position: row
            .get::<i64>(4)
            .map_err(|e| SerpwatchError::Storage(e.to_string()))? as i32,
        analysis: row
            .get::<String>(5)
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?,
        results_hash: row
            .get::<String>(6)
            .map_err(|e| SerpwatchError::Storage(e.to_string()))?,
    })
}
