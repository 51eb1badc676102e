//! SQL migration definitions for the serpwatch database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: runs, positions",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per completed pipeline run
CREATE TABLE IF NOT EXISTS runs (
    id            TEXT PRIMARY KEY,
    keyword       TEXT NOT NULL,
    domain        TEXT NOT NULL,
    checked_at    TEXT NOT NULL,
    our_position  INTEGER NOT NULL,
    analysis      TEXT NOT NULL,
    results_hash  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_keyword ON runs(keyword, checked_at);

-- The ranking observed in a run
CREATE TABLE IF NOT EXISTS positions (
    run_id      TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    url         TEXT NOT NULL,
    title       TEXT,
    is_our_site INTEGER NOT NULL,
    PRIMARY KEY (run_id, position)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
