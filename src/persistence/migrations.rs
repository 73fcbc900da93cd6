//! Database migrations for the internal collections

use crate::persistence::error::PersistenceError;
use crate::persistence::pool::ConnectionPool;
use sqlx::Row;

/// Tracking table for applied migrations
pub const MIGRATIONS_TABLE: &str = "_formwright_migrations";

/// Initial schema: navigation entries, form definitions and the deletion log.
/// Keys are client-generated UUID strings so the same SQL runs on every backend.
const MIGRATION_001_INITIAL: &str = r#"
-- Navigation entries (one per published form, plus any parent sections)
CREATE TABLE IF NOT EXISTS navigation_entries (
    id VARCHAR(64) PRIMARY KEY,
    parent_id VARCHAR(255),
    label VARCHAR(255),
    icon VARCHAR(255),
    url VARCHAR(512),
    form_table VARCHAR(255),
    created_at VARCHAR(64)
);

-- Published form definitions; fields are stored as JSON text
CREATE TABLE IF NOT EXISTS form_definitions (
    id VARCHAR(64) PRIMARY KEY,
    table_name VARCHAR(255) NOT NULL UNIQUE,
    label VARCHAR(255),
    navigation_entry_id VARCHAR(64),
    dashboard_entry_id VARCHAR(255),
    district_id VARCHAR(255),
    fields TEXT,
    created_by VARCHAR(255),
    created_at VARCHAR(64)
);

-- Audit trail of deletion requests
CREATE TABLE IF NOT EXISTS deletion_log (
    id VARCHAR(64) PRIMARY KEY,
    table_name VARCHAR(255),
    requested_by VARCHAR(255),
    attempted_at VARCHAR(64)
);
"#;

const MIGRATION_002_INDEXES: &str = r#"
CREATE INDEX idx_navigation_form_table ON navigation_entries(form_table);
CREATE INDEX idx_deletion_log_table ON deletion_log(table_name)
"#;

/// Migration definition
struct Migration {
    name: &'static str,
    sql: &'static str,
    checksum: &'static str,
}

/// Get all migrations in order
fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            name: "001_initial_schema",
            sql: MIGRATION_001_INITIAL,
            checksum: "v1",
        },
        Migration {
            name: "002_lookup_indexes",
            sql: MIGRATION_002_INDEXES,
            checksum: "v1",
        },
    ]
}

/// Statements of a migration script, comments stripped
fn statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Migration runner for the persistence layer
pub struct MigrationRunner {
    pool: ConnectionPool,
}

impl MigrationRunner {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations
    pub async fn migrate_up(&self) -> Result<MigrationResult, PersistenceError> {
        let mut applied = 0;
        let mut skipped = 0;

        self.ensure_migrations_table().await?;

        for migration in get_migrations() {
            if self.is_migration_applied(migration.name).await? {
                tracing::debug!("Migration '{}' already applied, skipping", migration.name);
                skipped += 1;
                continue;
            }

            tracing::info!("Applying migration: {}", migration.name);

            for statement in statements(migration.sql) {
                sqlx::query(&statement)
                    .execute(self.pool.pool())
                    .await
                    .map_err(|e| {
                        PersistenceError::Migration(format!(
                            "Failed to execute migration '{}': {}",
                            migration.name, e
                        ))
                    })?;
            }

            self.record_migration(migration.name, migration.checksum)
                .await?;

            tracing::info!("Migration '{}' applied successfully", migration.name);
            applied += 1;
        }

        Ok(MigrationResult { applied, skipped })
    }

    /// Get migration status
    pub async fn status(&self) -> Result<Vec<MigrationStatus>, PersistenceError> {
        self.ensure_migrations_table().await?;

        let mut statuses = Vec::new();
        for migration in get_migrations() {
            let applied_at = self.get_migration_applied_at(migration.name).await?;
            statuses.push(MigrationStatus {
                name: migration.name.to_string(),
                applied: applied_at.is_some(),
                applied_at,
            });
        }

        Ok(statuses)
    }

    async fn ensure_migrations_table(&self) -> Result<(), PersistenceError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                name VARCHAR(255) PRIMARY KEY,
                applied_at VARCHAR(64) NOT NULL,
                checksum VARCHAR(64) NOT NULL
            )",
            MIGRATIONS_TABLE
        );

        sqlx::query(&sql)
            .execute(self.pool.pool())
            .await
            .map_err(|e| {
                PersistenceError::Migration(format!("Failed to create migrations table: {}", e))
            })?;

        Ok(())
    }

    async fn is_migration_applied(&self, name: &str) -> Result<bool, PersistenceError> {
        Ok(self.get_migration_applied_at(name).await?.is_some())
    }

    async fn get_migration_applied_at(
        &self,
        name: &str,
    ) -> Result<Option<String>, PersistenceError> {
        let sql = format!(
            "SELECT applied_at FROM {} WHERE name = {}",
            MIGRATIONS_TABLE,
            self.pool.backend().placeholder(1)
        );

        let row = sqlx::query(&sql)
            .bind(name.to_string())
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| {
                PersistenceError::Migration(format!("Failed to check migration status: {}", e))
            })?;

        match row {
            Some(row) => Ok(Some(row.try_get("applied_at")?)),
            None => Ok(None),
        }
    }

    async fn record_migration(&self, name: &str, checksum: &str) -> Result<(), PersistenceError> {
        let now = chrono::Utc::now().to_rfc3339();
        let sql = format!(
            "INSERT INTO {} (name, applied_at, checksum) VALUES ({})",
            MIGRATIONS_TABLE,
            self.pool.backend().placeholders(1, 3)
        );

        sqlx::query(&sql)
            .bind(name.to_string())
            .bind(now)
            .bind(checksum.to_string())
            .execute(self.pool.pool())
            .await
            .map_err(|e| {
                PersistenceError::Migration(format!("Failed to record migration: {}", e))
            })?;

        Ok(())
    }
}

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Number of migrations applied
    pub applied: usize,
    /// Number of migrations skipped (already applied)
    pub skipped: usize,
}

/// Status of a single migration
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub name: String,
    pub applied: bool,
    pub applied_at: Option<String>,
}
