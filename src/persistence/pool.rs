//! Pooled sqlx connections for the form store

use crate::persistence::error::PersistenceError;
use sqlx::{any::AnyPoolOptions, AnyPool};
use std::time::Duration;

/// SQL dialect behind a connection URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    Mysql,
}

impl DatabaseBackend {
    pub fn from_url(url: &str) -> Result<Self, PersistenceError> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            other => Err(PersistenceError::Connection(format!(
                "unsupported database scheme '{}', expected sqlite, postgres or mysql",
                other
            ))),
        }
    }

    /// Lowercase name reported by the health endpoint
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
        }
    }

    /// Bind placeholder for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${}", index),
            Self::Sqlite | Self::Mysql => "?".to_string(),
        }
    }

    /// Comma-separated placeholders for parameters `first..first + count`
    pub fn placeholders(&self, first: usize, count: usize) -> String {
        (first..first + count)
            .map(|index| self.placeholder(index))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// An `AnyPool` tagged with the dialect it speaks
#[derive(Clone)]
pub struct ConnectionPool {
    pool: AnyPool,
    backend: DatabaseBackend,
}

impl ConnectionPool {
    pub async fn new(
        url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, PersistenceError> {
        sqlx::any::install_default_drivers();
        let backend = DatabaseBackend::from_url(url)?;

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        tracing::info!(backend = backend.name(), max_connections, "Form store connected");
        Ok(Self { pool, backend })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub async fn health_check(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Connection(format!("health check failed: {}", e)))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
