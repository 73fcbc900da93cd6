//! Repository trait and SQLx implementation for the form persistence interface

use crate::persistence::error::PersistenceError;
use crate::persistence::pool::{ConnectionPool, DatabaseBackend};
use crate::schema::ddl::{quote_ident, DdlGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::Row;
use std::fmt;

/// Internal record collections. Each maps to one table created by migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    NavigationEntries,
    FormDefinitions,
    DeletionLog,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Self::NavigationEntries => "navigation_entries",
            Self::FormDefinitions => "form_definitions",
            Self::DeletionLog => "deletion_log",
        }
    }

    /// Columns besides `id`
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::NavigationEntries => {
                &["parent_id", "label", "icon", "url", "form_table", "created_at"]
            }
            Self::FormDefinitions => &[
                "table_name",
                "label",
                "navigation_entry_id",
                "dashboard_entry_id",
                "district_id",
                "fields",
                "created_by",
                "created_at",
            ],
            Self::DeletionLog => &["table_name", "requested_by", "attempted_at"],
        }
    }

    fn order_column(&self) -> &'static str {
        match self {
            Self::NavigationEntries | Self::FormDefinitions => "created_at",
            Self::DeletionLog => "attempted_at",
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        column == "id" || self.columns().contains(&column)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// A stored record with its generated id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(Value::as_str)
    }
}

/// Options for [`FormRepository::select_records`]
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Column equality filters, combined with AND
    pub filters: Vec<(String, String)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Persistence interface the provisioning engine depends on
#[async_trait]
pub trait FormRepository: Send + Sync {
    /// Backend type; selects the DDL dialect
    fn backend(&self) -> DatabaseBackend;

    /// Run a raw data-definition statement (create/drop table)
    async fn execute_schema_statement(&self, statement: &str) -> Result<(), PersistenceError>;

    /// Insert a record; the store generates its id
    async fn insert_record(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> Result<Record, PersistenceError>;

    /// Delete a record by id. Returns `false` if no such record existed.
    async fn delete_record(&self, collection: Collection, id: &str)
        -> Result<bool, PersistenceError>;

    /// Select records matching the options
    async fn select_records(
        &self,
        collection: Collection,
        options: &SelectOptions,
    ) -> Result<Vec<Record>, PersistenceError>;

    /// Whether a table with this name exists
    async fn table_exists(&self, table_name: &str) -> Result<bool, PersistenceError>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<(), PersistenceError>;
}

/// Validate that every key is a column of the collection
pub(crate) fn check_columns<'a>(
    collection: Collection,
    columns: impl IntoIterator<Item = &'a String>,
) -> Result<(), PersistenceError> {
    for column in columns {
        if !collection.has_column(column) || column == "id" {
            return Err(PersistenceError::UnknownColumn {
                collection: collection.to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}

/// Text stored for a JSON value; all collection columns are text
pub(crate) fn column_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// SQLx-based implementation of FormRepository
pub struct SqlxFormRepository {
    pool: ConnectionPool,
}

impl SqlxFormRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn parse_row(
        collection: Collection,
        row: &sqlx::any::AnyRow,
    ) -> Result<Record, PersistenceError> {
        let mut fields = Map::new();
        for column in collection.columns() {
            let value: Option<String> = row.try_get(*column)?;
            fields.insert(
                column.to_string(),
                value.map(Value::String).unwrap_or(Value::Null),
            );
        }

        Ok(Record {
            id: row.try_get("id")?,
            fields,
        })
    }
}

#[async_trait]
impl FormRepository for SqlxFormRepository {
    fn backend(&self) -> DatabaseBackend {
        self.pool.backend()
    }

    async fn execute_schema_statement(&self, statement: &str) -> Result<(), PersistenceError> {
        sqlx::query(statement)
            .execute(self.pool.pool())
            .await
            .map_err(|e| PersistenceError::Schema(e.to_string()))?;
        Ok(())
    }

    async fn insert_record(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> Result<Record, PersistenceError> {
        check_columns(collection, fields.keys())?;

        let backend = self.backend();
        let id = uuid::Uuid::new_v4().to_string();
        let columns = collection.columns();
        let column_list: Vec<String> = std::iter::once("id")
            .chain(columns.iter().copied())
            .map(|c| quote_ident(backend, c))
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(backend, collection.table()),
            column_list.join(", "),
            backend.placeholders(1, columns.len() + 1)
        );

        let mut query = sqlx::query(&sql).bind(id.clone());
        for column in columns {
            query = query.bind(fields.get(*column).and_then(column_text));
        }
        query.execute(self.pool.pool()).await?;

        let mut stored = Map::new();
        for column in columns {
            let value = fields
                .get(*column)
                .and_then(column_text)
                .map(Value::String)
                .unwrap_or(Value::Null);
            stored.insert(column.to_string(), value);
        }

        Ok(Record { id, fields: stored })
    }

    async fn delete_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<bool, PersistenceError> {
        let backend = self.backend();
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            quote_ident(backend, collection.table()),
            quote_ident(backend, "id"),
            backend.placeholder(1)
        );

        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(self.pool.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn select_records(
        &self,
        collection: Collection,
        options: &SelectOptions,
    ) -> Result<Vec<Record>, PersistenceError> {
        for (column, _) in &options.filters {
            if !collection.has_column(column) {
                return Err(PersistenceError::UnknownColumn {
                    collection: collection.to_string(),
                    column: column.clone(),
                });
            }
        }

        let backend = self.backend();
        let column_list: Vec<String> = std::iter::once("id")
            .chain(collection.columns().iter().copied())
            .map(|c| quote_ident(backend, c))
            .collect();

        let mut sql = format!(
            "SELECT {} FROM {}",
            column_list.join(", "),
            quote_ident(backend, collection.table())
        );
        if !options.filters.is_empty() {
            let conditions: Vec<String> = options
                .filters
                .iter()
                .enumerate()
                .map(|(i, (column, _))| {
                    format!("{} = {}", quote_ident(backend, column), backend.placeholder(i + 1))
                })
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(&format!(
            " ORDER BY {} LIMIT {} OFFSET {}",
            quote_ident(backend, collection.order_column()),
            options.limit.unwrap_or(i64::MAX as usize),
            options.offset
        ));

        let mut query = sqlx::query(&sql);
        for (_, value) in &options.filters {
            query = query.bind(value.clone());
        }
        let rows = query.fetch_all(self.pool.pool()).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(Self::parse_row(collection, &row)?);
        }

        Ok(records)
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool, PersistenceError> {
        let probe = DdlGenerator::new(self.backend()).build_exists_probe(table_name);

        match sqlx::query(&probe).fetch_optional(self.pool.pool()).await {
            Ok(_) => Ok(true),
            // The backend rejects the probe when the table is missing
            Err(sqlx::Error::Database(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        self.pool.health_check().await
    }
}
