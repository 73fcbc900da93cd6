//! In-memory form repository
//!
//! Used by tests and by `--database-url memory:`. Storage tables are tracked by
//! name together with the statement that created them; failures can be
//! injected per operation to exercise partial-failure paths.

use crate::persistence::error::PersistenceError;
use crate::persistence::pool::DatabaseBackend;
use crate::persistence::repository::{
    check_columns, column_text, Collection, FormRepository, Record, SelectOptions,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateTable,
    DropTable,
    Insert(Collection),
    Delete(Collection),
    Select(Collection),
}

#[derive(Default)]
struct Inner {
    /// Lowercased table name -> create statement
    tables: BTreeMap<String, String>,
    collections: HashMap<Collection, Vec<Record>>,
    executed: Vec<String>,
    fail_points: HashSet<FailPoint>,
}

/// Thread-safe in-memory implementation of [`FormRepository`]
#[derive(Clone)]
pub struct InMemoryFormRepository {
    backend: DatabaseBackend,
    inner: Arc<RwLock<Inner>>,
}

impl Default for InMemoryFormRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFormRepository {
    pub fn new() -> Self {
        Self::with_backend(DatabaseBackend::Sqlite)
    }

    /// Emit DDL in another backend's dialect
    pub fn with_backend(backend: DatabaseBackend) -> Self {
        Self {
            backend,
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    pub async fn fail_on(&self, point: FailPoint) {
        self.inner.write().await.fail_points.insert(point);
    }

    pub async fn clear_failure(&self, point: FailPoint) {
        self.inner.write().await.fail_points.remove(&point);
    }

    /// Names of the storage tables that currently exist
    pub async fn tables(&self) -> Vec<String> {
        self.inner.read().await.tables.keys().cloned().collect()
    }

    /// Statement that created `table_name`, if it exists
    pub async fn table_statement(&self, table_name: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .tables
            .get(&table_name.to_lowercase())
            .cloned()
    }

    pub async fn records(&self, collection: Collection) -> Vec<Record> {
        self.inner
            .read()
            .await
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Every schema statement that was executed successfully, in order
    pub async fn executed_statements(&self) -> Vec<String> {
        self.inner.read().await.executed.clone()
    }

    fn injected(inner: &Inner, point: FailPoint) -> Result<(), PersistenceError> {
        if inner.fail_points.contains(&point) {
            return Err(PersistenceError::Internal(format!(
                "injected failure: {:?}",
                point
            )));
        }
        Ok(())
    }
}

/// Parse the leading identifier of `rest`, quoted or bare
fn leading_identifier(rest: &str) -> Option<String> {
    let rest = rest.trim_start();
    let mut chars = rest.chars();
    let quote = match chars.next()? {
        q @ ('"' | '`') => q,
        _ => {
            let name: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            return (!name.is_empty()).then_some(name);
        }
    };

    let mut name = String::new();
    let mut chars = chars.peekable();
    while let Some(c) = chars.next() {
        if c == quote {
            if chars.peek() == Some(&quote) {
                chars.next();
                name.push(quote);
            } else {
                return Some(name);
            }
        } else {
            name.push(c);
        }
    }
    None
}

fn strip_prefix_ci<'a>(statement: &'a str, prefix: &str) -> Option<&'a str> {
    let head = statement.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &statement[prefix.len()..])
}

#[async_trait]
impl FormRepository for InMemoryFormRepository {
    fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    async fn execute_schema_statement(&self, statement: &str) -> Result<(), PersistenceError> {
        let mut inner = self.inner.write().await;
        let trimmed = statement.trim();

        if let Some(rest) = strip_prefix_ci(trimmed, "CREATE TABLE ") {
            Self::injected(&inner, FailPoint::CreateTable)?;
            let name = leading_identifier(rest)
                .ok_or_else(|| {
                    PersistenceError::Schema(format!("malformed statement: {}", trimmed))
                })?
                .to_lowercase();
            if inner.tables.contains_key(&name) {
                return Err(PersistenceError::Schema(format!(
                    "table \"{}\" already exists",
                    name
                )));
            }
            inner.tables.insert(name, trimmed.to_string());
        } else if let Some(rest) = strip_prefix_ci(trimmed, "DROP TABLE ") {
            Self::injected(&inner, FailPoint::DropTable)?;
            let (rest, if_exists) = match strip_prefix_ci(rest, "IF EXISTS ") {
                Some(rest) => (rest, true),
                None => (rest, false),
            };
            let name = leading_identifier(rest)
                .ok_or_else(|| {
                    PersistenceError::Schema(format!("malformed statement: {}", trimmed))
                })?
                .to_lowercase();
            if inner.tables.remove(&name).is_none() && !if_exists {
                return Err(PersistenceError::Schema(format!("no such table: {}", name)));
            }
        } else {
            return Err(PersistenceError::Schema(format!(
                "unsupported statement: {}",
                trimmed
            )));
        }

        inner.executed.push(trimmed.to_string());
        Ok(())
    }

    async fn insert_record(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> Result<Record, PersistenceError> {
        let mut inner = self.inner.write().await;
        Self::injected(&inner, FailPoint::Insert(collection))?;
        check_columns(collection, fields.keys())?;

        let mut stored = Map::new();
        for column in collection.columns() {
            let value = fields
                .get(*column)
                .and_then(column_text)
                .map(Value::String)
                .unwrap_or(Value::Null);
            stored.insert(column.to_string(), value);
        }

        let record = Record {
            id: uuid::Uuid::new_v4().to_string(),
            fields: stored,
        };
        inner
            .collections
            .entry(collection)
            .or_default()
            .push(record.clone());

        Ok(record)
    }

    async fn delete_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<bool, PersistenceError> {
        let mut inner = self.inner.write().await;
        Self::injected(&inner, FailPoint::Delete(collection))?;

        let records = inner.collections.entry(collection).or_default();
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok(records.len() < before)
    }

    async fn select_records(
        &self,
        collection: Collection,
        options: &SelectOptions,
    ) -> Result<Vec<Record>, PersistenceError> {
        let inner = self.inner.read().await;
        Self::injected(&inner, FailPoint::Select(collection))?;

        for (column, _) in &options.filters {
            if !collection.has_column(column) {
                return Err(PersistenceError::UnknownColumn {
                    collection: collection.to_string(),
                    column: column.clone(),
                });
            }
        }

        let matches = |record: &&Record| {
            options.filters.iter().all(|(column, value)| {
                if column == "id" {
                    record.id == *value
                } else {
                    record.get_str(column) == Some(value.as_str())
                }
            })
        };

        Ok(inner
            .collections
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(matches)
                    .skip(options.offset)
                    .take(options.limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool, PersistenceError> {
        let inner = self.inner.read().await;
        Ok(inner.tables.contains_key(&table_name.to_lowercase())
            || crate::domain::is_internal_table(table_name))
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}
