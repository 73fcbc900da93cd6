//! Storage type mapping and data-definition statements
//!
//! Every identifier that reaches a statement goes through [`quote_ident`].

use serde::Serialize;

use crate::domain::{is_reserved_column, FieldType, FormDefinition};
use crate::persistence::pool::DatabaseBackend;
use crate::schema::builder::is_valid_identifier;
use crate::schema::error::DesignValidationError;

/// Quote an identifier for the given backend, escaping embedded quotes
pub fn quote_ident(backend: DatabaseBackend, name: &str) -> String {
    match backend {
        DatabaseBackend::Mysql => format!("`{}`", name.replace('`', "``")),
        DatabaseBackend::Sqlite | DatabaseBackend::Postgres => {
            format!("\"{}\"", name.replace('"', "\"\""))
        }
    }
}

/// Maps field types to backend column types
#[derive(Debug, Clone, Copy)]
pub struct TypeMapper {
    backend: DatabaseBackend,
}

impl TypeMapper {
    pub fn new(backend: DatabaseBackend) -> Self {
        Self { backend }
    }

    pub fn storage_type(&self, field_type: FieldType) -> &'static str {
        match (field_type, self.backend) {
            (FieldType::Text, _) => "TEXT",
            (FieldType::Number, DatabaseBackend::Mysql) => "DECIMAL(20,6)",
            (FieldType::Number, _) => "NUMERIC",
            (FieldType::Date, _) => "DATE",
            (FieldType::Boolean, _) => "BOOLEAN",
        }
    }

    /// Storage type for a free-text type label; unknown labels map to text
    pub fn storage_type_for_label(&self, label: &str) -> &'static str {
        self.storage_type(FieldType::from_label(label))
    }
}

/// One declared column of a storage table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub declaration: String,
    pub system: bool,
}

/// Builds create/drop statements for storage tables
#[derive(Debug, Clone, Copy)]
pub struct DdlGenerator {
    backend: DatabaseBackend,
    types: TypeMapper,
}

impl DdlGenerator {
    pub fn new(backend: DatabaseBackend) -> Self {
        Self {
            backend,
            types: TypeMapper::new(backend),
        }
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub fn quote(&self, name: &str) -> String {
        quote_ident(self.backend, name)
    }

    /// Identity key, creation timestamp, creator and owning district
    pub fn system_columns(&self) -> Vec<ColumnSpec> {
        let id = match self.backend {
            DatabaseBackend::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            DatabaseBackend::Postgres => "BIGSERIAL PRIMARY KEY",
            DatabaseBackend::Mysql => "BIGINT AUTO_INCREMENT PRIMARY KEY",
        };

        [
            ("id", id),
            ("created_at", "TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP"),
            ("created_by", "VARCHAR(255)"),
            ("district_id", "VARCHAR(255)"),
        ]
        .into_iter()
        .map(|(name, declaration)| ColumnSpec {
            name: name.to_string(),
            declaration: declaration.to_string(),
            system: true,
        })
        .collect()
    }

    /// System columns followed by one column per field in position order
    pub fn columns(&self, definition: &FormDefinition) -> Vec<ColumnSpec> {
        let mut columns = self.system_columns();
        columns.extend(definition.ordered_fields().into_iter().map(|field| ColumnSpec {
            name: field.name.clone(),
            declaration: self.types.storage_type(field.field_type).to_string(),
            system: false,
        }));
        columns
    }

    /// Single statement creating the definition's storage table.
    ///
    /// Deliberately not `IF NOT EXISTS`: a name already taken must fail.
    pub fn build_create_statement(
        &self,
        definition: &FormDefinition,
    ) -> Result<String, DesignValidationError> {
        if !is_valid_identifier(&definition.table_name) {
            return Err(DesignValidationError::InvalidTableName {
                name: definition.table_name.clone(),
            });
        }
        if let Some(field) = definition
            .fields
            .iter()
            .find(|field| is_reserved_column(&field.name))
        {
            return Err(DesignValidationError::ReservedName {
                name: field.name.clone(),
            });
        }

        let columns: Vec<String> = self
            .columns(definition)
            .iter()
            .map(|column| format!("{} {}", self.quote(&column.name), column.declaration))
            .collect();

        Ok(format!(
            "CREATE TABLE {} ({})",
            self.quote(&definition.table_name),
            columns.join(", ")
        ))
    }

    /// Drop statement, safe to run against an already-dropped table
    pub fn build_drop_statement(&self, table_name: &str) -> String {
        match self.backend {
            DatabaseBackend::Sqlite => format!("DROP TABLE IF EXISTS {}", self.quote(table_name)),
            DatabaseBackend::Postgres | DatabaseBackend::Mysql => {
                format!("DROP TABLE IF EXISTS {} CASCADE", self.quote(table_name))
            }
        }
    }

    /// Query that succeeds only when the table exists, without reading rows
    pub fn build_exists_probe(&self, table_name: &str) -> String {
        format!("SELECT 1 FROM {} WHERE 1 = 0", self.quote(table_name))
    }
}
