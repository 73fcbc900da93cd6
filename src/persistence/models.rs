//! Row models for the internal collections
//!
//! Every column is stored as text; these types convert between domain
//! values and the key/value maps the repository reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{FieldDefinition, FormDefinition, NavigationEntry};
use crate::persistence::error::PersistenceError;
use crate::persistence::repository::Record;

/// Form definition as stored in `form_definitions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDefinitionRow {
    pub table_name: String,
    pub label: String,
    pub navigation_entry_id: Option<String>,
    pub dashboard_entry_id: String,
    pub district_id: Option<String>,
    /// JSON serialized field list
    pub fields: String,
    pub created_by: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
}

impl FormDefinitionRow {
    pub fn from_definition(definition: &FormDefinition) -> Result<Self, PersistenceError> {
        let fields = definition.ordered_fields();

        Ok(Self {
            table_name: definition.table_name.clone(),
            label: definition.label.clone(),
            navigation_entry_id: definition.navigation_entry_id.clone(),
            dashboard_entry_id: definition.dashboard_entry_id.clone(),
            district_id: definition.district_id.clone(),
            fields: serde_json::to_string(&fields)?,
            created_by: definition.created_by.clone(),
            created_at: definition.created_at.to_rfc3339(),
        })
    }

    pub fn into_fields(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("table_name".into(), Value::String(self.table_name));
        map.insert("label".into(), Value::String(self.label));
        map.insert("navigation_entry_id".into(), optional(self.navigation_entry_id));
        map.insert("dashboard_entry_id".into(), Value::String(self.dashboard_entry_id));
        map.insert("district_id".into(), optional(self.district_id));
        map.insert("fields".into(), Value::String(self.fields));
        map.insert("created_by".into(), Value::String(self.created_by));
        map.insert("created_at".into(), Value::String(self.created_at));
        map
    }

    pub fn from_record(record: &Record) -> Result<Self, PersistenceError> {
        Ok(Self {
            table_name: required(record, "table_name")?,
            label: record.get_str("label").unwrap_or_default().to_string(),
            navigation_entry_id: record.get_str("navigation_entry_id").map(str::to_string),
            dashboard_entry_id: record
                .get_str("dashboard_entry_id")
                .unwrap_or_default()
                .to_string(),
            district_id: record.get_str("district_id").map(str::to_string),
            fields: record.get_str("fields").unwrap_or("[]").to_string(),
            created_by: record.get_str("created_by").unwrap_or_default().to_string(),
            created_at: record.get_str("created_at").unwrap_or_default().to_string(),
        })
    }

    /// Rebuild the domain definition. Fields come back in position order.
    pub fn into_definition(self, id: String) -> Result<FormDefinition, PersistenceError> {
        let mut fields: Vec<FieldDefinition> = serde_json::from_str(&self.fields)?;
        fields.sort_by_key(|field| field.position);

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| {
                PersistenceError::Serialization(format!(
                    "invalid created_at '{}' for form '{}': {}",
                    self.created_at, self.table_name, e
                ))
            })?;

        Ok(FormDefinition {
            id: Some(id),
            table_name: self.table_name,
            label: self.label,
            fields,
            navigation_entry_id: self.navigation_entry_id,
            dashboard_entry_id: self.dashboard_entry_id,
            district_id: self.district_id,
            created_by: self.created_by,
            created_at,
        })
    }
}

/// Navigation entry as stored in `navigation_entries`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationEntryRow {
    pub parent_id: String,
    pub label: String,
    pub icon: String,
    pub url: String,
    pub form_table: String,
    pub created_at: String,
}

impl NavigationEntryRow {
    pub fn from_entry(entry: &NavigationEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            parent_id: entry.parent_id.clone(),
            label: entry.label.clone(),
            icon: entry.icon.clone(),
            url: entry.url.clone(),
            form_table: entry.form_table.clone(),
            created_at: created_at.to_rfc3339(),
        }
    }

    pub fn into_fields(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("parent_id".into(), Value::String(self.parent_id));
        map.insert("label".into(), Value::String(self.label));
        map.insert("icon".into(), Value::String(self.icon));
        map.insert("url".into(), Value::String(self.url));
        map.insert("form_table".into(), Value::String(self.form_table));
        map.insert("created_at".into(), Value::String(self.created_at));
        map
    }

    pub fn entry_from_record(record: &Record) -> NavigationEntry {
        let text = |column: &str| record.get_str(column).unwrap_or_default().to_string();
        NavigationEntry {
            id: Some(record.id.clone()),
            parent_id: text("parent_id"),
            label: text("label"),
            icon: text("icon"),
            url: text("url"),
            form_table: text("form_table"),
        }
    }
}

/// One row of `deletion_log`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionLogRow {
    pub table_name: String,
    pub requested_by: String,
    pub attempted_at: String,
}

impl DeletionLogRow {
    pub fn new(table_name: &str, requested_by: &str, attempted_at: DateTime<Utc>) -> Self {
        Self {
            table_name: table_name.to_string(),
            requested_by: requested_by.to_string(),
            attempted_at: attempted_at.to_rfc3339(),
        }
    }

    pub fn into_fields(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("table_name".into(), Value::String(self.table_name));
        map.insert("requested_by".into(), Value::String(self.requested_by));
        map.insert("attempted_at".into(), Value::String(self.attempted_at));
        map
    }
}

fn optional(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

fn required(record: &Record, column: &str) -> Result<String, PersistenceError> {
    record
        .get_str(column)
        .map(str::to_string)
        .ok_or_else(|| {
            PersistenceError::Serialization(format!(
                "record '{}' is missing column '{}'",
                record.id, column
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldType, ValidationRules, VisibilityCondition};

    fn definition() -> FormDefinition {
        FormDefinition {
            id: None,
            table_name: "crop_survey".to_string(),
            label: "Crop Survey".to_string(),
            fields: vec![
                FieldDefinition::new("total", "Total", 2, FieldType::Number)
                    .with_formula("qty * price"),
                FieldDefinition::new("qty", "Quantity", 0, FieldType::Number)
                    .with_rules(ValidationRules::required().with_range(Some(0.0), Some(1000.0))),
                FieldDefinition::new("price", "Price", 1, FieldType::Number)
                    .with_visibility(VisibilityCondition::equals("qty", "1")),
            ],
            navigation_entry_id: Some("nav-1".to_string()),
            dashboard_entry_id: "dash".to_string(),
            district_id: None,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_definition_survives_storage() {
        let original = definition();
        let row = FormDefinitionRow::from_definition(&original).unwrap();
        let record = Record {
            id: "def-1".to_string(),
            fields: row.into_fields(),
        };

        let restored = FormDefinitionRow::from_record(&record)
            .unwrap()
            .into_definition(record.id.clone())
            .unwrap();

        let mut expected = original.fields.clone();
        expected.sort_by_key(|field| field.position);
        assert_eq!(restored.fields, expected);
        assert_eq!(restored.id.as_deref(), Some("def-1"));
        assert_eq!(restored.district_id, None);
        assert_eq!(restored.created_at, original.created_at);
    }

    #[test]
    fn test_missing_table_name_is_rejected() {
        let record = Record {
            id: "x".to_string(),
            fields: Map::new(),
        };
        assert!(matches!(
            FormDefinitionRow::from_record(&record),
            Err(PersistenceError::Serialization(_))
        ));
    }

    #[test]
    fn test_navigation_entry_from_record() {
        let entry =
            NavigationEntry::for_form("forms", "table", "/forms/", "crop_survey", "Crop Survey");
        let record = Record {
            id: "nav-9".to_string(),
            fields: NavigationEntryRow::from_entry(&entry, Utc::now()).into_fields(),
        };
        let restored = NavigationEntryRow::entry_from_record(&record);
        assert_eq!(restored.id.as_deref(), Some("nav-9"));
        assert_eq!(restored.url, "/forms/crop_survey");
        assert_eq!(restored.form_table, "crop_survey");
    }
}
