//! Draft field list from an imported header row
//!
//! The import contract is a grid of string cells whose first row holds the
//! column headers. Any rows below the header are used only as samples for
//! type inference.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::domain::{FieldDefinition, FieldType, SYSTEM_COLUMNS};
use crate::schema::values::{looks_boolean, parse_date, parse_number};

/// Longest identifier accepted by every supported backend (PostgreSQL: 63)
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Strip everything but ASCII letters, digits and underscores, then lower-case.
///
/// May return an empty string; callers supply their own fallback.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut name: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_ascii_lowercase();
    name.truncate(MAX_IDENTIFIER_LEN);
    name
}

/// Sanitize an admin-supplied table name, falling back to a timestamped name
pub fn sanitize_table_name(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let name = raw.map(sanitize_identifier).unwrap_or_default();
    if name.is_empty() {
        format!("form_{}", now.format("%Y%m%d%H%M%S"))
    } else {
        name
    }
}

/// Whether `name` is already in sanitized form
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && sanitize_identifier(name) == name
}

/// Case-insensitive set of claimed identifiers
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    seen: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the system column names already claimed
    pub fn with_reserved() -> Self {
        let mut registry = Self::new();
        for column in SYSTEM_COLUMNS {
            registry.seen.insert(column.to_string());
        }
        registry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(&name.to_ascii_lowercase())
    }

    /// Claim `candidate`, appending `_1`, `_2`, ... until the name is unique
    pub fn claim(&mut self, candidate: &str) -> String {
        if !self.contains(candidate) {
            self.seen.insert(candidate.to_ascii_lowercase());
            return candidate.to_string();
        }

        let mut n = 1usize;
        loop {
            let suffix = format!("_{}", n);
            let mut base = candidate.to_string();
            base.truncate(MAX_IDENTIFIER_LEN.saturating_sub(suffix.len()));
            let name = format!("{}{}", base, suffix);
            if !self.contains(&name) {
                self.seen.insert(name.to_ascii_lowercase());
                return name;
            }
            n += 1;
        }
    }
}

/// Turns an imported grid into draft field descriptors
#[derive(Debug, Clone)]
pub struct FieldSchemaBuilder {
    infer_types: bool,
    sample_rows: usize,
}

impl Default for FieldSchemaBuilder {
    fn default() -> Self {
        Self {
            infer_types: true,
            sample_rows: 50,
        }
    }
}

impl FieldSchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable type inference from the rows below the header
    pub fn infer_types(mut self, enabled: bool) -> Self {
        self.infer_types = enabled;
        self
    }

    /// Maximum number of data rows inspected per column
    pub fn sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows;
        self
    }

    /// Build one field per header cell. An empty grid yields no fields.
    pub fn build(&self, grid: &[Vec<String>]) -> Vec<FieldDefinition> {
        let Some(headers) = grid.first() else {
            return Vec::new();
        };

        let mut registry = NameRegistry::with_reserved();

        headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                let trimmed = header.trim();
                let label = if trimmed.is_empty() {
                    format!("Column {}", index + 1)
                } else {
                    trimmed.to_string()
                };

                let mut candidate = sanitize_identifier(header);
                if candidate.is_empty() {
                    candidate = format!("column_{}", index + 1);
                }
                let name = registry.claim(&candidate);

                let field_type = if self.infer_types {
                    let samples = grid
                        .iter()
                        .skip(1)
                        .take(self.sample_rows)
                        .filter_map(|row| row.get(index))
                        .map(String::as_str);
                    infer_column_type(samples)
                } else {
                    FieldType::Text
                };

                FieldDefinition::new(name, label, index, field_type)
            })
            .collect()
    }
}

fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> FieldType {
    let samples: Vec<&str> = cells.map(str::trim).filter(|c| !c.is_empty()).collect();
    if samples.is_empty() {
        return FieldType::Text;
    }

    if samples.iter().all(|cell| looks_boolean(cell)) {
        FieldType::Boolean
    } else if samples.iter().all(|cell| parse_number(cell).is_some()) {
        FieldType::Number
    } else if samples.iter().all(|cell| parse_date(cell).is_some()) {
        FieldType::Date
    } else {
        FieldType::Text
    }
}
