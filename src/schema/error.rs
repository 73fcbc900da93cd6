//! Design-time and entry-time error types

use std::collections::BTreeMap;
use thiserror::Error;

/// A problem in a draft form that blocks publishing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignValidationError {
    #[error("Field #{position} is missing a {attribute}")]
    MissingAttribute {
        position: usize,
        attribute: &'static str,
    },

    #[error(
        "Field '{name}' is not a valid identifier (use lowercase letters, digits and underscores)"
    )]
    InvalidIdentifier { name: String },

    #[error("Field name '{name}' is reserved for a system column")]
    ReservedName { name: String },

    #[error("Field name '{name}' is used more than once")]
    DuplicateName { name: String },

    #[error("Field '{field}' references unknown field '{target}' in its {rule}")]
    UnknownReference {
        field: String,
        target: String,
        rule: &'static str,
    },

    #[error("Field '{field}' references itself in its {rule}")]
    SelfReference { field: String, rule: &'static str },

    #[error("Field '{field}' has an invalid formula: {reason}")]
    InvalidFormula { field: String, reason: String },

    #[error("Field '{field}' has a formula but is not a number field")]
    FormulaOnNonNumber { field: String },

    #[error("Field '{field}' has a pattern but is not a text field")]
    PatternOnNonText { field: String },

    #[error("Field '{field}' has an invalid pattern: {reason}")]
    InvalidPattern { field: String, reason: String },

    #[error("Field '{field}' has min greater than max")]
    InvertedRange { field: String },

    #[error("Circular {rule} dependency: {}", .cycle.join(" -> "))]
    DependencyCycle { rule: &'static str, cycle: Vec<String> },

    #[error("Table name is missing")]
    MissingTableName,

    #[error("Table name '{name}' is not a valid identifier")]
    InvalidTableName { name: String },

    #[error("Table name '{name}' is reserved")]
    ReservedTableName { name: String },

    #[error("Form has no fields")]
    NoFields,
}

/// Errors raised while parsing a calculation formula
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: &'static str },

    #[error("formula is empty")]
    Empty,

    #[error("formula nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("formula has more than {limit} tokens")]
    TooLong { limit: usize },
}

/// Every violation found while validating a data-entry submission
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
#[error("{} field(s) failed validation", .violations.len())]
pub struct EntryValidationError {
    /// Violation messages keyed by field name
    pub violations: BTreeMap<String, Vec<String>>,
}

impl EntryValidationError {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.violations.values().flatten().cloned().collect()
    }
}

/// Errors raised by edit operations on a design session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignerError {
    #[error("No field at index {0}")]
    FieldIndexOutOfRange(usize),
}
