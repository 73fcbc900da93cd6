//! Form and field definitions
//!
//! A [`FormDefinition`] is the persisted, machine-readable description of one
//! dynamically provisioned data-entry form. Its field list is serialized with
//! camelCase keys (`validationRules`, `calculationFormula`,
//! `visibilityCondition`) because it is read back by the data-entry renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage/input type of a field
///
/// The set is closed. Free-text labels coming from imports or stored records
/// are mapped onto it by [`FieldType::from_label`], which never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }

    /// Map an open-ended type label onto the closed type set.
    ///
    /// Unknown labels fall back to [`FieldType::Text`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "number" | "numeric" | "int" | "integer" | "decimal" | "float" | "double" => {
                Self::Number
            }
            "date" | "datetime" | "timestamp" => Self::Date,
            "boolean" | "bool" | "checkbox" | "yes/no" => Self::Boolean,
            _ => Self::Text,
        }
    }

    /// Text fields take length-based min/max and a pattern
    pub fn supports_length_rules(&self) -> bool {
        matches!(self, Self::Text)
    }

    pub fn supports_formula(&self) -> bool {
        matches!(self, Self::Number)
    }
}

impl From<String> for FieldType {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation rules attached to a field
///
/// `min`/`max` compare the numeric value for number fields and the character
/// length for text fields. `pattern` applies to text fields only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ValidationRules {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Drop the type-dependent sub-fields, keeping `required`.
    ///
    /// `min`/`max` mean a length for text and a value for numbers, so they
    /// never survive a type change.
    pub fn reset_type_dependent(&mut self) {
        self.min = None;
        self.max = None;
        self.pattern = None;
    }

    pub fn is_empty(&self) -> bool {
        !self.required && self.min.is_none() && self.max.is_none() && self.pattern.is_none()
    }
}

/// Comparison used by a visibility condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
}

/// Shows a field only when another field's current value matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityCondition {
    pub parent_field: String,
    pub operator: ConditionOperator,
    pub value: String,
}

impl VisibilityCondition {
    pub fn equals(parent_field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parent_field: parent_field.into(),
            operator: ConditionOperator::Equals,
            value: value.into(),
        }
    }

    pub fn not_equals(parent_field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parent_field: parent_field.into(),
            operator: ConditionOperator::NotEquals,
            value: value.into(),
        }
    }

    /// Compare the parent's current value against the condition literal
    pub fn matches(&self, parent_value: &str) -> bool {
        match self.operator {
            ConditionOperator::Equals => parent_value == self.value,
            ConditionOperator::NotEquals => parent_value != self.value,
        }
    }
}

/// Full design-time description of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Storage-safe identifier, unique within the form (case-insensitively)
    pub name: String,
    /// Display label, independent of `name`
    pub label: String,
    /// Zero-based ordinal for both column order and render order
    pub position: usize,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<ValidationRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation_formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_condition: Option<VisibilityCondition>,
}

impl FieldDefinition {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        position: usize,
        field_type: FieldType,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            position,
            field_type,
            validation_rules: None,
            calculation_formula: None,
            visibility_condition: None,
        }
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.validation_rules = Some(rules);
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.calculation_formula = Some(formula.into());
        self
    }

    pub fn with_visibility(mut self, condition: VisibilityCondition) -> Self {
        self.visibility_condition = Some(condition);
        self
    }

    pub fn is_required(&self) -> bool {
        self.validation_rules.as_ref().is_some_and(|r| r.required)
    }

    /// Switch the field type, resetting the rule sections that depend on it.
    /// Setting the current type again changes nothing.
    pub fn set_type(&mut self, field_type: FieldType) {
        if field_type == self.field_type {
            return;
        }
        self.field_type = field_type;
        if let Some(rules) = self.validation_rules.as_mut() {
            rules.reset_type_dependent();
            if rules.is_empty() {
                self.validation_rules = None;
            }
        }
        if !field_type.supports_formula() {
            self.calculation_formula = None;
        }
    }
}

/// Persisted schema and metadata of one published form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    /// Record id assigned by the store on publish
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Storage table name; immutable once provisioned
    pub table_name: String,
    pub label: String,
    pub fields: Vec<FieldDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_entry_id: Option<String>,
    pub dashboard_entry_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl FormDefinition {
    /// Look up a field by name, case-insensitively
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|field| field.name.eq_ignore_ascii_case(name))
    }

    /// Fields sorted by `position`
    pub fn ordered_fields(&self) -> Vec<&FieldDefinition> {
        let mut fields: Vec<&FieldDefinition> = self.fields.iter().collect();
        fields.sort_by_key(|field| field.position);
        fields
    }

    /// Sort fields by position and renumber them densely from zero
    pub fn normalize_positions(&mut self) {
        self.fields.sort_by_key(|field| field.position);
        for (position, field) in self.fields.iter_mut().enumerate() {
            field.position = position;
        }
    }
}
