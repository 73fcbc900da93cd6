//! Rule evaluation for data entry
//!
//! Everything here is a pure function of a [`FormDefinition`] and the current
//! entry values, so a renderer can call it on every change without keeping
//! state between calls.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::{FieldDefinition, FieldType, FormDefinition};
use crate::schema::error::{EntryValidationError, FormulaError};
use crate::schema::formula::Formula;
use crate::schema::values::{numeric_or_zero, parse_boolean, parse_date, parse_number};

/// Current raw values of an entry, keyed by field name
pub type EntryValues = HashMap<String, String>;

/// Whether `field` is visible for the given values.
///
/// A field without a condition is visible. Otherwise its condition must hold
/// and its parent field must itself be visible.
pub fn is_visible(
    definition: &FormDefinition,
    field: &FieldDefinition,
    values: &EntryValues,
) -> bool {
    let mut current = field;
    let mut visited: HashSet<&str> = HashSet::new();

    loop {
        let Some(condition) = &current.visibility_condition else {
            return true;
        };
        if !visited.insert(current.name.as_str()) {
            // Cyclic chain; publish rejects these, treat as hidden.
            return false;
        }

        // Field names match case-insensitively, as in design validation
        let parent = definition.field(&condition.parent_field);
        let key = parent.map_or(condition.parent_field.as_str(), |p| p.name.as_str());
        if !condition.matches(entry_value(values, key).unwrap_or("")) {
            return false;
        }

        match parent {
            Some(parent) => current = parent,
            None => return true,
        }
    }
}

/// Value of a computed field, or `None` when the field has no formula
pub fn computed_value(
    field: &FieldDefinition,
    values: &EntryValues,
) -> Result<Option<f64>, FormulaError> {
    let Some(source) = &field.calculation_formula else {
        return Ok(None);
    };
    let formula = Formula::parse(source)?;
    Ok(Some(formula.evaluate(|name| lookup_numeric(values, name))))
}

fn lookup_numeric(values: &EntryValues, name: &str) -> f64 {
    numeric_or_zero(entry_value(values, name))
}

/// Raw value of `name`, matched exactly first and then case-insensitively
fn entry_value<'a>(values: &'a EntryValues, name: &str) -> Option<&'a str> {
    values
        .get(name)
        .or_else(|| {
            values
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
        .map(String::as_str)
}

/// Validate one raw value against a field's rules.
///
/// Rules apply in order: required, type, min/max, pattern. A blank optional
/// value passes, and a value of the wrong type is not range-checked.
pub fn validate(field: &FieldDefinition, value: &str) -> Vec<String> {
    let label = if field.label.trim().is_empty() {
        field.name.as_str()
    } else {
        field.label.as_str()
    };
    let rules = field.validation_rules.clone().unwrap_or_default();
    let value = value.trim();
    let mut violations = Vec::new();

    if value.is_empty() {
        if rules.required {
            violations.push(format!("{} is required", label));
        }
        return violations;
    }

    match field.field_type {
        FieldType::Number => {
            let Some(number) = parse_number(value) else {
                violations.push(format!("{} must be a number", label));
                return violations;
            };
            if let Some(min) = rules.min {
                if number < min {
                    violations.push(format!("{} must be at least {}", label, min));
                }
            }
            if let Some(max) = rules.max {
                if number > max {
                    violations.push(format!("{} must be at most {}", label, max));
                }
            }
        }
        FieldType::Text => {
            let length = value.chars().count() as f64;
            if let Some(min) = rules.min {
                if length < min {
                    violations.push(format!("{} must be at least {} characters", label, min));
                }
            }
            if let Some(max) = rules.max {
                if length > max {
                    violations.push(format!("{} must be at most {} characters", label, max));
                }
            }
            if let Some(pattern) = &rules.pattern {
                match Regex::new(pattern) {
                    Ok(regex) if regex.is_match(value) => {}
                    Ok(_) => {
                        violations.push(format!("{} does not match the required format", label))
                    }
                    Err(_) => {
                        violations.push(format!("{} has an invalid validation pattern", label))
                    }
                }
            }
        }
        FieldType::Date => {
            if parse_date(value).is_none() {
                violations.push(format!("{} must be a valid date (YYYY-MM-DD)", label));
            }
        }
        FieldType::Boolean => {
            if parse_boolean(value).is_none() {
                violations.push(format!("{} must be yes or no", label));
            }
        }
    }

    violations
}

/// Visibility, computed values and violations for a whole entry
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntryEvaluation {
    pub visibility: BTreeMap<String, bool>,
    pub computed: BTreeMap<String, f64>,
    pub violations: BTreeMap<String, Vec<String>>,
}

impl EntryEvaluation {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_result(self) -> Result<Self, EntryValidationError> {
        if self.violations.is_empty() {
            Ok(self)
        } else {
            Err(EntryValidationError {
                violations: self.violations,
            })
        }
    }
}

/// Evaluate a full entry.
///
/// Computed fields are evaluated in dependency order so a formula may use
/// another computed field. Every visible field is validated and all
/// violations are collected; hidden fields are skipped.
pub fn evaluate_entry(definition: &FormDefinition, values: &EntryValues) -> EntryEvaluation {
    let mut working = values.clone();
    let mut evaluation = EntryEvaluation::default();

    for field in computation_order(definition) {
        match computed_value(field, &working) {
            Ok(Some(value)) => {
                working.insert(field.name.clone(), value.to_string());
                evaluation.computed.insert(field.name.clone(), value);
            }
            Ok(None) => {}
            Err(e) => {
                evaluation
                    .violations
                    .entry(field.name.clone())
                    .or_default()
                    .push(format!("{} cannot be calculated: {}", field.label, e));
            }
        }
    }

    for field in definition.ordered_fields() {
        let visible = is_visible(definition, field, &working);
        evaluation.visibility.insert(field.name.clone(), visible);
        if !visible {
            continue;
        }

        let value = entry_value(&working, &field.name).unwrap_or("");
        let violations = validate(field, value);
        if !violations.is_empty() {
            evaluation
                .violations
                .entry(field.name.clone())
                .or_default()
                .extend(violations);
        }
    }

    evaluation
}

/// Validate every visible field, collecting all violations
pub fn validate_entry(
    definition: &FormDefinition,
    values: &EntryValues,
) -> Result<(), EntryValidationError> {
    evaluate_entry(definition, values).into_result().map(|_| ())
}

/// Formula fields ordered so each comes after the formula fields it reads
fn computation_order(definition: &FormDefinition) -> Vec<&FieldDefinition> {
    let formula_fields: Vec<&FieldDefinition> = definition
        .ordered_fields()
        .into_iter()
        .filter(|field| field.calculation_formula.is_some())
        .collect();

    let dependencies: HashMap<&str, Vec<String>> = formula_fields
        .iter()
        .map(|field| {
            let refs = field
                .calculation_formula
                .as_deref()
                .and_then(|source| Formula::parse(source).ok())
                .map(|formula| formula.references())
                .unwrap_or_default();
            (field.name.as_str(), refs)
        })
        .collect();

    let mut ordered: Vec<&FieldDefinition> = Vec::with_capacity(formula_fields.len());
    let mut done: HashSet<String> = HashSet::new();

    // Repeatedly take every field whose computed dependencies are settled;
    // anything left after a pass with no progress is cyclic and goes last.
    let mut remaining = formula_fields;
    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&FieldDefinition>, Vec<&FieldDefinition>) =
            remaining.iter().partition(|field| {
                dependencies[field.name.as_str()].iter().all(|dep| {
                    done.contains(dep)
                        || dep.eq_ignore_ascii_case(&field.name)
                        || !dependencies
                            .keys()
                            .any(|name| name.eq_ignore_ascii_case(dep))
                })
            });

        if ready.is_empty() {
            ordered.extend(blocked);
            break;
        }
        for field in &ready {
            done.insert(field.name.to_ascii_lowercase());
        }
        ordered.extend(ready);
        remaining = blocked;
    }

    ordered
}
