//! Editable form design session
//!
//! A [`SchemaDesigner`] owns the draft field list of one design session. All
//! state lives on the instance; nothing is shared between sessions.

use chrono::Utc;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::domain::{
    is_internal_table, is_reserved_column, FieldDefinition, FieldType, FormDefinition,
    ValidationRules, VisibilityCondition,
};
use crate::schema::builder::{
    is_valid_identifier, sanitize_identifier, sanitize_table_name, FieldSchemaBuilder,
    NameRegistry,
};
use crate::schema::error::{DesignValidationError, DesignerError};
use crate::schema::formula::{rename_reference, Formula};

/// Metadata supplied at publish time
#[derive(Debug, Clone)]
pub struct DefinitionMetadata {
    pub dashboard_entry_id: String,
    pub district_id: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct SchemaDesigner {
    table_name: String,
    label: String,
    fields: Vec<FieldDefinition>,
    reference_targets: Vec<Vec<String>>,
}

impl SchemaDesigner {
    pub fn new(
        table_name: impl Into<String>,
        label: impl Into<String>,
        fields: Vec<FieldDefinition>,
    ) -> Self {
        let mut designer = Self {
            table_name: table_name.into(),
            label: label.into(),
            fields,
            reference_targets: Vec::new(),
        };
        designer.renumber();
        designer
    }

    /// Start a session from an imported grid (row 0 = headers)
    pub fn from_grid(grid: &[Vec<String>], table_name: Option<&str>, label: Option<&str>) -> Self {
        let fields = FieldSchemaBuilder::new().build(grid);
        let table_name = sanitize_table_name(table_name, Utc::now());
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| table_name.clone());
        Self::new(table_name, label, fields)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn set_table_name(&mut self, raw: &str) -> &str {
        self.table_name = sanitize_table_name(Some(raw), Utc::now());
        &self.table_name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_form_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldDefinition> {
        self.fields.get(index)
    }

    /// Names the field at `index` may reference: every other field's name
    pub fn reference_targets(&self, index: usize) -> &[String] {
        self.reference_targets
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_reference_targets(&self) -> &[Vec<String>] {
        &self.reference_targets
    }

    pub fn set_label(
        &mut self,
        index: usize,
        label: impl Into<String>,
    ) -> Result<(), DesignerError> {
        self.field_mut(index)?.label = label.into();
        Ok(())
    }

    /// Rename a field, resolving collisions against the other fields and the
    /// system columns. References held by other fields follow the rename.
    pub fn rename_field(&mut self, index: usize, raw: &str) -> Result<String, DesignerError> {
        let old = self.field_mut(index)?.name.clone();

        let mut registry = NameRegistry::with_reserved();
        for (i, field) in self.fields.iter().enumerate() {
            if i != index {
                registry.claim(&field.name);
            }
        }

        let mut candidate = sanitize_identifier(raw);
        if candidate.is_empty() {
            candidate = format!("column_{}", index + 1);
        }
        let new = registry.claim(&candidate);

        if new != old {
            for (i, field) in self.fields.iter_mut().enumerate() {
                if i == index {
                    field.name = new.clone();
                    continue;
                }
                if let Some(condition) = field.visibility_condition.as_mut() {
                    if condition.parent_field.eq_ignore_ascii_case(&old) {
                        condition.parent_field = new.clone();
                    }
                }
                if let Some(formula) = field.calculation_formula.as_mut() {
                    *formula = rename_reference(formula, &old, &new);
                }
            }
            self.refresh_targets();
        }

        Ok(new)
    }

    /// Change a field's type, resetting the rule sections that depend on it
    pub fn set_field_type(
        &mut self,
        index: usize,
        field_type: FieldType,
    ) -> Result<(), DesignerError> {
        self.field_mut(index)?.set_type(field_type);
        Ok(())
    }

    pub fn set_validation(
        &mut self,
        index: usize,
        rules: Option<ValidationRules>,
    ) -> Result<(), DesignerError> {
        self.field_mut(index)?.validation_rules = rules.filter(|r| !r.is_empty());
        Ok(())
    }

    pub fn set_formula(
        &mut self,
        index: usize,
        formula: Option<String>,
    ) -> Result<(), DesignerError> {
        self.field_mut(index)?.calculation_formula = formula
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        Ok(())
    }

    pub fn set_visibility(
        &mut self,
        index: usize,
        condition: Option<VisibilityCondition>,
    ) -> Result<(), DesignerError> {
        self.field_mut(index)?.visibility_condition = condition;
        Ok(())
    }

    /// Append a field named after its label; returns its index
    pub fn add_field(&mut self, label: &str, field_type: FieldType) -> usize {
        let index = self.fields.len();
        let mut registry = NameRegistry::with_reserved();
        for field in &self.fields {
            registry.claim(&field.name);
        }

        let mut candidate = sanitize_identifier(label);
        if candidate.is_empty() {
            candidate = format!("column_{}", index + 1);
        }
        let name = registry.claim(&candidate);
        let label = if label.trim().is_empty() {
            format!("Column {}", index + 1)
        } else {
            label.trim().to_string()
        };

        self.fields
            .push(FieldDefinition::new(name, label, index, field_type));
        self.refresh_targets();
        index
    }

    /// Remove a field. References to it are left in place and reported by
    /// [`SchemaDesigner::validate_before_publish`].
    pub fn remove_field(&mut self, index: usize) -> Result<FieldDefinition, DesignerError> {
        if index >= self.fields.len() {
            return Err(DesignerError::FieldIndexOutOfRange(index));
        }
        let removed = self.fields.remove(index);
        self.renumber();
        Ok(removed)
    }

    pub fn move_field(&mut self, from: usize, to: usize) -> Result<(), DesignerError> {
        let len = self.fields.len();
        if from >= len {
            return Err(DesignerError::FieldIndexOutOfRange(from));
        }
        if to >= len {
            return Err(DesignerError::FieldIndexOutOfRange(to));
        }
        let field = self.fields.remove(from);
        self.fields.insert(to, field);
        self.renumber();
        Ok(())
    }

    pub fn validate_before_publish(&self) -> Vec<DesignValidationError> {
        validate_design(&self.table_name, &self.fields)
    }

    /// Produce the definition to publish, or every design error found
    pub fn to_definition(
        &self,
        metadata: DefinitionMetadata,
    ) -> Result<FormDefinition, Vec<DesignValidationError>> {
        let errors = self.validate_before_publish();
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(FormDefinition {
            id: None,
            table_name: self.table_name.clone(),
            label: self.label.clone(),
            fields: self.fields.clone(),
            navigation_entry_id: None,
            dashboard_entry_id: metadata.dashboard_entry_id,
            district_id: metadata.district_id,
            created_by: metadata.created_by,
            created_at: Utc::now(),
        })
    }

    fn field_mut(&mut self, index: usize) -> Result<&mut FieldDefinition, DesignerError> {
        self.fields
            .get_mut(index)
            .ok_or(DesignerError::FieldIndexOutOfRange(index))
    }

    fn renumber(&mut self) {
        for (position, field) in self.fields.iter_mut().enumerate() {
            field.position = position;
        }
        self.refresh_targets();
    }

    fn refresh_targets(&mut self) {
        self.reference_targets = self
            .fields
            .iter()
            .enumerate()
            .map(|(index, _)| {
                self.fields
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != index)
                    .map(|(_, field)| field.name.clone())
                    .collect()
            })
            .collect();
    }
}

/// Design-time checks run before anything is provisioned
pub fn validate_design(table_name: &str, fields: &[FieldDefinition]) -> Vec<DesignValidationError> {
    let mut errors = Vec::new();

    if table_name.is_empty() {
        errors.push(DesignValidationError::MissingTableName);
    } else if !is_valid_identifier(table_name) {
        errors.push(DesignValidationError::InvalidTableName {
            name: table_name.to_string(),
        });
    } else if is_internal_table(table_name) {
        errors.push(DesignValidationError::ReservedTableName {
            name: table_name.to_string(),
        });
    }

    if fields.is_empty() {
        errors.push(DesignValidationError::NoFields);
        return errors;
    }

    let names: HashSet<String> = fields.iter().map(|f| f.name.to_ascii_lowercase()).collect();
    let mut seen = HashSet::new();
    let mut reported_duplicates = HashSet::new();
    let mut formula_edges: HashMap<String, Vec<String>> = HashMap::new();
    let mut visibility_edges: HashMap<String, Vec<String>> = HashMap::new();

    for field in fields {
        let key = field.name.to_ascii_lowercase();

        if field.label.trim().is_empty() {
            errors.push(DesignValidationError::MissingAttribute {
                position: field.position,
                attribute: "label",
            });
        }
        if field.name.is_empty() {
            errors.push(DesignValidationError::MissingAttribute {
                position: field.position,
                attribute: "name",
            });
            continue;
        }
        if !is_valid_identifier(&field.name) {
            errors.push(DesignValidationError::InvalidIdentifier {
                name: field.name.clone(),
            });
        }
        if is_reserved_column(&field.name) {
            errors.push(DesignValidationError::ReservedName {
                name: field.name.clone(),
            });
        }
        if !seen.insert(key.clone()) && reported_duplicates.insert(key.clone()) {
            errors.push(DesignValidationError::DuplicateName {
                name: field.name.clone(),
            });
        }

        if let Some(condition) = &field.visibility_condition {
            let target = condition.parent_field.to_ascii_lowercase();
            if target == key {
                errors.push(DesignValidationError::SelfReference {
                    field: field.name.clone(),
                    rule: "visibility condition",
                });
            } else if !names.contains(&target) {
                errors.push(DesignValidationError::UnknownReference {
                    field: field.name.clone(),
                    target: condition.parent_field.clone(),
                    rule: "visibility condition",
                });
            } else {
                visibility_edges.entry(key.clone()).or_default().push(target);
            }
        }

        if let Some(source) = &field.calculation_formula {
            if !field.field_type.supports_formula() {
                errors.push(DesignValidationError::FormulaOnNonNumber {
                    field: field.name.clone(),
                });
            }
            match Formula::parse(source) {
                Ok(formula) => {
                    for target in formula.references() {
                        if target == key {
                            errors.push(DesignValidationError::SelfReference {
                                field: field.name.clone(),
                                rule: "formula",
                            });
                        } else if !names.contains(&target) {
                            errors.push(DesignValidationError::UnknownReference {
                                field: field.name.clone(),
                                target,
                                rule: "formula",
                            });
                        } else {
                            formula_edges.entry(key.clone()).or_default().push(target);
                        }
                    }
                }
                Err(e) => errors.push(DesignValidationError::InvalidFormula {
                    field: field.name.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        if let Some(rules) = &field.validation_rules {
            if let Some(pattern) = &rules.pattern {
                if !field.field_type.supports_length_rules() {
                    errors.push(DesignValidationError::PatternOnNonText {
                        field: field.name.clone(),
                    });
                } else if let Err(e) = Regex::new(pattern) {
                    errors.push(DesignValidationError::InvalidPattern {
                        field: field.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            if let (Some(min), Some(max)) = (rules.min, rules.max) {
                if min > max {
                    errors.push(DesignValidationError::InvertedRange {
                        field: field.name.clone(),
                    });
                }
            }
        }
    }

    let order: Vec<String> = fields.iter().map(|f| f.name.to_ascii_lowercase()).collect();
    for cycle in find_cycles(&order, &formula_edges) {
        errors.push(DesignValidationError::DependencyCycle {
            rule: "formula",
            cycle,
        });
    }
    for cycle in find_cycles(&order, &visibility_edges) {
        errors.push(DesignValidationError::DependencyCycle {
            rule: "visibility",
            cycle,
        });
    }

    errors
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Every cycle reachable by depth-first search, each reported once as the
/// path that closes it (`a -> b -> a`)
fn find_cycles(nodes: &[String], edges: &HashMap<String, Vec<String>>) -> Vec<Vec<String>> {
    fn visit(
        node: &str,
        edges: &HashMap<String, Vec<String>>,
        marks: &mut HashMap<String, Mark>,
        stack: &mut Vec<String>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        match marks.get(node) {
            Some(Mark::Done) => return,
            Some(Mark::Visiting) => {
                if let Some(start) = stack.iter().position(|n| n == node) {
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(node.to_string());
                    cycles.push(cycle);
                }
                return;
            }
            None => {}
        }

        marks.insert(node.to_string(), Mark::Visiting);
        stack.push(node.to_string());
        if let Some(targets) = edges.get(node) {
            for target in targets {
                visit(target, edges, marks, stack, cycles);
            }
        }
        stack.pop();
        marks.insert(node.to_string(), Mark::Done);
    }

    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    let mut cycles = Vec::new();
    for node in nodes {
        visit(node, edges, &mut marks, &mut stack, &mut cycles);
    }
    cycles
}
