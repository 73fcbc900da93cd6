//! Error and report types for publishing and retiring forms

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::persistence::PersistenceError;
use crate::schema::DesignValidationError;

/// One side effect of publishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStep {
    CreateTable,
    RegisterNavigation,
    PersistDefinition,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateTable => "create storage table",
            Self::RegisterNavigation => "register navigation entry",
            Self::PersistDefinition => "persist form definition",
        })
    }
}

/// Result of one compensating action replayed after a failed publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompensationOutcome {
    pub action: String,
    /// Error message when the action itself failed
    pub error: Option<String>,
}

impl CompensationOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Errors that can occur while publishing a form
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The design has errors; nothing was provisioned
    #[error("Design has {} error(s): {}", .0.len(), join_errors(.0))]
    Design(Vec<DesignValidationError>),

    /// A form or table with this name already exists
    #[error("Table name '{0}' is already in use")]
    NameTaken(String),

    /// Another publish of the same table name is running
    #[error("A publish of '{0}' is already in progress")]
    InProgress(String),

    /// Could not determine whether the name is free
    #[error("Could not check availability of '{table_name}': {source}")]
    Availability {
        table_name: String,
        #[source]
        source: PersistenceError,
    },

    /// A publish step failed; earlier steps were rolled back
    #[error("Failed to {step}: {source}")]
    Step {
        step: PublishStep,
        #[source]
        source: PersistenceError,
        compensation: Vec<CompensationOutcome>,
    },
}

impl ProvisioningError {
    /// Convert to HTTP status code for API responses
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::Design(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NameTaken(_) | Self::InProgress(_) => StatusCode::CONFLICT,
            Self::Availability { .. } | Self::Step { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a failed step left resources behind that could not be removed
    pub fn left_orphans(&self) -> bool {
        match self {
            Self::Step { compensation, .. } => compensation.iter().any(|c| !c.succeeded()),
            _ => false,
        }
    }
}

fn join_errors(errors: &[DesignValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One teardown step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStep {
    LogAttempt,
    RemoveNavigation,
    RemoveDefinition,
    DropTable,
}

/// What happened when a teardown step ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum StepOutcome {
    Done,
    /// Nothing to remove; an earlier run already did it
    AlreadyAbsent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: DeletionStep,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Per-step outcome of a teardown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub table_name: String,
    pub steps: Vec<StepReport>,
}

impl DeletionReport {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, step: DeletionStep, outcome: StepOutcome) {
        self.steps.push(StepReport { step, outcome });
    }

    pub fn outcome(&self, step: DeletionStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|report| report.step == step)
            .map(|report| &report.outcome)
    }

    /// True when no step failed
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|report| matches!(report.outcome, StepOutcome::Failed(_)))
    }

    /// True when every removal step found nothing to remove
    pub fn nothing_found(&self) -> bool {
        self.steps
            .iter()
            .filter(|report| report.step != DeletionStep::LogAttempt)
            .all(|report| report.outcome == StepOutcome::AlreadyAbsent)
    }
}

/// Errors that can occur while retiring a form
#[derive(Debug, Error)]
pub enum DeletionError {
    /// The name can never belong to a provisioned form; nothing was touched
    #[error("Refusing to delete '{table_name}': {reason}")]
    Refused { table_name: String, reason: String },

    /// Some steps failed; re-running the deletion resumes where it stopped
    #[error("Deletion of '{}' incomplete: {} step(s) failed", .0.table_name, .0.failures().count())]
    Incomplete(DeletionReport),
}

impl DeletionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::Refused { .. } => StatusCode::BAD_REQUEST,
            Self::Incomplete(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_completion() {
        let mut report = DeletionReport::new("crop");
        report.record(DeletionStep::LogAttempt, StepOutcome::Done);
        report.record(DeletionStep::RemoveNavigation, StepOutcome::AlreadyAbsent);
        assert!(report.is_complete());
        assert!(report.nothing_found());

        report.record(DeletionStep::DropTable, StepOutcome::Failed("locked".to_string()));
        assert!(!report.is_complete());
        assert!(!report.nothing_found());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(
            report.outcome(DeletionStep::DropTable),
            Some(&StepOutcome::Failed("locked".to_string()))
        );
    }

    #[test]
    fn test_step_outcome_serialization() {
        let report = StepReport {
            step: DeletionStep::DropTable,
            outcome: StepOutcome::Failed("boom".to_string()),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["step"], "drop_table");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["message"], "boom");
    }

    #[test]
    fn test_design_error_message_lists_all() {
        let err = ProvisioningError::Design(vec![
            DesignValidationError::NoFields,
            DesignValidationError::MissingTableName,
        ]);
        assert!(err.to_string().starts_with("Design has 2 error(s)"));
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }
}
