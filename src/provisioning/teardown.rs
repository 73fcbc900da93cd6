//! Retiring a published form
//!
//! Teardown is best effort: every step is attempted even if an earlier one
//! failed, and nothing already removed is re-created. Steps that find nothing
//! to remove report `AlreadyAbsent`, so a deletion that stopped half way can
//! simply be run again.

use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::is_internal_table;
use crate::persistence::{
    Collection, DeletionLogRow, FormRepository, PersistenceError, Record,
    SelectOptions,
};
use crate::provisioning::error::{DeletionError, DeletionReport, DeletionStep, StepOutcome};
use crate::schema::builder::is_valid_identifier;
use crate::schema::DdlGenerator;

/// Sequences the teardown of a published form
#[derive(Clone)]
pub struct DeletionOrchestrator {
    repository: Arc<dyn FormRepository>,
}

impl DeletionOrchestrator {
    pub fn new(repository: Arc<dyn FormRepository>) -> Self {
        Self { repository }
    }

    /// Remove the navigation entry, the definition and the storage table of
    /// `table_name`.
    ///
    /// Returns the report when every step either succeeded or found nothing
    /// to do, and `DeletionError::Incomplete` with the same report otherwise.
    pub async fn delete(
        &self,
        table_name: &str,
        requested_by: &str,
    ) -> Result<DeletionReport, DeletionError> {
        let table_name = table_name.trim().to_lowercase();
        if !is_valid_identifier(&table_name) {
            return Err(DeletionError::Refused {
                table_name,
                reason: "not a valid table name".to_string(),
            });
        }
        if is_internal_table(&table_name) {
            return Err(DeletionError::Refused {
                table_name,
                reason: "table belongs to the service".to_string(),
            });
        }

        let mut report = DeletionReport::new(&table_name);
        info!(table = %table_name, requested_by = %requested_by, "Deleting form");

        let log = DeletionLogRow::new(&table_name, requested_by, Utc::now());
        let outcome = match self
            .repository
            .insert_record(Collection::DeletionLog, log.into_fields())
            .await
        {
            Ok(_) => StepOutcome::Done,
            Err(e) => failed(DeletionStep::LogAttempt, &table_name, e),
        };
        report.record(DeletionStep::LogAttempt, outcome);

        let definitions = self
            .repository
            .select_records(
                Collection::FormDefinitions,
                &SelectOptions::new().filter("table_name", table_name.as_str()),
            )
            .await;

        let navigation = self.remove_navigation(&table_name, definitions.as_ref().ok()).await;
        report.record(DeletionStep::RemoveNavigation, navigation);

        let definition = match definitions {
            Ok(records) => self.remove_definitions(&table_name, &records).await,
            Err(e) => failed(DeletionStep::RemoveDefinition, &table_name, e),
        };
        report.record(DeletionStep::RemoveDefinition, definition);

        let drop = self.drop_table(&table_name).await;
        report.record(DeletionStep::DropTable, drop);

        if report.is_complete() {
            info!(table = %table_name, "Form deleted");
            Ok(report)
        } else {
            warn!(
                table = %table_name,
                failures = report.failures().count(),
                "Form deletion incomplete"
            );
            Err(DeletionError::Incomplete(report))
        }
    }

    /// Entries are found both through the definition and by the table they
    /// expose, so an entry whose definition is already gone is still removed.
    async fn remove_navigation(
        &self,
        table_name: &str,
        definitions: Option<&Vec<Record>>,
    ) -> StepOutcome {
        let mut ids = BTreeSet::new();
        for record in definitions.into_iter().flatten() {
            if let Some(id) = record.get_str("navigation_entry_id") {
                ids.insert(id.to_string());
            }
        }

        let lookup_error = match self
            .repository
            .select_records(
                Collection::NavigationEntries,
                &SelectOptions::new().filter("form_table", table_name),
            )
            .await
        {
            Ok(entries) => {
                ids.extend(entries.into_iter().map(|entry| entry.id));
                None
            }
            Err(e) => Some(e),
        };

        let mut removed = false;
        for id in ids {
            match self
                .repository
                .delete_record(Collection::NavigationEntries, &id)
                .await
            {
                Ok(found) => removed |= found,
                Err(e) => return failed(DeletionStep::RemoveNavigation, table_name, e),
            }
        }

        match lookup_error {
            // Entries only reachable by table name may remain
            Some(e) => failed(DeletionStep::RemoveNavigation, table_name, e),
            None if removed => StepOutcome::Done,
            None => StepOutcome::AlreadyAbsent,
        }
    }

    async fn remove_definitions(&self, table_name: &str, records: &[Record]) -> StepOutcome {
        let mut removed = false;
        for record in records {
            match self
                .repository
                .delete_record(Collection::FormDefinitions, &record.id)
                .await
            {
                Ok(found) => removed |= found,
                Err(e) => return failed(DeletionStep::RemoveDefinition, table_name, e),
            }
        }

        if removed {
            StepOutcome::Done
        } else {
            StepOutcome::AlreadyAbsent
        }
    }

    async fn drop_table(&self, table_name: &str) -> StepOutcome {
        let existed = match self.repository.table_exists(table_name).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!(table = %table_name, error = %e, "Table probe failed, dropping anyway");
                true
            }
        };

        let statement =
            DdlGenerator::new(self.repository.backend()).build_drop_statement(table_name);
        match self.repository.execute_schema_statement(&statement).await {
            Ok(()) if existed => StepOutcome::Done,
            Ok(()) => StepOutcome::AlreadyAbsent,
            Err(e) => failed(DeletionStep::DropTable, table_name, e),
        }
    }
}

fn failed(step: DeletionStep, table_name: &str, error: PersistenceError) -> StepOutcome {
    warn!(table = %table_name, step = ?step, error = %error, "Deletion step failed");
    StepOutcome::Failed(error.to_string())
}
