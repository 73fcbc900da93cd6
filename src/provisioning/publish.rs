//! Publishing a design: storage table, navigation entry, form definition
//!
//! The three steps run strictly in order because each needs the identity the
//! previous one produced. Every completed step records the action that undoes
//! it; when a later step fails those actions are replayed newest first.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::domain::{FormDefinition, NavigationEntry};
use crate::persistence::{
    Collection, FormDefinitionRow, FormRepository, NavigationEntryRow, PersistenceError,
    SelectOptions,
};
use crate::provisioning::error::{CompensationOutcome, ProvisioningError, PublishStep};
use crate::provisioning::NavigationSettings;
use crate::schema::{validate_design, DdlGenerator};

/// Everything a successful publish created
#[derive(Debug, Clone, Serialize)]
pub struct PublishedForm {
    pub definition: FormDefinition,
    pub navigation_entry: NavigationEntry,
    pub create_statement: String,
}

/// Table names with a publish currently running
#[derive(Debug, Clone, Default)]
pub struct InFlightPublishes {
    names: Arc<Mutex<HashSet<String>>>,
}

impl InFlightPublishes {
    /// Reserve `table_name` until the returned guard drops; `None` if taken
    pub fn claim(&self, table_name: &str) -> Option<PublishGuard> {
        let name = table_name.to_lowercase();
        let mut names = self.names.lock().unwrap_or_else(|e| e.into_inner());
        if !names.insert(name.clone()) {
            return None;
        }
        Some(PublishGuard {
            names: self.names.clone(),
            name,
        })
    }

    pub fn contains(&self, table_name: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&table_name.to_lowercase())
    }
}

pub struct PublishGuard {
    names: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl Drop for PublishGuard {
    fn drop(&mut self) {
        let mut names = self.names.lock().unwrap_or_else(|e| e.into_inner());
        names.remove(&self.name);
    }
}

/// Undo action for a completed publish step
#[derive(Debug, Clone)]
enum Compensation {
    DropTable(String),
    RemoveNavigation(String),
}

impl Compensation {
    fn describe(&self) -> String {
        match self {
            Self::DropTable(table) => format!("drop table '{}'", table),
            Self::RemoveNavigation(id) => format!("remove navigation entry '{}'", id),
        }
    }

    async fn apply(&self, repository: &dyn FormRepository) -> Result<(), PersistenceError> {
        match self {
            Self::DropTable(table) => {
                let statement = DdlGenerator::new(repository.backend()).build_drop_statement(table);
                repository.execute_schema_statement(&statement).await
            }
            Self::RemoveNavigation(id) => repository
                .delete_record(Collection::NavigationEntries, id)
                .await
                .map(|_| ()),
        }
    }
}

/// Sequences the side effects of publishing a form
#[derive(Clone)]
pub struct ProvisioningOrchestrator {
    repository: Arc<dyn FormRepository>,
    navigation: NavigationSettings,
    in_flight: InFlightPublishes,
}

impl ProvisioningOrchestrator {
    pub fn new(repository: Arc<dyn FormRepository>, navigation: NavigationSettings) -> Self {
        Self {
            repository,
            navigation,
            in_flight: InFlightPublishes::default(),
        }
    }

    pub fn navigation(&self) -> &NavigationSettings {
        &self.navigation
    }

    pub fn in_flight(&self) -> &InFlightPublishes {
        &self.in_flight
    }

    /// Publish a definition.
    ///
    /// `parent_section` overrides the configured parent menu section. The form
    /// is published only once the definition record is stored.
    pub async fn publish(
        &self,
        definition: FormDefinition,
        parent_section: Option<&str>,
    ) -> Result<PublishedForm, ProvisioningError> {
        let errors = validate_design(&definition.table_name, &definition.fields);
        if !errors.is_empty() {
            return Err(ProvisioningError::Design(errors));
        }

        let table_name = definition.table_name.clone();
        let _guard = self
            .in_flight
            .claim(&table_name)
            .ok_or_else(|| ProvisioningError::InProgress(table_name.clone()))?;

        self.ensure_available(&table_name).await?;

        let statement = DdlGenerator::new(self.repository.backend())
            .build_create_statement(&definition)
            .map_err(|e| ProvisioningError::Design(vec![e]))?;

        let mut compensations: Vec<Compensation> = Vec::new();

        info!(table = %table_name, "Creating storage table");
        self.repository
            .execute_schema_statement(&statement)
            .await
            .map_err(|source| ProvisioningError::Step {
                step: PublishStep::CreateTable,
                source,
                compensation: Vec::new(),
            })?;
        compensations.push(Compensation::DropTable(table_name.clone()));

        let parent = parent_section
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(self.navigation.parent_section_id.as_str());
        let mut entry = NavigationEntry::for_form(
            parent,
            &self.navigation.icon,
            &self.navigation.url_prefix,
            &table_name,
            &definition.label,
        );

        info!(table = %table_name, parent = %parent, "Registering navigation entry");
        let record = match self
            .repository
            .insert_record(
                Collection::NavigationEntries,
                NavigationEntryRow::from_entry(&entry, Utc::now()).into_fields(),
            )
            .await
        {
            Ok(record) => record,
            Err(source) => {
                return Err(self
                    .roll_back(PublishStep::RegisterNavigation, source, compensations)
                    .await)
            }
        };
        entry.id = Some(record.id.clone());
        compensations.push(Compensation::RemoveNavigation(record.id.clone()));

        let mut definition = definition;
        definition.navigation_entry_id = Some(record.id);
        definition.normalize_positions();

        info!(table = %table_name, fields = definition.fields.len(), "Persisting form definition");
        let stored = match FormDefinitionRow::from_definition(&definition) {
            Ok(row) => {
                self.repository
                    .insert_record(Collection::FormDefinitions, row.into_fields())
                    .await
            }
            Err(e) => Err(e),
        };
        match stored {
            Ok(record) => definition.id = Some(record.id),
            Err(source) => {
                return Err(self
                    .roll_back(PublishStep::PersistDefinition, source, compensations)
                    .await)
            }
        }

        info!(table = %table_name, "Form published");
        Ok(PublishedForm {
            definition,
            navigation_entry: entry,
            create_statement: statement,
        })
    }

    async fn ensure_available(&self, table_name: &str) -> Result<(), ProvisioningError> {
        let availability = |source: PersistenceError| ProvisioningError::Availability {
            table_name: table_name.to_string(),
            source,
        };

        let existing = self
            .repository
            .select_records(
                Collection::FormDefinitions,
                &SelectOptions::new().filter("table_name", table_name).limit(1),
            )
            .await
            .map_err(availability)?;
        if !existing.is_empty() {
            return Err(ProvisioningError::NameTaken(table_name.to_string()));
        }

        if self
            .repository
            .table_exists(table_name)
            .await
            .map_err(availability)?
        {
            return Err(ProvisioningError::NameTaken(table_name.to_string()));
        }

        Ok(())
    }

    async fn roll_back(
        &self,
        step: PublishStep,
        source: PersistenceError,
        compensations: Vec<Compensation>,
    ) -> ProvisioningError {
        warn!(step = %step, error = %source, "Publish step failed, rolling back");

        let mut outcomes = Vec::with_capacity(compensations.len());
        for compensation in compensations.into_iter().rev() {
            let action = compensation.describe();
            let error = match compensation.apply(self.repository.as_ref()).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(action = %action, error = %e, "Compensating action failed");
                    Some(e.to_string())
                }
            };
            outcomes.push(CompensationOutcome { action, error });
        }

        ProvisioningError::Step {
            step,
            source,
            compensation: outcomes,
        }
    }
}
