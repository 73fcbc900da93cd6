//! Lookup of published form definitions

use std::sync::Arc;

use crate::domain::FormDefinition;
use crate::persistence::{
    Collection, FormDefinitionRow, FormRepository, PersistenceError, SelectOptions,
};

/// Read access to the published definitions
#[derive(Clone)]
pub struct FormCatalog {
    repository: Arc<dyn FormRepository>,
}

impl FormCatalog {
    pub fn new(repository: Arc<dyn FormRepository>) -> Self {
        Self { repository }
    }

    /// Published definitions, oldest first
    pub async fn list(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<FormDefinition>, PersistenceError> {
        let mut options = SelectOptions::new().offset(offset);
        if let Some(limit) = limit {
            options = options.limit(limit);
        }

        let records = self
            .repository
            .select_records(Collection::FormDefinitions, &options)
            .await?;

        records
            .iter()
            .map(|record| {
                FormDefinitionRow::from_record(record)?.into_definition(record.id.clone())
            })
            .collect()
    }

    /// The definition stored for `table_name`, if any
    pub async fn find(&self, table_name: &str) -> Result<Option<FormDefinition>, PersistenceError> {
        let records = self
            .repository
            .select_records(
                Collection::FormDefinitions,
                &SelectOptions::new().filter("table_name", table_name.to_lowercase()),
            )
            .await?;

        match records.first() {
            Some(record) => Ok(Some(
                FormDefinitionRow::from_record(record)?.into_definition(record.id.clone())?,
            )),
            None => Ok(None),
        }
    }

    /// Definition for `table_name`, or `NotFound`
    pub async fn get(&self, table_name: &str) -> Result<FormDefinition, PersistenceError> {
        self.find(table_name)
            .await?
            .ok_or_else(|| PersistenceError::not_found("form", table_name))
    }
}
