//! Publishing and retiring forms
//!
//! - `publish`: storage table, navigation entry and definition, with rollback
//! - `teardown`: best-effort, resumable removal of all three
//! - `catalog`: lookup of published definitions

pub mod catalog;
pub mod error;
pub mod publish;
pub mod teardown;

pub use catalog::FormCatalog;
pub use error::{
    CompensationOutcome, DeletionError, DeletionReport, DeletionStep, ProvisioningError,
    PublishStep, StepOutcome, StepReport,
};
pub use publish::{InFlightPublishes, ProvisioningOrchestrator, PublishedForm};
pub use teardown::DeletionOrchestrator;

use serde::{Deserialize, Serialize};

/// Where published forms appear in the menu
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NavigationSettings {
    /// Parent section new entries are attached to
    #[serde(default = "default_parent_section_id")]
    pub parent_section_id: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    /// Prefix of the data-entry URL; the table name is appended
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

fn default_parent_section_id() -> String {
    "forms".to_string()
}

fn default_icon() -> String {
    "table".to_string()
}

fn default_url_prefix() -> String {
    "/forms/".to_string()
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            parent_section_id: default_parent_section_id(),
            icon: default_icon(),
            url_prefix: default_url_prefix(),
        }
    }
}
