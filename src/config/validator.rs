use thiserror::Error;

use crate::config::{ServerSettings, Settings};
use crate::persistence::{DatabaseBackend, PersistenceConfig};
use crate::provisioning::NavigationSettings;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

pub struct ConfigValidator;

impl ConfigValidator {
    /// Collect every problem rather than stopping at the first
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        Self::validate_server(&settings.server, &mut errors);
        Self::validate_persistence(&settings.persistence, &mut errors);
        Self::validate_navigation(&settings.navigation, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &ServerSettings, errors: &mut Vec<ValidationError>) {
        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }
    }

    fn validate_persistence(persistence: &PersistenceConfig, errors: &mut Vec<ValidationError>) {
        if persistence.url.is_empty() {
            errors.push(ValidationError::MissingField("persistence.url".to_string()));
        } else if !persistence.is_in_memory() {
            if let Err(e) = DatabaseBackend::from_url(&persistence.url) {
                errors.push(ValidationError::InvalidValue {
                    field: "persistence.url".to_string(),
                    reason: e.to_string(),
                });
            }
        }

        if persistence.max_connections == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "persistence.max_connections".to_string(),
                reason: "At least one connection is required".to_string(),
            });
        }
    }

    fn validate_navigation(navigation: &NavigationSettings, errors: &mut Vec<ValidationError>) {
        if navigation.parent_section_id.trim().is_empty() {
            errors.push(ValidationError::MissingField(
                "navigation.parent_section_id".to_string(),
            ));
        }

        if !navigation.url_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidValue {
                field: "navigation.url_prefix".to_string(),
                reason: "Must start with '/'".to_string(),
            });
        }
    }
}
