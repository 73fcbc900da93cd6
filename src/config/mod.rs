use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

pub mod validator;

use crate::cli::Cli;
use crate::persistence::PersistenceConfig;
use crate::provisioning::NavigationSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub navigation: NavigationSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Defaults, lowest precedence
fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let defaults = PersistenceConfig::default();
    let navigation = NavigationSettings::default();

    builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 3000)?
        .set_default("persistence.url", defaults.url)?
        .set_default("persistence.max_connections", i64::from(defaults.max_connections))?
        .set_default("persistence.auto_migrate", defaults.auto_migrate)?
        .set_default("persistence.connect_timeout_secs", defaults.connect_timeout_secs as i64)?
        .set_default("navigation.parent_section_id", navigation.parent_section_id)?
        .set_default("navigation.icon", navigation.icon)?
        .set_default("navigation.url_prefix", navigation.url_prefix)
}

/// `FORMWRIGHT_SERVER__PORT=8080` overrides `server.port`
fn environment() -> Environment {
    Environment::with_prefix("FORMWRIGHT")
        .prefix_separator("_")
        .separator("__")
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_root(".")
    }

    /// Create settings from CLI arguments (includes config file and CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let s = with_defaults(Config::builder())?
            .add_source(File::from(cli.config.clone()).required(false))
            .add_source(environment())
            .build()?;

        let mut settings: Settings = s.try_deserialize()?;

        // CLI > env vars > config file
        settings.apply_cli_overrides(cli);
        settings.validate()?;

        Ok(settings)
    }

    /// Load `formwright.{toml,json,yaml}` from `root`, if present
    pub fn from_root(root: &str) -> Result<Self, anyhow::Error> {
        let config_path = std::path::Path::new(root).join("formwright");
        let s = with_defaults(Config::builder())?
            .add_source(File::from(config_path).required(false))
            .add_source(environment())
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(url) = &cli.database_url {
            self.persistence.url = url.clone();
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }
}
