use formwright::config::Settings;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_config_file() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    let formwright_toml = r#"
[server]
host = "0.0.0.0"
port = 8080

[persistence]
url = "memory:"
max_connections = 2

[navigation]
parent_section_id = "surveys"
url_prefix = "/entry/"
"#;
    fs::write(root.join("formwright.toml"), formwright_toml)?;

    let settings = Settings::from_root(root.to_str().unwrap())?;

    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 8080);
    assert!(settings.persistence.is_in_memory());
    assert_eq!(settings.persistence.max_connections, 2);
    assert!(settings.persistence.auto_migrate);
    assert_eq!(settings.navigation.parent_section_id, "surveys");
    assert_eq!(settings.navigation.icon, "table");
    assert_eq!(settings.navigation.url_prefix, "/entry/");

    Ok(())
}

#[test]
fn test_defaults_without_config_file() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = Settings::from_root(temp_dir.path().to_str().unwrap())?;

    assert_eq!(settings.server.port, 3000);
    assert_eq!(settings.persistence.url, "sqlite://formwright.db?mode=rwc");
    assert_eq!(settings.navigation.url_prefix, "/forms/");

    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    let formwright_toml = r#"
[server]
host = "127.0.0.1"
port = 3000

[persistence]
url = "redis://localhost"

[navigation]
url_prefix = "forms"
"#;
    fs::write(root.join("formwright.toml"), formwright_toml)?;

    let err = Settings::from_root(root.to_str().unwrap()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("persistence.url"));
    assert!(message.contains("navigation.url_prefix"));

    Ok(())
}
