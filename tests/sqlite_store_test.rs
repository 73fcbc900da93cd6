use formwright::domain::FormDefinition;
use formwright::persistence::{
    Collection, DataStore, FormRepository, PersistenceConfig, SelectOptions,
};
use formwright::provisioning::{
    DeletionOrchestrator, DeletionStep, FormCatalog, NavigationSettings, ProvisioningError,
    ProvisioningOrchestrator, StepOutcome,
};
use formwright::schema::{DefinitionMetadata, SchemaDesigner};
use serde_json::json;
use tempfile::TempDir;

async fn data_store(dir: &TempDir) -> DataStore {
    let config = PersistenceConfig {
        url: format!("sqlite://{}?mode=rwc", dir.path().join("forms.db").display()),
        max_connections: 1,
        ..PersistenceConfig::default()
    };
    let store = DataStore::new(&config).await.unwrap();
    store.migrate().await.unwrap();
    store
}

fn definition(table_name: &str) -> FormDefinition {
    let grid = vec![
        vec!["Farmer Name".to_string(), "Quantity".to_string(), "Harvested".to_string()],
        vec!["Ama".to_string(), "12".to_string(), "2024-03-01".to_string()],
    ];
    SchemaDesigner::from_grid(&grid, Some(table_name), Some("Harvest"))
        .to_definition(DefinitionMetadata {
            dashboard_entry_id: "dash-1".to_string(),
            district_id: None,
            created_by: "admin".to_string(),
        })
        .unwrap()
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = data_store(&dir).await;

    let second = store.migrate().await.unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(second.skipped, 2);

    let status = store.migration_status().await.unwrap();
    assert!(status.iter().all(|m| m.applied));
    store.health_check().await.unwrap();
}

#[tokio::test]
async fn test_record_operations() {
    let dir = TempDir::new().unwrap();
    let store = data_store(&dir).await;
    let repo = store.repository();

    let fields = json!({
        "table_name": "crop",
        "requested_by": "admin",
        "attempted_at": "2024-01-01T00:00:00Z"
    });
    let record = repo
        .insert_record(Collection::DeletionLog, fields.as_object().cloned().unwrap())
        .await
        .unwrap();
    assert_eq!(record.get_str("requested_by"), Some("admin"));

    let found = repo
        .select_records(
            Collection::DeletionLog,
            &SelectOptions::new().filter("table_name", "crop"),
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, record.id);

    assert!(repo.delete_record(Collection::DeletionLog, &record.id).await.unwrap());
    assert!(!repo.delete_record(Collection::DeletionLog, &record.id).await.unwrap());

    assert!(repo.table_exists("deletion_log").await.unwrap());
    assert!(!repo.table_exists("no_such_table").await.unwrap());
}

#[tokio::test]
async fn test_publish_and_delete_against_sqlite() {
    let dir = TempDir::new().unwrap();
    let store = data_store(&dir).await;
    let repo = store.repository();

    let provisioning = ProvisioningOrchestrator::new(repo.clone(), NavigationSettings::default());
    let deletion = DeletionOrchestrator::new(repo.clone());
    let catalog = FormCatalog::new(repo.clone());

    let published = provisioning.publish(definition("harvest"), None).await.unwrap();
    assert!(published.create_statement.starts_with("CREATE TABLE \"harvest\""));
    assert!(repo.table_exists("harvest").await.unwrap());

    let stored = catalog.get("harvest").await.unwrap();
    assert_eq!(stored.fields.len(), 3);
    assert_eq!(stored.navigation_entry_id, published.navigation_entry.id);

    let err = provisioning.publish(definition("harvest"), None).await.unwrap_err();
    assert!(matches!(err, ProvisioningError::NameTaken(_)));

    let report = deletion.delete("harvest", "admin").await.unwrap();
    assert_eq!(report.outcome(DeletionStep::DropTable), Some(&StepOutcome::Done));
    assert!(!repo.table_exists("harvest").await.unwrap());
    assert!(catalog.find("harvest").await.unwrap().is_none());

    let again = deletion.delete("harvest", "admin").await.unwrap();
    assert!(again.nothing_found());

    store.close().await;
}
