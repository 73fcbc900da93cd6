use formwright::domain::{FieldType, FormDefinition, ValidationRules, VisibilityCondition};
use formwright::persistence::{Collection, FailPoint, FormRepository, InMemoryFormRepository};
use formwright::provisioning::{
    DeletionError, DeletionOrchestrator, DeletionStep, FormCatalog, NavigationSettings,
    ProvisioningError, ProvisioningOrchestrator, PublishStep, StepOutcome,
};
use formwright::schema::{evaluate_entry, DefinitionMetadata, SchemaDesigner};
use std::collections::HashMap;
use std::sync::Arc;

fn farmer_grid() -> Vec<Vec<String>> {
    vec![
        vec!["Farmer Name".to_string(), "Quantity".to_string(), "Is Verified".to_string()],
        vec!["Ama".to_string(), "12".to_string(), "yes".to_string()],
    ]
}

fn farmer_definition(table_name: &str) -> FormDefinition {
    let mut designer =
        SchemaDesigner::from_grid(&farmer_grid(), Some(table_name), Some("Farmer Intake"));
    designer
        .set_validation(
            1,
            Some(ValidationRules::required().with_range(Some(0.0), Some(1000.0))),
        )
        .unwrap();
    designer
        .to_definition(DefinitionMetadata {
            dashboard_entry_id: "dash-1".to_string(),
            district_id: Some("north".to_string()),
            created_by: "admin".to_string(),
        })
        .unwrap()
}

struct Harness {
    repo: InMemoryFormRepository,
    provisioning: ProvisioningOrchestrator,
    deletion: DeletionOrchestrator,
    catalog: FormCatalog,
}

fn harness() -> Harness {
    let repo = InMemoryFormRepository::new();
    let shared: Arc<dyn FormRepository> = Arc::new(repo.clone());
    Harness {
        provisioning: ProvisioningOrchestrator::new(shared.clone(), NavigationSettings::default()),
        deletion: DeletionOrchestrator::new(shared.clone()),
        catalog: FormCatalog::new(shared),
        repo,
    }
}

#[tokio::test]
async fn test_publish_then_delete_round_trip() {
    let h = harness();
    let definition = farmer_definition("farmer_intake");
    assert_eq!(
        definition.fields.iter().map(|f| f.field_type).collect::<Vec<_>>(),
        vec![FieldType::Text, FieldType::Number, FieldType::Boolean]
    );

    let published = h.provisioning.publish(definition, None).await.unwrap();
    assert_eq!(published.navigation_entry.url, "/forms/farmer_intake");
    assert_eq!(published.navigation_entry.parent_id, "forms");
    assert!(published.definition.id.is_some());
    assert_eq!(
        published.definition.navigation_entry_id,
        published.navigation_entry.id
    );

    assert_eq!(h.repo.tables().await, vec!["farmer_intake".to_string()]);
    let statement = h.repo.table_statement("farmer_intake").await.unwrap();
    assert!(statement.contains("\"quantity\""));
    assert!(statement.contains("\"farmername\""));
    assert_eq!(h.repo.records(Collection::NavigationEntries).await.len(), 1);
    assert_eq!(h.repo.records(Collection::FormDefinitions).await.len(), 1);

    let report = h.deletion.delete("farmer_intake", "admin").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.outcome(DeletionStep::DropTable), Some(&StepOutcome::Done));
    assert_eq!(report.outcome(DeletionStep::RemoveNavigation), Some(&StepOutcome::Done));
    assert_eq!(report.outcome(DeletionStep::RemoveDefinition), Some(&StepOutcome::Done));

    assert!(h.repo.tables().await.is_empty());
    assert!(h.repo.records(Collection::NavigationEntries).await.is_empty());
    assert!(h.repo.records(Collection::FormDefinitions).await.is_empty());
    assert_eq!(h.repo.records(Collection::DeletionLog).await.len(), 1);
}

#[tokio::test]
async fn test_parent_section_override() {
    let h = harness();
    let published = h
        .provisioning
        .publish(farmer_definition("farmer_intake"), Some("surveys"))
        .await
        .unwrap();
    assert_eq!(published.navigation_entry.parent_id, "surveys");
}

#[tokio::test]
async fn test_failed_definition_insert_rolls_back() {
    let h = harness();
    h.repo.fail_on(FailPoint::Insert(Collection::FormDefinitions)).await;

    let err = h
        .provisioning
        .publish(farmer_definition("farmer_intake"), None)
        .await
        .unwrap_err();

    match &err {
        ProvisioningError::Step { step, compensation, .. } => {
            assert_eq!(*step, PublishStep::PersistDefinition);
            assert_eq!(compensation.len(), 2);
            assert!(compensation.iter().all(|c| c.succeeded()));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!err.left_orphans());

    assert!(h.repo.tables().await.is_empty());
    assert!(h.repo.records(Collection::NavigationEntries).await.is_empty());
    assert!(h.repo.records(Collection::FormDefinitions).await.is_empty());

    // The name is free again once the failure clears
    h.repo.clear_failure(FailPoint::Insert(Collection::FormDefinitions)).await;
    assert!(h
        .provisioning
        .publish(farmer_definition("farmer_intake"), None)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_failed_rollback_reports_orphans() {
    let h = harness();
    h.repo.fail_on(FailPoint::Insert(Collection::NavigationEntries)).await;
    h.repo.fail_on(FailPoint::DropTable).await;

    let err = h
        .provisioning
        .publish(farmer_definition("farmer_intake"), None)
        .await
        .unwrap_err();

    assert!(err.left_orphans());
    assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(h.repo.tables().await, vec!["farmer_intake".to_string()]);
}

#[tokio::test]
async fn test_failed_create_table_leaves_nothing_behind() {
    let h = harness();
    h.repo.fail_on(FailPoint::CreateTable).await;

    let err = h
        .provisioning
        .publish(farmer_definition("farmer_intake"), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisioningError::Step { step: PublishStep::CreateTable, .. }
    ));
    assert!(h.repo.records(Collection::NavigationEntries).await.is_empty());
}

#[tokio::test]
async fn test_name_taken_by_form_or_table() {
    let h = harness();
    h.provisioning
        .publish(farmer_definition("farmer_intake"), None)
        .await
        .unwrap();

    let err = h
        .provisioning
        .publish(farmer_definition("farmer_intake"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::NameTaken(ref name) if name == "farmer_intake"));
    assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);

    // A table created outside the service also blocks the name
    h.repo
        .execute_schema_statement("CREATE TABLE \"legacy_intake\" (\"id\" INTEGER)")
        .await
        .unwrap();
    let err = h
        .provisioning
        .publish(farmer_definition("legacy_intake"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::NameTaken(_)));

    // Nothing was added by the rejected publishes
    assert_eq!(h.repo.records(Collection::NavigationEntries).await.len(), 1);
}

#[tokio::test]
async fn test_invalid_design_is_rejected_before_provisioning() {
    let h = harness();
    let mut definition = farmer_definition("farmer_intake");
    definition.fields[1].calculation_formula = Some("quantity + 1".to_string());

    let err = h.provisioning.publish(definition, None).await.unwrap_err();
    assert!(matches!(err, ProvisioningError::Design(_)));
    assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    assert!(h.repo.executed_statements().await.is_empty());
}

#[tokio::test]
async fn test_partial_deletion_can_be_resumed() {
    let h = harness();
    h.provisioning
        .publish(farmer_definition("farmer_intake"), None)
        .await
        .unwrap();

    h.repo.fail_on(FailPoint::Delete(Collection::NavigationEntries)).await;
    let report = match h.deletion.delete("farmer_intake", "admin").await {
        Err(DeletionError::Incomplete(report)) => report,
        other => panic!("unexpected result: {:?}", other),
    };

    // Later steps still ran
    assert!(matches!(
        report.outcome(DeletionStep::RemoveNavigation),
        Some(StepOutcome::Failed(_))
    ));
    assert_eq!(report.outcome(DeletionStep::RemoveDefinition), Some(&StepOutcome::Done));
    assert_eq!(report.outcome(DeletionStep::DropTable), Some(&StepOutcome::Done));
    assert_eq!(h.repo.records(Collection::NavigationEntries).await.len(), 1);

    h.repo.clear_failure(FailPoint::Delete(Collection::NavigationEntries)).await;
    let report = h.deletion.delete("farmer_intake", "admin").await.unwrap();
    assert_eq!(report.outcome(DeletionStep::RemoveNavigation), Some(&StepOutcome::Done));
    assert_eq!(
        report.outcome(DeletionStep::RemoveDefinition),
        Some(&StepOutcome::AlreadyAbsent)
    );
    assert_eq!(report.outcome(DeletionStep::DropTable), Some(&StepOutcome::AlreadyAbsent));
    assert!(h.repo.records(Collection::NavigationEntries).await.is_empty());
}

#[tokio::test]
async fn test_deleting_unknown_form_is_idempotent() {
    let h = harness();
    let report = h.deletion.delete("never_published", "admin").await.unwrap();
    assert!(report.nothing_found());

    let again = h.deletion.delete("never_published", "admin").await.unwrap();
    assert!(again.nothing_found());
    assert_eq!(h.repo.records(Collection::DeletionLog).await.len(), 2);
}

#[tokio::test]
async fn test_deletion_refuses_internal_and_invalid_names() {
    let h = harness();
    assert!(matches!(
        h.deletion.delete("form_definitions", "admin").await,
        Err(DeletionError::Refused { .. })
    ));
    assert!(matches!(
        h.deletion.delete("crop; DROP TABLE x", "admin").await,
        Err(DeletionError::Refused { .. })
    ));
    assert!(h.repo.records(Collection::DeletionLog).await.is_empty());
}

#[tokio::test]
async fn test_catalog_returns_published_definition() {
    let h = harness();
    let mut designer = SchemaDesigner::from_grid(&farmer_grid(), Some("farmer_intake"), None);
    designer.set_field_type(2, FieldType::Text).unwrap();
    designer
        .set_visibility(1, Some(VisibilityCondition::equals("isverified", "yes")))
        .unwrap();
    let definition = designer
        .to_definition(DefinitionMetadata {
            dashboard_entry_id: "dash-1".to_string(),
            district_id: None,
            created_by: "admin".to_string(),
        })
        .unwrap();
    h.provisioning.publish(definition, None).await.unwrap();

    let stored = h.catalog.get("farmer_intake").await.unwrap();
    assert_eq!(stored.fields.len(), 3);
    assert_eq!(stored.fields[1].name, "quantity");
    assert!(stored.fields[1].visibility_condition.is_some());
    assert_eq!(h.catalog.list(None, 0).await.unwrap().len(), 1);
    assert!(h.catalog.find("missing").await.unwrap().is_none());

    let hidden: HashMap<String, String> =
        HashMap::from([("isverified".to_string(), "no".to_string())]);
    let evaluation = evaluate_entry(&stored, &hidden);
    assert_eq!(evaluation.visibility.get("quantity"), Some(&false));

    let shown: HashMap<String, String> = HashMap::from([
        ("isverified".to_string(), "yes".to_string()),
        ("quantity".to_string(), "abc".to_string()),
    ]);
    let evaluation = evaluate_entry(&stored, &shown);
    assert_eq!(evaluation.visibility.get("quantity"), Some(&true));
    assert!(evaluation.violations.contains_key("quantity"));
}
