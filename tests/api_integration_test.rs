use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use formwright::adapters::api_handler::ApiState;
use formwright::adapters::health_handler::HealthHandler;
use formwright::persistence::{Collection, FailPoint, FormRepository, InMemoryFormRepository};
use formwright::provisioning::NavigationSettings;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn app() -> (Router, InMemoryFormRepository) {
    let repo = InMemoryFormRepository::new();
    let shared: Arc<dyn FormRepository> = Arc::new(repo.clone());
    let api_state = ApiState::new(shared.clone(), NavigationSettings::default());
    let health = Arc::new(HealthHandler::new(shared));
    (formwright::create_app(api_state, health), repo)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_design(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/designs",
        Some(json!({
            "grid": [["Farmer Name", "Quantity", "Is Verified"], ["Ama", "12", "yes"]],
            "table_name": "Farmer Intake",
            "label": "Farmer Intake"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["table_name"], "farmerintake");
    assert_eq!(body["data"]["fields"][1]["type"], "number");
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _) = app();

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "sqlite");

    let (status, _) = send(&app, "GET", "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_design_publish_evaluate_delete() {
    let (app, repo) = app();
    let id = create_design(&app).await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/designs/{}/fields/1", id),
        Some(json!({
            "label": "Quantity (kg)",
            "validationRules": { "required": true, "min": 0, "max": 1000 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fields"][1]["label"], "Quantity (kg)");
    assert_eq!(body["data"]["fields"][1]["validationRules"]["required"], true);

    let (status, body) = send(&app, "POST", &format!("/api/designs/{}/validate", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/designs/{}/publish", id),
        Some(json!({ "dashboard_entry_id": "dash-1", "created_by": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["navigation_entry"]["url"], "/forms/farmerintake");

    // The session is closed once published
    let (status, _) = send(&app, "GET", &format!("/api/designs/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/api/forms", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        "/api/forms/farmerintake/evaluate",
        Some(json!({ "farmername": "Ama", "quantity": 5000, "isverified": "yes" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], false);
    assert!(body["data"]["violations"]["quantity"].is_array());

    let (status, body) = send(
        &app,
        "DELETE",
        "/api/forms/farmerintake?requested_by=admin",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["steps"].as_array().unwrap().len(), 4);
    assert!(repo.tables().await.is_empty());

    let (status, _) = send(&app, "GET", "/api/forms/farmerintake", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_design_cannot_be_published() {
    let (app, repo) = app();
    let id = create_design(&app).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/designs/{}/fields/1", id),
        Some(json!({ "calculationFormula": "quantity * 2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "POST", &format!("/api/designs/{}/validate", id), None).await;
    assert_eq!(body["data"]["valid"], false);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/designs/{}/publish", id),
        Some(json!({ "dashboard_entry_id": "dash-1", "created_by": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(repo.tables().await.is_empty());

    // The session survives a rejected publish
    let (status, _) = send(&app, "GET", &format!("/api/designs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_field_edits() {
    let (app, _) = app();
    let id = create_design(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/designs/{}/fields", id),
        Some(json!({ "label": "Quantity", "type": "number" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["fields"][3]["name"], "quantity_1");

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/designs/{}/fields/3", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fields"].as_array().unwrap().len(), 3);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/designs/{}/fields/9", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/designs/{}", id),
        Some(json!({ "table_name": "Harvest 2024" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["table_name"], "harvest2024");

    let (status, _) = send(&app, "DELETE", &format!("/api/designs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/api/designs/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_field_edit_leaves_session_unchanged() {
    let (app, _) = app();
    let id = create_design(&app).await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/designs/{}/fields/0", id),
        Some(json!({ "type": "number", "label": "Renamed", "position": 99 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(&app, "GET", &format!("/api/designs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fields"][0]["type"], "text");
    assert_eq!(body["data"]["fields"][0]["label"], "Farmer Name");
}

#[tokio::test]
async fn test_rejected_requests() {
    let (app, _) = app();

    let (status, _) = send(&app, "POST", "/api/designs", Some(json!({ "grid": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "DELETE", "/api/forms/form_definitions", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_incomplete_deletion_returns_report() {
    let (app, repo) = app();
    let id = create_design(&app).await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/designs/{}/publish", id),
        Some(json!({ "dashboard_entry_id": "dash-1", "created_by": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    repo.fail_on(FailPoint::DropTable).await;
    let (status, body) = send(&app, "DELETE", "/api/forms/farmerintake", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    let steps = body["data"]["steps"].as_array().unwrap();
    assert_eq!(steps[3]["step"], "drop_table");
    assert_eq!(steps[3]["status"], "failed");
    assert!(repo.records(Collection::FormDefinitions).await.is_empty());

    repo.clear_failure(FailPoint::DropTable).await;
    let (status, _) = send(&app, "DELETE", "/api/forms/farmerintake", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(repo.tables().await.is_empty());
}
