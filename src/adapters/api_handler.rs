//! REST API handlers for form design and provisioning
//!
//! Design sessions are edited in memory; publishing and deleting go through
//! the provisioning orchestrators.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::adapters::session_store::DesignSessionStore;
use crate::domain::{
    FieldDefinition, FieldType, FormDefinition, ValidationRules, VisibilityCondition,
};
use crate::persistence::FormRepository;
use crate::provisioning::{
    DeletionError, DeletionOrchestrator, DeletionReport, FormCatalog, NavigationSettings,
    ProvisioningError, ProvisioningOrchestrator, PublishedForm,
};
use crate::schema::{
    evaluate_entry, DefinitionMetadata, DesignerError, EntryEvaluation, EntryValues, SchemaDesigner,
};

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub sessions: DesignSessionStore,
    pub catalog: FormCatalog,
    pub provisioning: ProvisioningOrchestrator,
    pub deletion: DeletionOrchestrator,
}

impl ApiState {
    pub fn new(repository: Arc<dyn FormRepository>, navigation: NavigationSettings) -> Self {
        Self {
            sessions: DesignSessionStore::new(),
            catalog: FormCatalog::new(repository.clone()),
            provisioning: ProvisioningOrchestrator::new(repository.clone(), navigation),
            deletion: DeletionOrchestrator::new(repository),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed request that still carries a payload (e.g. a partial report)
    pub fn failure(data: T, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(message.into()),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }
}

/// A design session as returned to clients
#[derive(Debug, Serialize)]
pub struct DesignDto {
    pub id: String,
    pub table_name: String,
    pub label: String,
    pub fields: Vec<FieldDefinition>,
    /// Per field, the names it may reference in rules
    pub reference_targets: Vec<Vec<String>>,
}

impl DesignDto {
    fn new(id: &str, designer: &SchemaDesigner) -> Self {
        Self {
            id: id.to_string(),
            table_name: designer.table_name().to_string(),
            label: designer.label().to_string(),
            fields: designer.fields().to_vec(),
            reference_targets: designer.all_reference_targets().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationDto {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluationDto {
    pub valid: bool,
    #[serde(flatten)]
    pub evaluation: EntryEvaluation,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateDesignRequest {
    /// Imported grid; row 0 holds the headers
    pub grid: Vec<Vec<String>>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDesignRequest {
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Present-but-null clears a rule; absent leaves it unchanged
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFieldRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,
    #[serde(default, deserialize_with = "double_option")]
    pub validation_rules: Option<Option<ValidationRules>>,
    #[serde(default, deserialize_with = "double_option")]
    pub calculation_formula: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub visibility_condition: Option<Option<VisibilityCondition>>,
    /// Move the field to this position
    #[serde(default)]
    pub position: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AddFieldRequest {
    pub label: String,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub dashboard_entry_id: String,
    #[serde(default)]
    pub district_id: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub parent_section_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListFormsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFormQuery {
    #[serde(default)]
    pub requested_by: Option<String>,
}

fn session_not_found<T>() -> (StatusCode, Json<ApiResponse<T>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Design session not found")),
    )
}

// ============================================================================
// Design Session Endpoints
// ============================================================================

/// POST /api/designs - Start a design session from an imported grid
pub async fn create_design(
    State(state): State<ApiState>,
    Json(request): Json<CreateDesignRequest>,
) -> impl IntoResponse {
    if request.grid.first().map_or(true, |headers| headers.is_empty()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<DesignDto>::error("Grid must contain a header row")),
        );
    }

    let designer = SchemaDesigner::from_grid(
        &request.grid,
        request.table_name.as_deref(),
        request.label.as_deref(),
    );
    let dto_designer = designer.clone();
    let id = state.sessions.create(designer).await;

    tracing::info!(
        session = %id,
        table = %dto_designer.table_name(),
        fields = dto_designer.fields().len(),
        "Design session created"
    );
    (StatusCode::CREATED, Json(ApiResponse::success(DesignDto::new(&id, &dto_designer))))
}

/// GET /api/designs/:id - Get a design session
pub async fn get_design(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.sessions.get(&id).await {
        Some(designer) => (
            StatusCode::OK,
            Json(ApiResponse::success(DesignDto::new(&id, &designer))),
        ),
        None => session_not_found(),
    }
}

/// PUT /api/designs/:id - Change the table name or form label
pub async fn update_design(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDesignRequest>,
) -> impl IntoResponse {
    let updated = state
        .sessions
        .update(&id, |designer| {
            if let Some(table_name) = &request.table_name {
                designer.set_table_name(table_name);
            }
            if let Some(label) = &request.label {
                designer.set_form_label(label.trim());
            }
            DesignDto::new(&id, designer)
        })
        .await;

    match updated {
        Some(dto) => (StatusCode::OK, Json(ApiResponse::success(dto))),
        None => session_not_found(),
    }
}

/// DELETE /api/designs/:id - Discard a design session
pub async fn delete_design(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.sessions.remove(&id).await {
        Some(_) => (StatusCode::OK, Json(ApiResponse::<()>::ok())),
        None => session_not_found(),
    }
}

/// PUT /api/designs/:id/fields/:index - Edit one field
pub async fn update_field(
    State(state): State<ApiState>,
    Path((id, index)): Path<(String, usize)>,
    Json(request): Json<UpdateFieldRequest>,
) -> impl IntoResponse {
    let result = state
        .sessions
        .update(&id, |designer| -> Result<DesignDto, DesignerError> {
            // The session changes only if every edit succeeds
            let mut draft = designer.clone();
            // Type first: it resets the rule sections the request may set
            if let Some(field_type) = request.field_type {
                draft.set_field_type(index, field_type)?;
            }
            if let Some(name) = &request.name {
                draft.rename_field(index, name)?;
            }
            if let Some(label) = &request.label {
                draft.set_label(index, label.trim())?;
            }
            if let Some(rules) = request.validation_rules {
                draft.set_validation(index, rules)?;
            }
            if let Some(formula) = request.calculation_formula {
                draft.set_formula(index, formula)?;
            }
            if let Some(condition) = request.visibility_condition {
                draft.set_visibility(index, condition)?;
            }
            if let Some(position) = request.position {
                draft.move_field(index, position)?;
            }
            *designer = draft;
            Ok(DesignDto::new(&id, designer))
        })
        .await;

    match result {
        Some(Ok(dto)) => (StatusCode::OK, Json(ApiResponse::success(dto))),
        Some(Err(e)) => (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
        None => session_not_found(),
    }
}

/// POST /api/designs/:id/fields - Append a field
pub async fn add_field(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<AddFieldRequest>,
) -> impl IntoResponse {
    let result = state
        .sessions
        .update(&id, |designer| {
            designer.add_field(&request.label, request.field_type);
            DesignDto::new(&id, designer)
        })
        .await;

    match result {
        Some(dto) => (StatusCode::CREATED, Json(ApiResponse::success(dto))),
        None => session_not_found(),
    }
}

/// DELETE /api/designs/:id/fields/:index - Remove a field
pub async fn remove_field(
    State(state): State<ApiState>,
    Path((id, index)): Path<(String, usize)>,
) -> impl IntoResponse {
    let result = state
        .sessions
        .update(&id, |designer| {
            designer
                .remove_field(index)
                .map(|_| DesignDto::new(&id, designer))
        })
        .await;

    match result {
        Some(Ok(dto)) => (StatusCode::OK, Json(ApiResponse::success(dto))),
        Some(Err(e)) => (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
        None => session_not_found(),
    }
}

/// POST /api/designs/:id/validate - Design-time errors that block publishing
pub async fn validate_design(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.sessions.get(&id).await {
        Some(designer) => {
            let errors: Vec<String> = designer
                .validate_before_publish()
                .iter()
                .map(ToString::to_string)
                .collect();
            let dto = ValidationDto {
                valid: errors.is_empty(),
                errors,
            };
            (StatusCode::OK, Json(ApiResponse::success(dto)))
        }
        None => session_not_found(),
    }
}

/// POST /api/designs/:id/publish - Provision the form and close the session
pub async fn publish_design(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<PublishRequest>,
) -> impl IntoResponse {
    let Some(designer) = state.sessions.get(&id).await else {
        return session_not_found();
    };

    let metadata = DefinitionMetadata {
        dashboard_entry_id: request.dashboard_entry_id,
        district_id: request.district_id.filter(|d| !d.trim().is_empty()),
        created_by: request.created_by,
    };
    let definition = match designer.to_definition(metadata) {
        Ok(definition) => definition,
        Err(errors) => return provisioning_error(ProvisioningError::Design(errors)),
    };

    match state
        .provisioning
        .publish(definition, request.parent_section_id.as_deref())
        .await
    {
        Ok(published) => {
            state.sessions.remove(&id).await;
            (StatusCode::CREATED, Json(ApiResponse::success(published)))
        }
        Err(e) => provisioning_error(e),
    }
}

fn provisioning_error(error: ProvisioningError) -> (StatusCode, Json<ApiResponse<PublishedForm>>) {
    let status = error.status_code();
    let mut message = error.to_string();
    if error.left_orphans() {
        message.push_str(" (rollback incomplete; manual cleanup required)");
    }
    tracing::warn!(error = %message, "Publish rejected");
    (status, Json(ApiResponse::error(message)))
}

// ============================================================================
// Published Form Endpoints
// ============================================================================

/// GET /api/forms - List published forms
pub async fn list_forms(
    State(state): State<ApiState>,
    Query(query): Query<ListFormsQuery>,
) -> impl IntoResponse {
    match state.catalog.list(query.limit, query.offset).await {
        Ok(forms) => (StatusCode::OK, Json(ApiResponse::success(forms))),
        Err(e) => (e.status_code(), Json(ApiResponse::<Vec<FormDefinition>>::error(e.to_string()))),
    }
}

/// GET /api/forms/:table - Get a published form definition
pub async fn get_form(
    State(state): State<ApiState>,
    Path(table): Path<String>,
) -> impl IntoResponse {
    let table = urlencoding::decode(&table).map(|s| s.into_owned()).unwrap_or(table);
    match state.catalog.get(&table).await {
        Ok(form) => (StatusCode::OK, Json(ApiResponse::success(form))),
        Err(e) => (e.status_code(), Json(ApiResponse::<FormDefinition>::error(e.to_string()))),
    }
}

/// DELETE /api/forms/:table - Retire a form
pub async fn delete_form(
    State(state): State<ApiState>,
    Path(table): Path<String>,
    Query(query): Query<DeleteFormQuery>,
) -> impl IntoResponse {
    let table = urlencoding::decode(&table).map(|s| s.into_owned()).unwrap_or(table);
    let requested_by = query.requested_by.unwrap_or_else(|| "unknown".to_string());

    match state.deletion.delete(&table, &requested_by).await {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::success(report))),
        Err(e) => {
            let status = e.status_code();
            let message = e.to_string();
            match e {
                DeletionError::Incomplete(report) => {
                    (status, Json(ApiResponse::failure(report, message)))
                }
                DeletionError::Refused { .. } => {
                    (status, Json(ApiResponse::<DeletionReport>::error(message)))
                }
            }
        }
    }
}

/// POST /api/forms/:table/evaluate - Visibility, computed values and
/// violations for one entry
pub async fn evaluate_form_entry(
    State(state): State<ApiState>,
    Path(table): Path<String>,
    Json(values): Json<serde_json::Map<String, Value>>,
) -> impl IntoResponse {
    let table = urlencoding::decode(&table).map(|s| s.into_owned()).unwrap_or(table);
    let definition = match state.catalog.get(&table).await {
        Ok(definition) => definition,
        Err(e) => {
            return (
                e.status_code(),
                Json(ApiResponse::<EvaluationDto>::error(e.to_string())),
            )
        }
    };

    let evaluation = evaluate_entry(&definition, &entry_values(values));
    let dto = EvaluationDto {
        valid: evaluation.is_valid(),
        evaluation,
    };
    (StatusCode::OK, Json(ApiResponse::success(dto)))
}

/// Entry values as text; JSON numbers and booleans are accepted too
fn entry_values(values: serde_json::Map<String, Value>) -> EntryValues {
    values
        .into_iter()
        .filter_map(|(name, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s,
                other => other.to_string(),
            };
            Some((name, text))
        })
        .collect()
}
