//! # Formwright - dynamic form provisioning
//!
//! Formwright turns an imported header row into a form design, lets an
//! administrator refine field types, validation rules, computed fields and
//! conditional visibility, and publishes the result as a storage table, a
//! navigation entry and a persisted form definition.
//!
//! ## Features
//!
//! - **Schema design**: identifier sanitization with collision avoidance,
//!   type inference, design-time validation including dependency cycles
//! - **Rule evaluation**: visibility, calculation formulas and per-field
//!   validation for data entry
//! - **Provisioning**: create-table DDL for SQLite, PostgreSQL and MySQL,
//!   with rollback of partially completed publishes
//! - **Teardown**: best-effort, resumable deletion with per-step reporting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formwright::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::new()?;
//!     println!("listening on {}:{}", settings.server.host, settings.server.port);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Domain**: form, field and navigation types
//! - **Schema**: designer, rule evaluation and DDL generation
//! - **Provisioning**: publish and teardown orchestration
//! - **Persistence**: repository interface and SQLx backend
//! - **Adapters**: REST API and health endpoints
//! - **Config**: configuration management

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod persistence;
pub mod provisioning;
pub mod schema;

use crate::adapters::api_handler::{self, ApiState};
use crate::adapters::health_handler::HealthHandler;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Creates the Axum application router with all endpoints configured.
///
/// # Arguments
///
/// * `api_state` - Design sessions and provisioning orchestrators
/// * `health_handler` - Health check handler
pub fn create_app(api_state: ApiState, health_handler: Arc<HealthHandler>) -> Router {
    let health_router = Router::new()
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/ready", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.ready().await }
            }
        }))
        .route("/health/live", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }));

    let api_router = Router::new()
        // Design sessions
        .route("/designs", post(api_handler::create_design))
        .route(
            "/designs/:id",
            get(api_handler::get_design)
                .put(api_handler::update_design)
                .delete(api_handler::delete_design),
        )
        .route("/designs/:id/fields", post(api_handler::add_field))
        .route(
            "/designs/:id/fields/:index",
            put(api_handler::update_field).delete(api_handler::remove_field),
        )
        .route("/designs/:id/validate", post(api_handler::validate_design))
        .route("/designs/:id/publish", post(api_handler::publish_design))
        // Published forms
        .route("/forms", get(api_handler::list_forms))
        .route("/forms/:table", get(api_handler::get_form).delete(api_handler::delete_form))
        .route("/forms/:table/evaluate", post(api_handler::evaluate_form_entry))
        .with_state(api_state);

    health_router.nest("/api", api_router).layer(
        tower_http::cors::CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}
