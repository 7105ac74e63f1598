use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::aggregation::{aggregation_router, Report};
use crate::error::AppError;
use crate::listings::{Agents, Inquiries, Properties, Users};
use crate::resources::{resource_router, Resource};
use crate::seed::{self, SeedOutcome};
use crate::store::SharedStore;

/// The complete listing API over `store`: the directory at `/`, bootstrap, the four
/// entity resources and the reports.
pub fn api_router(store: SharedStore) -> Router {
    Router::new()
        .route("/", get(directory))
        .route("/api/init-db", post(init_db))
        .merge(resource_router::<Properties>())
        .merge(resource_router::<Agents>())
        .merge(resource_router::<Users>())
        .merge(resource_router::<Inquiries>())
        .merge(aggregation_router())
        .with_state(store)
}

async fn directory() -> Json<Value> {
    let reports: Vec<String> = Report::ALL
        .iter()
        .map(|report| format!("/api/aggregation/{}", report.slug()))
        .collect();

    Json(json!({
        "message": "Real Estate Listing Platform API",
        "endpoints": {
            "properties": Properties::PATH,
            "agents": Agents::PATH,
            "users": Users::PATH,
            "inquiries": Inquiries::PATH,
            "aggregation": "/api/aggregation",
            "reports": reports,
            "init_db": "/api/init-db",
        }
    }))
}

async fn init_db(State(store): State<SharedStore>) -> Result<Json<Value>, AppError> {
    let outcome = seed::initialize(store.as_ref())
        .await
        .map_err(AppError::Bootstrap)?;
    if outcome == SeedOutcome::AlreadySeeded {
        info!("init-db called on a populated database");
    }
    Ok(Json(json!({ "message": "Database initialized successfully" })))
}
