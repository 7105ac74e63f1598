use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use bson::oid::ObjectId;
use bson::{DateTime, Document};
use serde_json::{json, Value};
use tracing::info;

use super::Resource;
use crate::error::AppError;
use crate::serialize::to_transport;
use crate::store::{parse_object_id, SharedStore, StoreError};

pub(crate) async fn list_records<R: Resource>(
    State(store): State<SharedStore>,
    query: Result<Query<R::Query>, QueryRejection>,
) -> Result<Json<Vec<Value>>, AppError> {
    let Query(query) = query?;
    let records = store
        .find(R::COLLECTION, R::filter(&query), R::sort(&query))
        .await?;
    let body = records
        .into_iter()
        .map(to_transport)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(body))
}

pub(crate) async fn get_record<R: Resource>(
    State(store): State<SharedStore>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_object_id(&raw_id)?;
    let record = fetch::<R>(&store, id).await?;
    Ok(Json(to_transport(record)?))
}

pub(crate) async fn create_record<R: Resource>(
    State(store): State<SharedStore>,
    payload: Result<Json<R::Create>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(payload) = payload?;
    let mut document = bson::to_document(&payload)?;
    document.insert("createdAt", DateTime::now());

    let id = store.insert_one(R::COLLECTION, document).await?;
    info!(collection = R::COLLECTION.name(), %id, "record created");

    let stored = store
        .find_by_id(R::COLLECTION, id)
        .await?
        .ok_or_else(|| StoreError::Backend(format!("{id} vanished after insert")))?;
    Ok((StatusCode::CREATED, Json(to_transport(stored)?)))
}

pub(crate) async fn update_record<R: Resource>(
    State(store): State<SharedStore>,
    Path(raw_id): Path<String>,
    payload: Result<Json<R::Patch>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let id = parse_object_id(&raw_id)?;
    let Json(patch) = payload?;
    let changes = bson::to_document(&patch)?;

    if !changes.is_empty() {
        let matched = store.update_by_id(R::COLLECTION, id, changes).await?;
        if !matched {
            return Err(AppError::not_found(R::LABEL));
        }
        info!(collection = R::COLLECTION.name(), %id, "record updated");
    }

    let record = fetch::<R>(&store, id).await?;
    Ok(Json(to_transport(record)?))
}

pub(crate) async fn delete_record<R: Resource>(
    State(store): State<SharedStore>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_object_id(&raw_id)?;
    if !store.delete_by_id(R::COLLECTION, id).await? {
        return Err(AppError::not_found(R::LABEL));
    }
    info!(collection = R::COLLECTION.name(), %id, "record deleted");
    Ok(Json(
        json!({ "message": format!("{} deleted successfully", R::LABEL) }),
    ))
}

async fn fetch<R: Resource>(store: &SharedStore, id: ObjectId) -> Result<Document, AppError> {
    store
        .find_by_id(R::COLLECTION, id)
        .await?
        .ok_or_else(|| AppError::not_found(R::LABEL))
}
