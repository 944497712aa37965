//! # Item Catalog Routes
//!
//! Plain CRUD over the catalog. Deleting an item only deactivates it so
//! old slips can still be cancelled and restore their stock.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use tally_core::validation::{validate_item_patch, validate_new_item, validate_stock_level};
use tally_core::{Item, ItemPatch, NewItem};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/items/low-stock", get(low_stock))
        .route(
            "/api/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedResponse {
    pub message: String,
    pub id: String,
}

async fn list_items(
    State(state): State<AppState>,
    query: Result<Query<ListItemsQuery>, QueryRejection>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let Query(query) = query?;
    let items = state
        .db
        .items()
        .list(query.search.as_deref(), query.include_inactive)
        .await?;
    Ok(Json(items))
}

async fn create_item(
    State(state): State<AppState>,
    payload: Result<Json<NewItem>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let Json(new_item) = payload?;
    validate_new_item(&new_item)?;

    let item = state.db.items().insert(&new_item).await?;
    info!(sku = %item.sku, id = %item.id, "Item created");
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Item>, ApiError> {
    state
        .db
        .items()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Item", &id))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ItemPatch>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let Json(patch) = payload?;
    validate_item_patch(&patch)?;

    let item = state.db.items().update(&id, &patch).await?;
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    state.db.items().soft_delete(&id).await?;
    info!(id = %id, "Item deactivated");

    Ok(Json(DeletedResponse {
        message: "Item deactivated".to_string(),
        id,
    }))
}

/// Items at or below `threshold`, the configured default, or otherwise
/// their own min stock level.
async fn low_stock(
    State(state): State<AppState>,
    query: Result<Query<LowStockQuery>, QueryRejection>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let Query(query) = query?;
    if let Some(threshold) = query.threshold {
        validate_stock_level("threshold", threshold)?;
    }

    let threshold = query.threshold.or(state.config.low_stock_threshold);
    let items = state.db.items().low_stock(threshold).await?;
    Ok(Json(items))
}
