//! # Sale Routes
//!
//! ```text
//! POST   /api/sales        create_sale  → 201 { slip, incomeEntry }
//! GET    /api/sales        list_sales   → 200 Page<Slip>
//! GET    /api/sales/{id}   get_sale     → 200 Slip      (id or slip number)
//! DELETE /api/sales/{id}   cancel_sale  → 200 CancelReceipt
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::routes::parse_range;
use crate::state::AppState;
use tally_core::validation::validate_pagination;
use tally_core::{CancelReceipt, Page, PaymentMethod, SaleReceipt, SaleRequest, Slip, SlipFilter, SlipStatus};

const DEFAULT_PAGE_LIMIT: u32 = 20;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sales", post(create_sale).get(list_sales))
        .route("/api/sales/{id}", get(get_sale).delete(cancel_sale))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSalesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub payment_method: Option<String>,
    pub customer: Option<String>,
}

async fn create_sale(
    State(state): State<AppState>,
    payload: Result<Json<SaleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SaleReceipt>), ApiError> {
    let Json(request) = payload?;
    debug!(lines = request.products.len(), "create_sale");

    let receipt = state.db.sales().create_sale(request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn cancel_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelReceipt>, ApiError> {
    debug!(reference = %id, "cancel_sale");

    let receipt = state.db.sales().cancel_sale(&id).await?;
    Ok(Json(receipt))
}

async fn get_sale(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Slip>, ApiError> {
    state
        .db
        .slips()
        .find_by_reference(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Sale", &id))
}

async fn list_sales(
    State(state): State<AppState>,
    query: Result<Query<ListSalesQuery>, QueryRejection>,
) -> Result<Json<Page<Slip>>, ApiError> {
    let Query(query) = query?;

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    validate_pagination(page, limit)?;

    let filter = SlipFilter {
        range: parse_range(query.start_date.as_deref(), query.end_date.as_deref())?,
        status: query
            .status
            .as_deref()
            .map(str::parse::<SlipStatus>)
            .transpose()?,
        payment_method: query
            .payment_method
            .as_deref()
            .map(str::parse::<PaymentMethod>)
            .transpose()?,
        customer: query
            .customer
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    };

    let slips = state.db.slips().list(&filter, page, limit).await?;
    Ok(Json(slips))
}
