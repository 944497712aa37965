//! # Income Routes
//!
//! Read-only views of the income ledger. Entries are written and removed
//! only by the sale coordinator.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::parse_range;
use crate::state::AppState;
use tally_core::{DateRange, IncomeEntry};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/income", get(list_income))
        .route("/api/income/today", get(today))
        .route("/api/income/weekly", get(weekly))
        .route("/api/income/monthly", get(monthly))
        .route("/api/income/slip/{slip_number}", get(by_slip_number))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Entries in a range, newest first, with their sum.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSummary {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub count: usize,
    pub total_income_cents: i64,
    pub entries: Vec<IncomeEntry>,
}

async fn summarize(state: &AppState, range: DateRange) -> Result<Json<IncomeSummary>, ApiError> {
    let ledger = state.db.income();
    let entries = ledger.list(range).await?;
    let total = ledger.total(range).await?;

    Ok(Json(IncomeSummary {
        start: range.start,
        end: range.end,
        count: entries.len(),
        total_income_cents: total.cents(),
        entries,
    }))
}

async fn list_income(
    State(state): State<AppState>,
    query: Result<Query<IncomeQuery>, QueryRejection>,
) -> Result<Json<IncomeSummary>, ApiError> {
    let Query(query) = query?;
    let range = parse_range(query.start_date.as_deref(), query.end_date.as_deref())?;
    summarize(&state, range).await
}

async fn today(State(state): State<AppState>) -> Result<Json<IncomeSummary>, ApiError> {
    summarize(&state, DateRange::day_of(Utc::now())).await
}

async fn weekly(State(state): State<AppState>) -> Result<Json<IncomeSummary>, ApiError> {
    summarize(&state, DateRange::last_days(Utc::now(), 7)).await
}

async fn monthly(State(state): State<AppState>) -> Result<Json<IncomeSummary>, ApiError> {
    summarize(&state, DateRange::month_of(Utc::now())).await
}

async fn by_slip_number(
    State(state): State<AppState>,
    Path(slip_number): Path<String>,
) -> Result<Json<IncomeEntry>, ApiError> {
    state
        .db
        .income()
        .find_by_slip_number(&slip_number)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Income entry for slip", &slip_number))
}
