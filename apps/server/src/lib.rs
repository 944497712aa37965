//! # Tally Server Library
//!
//! Router and handlers for the Tally HTTP API. `main.rs` only wires
//! configuration, the database and the listener around [`build_router`].
//!
//! ## Module Organization
//! ```text
//! tally_server/
//! ├── lib.rs          ◄─── You are here (router)
//! ├── main.rs         ◄─── Startup & graceful shutdown
//! ├── config.rs       ◄─── ServerConfig (defaults, tally.toml, TALLY_* env)
//! ├── state.rs        ◄─── AppState shared by handlers
//! ├── error.rs        ◄─── ApiError → JSON error responses
//! └── routes/
//!     ├── sales.rs    ◄─── create / cancel / get / list sales
//!     ├── income.rs   ◄─── income ledger views
//!     ├── items.rs    ◄─── item catalog
//!     ├── analytics.rs◄─── dashboard + sales trends
//!     └── health.rs   ◄─── liveness + database check
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;

pub use error::{ApiError, ErrorCode};
pub use state::AppState;

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::sales::routes())
        .merge(routes::income::routes())
        .merge(routes::items::routes())
        .merge(routes::analytics::routes())
        .merge(routes::health::routes())
        .with_state(state)
}

// =============================================================================
// Router Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tally_core::NewItem;
    use tally_db::{Database, DbConfig};
    use tower::ServiceExt;

    async fn app() -> (Router, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.items().insert(&NewItem::new("A", "Apple", 5, Some(1000))).await.unwrap();
        db.items().insert(&NewItem::new("B", "Banana", 5, Some(500))).await.unwrap();
        let router = build_router(AppState::new(db.clone(), ServerConfig::default()));
        (router, db)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn sale_body() -> Value {
        json!({
            "customerName": "Asha",
            "paymentMethod": "Cash",
            "products": [
                { "productRef": "A", "quantity": 2 },
                { "productRef": "Banana", "quantity": 1 }
            ],
            "taxCents": 200,
            "discountCents": 100
        })
    }

    #[tokio::test]
    async fn test_create_get_and_cancel_sale() {
        let (app, db) = app().await;

        let (status, body) = send(&app, "POST", "/api/sales", Some(sale_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["slip"]["totalCents"], 2600);
        assert_eq!(body["slip"]["status"], "Paid");
        assert_eq!(body["incomeEntry"]["totalIncomeCents"], 2600);
        let id = body["slip"]["id"].as_str().unwrap().to_string();
        let slip_number = body["slip"]["slipNumber"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "GET", &format!("/api/sales/{slip_number}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.as_str());
        assert_eq!(body["lines"].as_array().unwrap().len(), 2);

        let (status, body) = send(&app, "DELETE", &format!("/api/sales/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slip"]["status"], "Cancelled");

        let (status, body) = send(&app, "DELETE", &format!("/api/sales/{id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "AlreadyCancelled");

        let items = db.items().list(None, false).await.unwrap();
        assert!(items.iter().all(|i| i.quantity == 5));
    }

    #[tokio::test]
    async fn test_insufficient_stock_response() {
        let (app, _db) = app().await;
        let body = json!({ "products": [{ "productRef": "A", "quantity": 6 }] });

        let (status, body) = send(&app, "POST", "/api/sales", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InsufficientStock");
        assert_eq!(body["productName"], "Apple");
        assert_eq!(body["available"], 5);
        assert_eq!(body["requested"], 6);
    }

    #[tokio::test]
    async fn test_sale_error_statuses() {
        let (app, _db) = app().await;

        let unknown = json!({ "products": [{ "productRef": "Cherry", "quantity": 1 }] });
        let (status, body) = send(&app, "POST", "/api/sales", Some(unknown)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFound");

        let empty = json!({ "products": [] });
        let (status, body) = send(&app, "POST", "/api/sales", Some(empty)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ValidationError");

        let (status, _) = send(&app, "DELETE", "/api/sales/SLP-missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "GET", "/api/sales?status=bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "status");
    }

    #[tokio::test]
    async fn test_ambiguous_reference_is_conflict() {
        let (app, db) = app().await;
        db.items().insert(&NewItem::new("A-2", "apple", 5, Some(900))).await.unwrap();

        let body = json!({ "products": [{ "productRef": "APPLE", "quantity": 1 }] });
        let (status, body) = send(&app, "POST", "/api/sales", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "AmbiguousReference");
    }

    #[tokio::test]
    async fn test_list_sales_and_income() {
        let (app, _db) = app().await;
        for _ in 0..3 {
            let body = json!({ "products": [{ "productRef": "B", "quantity": 1 }], "paymentMethod": "UPI" });
            let (status, _) = send(&app, "POST", "/api/sales", Some(body)).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app, "GET", "/api/sales?page=1&limit=2&paymentMethod=upi", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);

        let (status, body) = send(&app, "GET", "/api/income/today", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
        assert_eq!(body["totalIncomeCents"], 1500);

        let (status, body) = send(&app, "GET", "/api/income?startDate=2000-01-01", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
    }

    #[tokio::test]
    async fn test_item_crud_and_low_stock() {
        let (app, _db) = app().await;

        let new_item = json!({ "sku": "c-1", "name": "Cherry", "quantity": 2, "priceCents": 300 });
        let (status, body) = send(&app, "POST", "/api/items", Some(new_item.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sku"], "C-1");
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "POST", "/api/items", Some(new_item)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Conflict");

        let (status, body) = send(&app, "GET", "/api/items/low-stock", None).await;
        assert_eq!(status, StatusCode::OK);
        // Apple and Banana sit at 5, under the default min level of 10
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, body) = send(&app, "GET", "/api/items/low-stock?threshold=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = send(&app, "PUT", &format!("/api/items/{id}"), Some(json!({ "quantity": 40 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quantity"], 40);

        let (status, _) = send(&app, "DELETE", &format!("/api/items/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "GET", &format!("/api/items/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isActive"], false);

        let (status, _) = send(&app, "GET", "/api/items/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _db) = app().await;
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);
    }

    #[tokio::test]
    async fn test_dashboard_counts_and_revenue() {
        let (app, _db) = app().await;

        let (_, first) = send(&app, "POST", "/api/sales", Some(sale_body())).await;
        let card = json!({ "paymentMethod": "Card", "products": [{ "productRef": "B", "quantity": 1 }] });
        let (status, _) = send(&app, "POST", "/api/sales", Some(card)).await;
        assert_eq!(status, StatusCode::CREATED);

        let id = first["slip"]["id"].as_str().unwrap();
        let (status, _) = send(&app, "DELETE", &format!("/api/sales/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "GET", "/api/analytics/dashboard", None).await;
        assert_eq!(status, StatusCode::OK);
        let summary = &body["summary"];
        assert_eq!(summary["totalItems"], 2);
        assert_eq!(summary["totalSlips"], 2);
        assert_eq!(summary["totalIncomeRecords"], 1);
        assert_eq!(summary["totalRevenueCents"], 500);
        assert_eq!(summary["todaySlips"], 2);
        assert_eq!(summary["todayRevenueCents"], 500);
        // Apple 5, Banana 4: both under the default level of 10
        assert_eq!(summary["lowStockItems"], 2);

        let recent = body["recentSales"].as_array().unwrap();
        assert_eq!(recent.len(), 2);

        let methods = body["paymentMethods"].as_array().unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0]["paymentMethod"], "Card");
        assert_eq!(methods[0]["count"], 1);
        assert_eq!(methods[0]["totalCents"], 500);
    }

    #[tokio::test]
    async fn test_sales_trends_periods() {
        let (app, _db) = app().await;
        send(&app, "POST", "/api/sales", Some(sale_body())).await;
        let single = json!({ "products": [{ "productRef": "B", "quantity": 1 }] });
        send(&app, "POST", "/api/sales", Some(single)).await;

        let (status, body) = send(&app, "GET", "/api/analytics/sales-trends", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["period"], "week");
        let points = body["points"].as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["totalSalesCents"], 3100);
        assert_eq!(points[0]["transactions"], 2);
        assert_eq!(points[0]["averageSaleCents"], 1550);
        assert_eq!(points[0]["bucket"].as_str().unwrap().len(), 10);

        let (status, body) = send(&app, "GET", "/api/analytics/sales-trends?period=year", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["points"][0]["bucket"].as_str().unwrap().len(), 7);

        let (status, body) = send(&app, "GET", "/api/analytics/sales-trends?period=decade", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "period");
    }
}
