//! EPV workflow library
//!
//! Expense voucher submission, approval routing, split invoices, the
//! supplementary document cycle and finance processing.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod collaborators;
pub mod commands;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod queries;
pub mod services;
pub mod tracing;
pub mod workflow;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Authenticated JSON API, nested under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    let expenses = Router::new()
        .route(
            "/expenses",
            get(handlers::expenses::list_own_expenses).post(handlers::expenses::submit_expense),
        )
        .route(
            "/expenses/by-epv/:epv_id",
            get(handlers::expenses::get_expense),
        )
        .route(
            "/expenses/:id/send-for-approval",
            post(handlers::expenses::send_for_approval),
        )
        .route(
            "/expenses/:id/request-documents",
            post(handlers::expenses::request_documents),
        )
        .route(
            "/expenses/:id/supplementary-documents",
            post(handlers::expenses::upload_supplementary),
        );

    let split_invoices = Router::new()
        .route(
            "/split-invoices",
            post(handlers::expenses::create_split_invoice),
        )
        .route(
            "/split-invoices/:id/allocation-totals",
            get(handlers::expenses::allocation_totals),
        );

    let finance = Router::new()
        .route("/finance/queue", get(handlers::finance::finance_queue))
        .route(
            "/finance/expenses/:id/claim",
            post(handlers::finance::claim_processing),
        )
        .route(
            "/finance/expenses/:id/release",
            post(handlers::finance::release_processing),
        )
        .route(
            "/finance/expenses/:id/entries",
            post(handlers::finance::create_finance_entry),
        )
        .route(
            "/finance/expenses/:id/reject",
            post(handlers::finance::reject_finance_expense),
        )
        .route(
            "/finance/entries/pending",
            get(handlers::finance::pending_entries),
        )
        .route(
            "/finance/entries/:id/review",
            post(handlers::finance::review_finance_entry),
        )
        .route(
            "/finance/entries/:id/payment",
            put(handlers::finance::update_payment_details),
        )
        .route(
            "/finance/cities",
            get(handlers::finance::list_city_assignments).post(handlers::finance::assign_city),
        )
        .route(
            "/finance/cities/:id/toggle",
            post(handlers::finance::toggle_city_assignment),
        );

    let admin = Router::new()
        .route(
            "/cost-centers",
            get(handlers::admin::list_cost_centers).post(handlers::admin::create_cost_center),
        )
        .route("/cost-centers/:id", put(handlers::admin::update_cost_center))
        .route(
            "/cost-centers/:id/toggle-status",
            post(handlers::admin::toggle_cost_center),
        )
        .route(
            "/employees",
            get(handlers::admin::list_employees).post(handlers::admin::create_employee),
        )
        .route("/employees/:id", put(handlers::admin::update_employee))
        .route(
            "/employees/:id/toggle-status",
            post(handlers::admin::toggle_employee),
        )
        .route(
            "/expense-heads",
            get(handlers::admin::list_expense_heads).post(handlers::admin::create_expense_head),
        )
        .route("/expense-heads/:id", put(handlers::admin::update_expense_head))
        .route(
            "/expense-heads/:id/toggle-status",
            post(handlers::admin::toggle_expense_head),
        )
        .route(
            "/settings/finance",
            get(handlers::admin::get_finance_settings).put(handlers::admin::update_finance_settings),
        );

    let reports = Router::new()
        .route("/reports/dashboard", get(handlers::reports::dashboard))
        .route("/reports/expense-trends", get(handlers::reports::expense_trends));

    Router::new()
        .route("/status", get(api_status))
        .merge(expenses)
        .merge(split_invoices)
        .merge(finance)
        .merge(admin)
        .merge(reports)
}

/// Routes outside `/api/v1`: the emailed decision links, the local document
/// fallback and health.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/approve-expense/:epv_id",
            get(handlers::approvals::approve_expense),
        )
        .route(
            "/reject-expense/:epv_id",
            get(handlers::approvals::reject_expense_form).post(handlers::approvals::reject_expense),
        )
        .route(
            "/files/:epv_id",
            get(handlers::expenses::download_document),
        )
}

/// Full application router with the request id and logging layers.
pub fn app_router(state: AppState, logger: slog::Logger) -> Router {
    let logging_state = Arc::new(logging::LoggingState::new(logger));
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .merge(public_routes())
        .merge(openapi::openapi_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn_with_state(
            logging_state,
            logging::logging_middleware,
        ))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "epv-workflow",
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match db::check_connection(state.db.as_ref()).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
