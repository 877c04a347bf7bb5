use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::RequestContext,
    commands::finance::{
        EntryDecision, FinanceEntryInput, FinanceRejectionKind, PaymentRecorded, ReviewedEntry,
        SlotPaymentDetails,
    },
    errors::ServiceError,
    models::{city_assignment, expense_record, finance_entry},
    queries::{CityAssignmentView, EntryForReview, QueueItem, QueueView},
    services::PaymentDetailsRequest,
    workflow::WorkflowOutcome,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct QueueParams {
    /// pending, resubmitted, rejected or awaiting_payment
    #[schema(value_type = Option<String>)]
    pub view: Option<QueueView>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FinanceRejectPayload {
    #[validate(length(min = 1, message = "A rejection reason is required"))]
    pub reason: String,
    /// upload_missing or restart_process
    #[schema(value_type = String)]
    pub kind: FinanceRejectionKind,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentDetailsPayload {
    pub transaction_id: String,
    pub payment_date: NaiveDate,
    #[schema(value_type = Option<Object>)]
    pub first_slot: Option<SlotPaymentDetails>,
    #[schema(value_type = Option<Object>)]
    pub second_slot: Option<SlotPaymentDetails>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignCityPayload {
    pub employee_id: Uuid,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/finance/queue",
    params(
        ("view" = Option<String>, Query, description = "pending, resubmitted, rejected or awaiting_payment")
    ),
    responses(
        (status = 200, description = "Finance queue", body = crate::ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "Finance"
)]
pub async fn finance_queue(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<QueueParams>,
) -> ApiResult<Vec<QueueItem>> {
    let view = params.view.unwrap_or(QueueView::Pending);
    let items = state.services.finance.queue(&ctx, view).await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    post,
    path = "/api/v1/finance/expenses/{id}/claim",
    params(
        ("id" = Uuid, Path, description = "Expense record ID")
    ),
    responses(
        (status = 200, description = "Processing claimed", body = crate::ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse),
        (status = 423, description = "Locked by another finance user", body = crate::errors::ErrorResponse)
    ),
    tag = "Finance"
)]
pub async fn claim_processing(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<expense_record::Model> {
    let record = state.services.finance.claim(&ctx, id).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn release_processing(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let released = state.services.finance.release(&ctx, id).await?;
    Ok(Json(ApiResponse::success(json!({
        "record_id": id,
        "released": released,
    }))))
}

#[utoipa::path(
    post,
    path = "/api/v1/finance/expenses/{id}/entries",
    params(
        ("id" = Uuid, Path, description = "Expense record ID")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 201, description = "Finance entry created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse),
        (status = 423, description = "Locked by another finance user", body = crate::errors::ErrorResponse)
    ),
    tag = "Finance"
)]
pub async fn create_finance_entry(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(entry): Json<FinanceEntryInput>,
) -> Result<(StatusCode, Json<ApiResponse<finance_entry::Model>>), ServiceError> {
    let created = state.services.finance.create_entry(&ctx, id, entry).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    post,
    path = "/api/v1/finance/expenses/{id}/reject",
    params(
        ("id" = Uuid, Path, description = "Expense record ID")
    ),
    request_body = FinanceRejectPayload,
    responses(
        (status = 200, description = "Expense rejected", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "Finance"
)]
pub async fn reject_finance_expense(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<FinanceRejectPayload>,
) -> ApiResult<WorkflowOutcome<expense_record::Model>> {
    payload.validate()?;
    let outcome = state
        .services
        .finance
        .reject_expense(&ctx, id, payload.reason, payload.kind)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn pending_entries(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> ApiResult<Vec<EntryForReview>> {
    let entries = state.services.finance.pending_entries(&ctx).await?;
    Ok(Json(ApiResponse::success(entries)))
}

#[utoipa::path(
    post,
    path = "/api/v1/finance/entries/{id}/review",
    params(
        ("id" = Uuid, Path, description = "Finance entry ID")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Entry reviewed", body = crate::ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "Finance"
)]
pub async fn review_finance_entry(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(decision): Json<EntryDecision>,
) -> ApiResult<WorkflowOutcome<ReviewedEntry>> {
    let outcome = state
        .services
        .finance
        .review_entry(&ctx, id, decision)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[utoipa::path(
    put,
    path = "/api/v1/finance/entries/{id}/payment",
    params(
        ("id" = Uuid, Path, description = "Finance entry ID")
    ),
    request_body = PaymentDetailsPayload,
    responses(
        (status = 200, description = "Payment recorded", body = crate::ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "Finance"
)]
pub async fn update_payment_details(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentDetailsPayload>,
) -> ApiResult<PaymentRecorded> {
    let request = PaymentDetailsRequest {
        transaction_id: payload.transaction_id,
        payment_date: payload.payment_date,
        first_slot: payload.first_slot,
        second_slot: payload.second_slot,
    };
    let recorded = state
        .services
        .finance
        .update_payment(&ctx, id, request)
        .await?;
    Ok(Json(ApiResponse::success(recorded)))
}

pub async fn list_city_assignments(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> ApiResult<Vec<CityAssignmentView>> {
    let rows = state.services.finance.city_assignments(&ctx).await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    post,
    path = "/api/v1/finance/cities",
    request_body = AssignCityPayload,
    responses(
        (status = 201, description = "City assigned", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "Finance"
)]
pub async fn assign_city(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<AssignCityPayload>,
) -> Result<(StatusCode, Json<ApiResponse<city_assignment::Model>>), ServiceError> {
    payload.validate()?;
    let assignment = state
        .services
        .finance
        .assign_city(&ctx, payload.employee_id, payload.city)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(assignment))))
}

pub async fn toggle_city_assignment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<city_assignment::Model> {
    let assignment = state.services.finance.toggle_city(&ctx, id).await?;
    Ok(Json(ApiResponse::success(assignment)))
}
