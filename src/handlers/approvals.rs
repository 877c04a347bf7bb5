//! Decision links mailed to approvers. The token in the query string is the
//! only credential; each one works once.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    commands::expenses::{ApprovalDecision, DecisionRecorded},
    models::{ApprovalStatus, ExpenseStatus},
    workflow::WorkflowOutcome,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionLinkQuery {
    pub token: String,
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RejectPayload {
    #[validate(length(min = 1, message = "A rejection reason is required"))]
    pub reason: String,
}

/// What an approver sees before confirming a rejection.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingDecision {
    pub epv_id: String,
    pub employee_name: String,
    pub total_amount: Decimal,
    #[schema(value_type = String)]
    pub status: ExpenseStatus,
    pub approver_email: String,
    #[schema(value_type = String)]
    pub approval_status: ApprovalStatus,
    pub requested_at: DateTime<Utc>,
    pub file_url: Option<String>,
}

#[utoipa::path(
    get,
    path = "/approve-expense/{epv_id}",
    params(
        ("epv_id" = String, Path, description = "EPV identifier"),
        ("token" = String, Query, description = "Single-use decision token"),
        ("comments" = Option<String>, Query, description = "Approver comments")
    ),
    responses(
        (status = 200, description = "Approval recorded", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "Approvals"
)]
pub async fn approve_expense(
    State(state): State<AppState>,
    Path(epv_id): Path<String>,
    Query(query): Query<DecisionLinkQuery>,
) -> ApiResult<WorkflowOutcome<DecisionRecorded>> {
    let outcome = state
        .services
        .expenses
        .decide(
            &epv_id,
            &query.token,
            ApprovalDecision::Approve {
                comments: query.comments,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[utoipa::path(
    get,
    path = "/reject-expense/{epv_id}",
    params(
        ("epv_id" = String, Path, description = "EPV identifier"),
        ("token" = String, Query, description = "Single-use decision token")
    ),
    responses(
        (status = 200, description = "Approval awaiting a decision", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Approvals"
)]
pub async fn reject_expense_form(
    State(state): State<AppState>,
    Path(epv_id): Path<String>,
    Query(query): Query<DecisionLinkQuery>,
) -> ApiResult<PendingDecision> {
    let (record, approval) = state
        .services
        .expenses
        .pending_decision(&epv_id, &query.token)
        .await?;

    Ok(Json(ApiResponse::success(PendingDecision {
        epv_id: record.epv_id,
        employee_name: record.employee_name,
        total_amount: record.total_amount,
        status: record.status,
        approver_email: approval.approver_email,
        approval_status: approval.status,
        requested_at: approval.created_at,
        file_url: record.file_url,
    })))
}

#[utoipa::path(
    post,
    path = "/reject-expense/{epv_id}",
    params(
        ("epv_id" = String, Path, description = "EPV identifier"),
        ("token" = String, Query, description = "Single-use decision token")
    ),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Rejection recorded", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "Approvals"
)]
pub async fn reject_expense(
    State(state): State<AppState>,
    Path(epv_id): Path<String>,
    Query(query): Query<DecisionLinkQuery>,
    Json(payload): Json<RejectPayload>,
) -> ApiResult<WorkflowOutcome<DecisionRecorded>> {
    payload.validate()?;
    let outcome = state
        .services
        .expenses
        .decide(
            &epv_id,
            &query.token,
            ApprovalDecision::Reject {
                reason: payload.reason,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
