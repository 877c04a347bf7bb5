use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::RequestContext,
    commands::{
        documents::SupplementsRecorded,
        expenses::{AllocationInput, ExpenseLine, RoutedApprovals, SplitInvoice, SubmittedExpense},
    },
    errors::ServiceError,
    models::expense_record,
    queries::{AllocationTotals, ExpenseDetail},
    services::{
        ExpenseLineRequest, SplitInvoiceRequest, SubmitExpenseRequest, SupplementaryUpload, Upload,
    },
    workflow::WorkflowOutcome,
    ApiResponse, ApiResult, AppState,
};

use super::UploadPayload;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ExpenseLinePayload {
    pub invoice_date: Option<NaiveDate>,
    pub expense_head: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub gst: Decimal,
    pub amount: Option<Decimal>,
    /// Line backed by a split master invoice; no receipt needed
    #[serde(default)]
    pub split_invoice: bool,
    pub receipt: Option<UploadPayload>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitExpensePayload {
    pub employee_id: Option<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub cost_center_id: Uuid,
    pub payment_to: Option<String>,
    pub city: Option<String>,
    #[validate(length(min = 1, message = "At least one expense line is required"))]
    pub lines: Vec<ExpenseLinePayload>,
    /// Routes the claim immediately when present
    #[serde(default)]
    pub approver_emails: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendForApprovalPayload {
    #[validate(length(min = 1, message = "At least one approver is required"))]
    pub approver_emails: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SplitInvoicePayload {
    pub employee_id: Option<String>,
    pub invoice_date: NaiveDate,
    pub total_amount: Decimal,
    pub description: Option<String>,
    pub payment_to: Option<String>,
    pub invoice: UploadPayload,
    /// One entry per cost center: cost_center_id, amount, description,
    /// expense_head, approver_email
    #[schema(value_type = Vec<Object>)]
    pub allocations: Vec<AllocationInput>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestDocumentsPayload {
    #[validate(length(min = 1, message = "Describe the documents that are needed"))]
    pub requested_documents: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SupplementaryFilePayload {
    #[serde(flatten)]
    pub file: UploadPayload,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SupplementaryPayload {
    #[validate(length(min = 1, message = "At least one file is required"))]
    pub files: Vec<SupplementaryFilePayload>,
}

impl TryFrom<ExpenseLinePayload> for ExpenseLineRequest {
    type Error = ServiceError;

    fn try_from(payload: ExpenseLinePayload) -> Result<Self, Self::Error> {
        Ok(ExpenseLineRequest {
            line: ExpenseLine {
                invoice_date: payload.invoice_date,
                expense_head: payload.expense_head,
                description: payload.description,
                gst: payload.gst,
                amount: payload.amount,
                split_invoice: payload.split_invoice,
                receipt_filename: None,
                receipt_path: None,
            },
            receipt: payload.receipt.map(Upload::try_from).transpose()?,
        })
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/expenses",
    request_body = SubmitExpensePayload,
    responses(
        (status = 201, description = "Expense submitted", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 502, description = "Document service unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Expenses"
)]
pub async fn submit_expense(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<SubmitExpensePayload>,
) -> Result<(StatusCode, Json<ApiResponse<WorkflowOutcome<SubmittedExpense>>>), ServiceError> {
    payload.validate()?;

    let lines = payload
        .lines
        .into_iter()
        .map(ExpenseLineRequest::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let request = SubmitExpenseRequest {
        employee_id: payload.employee_id,
        from_date: payload.from_date,
        to_date: payload.to_date,
        cost_center_id: payload.cost_center_id,
        payment_to: payload.payment_to,
        city: payload.city,
        lines,
        approver_emails: payload.approver_emails,
    };

    let outcome = state.services.expenses.submit_expense(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

#[utoipa::path(
    get,
    path = "/api/v1/expenses",
    responses(
        (status = 200, description = "Caller's expenses", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "Expenses"
)]
pub async fn list_own_expenses(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> ApiResult<Vec<expense_record::Model>> {
    let records = state.services.expenses.own_expenses(&ctx).await?;
    Ok(Json(ApiResponse::success(records)))
}

#[utoipa::path(
    get,
    path = "/api/v1/expenses/by-epv/{epv_id}",
    params(
        ("epv_id" = String, Path, description = "EPV identifier")
    ),
    responses(
        (status = 200, description = "Expense detail", body = crate::ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Expenses"
)]
pub async fn get_expense(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(epv_id): Path<String>,
) -> ApiResult<ExpenseDetail> {
    let detail = state.services.expenses.expense_detail(&ctx, &epv_id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/expenses/{id}/send-for-approval",
    params(
        ("id" = Uuid, Path, description = "Expense record ID")
    ),
    request_body = SendForApprovalPayload,
    responses(
        (status = 200, description = "Approvers notified", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "Expenses"
)]
pub async fn send_for_approval(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendForApprovalPayload>,
) -> ApiResult<WorkflowOutcome<RoutedApprovals>> {
    payload.validate()?;
    let outcome = state
        .services
        .expenses
        .send_for_approval(&ctx, id, payload.approver_emails)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/v1/split-invoices",
    request_body = SplitInvoicePayload,
    responses(
        (status = 201, description = "Split invoice created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 502, description = "Document service unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Split Invoices"
)]
pub async fn create_split_invoice(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<SplitInvoicePayload>,
) -> Result<(StatusCode, Json<ApiResponse<WorkflowOutcome<SplitInvoice>>>), ServiceError> {
    let request = SplitInvoiceRequest {
        employee_id: payload.employee_id,
        invoice_date: payload.invoice_date,
        total_amount: payload.total_amount,
        description: payload.description,
        payment_to: payload.payment_to,
        invoice: Upload::try_from(payload.invoice)?,
        allocations: payload.allocations,
    };
    let outcome = state
        .services
        .expenses
        .create_split_invoice(&ctx, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

#[utoipa::path(
    get,
    path = "/api/v1/split-invoices/{id}/allocation-totals",
    params(
        ("id" = Uuid, Path, description = "Master invoice ID")
    ),
    responses(
        (status = 200, description = "Allocation totals", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Split Invoices"
)]
pub async fn allocation_totals(
    State(state): State<AppState>,
    _ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<AllocationTotals> {
    let totals = state.services.expenses.allocation_totals(id).await?;
    Ok(Json(ApiResponse::success(totals)))
}

#[utoipa::path(
    post,
    path = "/api/v1/expenses/{id}/request-documents",
    params(
        ("id" = Uuid, Path, description = "Expense record ID")
    ),
    request_body = RequestDocumentsPayload,
    responses(
        (status = 200, description = "Documents requested", body = crate::ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "Documents"
)]
pub async fn request_documents(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<RequestDocumentsPayload>,
) -> ApiResult<WorkflowOutcome<expense_record::Model>> {
    payload.validate()?;
    let outcome = state
        .services
        .expenses
        .request_documents(&ctx, id, payload.requested_documents)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/v1/expenses/{id}/supplementary-documents",
    params(
        ("id" = Uuid, Path, description = "Expense record ID")
    ),
    request_body = SupplementaryPayload,
    responses(
        (status = 200, description = "Documents uploaded", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Conflict", body = crate::errors::ErrorResponse)
    ),
    tag = "Documents"
)]
pub async fn upload_supplementary(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<SupplementaryPayload>,
) -> ApiResult<WorkflowOutcome<SupplementsRecorded>> {
    payload.validate()?;
    let files = payload
        .files
        .into_iter()
        .map(|f| {
            Ok(SupplementaryUpload {
                file: Upload::try_from(f.file)?,
                description: f.description,
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    let outcome = state
        .services
        .expenses
        .upload_supplementary(&ctx, id, files)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Serves the locally stored claim bundle. Used when the drive upload failed.
pub async fn download_document(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(epv_id): Path<String>,
) -> Result<Response, ServiceError> {
    let path = state.services.expenses.document_file(&ctx, &epv_id).await?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ServiceError::InternalError(format!("Could not read document: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}.pdf\"", epv_id),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}
