use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::RequestContext,
    commands::admin::{
        CostCenterInput, EmployeeInput, ExpenseHeadInput, MasterDataKind, StatusToggled,
    },
    errors::ServiceError,
    models::{cost_center, employee, expense_head, finance_setting},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ListParams {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FinanceSettingsPayload {
    pub max_days_processing: i64,
    pub max_days_past: i64,
}

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

#[utoipa::path(
    get,
    path = "/api/v1/cost-centers",
    params(
        ("include_inactive" = Option<bool>, Query, description = "Include inactive cost centers (admins only)")
    ),
    responses(
        (status = 200, description = "Cost centers", body = crate::ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "Administration"
)]
pub async fn list_cost_centers(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<cost_center::Model>> {
    let rows = state
        .services
        .administration
        .cost_centers(&ctx, params.include_inactive)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    post,
    path = "/api/v1/cost-centers",
    request_body = serde_json::Value,
    responses(
        (status = 201, description = "Cost center created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse)
    ),
    tag = "Administration"
)]
pub async fn create_cost_center(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(input): Json<CostCenterInput>,
) -> Created<cost_center::Model> {
    let saved = state.services.administration.save_cost_center(&ctx, None, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(saved))))
}

pub async fn update_cost_center(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(input): Json<CostCenterInput>,
) -> ApiResult<cost_center::Model> {
    let saved = state
        .services
        .administration
        .save_cost_center(&ctx, Some(id), input)
        .await?;
    Ok(Json(ApiResponse::success(saved)))
}

pub async fn list_employees(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> ApiResult<Vec<employee::Model>> {
    let rows = state.services.administration.employees(&ctx).await?;
    Ok(Json(ApiResponse::success(rows)))
}

pub async fn create_employee(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(input): Json<EmployeeInput>,
) -> Created<employee::Model> {
    let saved = state.services.administration.save_employee(&ctx, None, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(saved))))
}

pub async fn update_employee(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(input): Json<EmployeeInput>,
) -> ApiResult<employee::Model> {
    let saved = state
        .services
        .administration
        .save_employee(&ctx, Some(id), input)
        .await?;
    Ok(Json(ApiResponse::success(saved)))
}

pub async fn list_expense_heads(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<expense_head::Model>> {
    let rows = state
        .services
        .administration
        .expense_heads(&ctx, params.include_inactive)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

pub async fn create_expense_head(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(input): Json<ExpenseHeadInput>,
) -> Created<expense_head::Model> {
    let saved = state.services.administration.save_expense_head(&ctx, None, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(saved))))
}

pub async fn update_expense_head(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(input): Json<ExpenseHeadInput>,
) -> ApiResult<expense_head::Model> {
    let saved = state
        .services
        .administration
        .save_expense_head(&ctx, Some(id), input)
        .await?;
    Ok(Json(ApiResponse::success(saved)))
}

async fn toggle(
    state: AppState,
    ctx: RequestContext,
    kind: MasterDataKind,
    id: Uuid,
) -> ApiResult<StatusToggled> {
    let toggled = state.services.administration.toggle_status(&ctx, kind, id).await?;
    Ok(Json(ApiResponse::success(toggled)))
}

#[utoipa::path(
    post,
    path = "/api/v1/cost-centers/{id}/toggle-status",
    params(
        ("id" = Uuid, Path, description = "Cost center ID")
    ),
    responses(
        (status = 200, description = "Status flipped", body = crate::ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Administration"
)]
pub async fn toggle_cost_center(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusToggled> {
    toggle(state, ctx, MasterDataKind::CostCenter, id).await
}

pub async fn toggle_employee(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusToggled> {
    toggle(state, ctx, MasterDataKind::Employee, id).await
}

pub async fn toggle_expense_head(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusToggled> {
    toggle(state, ctx, MasterDataKind::ExpenseHead, id).await
}

pub async fn get_finance_settings(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> ApiResult<Vec<finance_setting::Model>> {
    let rows = state.services.administration.finance_settings(&ctx).await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    put,
    path = "/api/v1/settings/finance",
    request_body = FinanceSettingsPayload,
    responses(
        (status = 200, description = "Settings saved", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Value out of range", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "Administration"
)]
pub async fn update_finance_settings(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(payload): Json<FinanceSettingsPayload>,
) -> ApiResult<Vec<finance_setting::Model>> {
    let rows = state
        .services
        .administration
        .update_finance_settings(&ctx, payload.max_days_processing, payload.max_days_past)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}
