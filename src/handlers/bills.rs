use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{created_response, no_content_response, page_request, success_response};
use crate::{
    auth::AuthUser,
    entities::bill::{BillType, PaymentStatus},
    errors::ServiceError,
    services::bills::{
        BillFilter, BillResponse, CreateBillInput, NextSerialResponse, RecordPaymentInput,
    },
    ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BillListParams {
    pub bill_type: Option<BillType>,
    pub customer_id: Option<Uuid>,
    /// First creation date to include (YYYY-MM-DD)
    pub from: Option<NaiveDate>,
    /// Last creation date to include (YYYY-MM-DD)
    pub to: Option<NaiveDate>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NextSerialParams {
    pub bill_type: BillType,
}

/// Create a sale or rental bill; stock is taken for every line
#[utoipa::path(
    post,
    path = "/api/v1/bills",
    request_body = CreateBillInput,
    responses(
        (status = 201, description = "Bill created", body = BillResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 402, description = "Plan limit or feature gate", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or customer not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bills"
)]
pub async fn create_bill(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateBillInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let bill = state
        .services
        .bills
        .create(input, Some(user.admin_id))
        .await?;
    Ok(created_response(bill))
}

/// List bills, newest first
#[utoipa::path(
    get,
    path = "/api/v1/bills",
    params(BillListParams),
    responses(
        (status = 200, description = "Bill page"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bills"
)]
pub async fn list_bills(
    State(state): State<AppState>,
    Query(params): Query<BillListParams>,
) -> ApiResult<PaginatedResponse<BillResponse>> {
    let page = page_request(&state.config, params.page, params.per_page);
    let filter = BillFilter {
        bill_type: params.bill_type,
        customer_id: params.customer_id,
        from: params.from,
        to: params.to,
        payment_status: params.payment_status,
    };
    let bills = state.services.bills.list(filter, page).await?;
    Ok(success_response(bills))
}

/// Serial number the next bill of a type will receive
#[utoipa::path(
    get,
    path = "/api/v1/bills/next-serial",
    params(NextSerialParams),
    responses(
        (status = 200, description = "Next serial number", body = NextSerialResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bills"
)]
pub async fn next_serial(
    State(state): State<AppState>,
    Query(params): Query<NextSerialParams>,
) -> ApiResult<NextSerialResponse> {
    let next = state.services.bills.next_serial(params.bill_type).await?;
    Ok(success_response(next))
}

/// Bill with its items
#[utoipa::path(
    get,
    path = "/api/v1/bills/{id}",
    params(("id" = Uuid, Path, description = "Bill id")),
    responses(
        (status = 200, description = "Bill", body = BillResponse),
        (status = 404, description = "Bill not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bills"
)]
pub async fn get_bill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<BillResponse> {
    let bill = state.services.bills.get(id).await?;
    Ok(success_response(bill))
}

/// Record a payment against the balance due
#[utoipa::path(
    post,
    path = "/api/v1/bills/{id}/payments",
    params(("id" = Uuid, Path, description = "Bill id")),
    request_body = RecordPaymentInput,
    responses(
        (status = 200, description = "Payment recorded", body = BillResponse),
        (status = 400, description = "Non-positive amount or overpayment", body = crate::errors::ErrorResponse),
        (status = 404, description = "Bill not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bills"
)]
pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> ApiResult<BillResponse> {
    let bill = state.services.bills.record_payment(id, input).await?;
    Ok(success_response(bill))
}

/// Check a rental back in
#[utoipa::path(
    post,
    path = "/api/v1/bills/{id}/return",
    params(("id" = Uuid, Path, description = "Bill id")),
    responses(
        (status = 200, description = "Rental returned", body = BillResponse),
        (status = 400, description = "Not a rental or already returned", body = crate::errors::ErrorResponse),
        (status = 404, description = "Bill not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bills"
)]
pub async fn return_rental(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<BillResponse> {
    let bill = state
        .services
        .bills
        .return_rental(id, Some(user.admin_id))
        .await?;
    Ok(success_response(bill))
}

/// Void a bill and put its outstanding stock back
#[utoipa::path(
    delete,
    path = "/api/v1/bills/{id}",
    params(("id" = Uuid, Path, description = "Bill id")),
    responses(
        (status = 204, description = "Bill voided"),
        (status = 404, description = "Bill not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bills"
)]
pub async fn void_bill(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.bills.void(id, Some(user.admin_id)).await?;
    Ok(no_content_response())
}
