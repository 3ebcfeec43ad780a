use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{
    created_response, no_content_response, page_request, success_response, PaginationParams,
};
use crate::{
    errors::ServiceError,
    services::{
        bills::BillResponse,
        customers::{CreateCustomerInput, CustomerResponse, UpdateCustomerInput},
    },
    ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CustomerListParams {
    /// Matches name, phone or email
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Register a customer
#[utoipa::path(
    post,
    path = "/api/v1/customers",
    request_body = CreateCustomerInput,
    responses(
        (status = 201, description = "Customer created", body = CustomerResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 402, description = "Plan customer limit reached", body = crate::errors::ErrorResponse),
        (status = 409, description = "Phone already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(input): Json<CreateCustomerInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state.services.customers.create(input).await?;
    Ok(created_response(customer))
}

/// List customers by name
#[utoipa::path(
    get,
    path = "/api/v1/customers",
    params(CustomerListParams),
    responses(
        (status = 200, description = "Customer page"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(params): Query<CustomerListParams>,
) -> ApiResult<PaginatedResponse<CustomerResponse>> {
    let page = page_request(&state.config, params.page, params.per_page);
    let customers = state.services.customers.list(params.search, page).await?;
    Ok(success_response(customers))
}

/// Fetch one customer
#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer", body = CustomerResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CustomerResponse> {
    let customer = state.services.customers.get(id).await?;
    Ok(success_response(customer))
}

/// Partially update a customer
#[utoipa::path(
    put,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = UpdateCustomerInput,
    responses(
        (status = 200, description = "Customer updated", body = CustomerResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Phone already registered", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCustomerInput>,
) -> ApiResult<CustomerResponse> {
    let customer = state.services.customers.update(id, input).await?;
    Ok(success_response(customer))
}

/// Delete a customer; their bills keep the name and phone snapshot
#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.customers.delete(id).await?;
    Ok(no_content_response())
}

/// Bills linked to a customer, newest first
#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}/bills",
    params(("id" = Uuid, Path, description = "Customer id"), PaginationParams),
    responses(
        (status = 200, description = "Bill page"),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn customer_bills(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<BillResponse>> {
    let bills = state
        .services
        .bills
        .list_for_customer(id, params.resolve(&state.config))
        .await?;
    Ok(success_response(bills))
}
