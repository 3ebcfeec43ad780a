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
    auth::AuthUser,
    errors::ServiceError,
    services::products::{
        AdjustStockInput, CreateProductInput, ProductFilter, ProductResponse, RestockInput,
        StockHistoryResponse, StockMovementResponse, UpdateProductInput,
    },
    ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductListParams {
    /// Matches name, SKU or category
    pub search: Option<String>,
    pub category: Option<String>,
    /// Only products at or below their minimum stock level
    pub low_stock: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Add a product to the catalog
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 402, description = "Plan product limit reached", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already used", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state
        .services
        .products
        .create(input, Some(user.admin_id))
        .await?;
    Ok(created_response(product))
}

/// List active products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListParams),
    responses(
        (status = 200, description = "Product page"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> ApiResult<PaginatedResponse<ProductResponse>> {
    let page = page_request(&state.config, params.page, params.per_page);
    let filter = ProductFilter {
        search: params.search,
        category: params.category,
        low_stock: params.low_stock,
    };
    let products = state.services.products.list(filter, page).await?;
    Ok(success_response(products))
}

/// Products at or below their minimum level, largest deficit first
#[utoipa::path(
    get,
    path = "/api/v1/products/low-stock",
    responses(
        (status = 200, description = "Low-stock products", body = [ProductResponse])
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn low_stock_products(State(state): State<AppState>) -> ApiResult<Vec<ProductResponse>> {
    let products = state.services.products.low_stock().await?;
    Ok(success_response(products))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ProductResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductResponse> {
    let product = state.services.products.get(id).await?;
    Ok(success_response(product))
}

/// Update catalog fields; stock changes go through restock or adjust
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already used", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> ApiResult<ProductResponse> {
    let product = state.services.products.update(id, input).await?;
    Ok(success_response(product))
}

/// Deactivate a product
#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deactivated"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.products.deactivate(id).await?;
    Ok(no_content_response())
}

/// Receive stock
#[utoipa::path(
    post,
    path = "/api/v1/products/restock",
    request_body = RestockInput,
    responses(
        (status = 200, description = "Stock added", body = StockMovementResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn restock_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<RestockInput>,
) -> ApiResult<StockMovementResponse> {
    let movement = state
        .services
        .products
        .restock(input, Some(user.admin_id))
        .await?;
    Ok(success_response(movement))
}

/// Manual stock correction
#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/adjust",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = AdjustStockInput,
    responses(
        (status = 200, description = "Stock adjusted", body = StockMovementResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 422, description = "Stock would go negative", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<AdjustStockInput>,
) -> ApiResult<StockMovementResponse> {
    let movement = state
        .services
        .products
        .adjust(id, input, Some(user.admin_id))
        .await?;
    Ok(success_response(movement))
}

/// Stock movements, newest first
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/history",
    params(("id" = Uuid, Path, description = "Product id"), PaginationParams),
    responses(
        (status = 200, description = "Stock history page"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn stock_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<StockHistoryResponse>> {
    let history = state
        .services
        .products
        .history(id, params.resolve(&state.config))
        .await?;
    Ok(success_response(history))
}
