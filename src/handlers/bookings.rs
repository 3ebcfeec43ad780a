use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{created_response, no_content_response, page_request, success_response};
use crate::{
    auth::AuthUser,
    entities::booking::BookingStatus,
    errors::ServiceError,
    services::bookings::{
        BookingFilter, BookingResponse, CreateBookingInput, UpdateBookingInput,
        UpdateBookingStatusInput,
    },
    ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BookingListParams {
    /// Window start (RFC 3339); bookings ending after it are included
    pub from: Option<DateTime<Utc>>,
    /// Window end (RFC 3339); bookings starting before it are included
    pub to: Option<DateTime<Utc>>,
    pub status: Option<BookingStatus>,
    pub customer_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Add a calendar booking
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = CreateBookingInput,
    responses(
        (status = 201, description = "Booking created", body = BookingResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 402, description = "Plan does not include bookings", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product already booked for that time", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateBookingInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let booking = state
        .services
        .bookings
        .create(input, Some(user.admin_id))
        .await?;
    Ok(created_response(booking))
}

/// Calendar view, earliest first
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    params(BookingListParams),
    responses(
        (status = 200, description = "Booking page"),
        (status = 400, description = "Invalid window", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(params): Query<BookingListParams>,
) -> ApiResult<PaginatedResponse<BookingResponse>> {
    let page = page_request(&state.config, params.page, params.per_page);
    let filter = BookingFilter {
        from: params.from,
        to: params.to,
        status: params.status,
        customer_id: params.customer_id,
        product_id: params.product_id,
    };
    let bookings = state.services.bookings.list(filter, page).await?;
    Ok(success_response(bookings))
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking", body = BookingResponse),
        (status = 404, description = "Booking not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<BookingResponse> {
    let booking = state.services.bookings.get(id).await?;
    Ok(success_response(booking))
}

/// Edit or reschedule a booking
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = UpdateBookingInput,
    responses(
        (status = 200, description = "Booking updated", body = BookingResponse),
        (status = 404, description = "Booking not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product already booked for that time", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateBookingInput>,
) -> ApiResult<BookingResponse> {
    let booking = state.services.bookings.update(id, input).await?;
    Ok(success_response(booking))
}

/// Confirm, complete or cancel a booking
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}/status",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = UpdateBookingStatusInput,
    responses(
        (status = 200, description = "Status changed", body = BookingResponse),
        (status = 404, description = "Booking not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slot taken while the booking was cancelled", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateBookingStatusInput>,
) -> ApiResult<BookingResponse> {
    let booking = state
        .services
        .bookings
        .update_status(id, input.status)
        .await?;
    Ok(success_response(booking))
}

#[utoipa::path(
    delete,
    path = "/api/v1/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 204, description = "Booking deleted"),
        (status = 404, description = "Booking not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.bookings.delete(id).await?;
    Ok(no_content_response())
}
