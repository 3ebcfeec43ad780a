use axum::{
    extract::{Json, State},
    response::IntoResponse,
};

use super::common::{created_response, no_content_response, success_response};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::admins::{AdminResponse, AuthSession, ChangePasswordInput, CreateAdminInput, LoginInput},
    ApiResult, AppState,
};

/// Create the shop owner account on a fresh install
#[utoipa::path(
    post,
    path = "/api/v1/auth/setup",
    request_body = CreateAdminInput,
    responses(
        (status = 201, description = "Owner account created and signed in", body = AuthSession),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Setup already completed", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn setup(
    State(state): State<AppState>,
    Json(input): Json<CreateAdminInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.services.admins.setup(input).await?;
    Ok(created_response(session))
}

/// Sign in with username and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Signed in", body = AuthSession),
        (status = 401, description = "Invalid credentials or disabled account", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> ApiResult<AuthSession> {
    let session = state.services.admins.authenticate(input).await?;
    Ok(success_response(session))
}

/// Revoke the presented session token
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> impl IntoResponse {
    state.services.admins.logout(&user);
    no_content_response()
}

/// Current admin
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Signed-in admin", body = AdminResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<AdminResponse> {
    let admin = state.services.admins.get(user.admin_id).await?;
    Ok(success_response(admin))
}

/// Change the caller's password
#[utoipa::path(
    put,
    path = "/api/v1/auth/password",
    request_body = ChangePasswordInput,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Current password is wrong", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<ChangePasswordInput>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .admins
        .change_password(user.admin_id, input)
        .await?;
    Ok(no_content_response())
}
