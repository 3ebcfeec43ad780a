use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use super::common::{created_response, success_response};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::admins::{AdminResponse, CreateAdminInput, UpdateAdminInput},
    ApiResult, AppState,
};

/// List admin accounts (owner only)
#[utoipa::path(
    get,
    path = "/api/v1/admins",
    responses(
        (status = 200, description = "Admin accounts", body = [AdminResponse]),
        (status = 403, description = "Owner role required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admins"
)]
pub async fn list_admins(State(state): State<AppState>) -> ApiResult<Vec<AdminResponse>> {
    let admins = state.services.admins.list().await?;
    Ok(success_response(admins))
}

/// Add a staff or owner account (owner only)
#[utoipa::path(
    post,
    path = "/api/v1/admins",
    request_body = CreateAdminInput,
    responses(
        (status = 201, description = "Admin created", body = AdminResponse),
        (status = 403, description = "Owner role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username taken", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admins"
)]
pub async fn create_admin(
    State(state): State<AppState>,
    Json(input): Json<CreateAdminInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let admin = state.services.admins.create_admin(input).await?;
    Ok(created_response(admin))
}

/// Change display name, role or active flag (owner only)
#[utoipa::path(
    put,
    path = "/api/v1/admins/{id}",
    params(("id" = Uuid, Path, description = "Admin id")),
    request_body = UpdateAdminInput,
    responses(
        (status = 200, description = "Admin updated", body = AdminResponse),
        (status = 400, description = "Owners cannot lock themselves out", body = crate::errors::ErrorResponse),
        (status = 404, description = "Admin not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "admins"
)]
pub async fn update_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateAdminInput>,
) -> ApiResult<AdminResponse> {
    let admin = state.services.admins.update(&user, id, input).await?;
    Ok(success_response(admin))
}
