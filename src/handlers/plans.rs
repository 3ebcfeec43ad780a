use axum::{
    extract::{Json, State},
    response::IntoResponse,
};

use super::common::success_response;
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::plans::{plan_catalog, ChangePlanInput, PlanDefinition, SubscriptionOverview},
    ApiResult, AppState,
};

/// Plan catalog with limits and features
#[utoipa::path(
    get,
    path = "/api/v1/plans",
    responses(
        (status = 200, description = "Available plans", body = [PlanDefinition])
    ),
    tag = "plans"
)]
pub async fn list_plans() -> ApiResult<Vec<PlanDefinition>> {
    Ok(success_response(plan_catalog()))
}

/// Current plan with usage counters
#[utoipa::path(
    get,
    path = "/api/v1/subscription",
    responses(
        (status = 200, description = "Current subscription", body = SubscriptionOverview),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "plans"
)]
pub async fn get_subscription(State(state): State<AppState>) -> ApiResult<SubscriptionOverview> {
    let overview = state.services.plans.overview().await?;
    Ok(success_response(overview))
}

/// Switch plans (owner only)
#[utoipa::path(
    post,
    path = "/api/v1/subscription",
    request_body = ChangePlanInput,
    responses(
        (status = 200, description = "Plan changed", body = SubscriptionOverview),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Owner role required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "plans"
)]
pub async fn change_subscription(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<ChangePlanInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let overview = state
        .services
        .plans
        .change_plan(input, user.admin_id)
        .await?;
    Ok(success_response(overview))
}
