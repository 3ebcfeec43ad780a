use axum::extract::{Query, State};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use super::common::success_response;
use crate::{
    services::dashboard::{DashboardSummary, SalesReport, SalesReportQuery},
    ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SalesReportParams {
    /// First day to include; defaults to 29 days before `to`
    pub from: Option<NaiveDate>,
    /// Last day to include; defaults to today
    pub to: Option<NaiveDate>,
}

/// Headline numbers for today and this month
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardSummary),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "dashboard"
)]
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    let summary = state.services.dashboard.summary().await?;
    Ok(success_response(summary))
}

/// Daily sales split by bill type
#[utoipa::path(
    get,
    path = "/api/v1/reports/sales",
    params(SalesReportParams),
    responses(
        (status = 200, description = "Sales report", body = SalesReport),
        (status = 400, description = "Invalid date range", body = crate::errors::ErrorResponse),
        (status = 402, description = "Plan does not include reports", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "dashboard"
)]
pub async fn sales_report(
    State(state): State<AppState>,
    Query(params): Query<SalesReportParams>,
) -> ApiResult<SalesReport> {
    let report = state
        .services
        .dashboard
        .sales_report(SalesReportQuery {
            from: params.from,
            to: params.to,
        })
        .await?;
    Ok(success_response(report))
}
