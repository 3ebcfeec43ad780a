use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::{config::AppConfig, services::PageRequest, ApiResponse};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Clamps caller-supplied paging into the configured bounds
pub fn page_request(config: &AppConfig, page: Option<u64>, per_page: Option<u64>) -> PageRequest {
    PageRequest::new(page.unwrap_or(1), config.page_size(per_page))
}

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    /// One-based page number
    pub page: Option<u64>,
    /// Items per page, capped by `api_max_page_size`
    pub per_page: Option<u64>,
}

impl PaginationParams {
    pub fn resolve(&self, config: &AppConfig) -> PageRequest {
        page_request(config, self.page, self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "k3Vq9ZpL2xR7mW4tY8uN1bH6cJ0fD5gS_Qe-Ta.Wo+Xi/Ur=Ey!Ip?As@Dk#Lz$Mc%Nv^Bx&".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "test".into(),
        )
    }

    #[test]
    fn paging_defaults_and_caps() {
        let cfg = config();
        assert_eq!(PaginationParams::default().resolve(&cfg), PageRequest::new(1, 20));

        let huge = PaginationParams {
            page: Some(3),
            per_page: Some(10_000),
        };
        assert_eq!(huge.resolve(&cfg), PageRequest::new(3, 100));

        let zero = PaginationParams {
            page: Some(0),
            per_page: Some(0),
        };
        assert_eq!(zero.resolve(&cfg), PageRequest::new(1, 1));
    }
}
