use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "code": "DUPLICATE_PHONE",
    "message": "A customer with phone +919876543210 already exists",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Conflict")]
    pub error: String,
    /// Machine-readable application error code
    #[schema(example = "DUPLICATE_PHONE")]
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, code: &str, message: String) -> Self {
        Self {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: code.to_string(),
            message,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Auth(#[from] crate::auth::AuthError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Duplicate phone: {0}")]
    DuplicatePhone(String),

    #[error("Duplicate username: {0}")]
    DuplicateUsername(String),

    #[error("Duplicate SKU: {0}")]
    DuplicateSku(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Booking conflict: {0}")]
    BookingConflict(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Plan limit reached: {0}")]
    PlanLimitReached(String),

    #[error("Upgrade required: {0}")]
    UpgradeRequired(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Auth(err) => err.status_code(),
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DuplicatePhone(_)
            | Self::DuplicateUsername(_)
            | Self::DuplicateSku(_)
            | Self::Conflict(_)
            | Self::BookingConflict(_) => StatusCode::CONFLICT,
            Self::InsufficientStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PlanLimitReached(_) | Self::UpgradeRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::DatabaseError(_)
            | Self::HashError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Application error code carried in the `code` field of the error body.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Auth(err) => err.error_code(),
            Self::Forbidden(_) => "FORBIDDEN",
            Self::DuplicatePhone(_) => "DUPLICATE_PHONE",
            Self::DuplicateUsername(_) => "DUPLICATE_USERNAME",
            Self::DuplicateSku(_) => "DUPLICATE_SKU",
            Self::Conflict(_) => "CONFLICT",
            Self::BookingConflict(_) => "BOOKING_CONFLICT",
            Self::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            Self::PlanLimitReached(_) => "PLAN_LIMIT_REACHED",
            Self::UpgradeRequired(_) => "UPGRADE_REQUIRED",
            Self::HashError(_) | Self::InternalError(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::HashError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::Auth(err) => err.response_message(),
            Self::NotFound(msg)
            | Self::ValidationError(msg)
            | Self::InvalidOperation(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::DuplicatePhone(msg)
            | Self::DuplicateUsername(msg)
            | Self::DuplicateSku(msg)
            | Self::Conflict(msg)
            | Self::BookingConflict(msg)
            | Self::InsufficientStock(msg)
            | Self::PlanLimitReached(msg)
            | Self::UpgradeRequired(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            error!(error = %self, code, "request failed");
        } else {
            warn!(error = %self, code, status = status.as_u16(), "request rejected");
        }
        metrics::counter!("shopdesk.errors.total", 1, "code" => code);

        let body = ErrorResponse::new(status, code, self.response_message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rstest::rstest;

    #[tokio::test]
    async fn error_response_includes_request_id_and_code() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::DuplicatePhone("phone taken".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.code, "DUPLICATE_PHONE");
        assert_eq!(payload.error, "Conflict");
        assert_eq!(payload.message, "phone taken");
    }

    #[rstest]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND")]
    #[case(ServiceError::ValidationError("x".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR")]
    #[case(ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN, "FORBIDDEN")]
    #[case(ServiceError::DuplicateSku("x".into()), StatusCode::CONFLICT, "DUPLICATE_SKU")]
    #[case(ServiceError::BookingConflict("x".into()), StatusCode::CONFLICT, "BOOKING_CONFLICT")]
    #[case(ServiceError::InsufficientStock("x".into()), StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_STOCK")]
    #[case(ServiceError::PlanLimitReached("x".into()), StatusCode::PAYMENT_REQUIRED, "PLAN_LIMIT_REACHED")]
    #[case(ServiceError::UpgradeRequired("x".into()), StatusCode::PAYMENT_REQUIRED, "UPGRADE_REQUIRED")]
    #[case(ServiceError::DatabaseError(DbErr::Custom("x".into())), StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")]
    fn status_and_code_mapping(
        #[case] err: ServiceError,
        #[case] status: StatusCode,
        #[case] code: &str,
    ) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::HashError("argon2 params".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("relation missing".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::NotFound("Customer 1 not found".into()).response_message(),
            "Customer 1 not found"
        );
    }
}
