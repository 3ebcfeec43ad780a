//! ShopDesk API Library
//!
//! Back-office backend for a single shop: customers, products and stock, sale and
//! rental bills with per-type serial numbers, bookings, plans and a dashboard.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use utoipa::ToSchema;

use crate::auth::{AuthConfig, AuthRouterExt, AuthService};
use crate::cache::InMemoryCache;
use crate::services::PageRequest;

const JWT_AUDIENCE: &str = "shopdesk-api";
const JWT_ISSUER: &str = "shopdesk-auth";

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub auth: Arc<AuthService>,
    pub event_sender: events::EventSender,
    pub cache: InMemoryCache,
    pub services: handlers::AppServices,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::new(
            config.jwt_secret.clone(),
            JWT_AUDIENCE.to_string(),
            JWT_ISSUER.to_string(),
            Duration::from_secs(config.jwt_expiration as u64),
        )));
        let cache = InMemoryCache::new();
        let services = handlers::AppServices::new(
            db.clone(),
            &config,
            event_sender.clone(),
            auth.clone(),
            cache.clone(),
        );

        Self {
            db,
            config: Arc::new(config),
            auth,
            event_sender,
            cache,
            services,
            started_at: Instant::now(),
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// One page of a list endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: PageRequest) -> Self {
        Self {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
            total_pages: total.div_ceil(page.per_page),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/status", get(api_status))
        .route("/plans", get(handlers::plans::list_plans))
        .route("/auth/setup", post(handlers::auth::setup))
        .route("/auth/login", post(handlers::auth::login));

    let session = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/password", put(handlers::auth::change_password))
        .with_auth();

    let customers = Router::new()
        .route(
            "/customers",
            get(handlers::customers::list_customers).post(handlers::customers::create_customer),
        )
        .route(
            "/customers/:id",
            get(handlers::customers::get_customer)
                .put(handlers::customers::update_customer)
                .delete(handlers::customers::delete_customer),
        )
        .route(
            "/customers/:id/bills",
            get(handlers::customers::customer_bills),
        )
        .with_auth();

    let products = Router::new()
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/products/low-stock",
            get(handlers::products::low_stock_products),
        )
        .route(
            "/products/restock",
            post(handlers::products::restock_product),
        )
        .route(
            "/products/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route(
            "/products/:id/adjust",
            post(handlers::products::adjust_stock),
        )
        .route(
            "/products/:id/history",
            get(handlers::products::stock_history),
        )
        .with_auth();

    let bills = Router::new()
        .route(
            "/bills",
            get(handlers::bills::list_bills).post(handlers::bills::create_bill),
        )
        .route("/bills/next-serial", get(handlers::bills::next_serial))
        .route(
            "/bills/:id",
            get(handlers::bills::get_bill).delete(handlers::bills::void_bill),
        )
        .route(
            "/bills/:id/payments",
            post(handlers::bills::record_payment),
        )
        .route("/bills/:id/return", post(handlers::bills::return_rental))
        .with_auth();

    let bookings = Router::new()
        .route(
            "/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route(
            "/bookings/:id",
            get(handlers::bookings::get_booking)
                .put(handlers::bookings::update_booking)
                .delete(handlers::bookings::delete_booking),
        )
        .route(
            "/bookings/:id/status",
            put(handlers::bookings::update_booking_status),
        )
        .with_auth();

    let insights = Router::new()
        .route("/dashboard", get(handlers::dashboard::dashboard))
        .route("/reports/sales", get(handlers::dashboard::sales_report))
        .route("/subscription", get(handlers::plans::get_subscription))
        .with_auth();

    // Owner-only account and plan management
    let owner = Router::new()
        .route(
            "/admins",
            get(handlers::admins::list_admins).post(handlers::admins::create_admin),
        )
        .route("/admins/:id", put(handlers::admins::update_admin))
        .route(
            "/subscription",
            post(handlers::plans::change_subscription),
        )
        .with_role("owner");

    Router::new()
        .merge(public)
        .merge(session)
        .merge(customers)
        .merge(products)
        .merge(bills)
        .merge(bookings)
        .merge(insights)
        .merge(owner)
}

/// Full application router: health probes, the v1 API and Swagger UI.
///
/// CORS and compression are added by the binary so tests can drive this router directly.
pub fn app_router(state: AppState) -> Router {
    let auth_service = state.auth.clone();
    let db = state.db.clone();

    Router::new()
        .merge(health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .with_state(state)
        .layer(Extension(auth_service))
        .layer(Extension(db))
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "service": "shopdesk-api",
        "shop": state.config.shop_name,
        "currency": state.config.currency,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn message_response_has_no_data() {
        let response = ApiResponse::<()>::message("done");
        assert!(response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("done"));
    }

    #[test]
    fn pagination_rounds_total_pages_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 41, PageRequest::new(2, 20));
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);
        assert_eq!(page.per_page, 20);

        let empty = PaginatedResponse::<u8>::new(vec![], 0, PageRequest::default());
        assert_eq!(empty.total_pages, 0);
    }
}
