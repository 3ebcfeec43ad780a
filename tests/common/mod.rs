#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use shopdesk_api::{
    app_router,
    config::AppConfig,
    db,
    events::{self, EventSender},
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const OWNER_USERNAME: &str = "owner";
pub const OWNER_PASSWORD: &str = "counter-top-42";

/// Application harness backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    _db_dir: TempDir,
    event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Fresh database with the owner account already set up.
    pub async fn new() -> Self {
        let mut app = Self::without_setup().await;
        let response = app
            .request(
                Method::POST,
                "/api/v1/auth/setup",
                Some(json!({
                    "username": OWNER_USERNAME,
                    "password": OWNER_PASSWORD,
                    "display_name": "Shop Owner"
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "owner setup failed");
        let body = response_json(response).await;
        app.token = body["data"]["token"]["access_token"]
            .as_str()
            .expect("setup returns a token")
            .to_string();
        app
    }

    /// Fresh database with no admin accounts.
    pub async fn without_setup() -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("shopdesk_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "k3Vq9ZpL2xR7mW4tY8uN1bH6cJ0fD5gS_Qe-Ta.Wo+Xi/Ur=Ey!Ip?As@Dk#Lz$Mc%Nv^Bx&".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = app_router(state.clone());

        Self {
            router,
            state,
            token: String::new(),
            _db_dir: db_dir,
            event_task,
        }
    }

    /// Bearer token for the owner account.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for requests made as the owner.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Owner request that must return `expected`; yields the `data` payload.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let response = self.request_authenticated(method.clone(), uri, body).await;
        let status = response.status();
        let json = response_json(response).await;
        assert_eq!(status, expected, "{} {} returned {}", method, uri, json);
        json["data"].clone()
    }

    /// Owner request expected to fail; yields the error `code`.
    pub async fn call_err(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        expected: StatusCode,
    ) -> String {
        let response = self.request_authenticated(method.clone(), uri, body).await;
        let status = response.status();
        let json = response_json(response).await;
        assert_eq!(status, expected, "{} {} returned {}", method, uri, json);
        json["code"].as_str().unwrap_or_default().to_string()
    }

    /// Switches the shop onto `plan` (free, basic or pro).
    pub async fn set_plan(&self, plan: &str) {
        self.call(
            Method::POST,
            "/api/v1/subscription",
            Some(json!({ "plan": plan, "months": 1 })),
            StatusCode::OK,
        )
        .await;
    }

    pub async fn create_customer(&self, name: &str, phone: &str) -> Value {
        self.call(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "name": name, "phone": phone })),
            StatusCode::CREATED,
        )
        .await
    }

    pub async fn create_product(&self, name: &str, price: &str, stock: i32) -> Value {
        self.call(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": name,
                "price": price,
                "stock_quantity": stock,
                "min_stock_level": 2
            })),
            StatusCode::CREATED,
        )
        .await
    }

    pub async fn create_rental_product(
        &self,
        name: &str,
        price: &str,
        rental_price: &str,
        stock: i32,
    ) -> Value {
        self.call(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": name,
                "price": price,
                "rental_price": rental_price,
                "stock_quantity": stock
            })),
            StatusCode::CREATED,
        )
        .await
    }

    pub async fn stock_of(&self, product_id: &str) -> i64 {
        let product = self
            .call(
                Method::GET,
                &format!("/api/v1/products/{}", product_id),
                None,
                StatusCode::OK,
            )
            .await;
        product["stock_quantity"].as_i64().expect("stock quantity")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json response")
}

/// Id field of a JSON record as an owned string
pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("record id").to_string()
}
