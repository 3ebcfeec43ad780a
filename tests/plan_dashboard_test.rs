//! Plan limits, the subscription overview and dashboard numbers.

mod common;

use axum::http::{Method, StatusCode};
use common::{id_of, TestApp};
use serde_json::json;

#[tokio::test]
async fn plan_catalog_is_public() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/plans", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::response_json(response).await;
    let plans = body["data"].as_array().expect("plan list");
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0]["tier"], "free");
    assert_eq!(plans[0]["limits"]["max_customers"], 50);
    assert_eq!(plans[2]["limits"]["max_customers"], serde_json::Value::Null);
    assert_eq!(plans[2]["features"], json!(["rentals", "bookings", "reports"]));
}

#[tokio::test]
async fn free_plan_caps_customers() {
    let app = TestApp::new().await;
    for i in 0..50 {
        app.create_customer(&format!("Customer {}", i), &format!("90000{:05}", i))
            .await;
    }

    let code = app
        .call_err(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "name": "One too many", "phone": "9111111111" })),
            StatusCode::PAYMENT_REQUIRED,
        )
        .await;
    assert_eq!(code, "PLAN_LIMIT_REACHED");

    app.set_plan("basic").await;
    app.create_customer("One too many", "9111111111").await;
}

#[tokio::test]
async fn retired_products_free_a_slot() {
    let app = TestApp::new().await;
    let mut last = None;
    for i in 0..50 {
        last = Some(app.create_product(&format!("Item {}", i), "1.00", 0).await);
    }

    let code = app
        .call_err(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Item 50", "price": "1.00" })),
            StatusCode::PAYMENT_REQUIRED,
        )
        .await;
    assert_eq!(code, "PLAN_LIMIT_REACHED");

    let retired = last.expect("products were created");
    let response = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/products/{}", id_of(&retired)),
            None,
        )
        .await;
    assert!(response.status().is_success());
    app.create_product("Item 50", "1.00", 0).await;
}

#[tokio::test]
async fn subscription_overview_reports_usage() {
    let app = TestApp::new().await;
    let overview = app
        .call(Method::GET, "/api/v1/subscription", None, StatusCode::OK)
        .await;
    assert_eq!(overview["plan"]["tier"], "free");
    assert_eq!(overview["subscription_id"], serde_json::Value::Null);

    app.create_customer("Ravi", "9876543210").await;
    let soap = app.create_product("Soap", "35.00", 10).await;
    app.call(
        Method::POST,
        "/api/v1/bills",
        Some(json!({
            "bill_type": "sale",
            "items": [{ "product_id": id_of(&soap), "quantity": 1 }]
        })),
        StatusCode::CREATED,
    )
    .await;

    let overview = app
        .call(
            Method::POST,
            "/api/v1/subscription",
            Some(json!({ "plan": "pro", "months": 12 })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(overview["plan"]["tier"], "pro");
    assert_eq!(overview["status"], "active");
    assert!(overview["expires_at"].is_string());
    assert_eq!(overview["usage"]["customers"], 1);
    assert_eq!(overview["usage"]["products"], 1);
    assert_eq!(overview["usage"]["bills_this_month"], 1);

    app.call_err(
        Method::POST,
        "/api/v1/subscription",
        Some(json!({ "plan": "pro", "months": 0 })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let downgraded = app
        .call(
            Method::POST,
            "/api/v1/subscription",
            Some(json!({ "plan": "free" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(downgraded["plan"]["tier"], "free");
    assert_eq!(downgraded["expires_at"], serde_json::Value::Null);
}

#[tokio::test]
async fn dashboard_reflects_bills_and_stock() {
    let app = TestApp::new().await;
    app.set_plan("basic").await;
    app.create_customer("Asha", "9988776655").await;
    let bulb = app.create_product("Bulb", "50.00", 5).await;
    let ladder = app
        .create_rental_product("Ladder", "3000.00", "100.00", 2)
        .await;

    let empty = app
        .call(Method::GET, "/api/v1/dashboard", None, StatusCode::OK)
        .await;
    assert_eq!(empty["today_bills"], 0);
    assert_eq!(empty["customers"], 1);

    app.call(
        Method::POST,
        "/api/v1/bills",
        Some(json!({
            "bill_type": "sale",
            "items": [{ "product_id": id_of(&bulb), "quantity": 4 }],
            "paid_amount": "150"
        })),
        StatusCode::CREATED,
    )
    .await;
    app.call(
        Method::POST,
        "/api/v1/bills",
        Some(json!({
            "bill_type": "rental",
            "items": [{ "product_id": id_of(&ladder), "quantity": 1 }],
            "rental_start": "2024-01-01",
            "rental_end": "2024-01-02"
        })),
        StatusCode::CREATED,
    )
    .await;

    let summary = app
        .call(Method::GET, "/api/v1/dashboard", None, StatusCode::OK)
        .await;
    assert_eq!(summary["customers"], 1);
    assert_eq!(summary["active_products"], 2);
    // bulb is down to 1 against a minimum of 2
    assert_eq!(summary["low_stock_products"], 1);
    assert_eq!(summary["today_bills"], 2);
    assert_eq!(summary["today_sales"], "400.00");
    assert_eq!(summary["month_revenue"], "400.00");
    assert_eq!(summary["outstanding_balance"], "250.00");
    assert_eq!(summary["active_rentals"], 1);
    assert_eq!(summary["overdue_rentals"], 1);
}

#[tokio::test]
async fn sales_report_requires_pro() {
    let app = TestApp::new().await;
    let code = app
        .call_err(
            Method::GET,
            "/api/v1/reports/sales",
            None,
            StatusCode::PAYMENT_REQUIRED,
        )
        .await;
    assert_eq!(code, "UPGRADE_REQUIRED");

    app.set_plan("pro").await;
    let pen = app.create_product("Pen", "12.50", 10).await;
    app.call(
        Method::POST,
        "/api/v1/bills",
        Some(json!({
            "bill_type": "sale",
            "items": [{ "product_id": id_of(&pen), "quantity": 2 }],
            "paid_amount": "25"
        })),
        StatusCode::CREATED,
    )
    .await;

    let report = app
        .call(Method::GET, "/api/v1/reports/sales", None, StatusCode::OK)
        .await;
    assert_eq!(report["bill_count"], 1);
    assert_eq!(report["total"], "25.00");
    assert_eq!(report["collected"], "25.00");
    assert_eq!(report["days"][0]["sale_count"], 1);

    app.call_err(
        Method::GET,
        "/api/v1/reports/sales?from=2024-06-10&to=2024-06-01",
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;
}
