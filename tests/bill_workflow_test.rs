//! Sale and rental bills: numbering, totals, stock, payments, returns and voids.

mod common;

use axum::http::{Method, StatusCode};
use common::{id_of, TestApp};
use serde_json::{json, Value};

async fn sale(app: &TestApp, product_id: &str, quantity: i32) -> Value {
    app.call(
        Method::POST,
        "/api/v1/bills",
        Some(json!({
            "bill_type": "sale",
            "items": [{ "product_id": product_id, "quantity": quantity }]
        })),
        StatusCode::CREATED,
    )
    .await
}

#[tokio::test]
async fn sale_totals_and_stock() {
    let app = TestApp::new().await;
    let kettle = app.create_product("Kettle", "100.00", 10).await;
    let kettle_id = id_of(&kettle);

    let bill = app
        .call(
            Method::POST,
            "/api/v1/bills",
            Some(json!({
                "bill_type": "sale",
                "customer_name": "Walk-in",
                "items": [{ "product_id": kettle_id, "quantity": 2 }],
                "discount": "20",
                "tax_rate": "0.10",
                "paid_amount": "50",
                "payment_method": "UPI"
            })),
            StatusCode::CREATED,
        )
        .await;

    assert_eq!(bill["display_number"], "S-000001");
    assert_eq!(bill["subtotal"], "200.00");
    assert_eq!(bill["discount"], "20.00");
    assert_eq!(bill["tax_amount"], "18.00");
    assert_eq!(bill["total"], "198.00");
    assert_eq!(bill["paid_amount"], "50.00");
    assert_eq!(bill["balance_due"], "148.00");
    assert_eq!(bill["payment_status"], "partial");
    assert_eq!(bill["payment_method"], "upi");
    assert_eq!(bill["items"][0]["line_total"], "200.00");
    assert_eq!(app.stock_of(&kettle_id).await, 8);

    let fetched = app
        .call(
            Method::GET,
            &format!("/api/v1/bills/{}", id_of(&bill)),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(fetched["items"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn serials_are_sequential_per_type() {
    let app = TestApp::new().await;
    app.set_plan("basic").await;
    let tent = app
        .create_rental_product("Tent", "5000.00", "300.00", 5)
        .await;
    let tent_id = id_of(&tent);

    let preview = app
        .call(
            Method::GET,
            "/api/v1/bills/next-serial?bill_type=sale",
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(preview["serial_no"], 1);
    assert_eq!(preview["display_number"], "S-000001");

    assert_eq!(sale(&app, &tent_id, 1).await["serial_no"], 1);
    assert_eq!(sale(&app, &tent_id, 1).await["serial_no"], 2);

    let rental = app
        .call(
            Method::POST,
            "/api/v1/bills",
            Some(json!({
                "bill_type": "rental",
                "items": [{ "product_id": tent_id, "quantity": 1 }],
                "rental_start": "2024-06-01",
                "rental_end": "2024-06-03"
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(rental["serial_no"], 1);
    assert_eq!(rental["display_number"], "R-000001");

    let preview = app
        .call(
            Method::GET,
            "/api/v1/bills/next-serial?bill_type=sale",
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(preview["serial_no"], 3);
}

#[tokio::test]
async fn overselling_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let lamp = app.create_product("Lamp", "300.00", 2).await;
    let fan = app.create_product("Fan", "1200.00", 5).await;

    let code = app
        .call_err(
            Method::POST,
            "/api/v1/bills",
            Some(json!({
                "bill_type": "sale",
                "items": [
                    { "product_id": id_of(&fan), "quantity": 1 },
                    { "product_id": id_of(&lamp), "quantity": 3 }
                ]
            })),
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await;
    assert_eq!(code, "INSUFFICIENT_STOCK");

    // the fan line was rolled back with the rest of the bill
    assert_eq!(app.stock_of(&id_of(&fan)).await, 5);
    let bills = app
        .call(Method::GET, "/api/v1/bills", None, StatusCode::OK)
        .await;
    assert_eq!(bills["total"], 0);
    let preview = app
        .call(
            Method::GET,
            "/api/v1/bills/next-serial?bill_type=sale",
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(preview["serial_no"], 1);
}

#[tokio::test]
async fn invalid_bills_are_rejected() {
    let app = TestApp::new().await;
    let mug = app.create_product("Mug", "80.00", 10).await;
    let mug_id = id_of(&mug);

    let cases = [
        json!({ "bill_type": "sale", "items": [] }),
        json!({
            "bill_type": "sale",
            "items": [{ "product_id": mug_id, "quantity": 1 }],
            "discount": "100"
        }),
        json!({
            "bill_type": "sale",
            "items": [{ "product_id": mug_id, "quantity": 1 }],
            "paid_amount": "81"
        }),
        json!({
            "bill_type": "sale",
            "items": [{ "product_id": mug_id, "quantity": 1 }],
            "deposit": "10"
        }),
    ];
    for body in cases {
        app.call_err(
            Method::POST,
            "/api/v1/bills",
            Some(body),
            StatusCode::BAD_REQUEST,
        )
        .await;
    }
    assert_eq!(app.stock_of(&mug_id).await, 10);
}

#[tokio::test]
async fn payments_settle_the_balance() {
    let app = TestApp::new().await;
    let rug = app.create_product("Rug", "250.00", 4).await;
    let bill = sale(&app, &id_of(&rug), 2).await;
    let uri = format!("/api/v1/bills/{}/payments", id_of(&bill));
    assert_eq!(bill["payment_status"], "unpaid");

    let paid = app
        .call(
            Method::POST,
            &uri,
            Some(json!({ "amount": "200" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(paid["payment_status"], "partial");
    assert_eq!(paid["balance_due"], "300.00");

    app.call_err(
        Method::POST,
        &uri,
        Some(json!({ "amount": "300.01" })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    app.call_err(
        Method::POST,
        &uri,
        Some(json!({ "amount": "0" })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let paid = app
        .call(
            Method::POST,
            &uri,
            Some(json!({ "amount": "300", "payment_method": "card" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(paid["payment_status"], "paid");
    assert_eq!(paid["balance_due"], "0.00");
    assert_eq!(paid["payment_method"], "card");

    let unpaid = app
        .call(
            Method::GET,
            "/api/v1/bills?payment_status=paid",
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(unpaid["total"], 1);
}

#[tokio::test]
async fn rentals_need_a_plan_and_come_back() {
    let app = TestApp::new().await;
    let drill = app
        .create_rental_product("Drill", "4000.00", "150.00", 3)
        .await;
    let drill_id = id_of(&drill);
    let rental = json!({
        "bill_type": "rental",
        "items": [{ "product_id": drill_id, "quantity": 2 }],
        "rental_start": "2024-06-01",
        "rental_end": "2024-06-03",
        "deposit": "1000"
    });

    let code = app
        .call_err(
            Method::POST,
            "/api/v1/bills",
            Some(rental.clone()),
            StatusCode::PAYMENT_REQUIRED,
        )
        .await;
    assert_eq!(code, "UPGRADE_REQUIRED");

    app.set_plan("basic").await;
    let bill = app
        .call(
            Method::POST,
            "/api/v1/bills",
            Some(rental),
            StatusCode::CREATED,
        )
        .await;
    // 150 x 2 units x 3 days
    assert_eq!(bill["total"], "900.00");
    assert_eq!(bill["items"][0]["rental_days"], 3);
    assert_eq!(bill["deposit"], "1000.00");
    assert_eq!(bill["is_overdue"], true);
    assert_eq!(app.stock_of(&drill_id).await, 1);

    let return_uri = format!("/api/v1/bills/{}/return", id_of(&bill));
    let returned = app
        .call(Method::POST, &return_uri, None, StatusCode::OK)
        .await;
    assert!(returned["returned_at"].is_string());
    assert_eq!(returned["is_overdue"], false);
    assert_eq!(app.stock_of(&drill_id).await, 3);

    let code = app
        .call_err(Method::POST, &return_uri, None, StatusCode::BAD_REQUEST)
        .await;
    assert_eq!(code, "INVALID_OPERATION");

    // voiding a returned rental does not restock twice
    let response = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/bills/{}", id_of(&bill)),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.stock_of(&drill_id).await, 3);
}

#[tokio::test]
async fn sales_cannot_be_returned() {
    let app = TestApp::new().await;
    let pen = app.create_product("Pen", "10.00", 10).await;
    let bill = sale(&app, &id_of(&pen), 1).await;

    let code = app
        .call_err(
            Method::POST,
            &format!("/api/v1/bills/{}/return", id_of(&bill)),
            None,
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert_eq!(code, "INVALID_OPERATION");
}

#[tokio::test]
async fn voiding_a_sale_restores_stock() {
    let app = TestApp::new().await;
    let chair = app.create_product("Chair", "700.00", 6).await;
    let chair_id = id_of(&chair);
    let bill = sale(&app, &chair_id, 4).await;
    assert_eq!(app.stock_of(&chair_id).await, 2);

    let response = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/bills/{}", id_of(&bill)),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.stock_of(&chair_id).await, 6);

    app.call_err(
        Method::GET,
        &format!("/api/v1/bills/{}", id_of(&bill)),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;

    let history = app
        .call(
            Method::GET,
            &format!("/api/v1/products/{}/history", chair_id),
            None,
            StatusCode::OK,
        )
        .await;
    let types: Vec<&str> = history["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["change_type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"sale"));
    assert!(types.contains(&"bill_void"));
}

#[tokio::test]
async fn walk_in_phone_links_known_customer() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Meera Iyer", "98450 12345").await;
    let soap = app.create_product("Soap", "35.00", 20).await;

    let bill = app
        .call(
            Method::POST,
            "/api/v1/bills",
            Some(json!({
                "bill_type": "sale",
                "customer_phone": "9845012345",
                "items": [{ "product_id": id_of(&soap), "quantity": 3 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(bill["customer_id"], customer["id"]);
    assert_eq!(bill["customer_name"], "Meera Iyer");

    let bills = app
        .call(
            Method::GET,
            &format!("/api/v1/customers/{}/bills", id_of(&customer)),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(bills["total"], 1);
    assert_eq!(bills["items"][0]["total"], "105.00");
}

#[tokio::test]
async fn inactive_products_cannot_be_billed() {
    let app = TestApp::new().await;
    let old = app.create_product("Old Stock", "5.00", 10).await;
    app.request_authenticated(
        Method::DELETE,
        &format!("/api/v1/products/{}", id_of(&old)),
        None,
    )
    .await;

    let code = app
        .call_err(
            Method::POST,
            "/api/v1/bills",
            Some(json!({
                "bill_type": "sale",
                "items": [{ "product_id": id_of(&old), "quantity": 1 }]
            })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert_eq!(code, "INVALID_OPERATION");
}

#[tokio::test]
async fn oversized_amounts_and_periods_are_rejected() {
    let app = TestApp::new().await;
    app.set_plan("basic").await;
    let crane = app
        .create_rental_product("Crane", "9000000.00", "900000.00", 500)
        .await;
    let crane_id = id_of(&crane);

    let cases = [
        json!({
            "bill_type": "sale",
            "items": [{ "product_id": crane_id, "quantity": 1, "unit_price": "100000000000000000000" }]
        }),
        json!({
            "bill_type": "sale",
            "items": [{ "product_id": crane_id, "quantity": 100000 }]
        }),
        json!({
            "bill_type": "rental",
            "items": [{ "product_id": crane_id, "quantity": 1 }],
            "rental_start": "2024-01-01",
            "rental_end": "9999-12-31"
        }),
        json!({
            "bill_type": "rental",
            "items": [{ "product_id": crane_id, "quantity": 400 }],
            "rental_start": "2024-01-01",
            "rental_end": "2024-12-31"
        }),
    ];
    for body in cases {
        let code = app
            .call_err(
                Method::POST,
                "/api/v1/bills",
                Some(body),
                StatusCode::BAD_REQUEST,
            )
            .await;
        assert_eq!(code, "VALIDATION_ERROR");
    }
    assert_eq!(app.stock_of(&crane_id).await, 500);

    app.call_err(
        Method::POST,
        "/api/v1/products",
        Some(json!({ "name": "Gold bar", "price": "10000000000.00" })),
        StatusCode::BAD_REQUEST,
    )
    .await;
}
