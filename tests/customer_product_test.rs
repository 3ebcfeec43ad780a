//! Customer records, the product catalog and stock movements.

mod common;

use axum::http::{Method, StatusCode};
use common::{id_of, TestApp};
use serde_json::json;

#[tokio::test]
async fn customer_crud_and_phone_uniqueness() {
    let app = TestApp::new().await;

    let asha = app.create_customer("Asha Rao", "+91 98765-43210").await;
    assert_eq!(asha["phone"], "+919876543210");

    // same number in a different format
    let code = app
        .call_err(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "name": "Someone Else", "phone": "+919876543210" })),
            StatusCode::CONFLICT,
        )
        .await;
    assert_eq!(code, "DUPLICATE_PHONE");

    let code = app
        .call_err(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "name": "Bad Phone", "phone": "call me" })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert_eq!(code, "VALIDATION_ERROR");

    let updated = app
        .call(
            Method::PUT,
            &format!("/api/v1/customers/{}", id_of(&asha)),
            Some(json!({ "email": "asha@example.com", "notes": "Prefers UPI" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(updated["email"], "asha@example.com");
    assert_eq!(updated["name"], "Asha Rao");

    app.create_customer("Vikram Shah", "022 2345 6789").await;
    let page = app
        .call(
            Method::GET,
            "/api/v1/customers?search=Vikram",
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["name"], "Vikram Shah");

    let response = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/customers/{}", id_of(&asha)),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    app.call_err(
        Method::GET,
        &format!("/api/v1/customers/{}", id_of(&asha)),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn customer_list_paginates() {
    let app = TestApp::new().await;
    for i in 0..5 {
        app.create_customer(&format!("Customer {}", i), &format!("98000000{:02}", i))
            .await;
    }

    let page = app
        .call(
            Method::GET,
            "/api/v1/customers?page=2&per_page=2",
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(page["total"], 5);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["page"], 2);
    assert_eq!(page["items"][0]["name"], "Customer 2");
}

#[tokio::test]
async fn product_skus_are_unique_and_uppercased() {
    let app = TestApp::new().await;

    let product = app
        .call(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Steel Chair", "sku": "chair-01", "price": "450.00" })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(product["sku"], "CHAIR-01");
    assert_eq!(product["stock_quantity"], 0);

    let code = app
        .call_err(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Other Chair", "sku": "CHAIR-01", "price": "300" })),
            StatusCode::CONFLICT,
        )
        .await;
    assert_eq!(code, "DUPLICATE_SKU");

    let code = app
        .call_err(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Negative", "price": "-1" })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert_eq!(code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn stock_is_not_editable_through_update() {
    let app = TestApp::new().await;
    let product = app.create_product("Bulb", "40.00", 10).await;

    app.call_err(
        Method::PUT,
        &format!("/api/v1/products/{}", id_of(&product)),
        Some(json!({ "stock_quantity": 99 })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let updated = app
        .call(
            Method::PUT,
            &format!("/api/v1/products/{}", id_of(&product)),
            Some(json!({ "price": "45.50", "category": "Lighting" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(updated["price"], "45.50");
    assert_eq!(updated["stock_quantity"], 10);
}

#[tokio::test]
async fn explicit_null_clears_sku_and_rental_price() {
    let app = TestApp::new().await;
    let product = app.create_rental_product("Ladder", "900.00", "150.00", 2).await;
    let path = format!("/api/v1/products/{}", id_of(&product));

    let updated = app
        .call(Method::PUT, &path, Some(json!({ "sku": " lad-01 " })), StatusCode::OK)
        .await;
    assert_eq!(updated["sku"], "LAD-01");
    assert_eq!(updated["rental_price"], "150.00");

    // Omitted fields stay as they are
    let updated = app
        .call(Method::PUT, &path, Some(json!({ "name": "Step Ladder" })), StatusCode::OK)
        .await;
    assert_eq!(updated["sku"], "LAD-01");
    assert_eq!(updated["rental_price"], "150.00");

    let updated = app
        .call(
            Method::PUT,
            &path,
            Some(json!({ "sku": null, "rental_price": null })),
            StatusCode::OK,
        )
        .await;
    assert!(updated["sku"].is_null());
    assert!(updated["rental_price"].is_null());
    assert_eq!(updated["name"], "Step Ladder");

    let code = app
        .call_err(
            Method::PUT,
            &path,
            Some(json!({ "sku": "X".repeat(65) })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert_eq!(code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn restock_and_adjust_write_history() {
    let app = TestApp::new().await;
    let product = app.create_product("Tape", "25.00", 3).await;
    let id = id_of(&product);

    let moved = app
        .call(
            Method::POST,
            "/api/v1/products/restock",
            Some(json!({ "product_id": id, "quantity": 7, "note": "Supplier delivery" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(moved["product"]["stock_quantity"], 10);
    assert_eq!(moved["history"]["change_type"], "restock");
    assert_eq!(moved["history"]["previous_quantity"], 3);
    assert_eq!(moved["history"]["new_quantity"], 10);

    let moved = app
        .call(
            Method::POST,
            &format!("/api/v1/products/{}/adjust", id),
            Some(json!({ "quantity_change": -4, "note": "Damaged in storage" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(moved["product"]["stock_quantity"], 6);

    // never below zero
    let code = app
        .call_err(
            Method::POST,
            &format!("/api/v1/products/{}/adjust", id),
            Some(json!({ "quantity_change": -7, "note": "Count correction" })),
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await;
    assert_eq!(code, "INSUFFICIENT_STOCK");
    assert_eq!(app.stock_of(&id).await, 6);

    app.call_err(
        Method::POST,
        "/api/v1/products/restock",
        Some(json!({ "product_id": id, "quantity": 0 })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let history = app
        .call(
            Method::GET,
            &format!("/api/v1/products/{}/history", id),
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
    assert!(types.contains(&"initial"));
    assert!(types.contains(&"restock"));
    assert!(types.contains(&"adjustment"));
    assert_eq!(history["total"], 3);
}

#[tokio::test]
async fn extreme_adjustments_leave_stock_untouched() {
    let app = TestApp::new().await;
    let product = app.create_product("Glue", "40.00", 10).await;
    let uri = format!("/api/v1/products/{}/adjust", id_of(&product));

    for change in [i64::from(i32::MIN), -1_000_001, 1_000_001, i64::from(i32::MAX)] {
        let code = app
            .call_err(
                Method::POST,
                &uri,
                Some(json!({ "quantity_change": change, "note": "Bulk fix" })),
                StatusCode::BAD_REQUEST,
            )
            .await;
        assert_eq!(code, "VALIDATION_ERROR", "quantity_change {}", change);
    }

    app.call_err(
        Method::POST,
        "/api/v1/products/restock",
        Some(json!({ "product_id": id_of(&product), "quantity": i32::MAX })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    assert_eq!(app.stock_of(&id_of(&product)).await, 10);
    let history = app
        .call(
            Method::GET,
            &format!("/api/v1/products/{}/history", id_of(&product)),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(history["total"], 1);
}

#[tokio::test]
async fn deleting_a_customer_keeps_bill_snapshots() {
    let app = TestApp::new().await;
    let customer = app.create_customer("Farah Khan", "9812345678").await;
    let towel = app.create_product("Towel", "150.00", 5).await;

    let bill = app
        .call(
            Method::POST,
            "/api/v1/bills",
            Some(json!({
                "bill_type": "sale",
                "customer_id": customer["id"],
                "items": [{ "product_id": id_of(&towel), "quantity": 1 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(bill["customer_id"], customer["id"]);

    let response = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/customers/{}", id_of(&customer)),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let kept = app
        .call(
            Method::GET,
            &format!("/api/v1/bills/{}", id_of(&bill)),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(kept["customer_id"].is_null());
    assert_eq!(kept["customer_name"], "Farah Khan");
    assert_eq!(kept["customer_phone"], "9812345678");
    assert_eq!(kept["total"], "150.00");
}

#[tokio::test]
async fn low_stock_listing_and_soft_delete() {
    let app = TestApp::new().await;
    let low = app.create_product("Fuse", "10.00", 1).await;
    app.create_product("Switch", "60.00", 50).await;

    let listed = app
        .call(Method::GET, "/api/v1/products/low-stock", None, StatusCode::OK)
        .await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "Fuse");
    assert_eq!(listed[0]["is_low_stock"], true);
    assert_eq!(listed[0]["stock_deficit"], 1);

    let response = app
        .request_authenticated(
            Method::DELETE,
            &format!("/api/v1/products/{}", id_of(&low)),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // still readable, but out of the low-stock list and not restockable
    let fuse = app
        .call(
            Method::GET,
            &format!("/api/v1/products/{}", id_of(&low)),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(fuse["is_active"], false);
    let listed = app
        .call(Method::GET, "/api/v1/products/low-stock", None, StatusCode::OK)
        .await;
    assert!(listed.as_array().unwrap().is_empty());
    app.call_err(
        Method::POST,
        "/api/v1/products/restock",
        Some(json!({ "product_id": id_of(&low), "quantity": 5 })),
        StatusCode::BAD_REQUEST,
    )
    .await;
}
