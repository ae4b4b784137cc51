mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use common::{grocery_lines, line, Harness, DONG, PHONE, SESSION};
use local_market_fulfillment::adapter::driver::{create_router, AppState};
use serde_json::{json, Value};

fn server(harness: &Harness) -> TestServer {
    let state = AppState {
        order_service: harness.service.clone(),
        checkout_service: harness.checkout.clone(),
        order_query_service: harness.queries.clone(),
    };
    TestServer::new(create_router().with_state(state)).unwrap()
}

fn order_body() -> Value {
    json!({
        "session_key": SESSION,
        "customer_name": "김민수",
        "customer_phone": PHONE,
        "address_line1": "서울특별시 강남구 테헤란로 1",
        "dong_code": DONG,
        "allow_substitution": true
    })
}

/// 注文を作成して (order_id, order_no) を返す
async fn place_order(server: &TestServer) -> (String, String) {
    let response = server.post("/orders").json(&order_body()).await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    (
        created["order_id"].as_str().unwrap().to_string(),
        created["order_no"].as_str().unwrap().to_string(),
    )
}

fn picker_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-admin-user"),
        HeaderValue::from_static("picker-9"),
    )
}

#[tokio::test]
async fn test_health_check() {
    let harness = Harness::new();
    let server = server(&harness);

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_quote_returns_decimal_strings() {
    let harness = Harness::new();
    harness.with_dong_zone().await;
    harness.put_cart(grocery_lines()).await;
    let server = server(&harness);

    let response = server
        .post("/checkout/quote")
        .json(&json!({ "session_key": SESSION, "dong_code": DONG }))
        .await;

    response.assert_status_ok();
    let quote: Value = response.json();
    assert_eq!(quote["valid"], true);
    assert_eq!(quote["subtotal"], "33800");
    assert_eq!(quote["delivery_fee"], "0");
    assert_eq!(quote["total_estimated"], "33800");
    assert_eq!(quote["zone_id"], 1);
}

#[tokio::test]
async fn test_validate_reports_rule_violations() {
    let harness = Harness::new();
    harness.put_cart(vec![line(1, "두부", 1, 2500)]).await;
    let server = server(&harness);

    let response = server
        .post("/checkout/validate")
        .json(&json!({ "session_key": SESSION }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["valid"], false);
    assert_eq!(body["errors"], json!(["MIN_ORDER_NOT_MET"]));
}

#[tokio::test]
async fn test_validate_reports_catalog_violations() {
    let harness = Harness::new();
    harness.put_cart(vec![line(1, "두부", 11, 2500)]).await;
    let server = server(&harness);

    let response = server
        .post("/checkout/validate")
        .json(&json!({ "session_key": SESSION }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["valid"], false);
    assert_eq!(body["errors"], json!(["MAX_QTY_EXCEEDED", "MIN_ORDER_NOT_MET"]));

    let quote: Value = server
        .post("/checkout/quote")
        .json(&json!({ "session_key": SESSION }))
        .await
        .json();
    assert_eq!(quote["subtotal"], "0");
}

#[tokio::test]
async fn test_create_order_rejected_by_policy() {
    let harness = Harness::new();
    harness.put_cart(vec![line(1, "두부", 1, 2500)]).await;
    let server = server(&harness);

    let response = server.post("/orders").json(&order_body()).await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["code"], "POLICY_VIOLATION");
    assert_eq!(body["errors"], json!(["MIN_ORDER_NOT_MET"]));
}

#[tokio::test]
async fn test_create_and_lookup_order() {
    let harness = Harness::new();
    harness.with_dong_zone().await;
    harness.put_cart(grocery_lines()).await;
    let server = server(&harness);

    let (order_id, order_no) = place_order(&server).await;

    let response = server
        .get("/orders/lookup")
        .add_query_param("order_no", &order_no)
        .add_query_param("phone", "01012345678")
        .await;
    response.assert_status_ok();
    let detail: Value = response.json();
    assert_eq!(detail["order_id"], order_id);
    assert_eq!(detail["status"], "RECEIVED");
    assert_eq!(detail["total_estimated"], "33800");
    assert_eq!(detail["allowed_next"], json!(["CANCELED", "PICKING"]));
    assert_eq!(detail["items"].as_array().unwrap().len(), 3);

    let response = server
        .get("/orders/lookup")
        .add_query_param("order_no", &order_no)
        .add_query_param("phone", "01000000000")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_illegal_status_change_is_conflict() {
    let harness = Harness::new();
    harness.put_cart(grocery_lines()).await;
    let server = server(&harness);
    let (order_id, _) = place_order(&server).await;

    let response = server
        .patch(&format!("/admin/orders/{}/status", order_id))
        .json(&json!({ "status": "DELIVERED" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let response = server
        .patch(&format!("/admin/orders/{}/status", order_id))
        .json(&json!({ "status": "SHIPPED" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .patch(&format!("/admin/orders/{}/status", order_id))
        .json(&json!({ "status": "PICKING" }))
        .await;
    response.assert_status_ok();
    let detail: Value = response.json();
    assert_eq!(detail["status"], "PICKING");
    assert_eq!(detail["version"], 1);
}

#[tokio::test]
async fn test_shortage_action_records_refund_for_staff_member() {
    let harness = Harness::new();
    harness.with_dong_zone().await;
    harness.put_cart(grocery_lines()).await;
    let server = server(&harness);
    let (order_id, _) = place_order(&server).await;

    let detail: Value = server
        .get(&format!("/admin/orders/{}", order_id))
        .await
        .json();
    let item_id = detail["items"][2]["order_item_id"].as_str().unwrap().to_string();

    let (name, value) = picker_header();
    let response = server
        .post(&format!("/admin/orders/{}/shortage-actions", order_id))
        .add_header(name, value)
        .json(&json!({ "order_item_id": item_id, "action": "OUT_OF_STOCK" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["refund"]["amount"], "17800");
    assert_eq!(body["refund"]["processed_by"], "picker-9");
    assert_eq!(body["uncharged_amount"], "0");
    assert_eq!(body["auto_canceled"], false);
    assert_eq!(body["order"]["status"], "PICKING");
    assert_eq!(body["order"]["refundable_remaining"], "16000");
    assert_eq!(body["order"]["items"][2]["status"], "OUT_OF_STOCK");
    let logs = body["order"]["status_logs"].as_array().unwrap();
    assert_eq!(logs.last().unwrap()["changed_by_id"], "picker-9");
}

#[tokio::test]
async fn test_shortage_action_validation_errors() {
    let harness = Harness::new();
    harness.put_cart(grocery_lines()).await;
    let server = server(&harness);
    let (order_id, _) = place_order(&server).await;
    let detail: Value = server
        .get(&format!("/admin/orders/{}", order_id))
        .await
        .json();
    let item_id = detail["items"][0]["order_item_id"].as_str().unwrap().to_string();

    let response = server
        .post(&format!("/admin/orders/{}/shortage-actions", order_id))
        .json(&json!({ "order_item_id": item_id, "action": "PARTIAL_CANCEL", "fulfilled_qty": 2 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_QUANTITY");

    let response = server
        .post(&format!("/admin/orders/{}/shortage-actions", order_id))
        .json(&json!({ "order_item_id": item_id, "action": "PARTIAL_CANCEL", "fulfilled_qty": -1 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post(&format!("/admin/orders/{}/shortage-actions", order_id))
        .json(&json!({
            "order_item_id": "00000000-0000-0000-0000-000000000000",
            "action": "OUT_OF_STOCK"
        }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "ITEM_NOT_FOUND");
}

#[tokio::test]
async fn test_refunds_create_and_list() {
    let harness = Harness::new();
    harness.with_dong_zone().await;
    harness.put_cart(grocery_lines()).await;
    let server = server(&harness);
    let (order_id, _) = place_order(&server).await;
    let path = format!("/admin/orders/{}/refunds", order_id);

    let response = server
        .post(&path)
        .json(&json!({ "amount": "1000", "reason": "bruised fruit" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let refund: Value = response.json();
    assert_eq!(refund["amount"], "1000");
    assert_eq!(refund["method"], "COD_ADJUSTMENT");
    assert_eq!(refund["status"], "APPROVED");
    assert_eq!(refund["processed_by"], "admin");

    let response = server
        .post(&path)
        .json(&json!({ "amount": "40000", "reason": "too much" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "REFUND_EXCEEDS_REMAINING");

    // 金額カラムは小数点以下2桁まで
    let response = server
        .post(&path)
        .json(&json!({ "amount": "0.001", "reason": "rounding" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let response = server.get(&path).await;
    response.assert_status_ok();
    let refunds: Vec<Value> = response.json();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0]["reason"], "bruised fruit");
}

#[tokio::test]
async fn test_customer_cancel_request() {
    let harness = Harness::new();
    harness.put_cart(grocery_lines()).await;
    let server = server(&harness);
    let (_, order_no) = place_order(&server).await;

    let response = server
        .post(&format!("/orders/{}/cancel-requests", order_no))
        .add_query_param("phone", "01099999999")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .post(&format!("/orders/{}/cancel-requests", order_no))
        .add_query_param("phone", PHONE)
        .add_query_param("reason", "changed my mind")
        .await;
    response.assert_status_ok();
    let detail: Value = response.json();
    assert_eq!(detail["status"], "CANCELED");
    assert_eq!(detail["total_final"], "0");
    assert_eq!(detail["allowed_next"], json!([]));

    let response = server
        .post(&format!("/orders/{}/cancel-requests", order_no))
        .add_query_param("phone", PHONE)
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "ORDER_NOT_CANCELABLE");
}

#[tokio::test]
async fn test_admin_order_listing() {
    let harness = Harness::new();
    harness.put_cart(grocery_lines()).await;
    let server = server(&harness);
    let (first_id, _) = place_order(&server).await;
    harness.put_cart(grocery_lines()).await;
    let (second_id, _) = place_order(&server).await;
    server
        .patch(&format!("/admin/orders/{}/status", second_id))
        .json(&json!({ "status": "PICKING" }))
        .await
        .assert_status_ok();

    let all: Vec<Value> = server.get("/admin/orders").await.json();
    assert_eq!(all.len(), 2);

    let received: Vec<Value> = server
        .get("/admin/orders")
        .add_query_param("status", "RECEIVED")
        .await
        .json();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["order_id"], first_id);

    let response = server
        .get("/admin/orders")
        .add_query_param("status", "LOST")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/admin/orders/6f1c9b5e-0000-4000-8000-000000000000")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
