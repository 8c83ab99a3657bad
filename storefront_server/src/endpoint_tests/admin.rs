use actix_web::http::StatusCode;
use serde_json::json;

use super::helpers::{checkout, get, post, test_state, wait_for_session_state};

#[actix_web::test]
async fn refused_order_moves_echo_the_current_state() {
    let state = test_state().await;
    let body = checkout(&state, "alice", "pay-1").await;
    let order_id = body["order"]["order_id"].as_str().unwrap().to_string();
    let path = format!("/admin/orders/{order_id}/status");

    let (status, body) = post(&state, &path, json!({ "status": "delivered" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["current"], "pending");
    assert_eq!(body["error"], "Order cannot move from pending to delivered");

    let (status, body) = post(&state, &path, json!({ "status": "paid" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "applied");
    assert_eq!(body["order"]["status"], "paid");

    let (status, body) = post(&state, &path, json!({ "status": "paid" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "unchanged");

    let (status, body) = post(&state, &path, json!({ "status": "bogus" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    state.sessions.close_all().await;
}

#[actix_web::test]
async fn operators_cannot_expire_payments() {
    let state = test_state().await;
    checkout(&state, "alice", "pay-1").await;
    let (status, body) = post(&state, "/admin/payments/pay-1/status", json!({ "status": "expired" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["current"], "pending");
    state.sessions.close_all().await;
}

#[actix_web::test]
async fn terminal_payments_are_sticky() {
    let state = test_state().await;
    checkout(&state, "alice", "pay-1").await;
    post(&state, "/admin/payments/pay-1/status", json!({ "status": "completed" })).await;
    let (status, body) = post(&state, "/admin/payments/pay-1/status", json!({ "status": "failed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "unchanged");
    assert_eq!(body["payment"]["status"], "completed");
    state.sessions.close_all().await;
}

#[actix_web::test]
async fn legacy_order_payment_status_settles_with_drift() {
    let state = test_state().await;
    let body = checkout(&state, "alice", "pay-1").await;
    let order_id = body["order"]["order_id"].as_str().unwrap().to_string();
    post(&state, "/admin/payments/pay-1/status", json!({ "status": "processing" })).await;

    let path = format!("/admin/orders/{order_id}/payment_status");
    let (status, body) = post(&state, &path, json!({ "status": "completed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["payment_status"], "completed");

    // Only the poll channel sees the outcome; that is enough to settle
    let session = wait_for_session_state(&state, "pay-1", &["redirect"]).await;
    assert_eq!(session["drift_observed"], true);
    let (_, payment) = get(&state, "/payments/pay-1").await;
    assert_eq!(payment["status"], "processing");
    let (_, cart) = get(&state, "/cart/alice").await;
    assert_eq!(cart["lines"], json!([]));
    state.sessions.close_all().await;
}

#[actix_web::test]
async fn unknown_records() {
    let state = test_state().await;
    let (status, _) = post(&state, "/admin/payments/nope/status", json!({ "status": "completed" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = post(&state, "/admin/orders/nope/status", json!({ "status": "paid" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = post(&state, "/admin/orders/nope/payment_status", json!({ "status": "completed" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
