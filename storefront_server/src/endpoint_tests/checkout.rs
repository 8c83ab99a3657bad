use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::helpers::{address, checkout, get, post, send, test_state, wait_for_session_state};

#[actix_web::test]
async fn empty_carts_cannot_check_out() {
    let state = test_state().await;
    let body = json!({ "shipping_address": address(), "payment_id": "pay-1" });
    let (status, body) = post(&state, "/checkout/alice", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request. Cannot check out an empty cart");
    assert_eq!(state.sessions.active_count().await, 0);
}

#[actix_web::test]
async fn completed_payment_settles_and_clears_the_cart() {
    let state = test_state().await;
    let body = checkout(&state, "alice", "pay-1").await;
    assert_eq!(body["session"]["state"], "waiting");
    assert_eq!(body["order"]["total"], 4592);
    assert_eq!(body["order"]["payment_id"], "pay-1");
    assert_eq!(body["payment"]["amount"], 4592);
    let order_id = body["order"]["order_id"].as_str().unwrap().to_string();
    assert_eq!(body["payment"]["order_id"], order_id.as_str());

    // The cart survives until the payment settles
    let (_, cart) = get(&state, "/cart/alice").await;
    assert_eq!(cart["lines"].as_array().map(Vec::len), Some(2));

    let (status, update) =
        post(&state, "/admin/payments/pay-1/status", json!({ "status": "completed", "message": "cash" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["result"], "applied");
    assert_eq!(update["payment"]["status"], "completed");

    let session = wait_for_session_state(&state, "pay-1", &["redirect"]).await;
    assert_eq!(session["status"]["location"], format!("/orders/{order_id}/confirmation"));
    assert_eq!(session["drift_observed"], false);

    let (_, cart) = get(&state, "/cart/alice").await;
    assert_eq!(cart["lines"], json!([]));
    let (_, order) = get(&state, &format!("/orders/{order_id}")).await;
    assert_eq!(order["payment_status"], "completed");
    assert_eq!(order["status"], "pending");

    let (status, _) = send(&state, TestRequest::delete().uri("/checkout/session/pay-1")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&state, "/checkout/session/pay-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn payment_references_are_single_use() {
    let state = test_state().await;
    checkout(&state, "alice", "pay-1").await;
    super::helpers::fill_cart(&state, "bob").await;
    let body = json!({ "shipping_address": address(), "payment_id": "pay-1" });
    let (status, body) = post(&state, "/checkout/bob", body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "The request conflicts with the current state. Payment [pay-1] already exists");
    let (_, orders) = get(&state, "/users/bob/orders").await;
    assert_eq!(orders, json!([]));
    state.sessions.close_all().await;
}

#[actix_web::test]
async fn failed_payments_can_be_retried() {
    let state = test_state().await;
    let body = checkout(&state, "alice", "pay-1").await;
    let order_id = body["order"]["order_id"].as_str().unwrap().to_string();

    // Retrying while the first attempt is still open is refused
    let retry = json!({ "user_id": "alice", "payment_id": "pay-2" });
    let (status, _) = post(&state, &format!("/orders/{order_id}/retry"), retry.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) =
        post(&state, "/admin/payments/pay-1/status", json!({ "status": "failed", "message": "card declined" })).await;
    assert_eq!(status, StatusCode::OK);
    let session = wait_for_session_state(&state, "pay-1", &["retryable_failure"]).await;
    assert_eq!(session["status"]["reason"]["kind"], "payment_failed");
    // Nothing settled, so the cart is intact
    let (_, cart) = get(&state, "/cart/alice").await;
    assert_eq!(cart["lines"].as_array().map(Vec::len), Some(2));

    let intruder = json!({ "user_id": "mallory", "payment_id": "pay-3" });
    let (status, _) = post(&state, &format!("/orders/{order_id}/retry"), intruder).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(&state, &format!("/orders/{order_id}/retry"), retry).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["payment_id"], "pay-2");
    assert_eq!(body["order"]["payment_status"], "pending");
    assert_eq!(body["order"]["shipping_address"]["city"], "Springfield");
    assert_eq!(body["session"]["state"], "waiting");

    // The old session was replaced by one for the new attempt
    let (status, _) = get(&state, "/checkout/session/pay-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, payment) = get(&state, "/payments/pay-1").await;
    assert_eq!(payment["status"], "failed");

    post(&state, "/admin/payments/pay-2/status", json!({ "status": "completed" })).await;
    wait_for_session_state(&state, "pay-2", &["redirect"]).await;
    let (_, cart) = get(&state, "/cart/alice").await;
    assert_eq!(cart["lines"], json!([]));
    state.sessions.close_all().await;
}

#[actix_web::test]
async fn purchasers_can_cancel_their_own_orders() {
    let state = test_state().await;
    let body = checkout(&state, "alice", "pay-1").await;
    let order_id = body["order"]["order_id"].as_str().unwrap().to_string();

    let (status, _) = post(&state, &format!("/orders/{order_id}/cancel"), json!({ "user_id": "bob" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, order) = post(&state, &format!("/orders/{order_id}/cancel"), json!({ "user_id": "alice" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "cancelled");

    let session = wait_for_session_state(&state, "pay-1", &["retryable_failure"]).await;
    assert_eq!(session["status"]["reason"], json!({ "kind": "order_annulled", "status": "cancelled" }));
    state.sessions.close_all().await;
}

#[actix_web::test]
async fn unknown_records() {
    let state = test_state().await;
    let (status, body) = get(&state, "/orders/ORD-000000000000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "The data was not found. Order #ORD-000000000000 does not exist");
    let (status, _) = get(&state, "/payments/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&state, "/checkout/session/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&state, TestRequest::delete().uri("/checkout/session/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
