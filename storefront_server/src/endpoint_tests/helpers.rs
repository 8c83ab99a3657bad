use std::time::Duration;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, App};
use log::debug;
use serde_json::{json, Value};
use storefront_engine::{sync::SyncConfig, InMemoryStore};

use crate::{config::ServerConfig, server::ServerState};

pub type TestState = ServerState<InMemoryStore>;

/// Server state over an in-memory store, with sessions that poll quickly and redirect straight away.
pub async fn test_state() -> TestState {
    let _ = env_logger::try_init();
    let config = ServerConfig {
        sync: SyncConfig {
            poll_interval: Duration::from_millis(50),
            redirect_delay: Duration::ZERO,
            max_consecutive_failures: 3,
        },
        ..ServerConfig::default()
    };
    ServerState::new(config, InMemoryStore::new()).await
}

pub async fn send(state: &TestState, req: TestRequest) -> (StatusCode, Value) {
    let app = App::new().configure(|cfg| state.register(cfg));
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = res.into_body().try_into_bytes().unwrap_or_default();
    let body = serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()));
    (status, body)
}

pub async fn get(state: &TestState, path: &str) -> (StatusCode, Value) {
    send(state, TestRequest::get().uri(path)).await
}

pub async fn post(state: &TestState, path: &str, body: Value) -> (StatusCode, Value) {
    send(state, TestRequest::post().uri(path).set_json(body)).await
}

pub fn address() -> Value {
    json!({
        "recipient": "Alice Smith",
        "line1": "1 Main St",
        "city": "Springfield",
        "postal_code": "12345",
        "country": "US"
    })
}

/// Fills the cart with the two lines of the reference order: 2 x 12.99 and 1 x 10.99.
pub async fn fill_cart(state: &TestState, user: &str) {
    for (product, price, qty) in [("shirt", 1299, 2), ("mug", 1099, 1)] {
        let body = json!({ "product_id": product, "unit_price": price, "quantity": qty });
        let (status, _) = post(state, &format!("/cart/{user}/lines"), body).await;
        assert_eq!(status, StatusCode::OK);
    }
}

/// Checks out the user's cart and returns the response body.
pub async fn checkout(state: &TestState, user: &str, payment_id: &str) -> Value {
    fill_cart(state, user).await;
    let body = json!({ "shipping_address": address(), "payment_id": payment_id });
    let (status, body) = post(state, &format!("/checkout/{user}"), body).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

/// Polls the session until its state is one of `states`, for up to two seconds.
pub async fn wait_for_session_state(state: &TestState, payment_id: &str, states: &[&str]) -> Value {
    for _ in 0..100 {
        let (status, body) = get(state, &format!("/checkout/session/{payment_id}")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        if states.iter().any(|s| body["status"]["state"] == *s) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Session for {payment_id} never reached any of {states:?}");
}
