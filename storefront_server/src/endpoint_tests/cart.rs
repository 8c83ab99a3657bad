use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::helpers::{fill_cart, get, post, send, test_state};

#[actix_web::test]
async fn health() {
    let state = test_state().await;
    let (status, body) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn cart_totals() {
    let state = test_state().await;
    let (status, body) = get(&state, "/cart/alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"], json!([]));
    assert_eq!(body["totals"]["shipping"], 599);

    fill_cart(&state, "alice").await;
    let (_, body) = get(&state, "/cart/alice").await;
    assert_eq!(body["lines"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["totals"], json!({ "subtotal": 3697, "tax": 296, "shipping": 599, "total": 4592 }));
    assert_eq!(body["currency"], "USD");

    // Carts are per user
    let (_, body) = get(&state, "/cart/bob").await;
    assert_eq!(body["lines"], json!([]));
}

#[actix_web::test]
async fn same_product_and_price_merge() {
    let state = test_state().await;
    let line = json!({ "product_id": "shirt", "unit_price": 1299, "quantity": 1 });
    let (_, first) = post(&state, "/cart/alice/lines", line.clone()).await;
    let (_, second) = post(&state, "/cart/alice/lines", line).await;
    assert_eq!(first["line_id"], second["line_id"]);
    assert_eq!(second["lines"][0]["quantity"], 2);
}

#[actix_web::test]
async fn edit_lines() {
    let state = test_state().await;
    let (_, body) =
        post(&state, "/cart/alice/lines", json!({ "product_id": "rug", "unit_price": 2500, "quantity": 1 })).await;
    let line = body["line_id"].as_u64().unwrap();

    let req = TestRequest::put().uri(&format!("/cart/alice/lines/{line}")).set_json(json!({ "quantity": 2 }));
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    // 50.00 reaches the free shipping threshold
    assert_eq!(body["totals"], json!({ "subtotal": 5000, "tax": 400, "shipping": 0, "total": 5400 }));

    let req = TestRequest::put().uri(&format!("/cart/alice/lines/{line}")).set_json(json!({ "quantity": 0 }));
    let (status, body) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"], json!([]));

    let (status, body) = send(&state, TestRequest::delete().uri(&format!("/cart/alice/lines/{line}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "The data was not found. Cart line 1 does not exist");
}

#[actix_web::test]
async fn invalid_lines_are_rejected() {
    let state = test_state().await;
    let bad_qty = json!({ "product_id": "shirt", "unit_price": 1299, "quantity": 0 });
    let (status, body) = post(&state, "/cart/alice/lines", bad_qty).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request. Quantity must be positive, but was 0");

    let bad_price = json!({ "product_id": "shirt", "unit_price": -1, "quantity": 1 });
    let (status, _) = post(&state, "/cart/alice/lines", bad_price).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let no_product = json!({ "product_id": " ", "unit_price": 100, "quantity": 1 });
    let (status, _) = post(&state, "/cart/alice/lines", no_product).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = get(&state, "/cart/alice").await;
    assert_eq!(body["lines"], json!([]));
}
