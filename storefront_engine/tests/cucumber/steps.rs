use std::time::Duration;

use cucumber::{given, then, when};
use storefront_common::Cents;
use storefront_engine::{
    db_types::{OrderStatusType, PaymentId, PaymentStatus, ShippingAddress, UserId},
    sync::{SyncError, SyncStatus},
    traits::PaymentManagement,
};
use tokio::time::timeout;

use crate::cucumber::{checkout_world::POLL_INTERVAL, CheckoutWorld};

fn address() -> ShippingAddress {
    ShippingAddress {
        recipient: "Alice Smith".into(),
        line1: "1 Main St".into(),
        line2: None,
        city: "Springfield".into(),
        postal_code: "12345".into(),
        country: "US".into(),
    }
}

fn cents(amount: &str) -> Cents {
    amount.parse().expect("Not a valid amount")
}

#[when(expr = "{string} adds {int} {string} at {word} to the cart")]
async fn add_to_cart(world: &mut CheckoutWorld, user: String, qty: i64, product: String, price: String) {
    let sys = world.sys();
    sys.carts
        .with_cart(&UserId::from(user), |cart| cart.add_line(product.into(), cents(&price), qty))
        .expect("Could not add to cart");
}

#[then(expr = "the cart for {string} has subtotal {word}, tax {word}, shipping {word} and total {word}")]
async fn check_cart_totals(
    world: &mut CheckoutWorld,
    user: String,
    subtotal: String,
    tax: String,
    shipping: String,
    total: String,
) {
    let totals = world.sys().carts.snapshot(&UserId::from(user)).totals();
    assert_eq!(totals.subtotal, cents(&subtotal), "Subtotal is incorrect");
    assert_eq!(totals.tax, cents(&tax), "Tax is incorrect");
    assert_eq!(totals.shipping, cents(&shipping), "Shipping is incorrect");
    assert_eq!(totals.total, cents(&total), "Total is incorrect");
}

#[then(expr = "the cart for {string} is empty")]
async fn check_cart_empty(world: &mut CheckoutWorld, user: String) {
    assert!(world.sys().carts.snapshot(&UserId::from(user)).is_empty(), "Cart is not empty");
}

#[then(expr = "the cart for {string} still has {int} lines")]
async fn check_cart_lines(world: &mut CheckoutWorld, user: String, lines: usize) {
    assert_eq!(world.sys().carts.snapshot(&UserId::from(user)).lines().len(), lines);
}

#[given(expr = "{string} checks out with payment {string}")]
async fn checkout(world: &mut CheckoutWorld, user: String, payment_id: String) {
    let sys = world.sys();
    let user = UserId::from(user);
    let cart = sys.carts.snapshot(&user);
    let receipt =
        sys.checkout.checkout(&user, &cart, address(), PaymentId::from(payment_id)).await.expect("Checkout failed");
    sys.receipt = Some(receipt);
    sys.user = Some(user);
    sys.start_session();
}

#[given(expr = "the payment session window is {int}ms")]
async fn start_session_timer(world: &mut CheckoutWorld, ms: u64) {
    let sys = world.sys();
    let payment_id = sys.receipt().payment.payment_id.clone();
    // The timer runs to completion on its own; the handle is only needed to cancel it.
    let _timer = sys.gateway.start_session_timer(payment_id, Duration::from_millis(ms));
}

#[when(expr = "the operator marks payment {string} as {word}")]
async fn operator_sets_payment_status(world: &mut CheckoutWorld, payment_id: String, status: String) {
    let status = status.parse::<PaymentStatus>().expect("Not a payment status");
    world
        .sys()
        .gateway
        .set_payment_status(&PaymentId::from(payment_id), status, None)
        .await
        .expect("Could not set payment status");
}

#[when(expr = "the operator records the order payment status as {word}")]
async fn operator_sets_order_payment_status(world: &mut CheckoutWorld, status: String) {
    let status = status.parse::<PaymentStatus>().expect("Not a payment status");
    let sys = world.sys();
    let order_id = sys.receipt().order.order_id.clone();
    sys.gateway.set_order_payment_status(&order_id, status).await.expect("Could not set order payment status");
}

#[when(expr = "the operator marks the order as {word}")]
async fn operator_sets_order_status(world: &mut CheckoutWorld, status: String) {
    let status = status.parse::<OrderStatusType>().expect("Not an order status");
    let sys = world.sys();
    let order_id = sys.receipt().order.order_id.clone();
    sys.gateway.set_order_status(&order_id, status).await.expect("Could not set order status");
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut CheckoutWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[when("both channels have had time to report")]
async fn wait_for_both_channels(_world: &mut CheckoutWorld) {
    tokio::time::sleep(POLL_INTERVAL * 3).await;
}

#[then("the sync session settles")]
async fn session_settles(world: &mut CheckoutWorld) {
    let sys = world.sys();
    let outcome = timeout(Duration::from_secs(5), sys.session().wait_for_outcome()).await.expect("Timed out");
    assert_eq!(outcome, Ok(sys.receipt().order.order_id.clone()));
    assert!(sys.session().is_completed());
}

#[then(expr = "the sync session asks for a retry because {word}")]
async fn session_needs_retry(world: &mut CheckoutWorld, reason: String) {
    let sys = world.sys();
    let outcome = timeout(Duration::from_secs(5), sys.session().wait_for_outcome()).await.expect("Timed out");
    match (reason.as_str(), outcome) {
        ("expired", Err(SyncError::SessionExpired)) => {},
        ("failed", Err(SyncError::PaymentFailed { .. })) => {},
        ("annulled", Err(SyncError::OrderAnnulled(_))) => {},
        (reason, outcome) => panic!("Expected a retry because {reason}, but got {outcome:?}"),
    }
    assert!(!sys.session().is_completed());
}

#[then("the purchaser is redirected to the order confirmation")]
async fn redirected(world: &mut CheckoutWorld) {
    let sys = world.sys();
    let mut rx = sys.session().watch();
    let expected = format!("/orders/{}/confirmation", sys.receipt().order.order_id.as_str());
    let redirect = timeout(Duration::from_secs(5), rx.wait_for(|s| matches!(s, SyncStatus::Redirect { .. })))
        .await
        .expect("Timed out")
        .expect("Session closed")
        .clone();
    assert_eq!(redirect, SyncStatus::Redirect { location: expected });
}

#[then(expr = "the cart was cleared {int} time(s)")]
async fn settle_count(world: &mut CheckoutWorld, count: usize) {
    assert_eq!(world.sys().settle_count(), count);
}

#[then("drift was observed")]
async fn drift_observed(world: &mut CheckoutWorld) {
    assert!(world.sys().session().drift_observed(), "Drift was not recorded");
}

#[then(expr = "payment {string} is {word}")]
async fn check_payment_status(world: &mut CheckoutWorld, payment_id: String, status: String) {
    let status = status.parse::<PaymentStatus>().expect("Not a payment status");
    let payment = world
        .sys()
        .db
        .fetch_payment(&PaymentId::from(payment_id))
        .await
        .expect("Error fetching payment")
        .expect("Payment does not exist");
    assert_eq!(payment.status, status);
}

#[when(expr = "{string} retries the order with payment {string}")]
async fn retry(world: &mut CheckoutWorld, user: String, payment_id: String) {
    let sys = world.sys();
    sys.close_session().await;
    let order_id = sys.receipt().order.order_id.clone();
    let receipt = sys
        .checkout
        .retry_payment(&UserId::from(user), &order_id, PaymentId::from(payment_id))
        .await
        .expect("Retry failed");
    sys.receipt = Some(receipt);
    sys.start_session();
}

#[then(expr = "the order is waiting on payment {string} with the same shipping address")]
async fn check_retried_order(world: &mut CheckoutWorld, payment_id: String) {
    let sys = world.sys();
    let order = sys.checkout.order(&sys.receipt().order.order_id).await.expect("Order is missing");
    assert_eq!(order.payment_id, Some(PaymentId::from(payment_id)));
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.shipping_address, address());
}
