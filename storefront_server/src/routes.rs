//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Cart operations take a mutex but never hold it across an await, and
//! everything that touches the store is async.
//!
//! Handlers that need the document store are generic over it, and are registered via the `route!` macro. The rest use
//! the plain actix attribute macros.
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use log::*;
use storefront_engine::{
    cart::{CartRepository, LineId},
    db_types::{OrderId, PaymentId, UserId},
    sync::SyncStatus,
    traits::DocumentStore,
    AdminActionGateway,
    CheckoutApi,
};

use crate::{
    config::ServerConfig,
    data_objects::{
        AddLineRequest,
        CancelRequest,
        CartResponse,
        CheckoutRequest,
        CheckoutResponse,
        JsonResponse,
        OrderPaymentStatusUpdate,
        OrderStatusUpdate,
        PaymentStatusUpdate,
        RetryRequest,
        SetQuantityRequest,
    },
    errors::ServerError,
    sessions::SessionRegistry,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

/// Registers every route. The caller supplies the app data: a [`CartRepository`], a [`SessionRegistry`], the
/// [`ServerConfig`], and a [`CheckoutApi`] and [`AdminActionGateway`] over `B`.
pub fn configure<B: DocumentStore>(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(get_cart)
        .service(add_cart_line)
        .service(set_line_quantity)
        .service(remove_cart_line)
        .service(session_status)
        .service(close_session)
        .service(CheckoutRoute::<B>::new())
        .service(RetryPaymentRoute::<B>::new())
        .service(CancelOrderRoute::<B>::new())
        .service(OrderByIdRoute::<B>::new())
        .service(PaymentByIdRoute::<B>::new())
        .service(OrdersForUserRoute::<B>::new())
        .service(SetPaymentStatusRoute::<B>::new())
        .service(SetOrderStatusRoute::<B>::new())
        .service(SetOrderPaymentStatusRoute::<B>::new());
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Cart  ----------------------------------------------------
#[get("/cart/{user}")]
pub async fn get_cart(path: web::Path<UserId>, carts: web::Data<CartRepository>) -> impl Responder {
    let user = path.into_inner();
    trace!("💻️ GET cart for {user}");
    HttpResponse::Ok().json(CartResponse::new(&carts.snapshot(&user)))
}

#[post("/cart/{user}/lines")]
pub async fn add_cart_line(
    path: web::Path<UserId>,
    body: web::Json<AddLineRequest>,
    carts: web::Data<CartRepository>,
) -> Result<HttpResponse, ServerError> {
    let user = path.into_inner();
    let AddLineRequest { product_id, unit_price, quantity } = body.into_inner();
    debug!("💻️ Adding {quantity} x {product_id} @ {unit_price} to the cart for {user}");
    let response = carts.with_cart(&user, |cart| {
        cart.add_line(product_id, unit_price, quantity).map(|id| CartResponse::new(cart).with_line_id(id))
    })?;
    Ok(HttpResponse::Ok().json(response))
}

#[put("/cart/{user}/lines/{line}")]
pub async fn set_line_quantity(
    path: web::Path<(UserId, u64)>,
    body: web::Json<SetQuantityRequest>,
    carts: web::Data<CartRepository>,
) -> Result<HttpResponse, ServerError> {
    let (user, line) = path.into_inner();
    let qty = body.quantity;
    debug!("💻️ Setting quantity of line {line} to {qty} for {user}");
    let response =
        carts.with_cart(&user, |cart| cart.set_quantity(LineId(line), qty).map(|_| CartResponse::new(cart)))?;
    Ok(HttpResponse::Ok().json(response))
}

#[delete("/cart/{user}/lines/{line}")]
pub async fn remove_cart_line(
    path: web::Path<(UserId, u64)>,
    carts: web::Data<CartRepository>,
) -> Result<HttpResponse, ServerError> {
    let (user, line) = path.into_inner();
    debug!("💻️ Removing line {line} from the cart for {user}");
    let response = carts.with_cart(&user, |cart| cart.remove_line(LineId(line)).map(|_| CartResponse::new(cart)))?;
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout/{user}" impl DocumentStore);
/// Submits the user's cart as an order, opens the payment, starts its session timer and starts watching it.
///
/// The cart is left alone until the payment settles.
pub async fn checkout<B: DocumentStore>(
    path: web::Path<UserId>,
    body: web::Json<CheckoutRequest>,
    api: web::Data<CheckoutApi<B>>,
    gateway: web::Data<AdminActionGateway<B>>,
    carts: web::Data<CartRepository>,
    sessions: web::Data<SessionRegistry>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let user = path.into_inner();
    let CheckoutRequest { shipping_address, payment_id } = body.into_inner();
    debug!("💻️ Checkout request from {user} with payment {payment_id}");
    let cart = carts.snapshot(&user);
    let receipt = api.checkout(&user, &cart, shipping_address, payment_id).await?;
    let (order_id, payment_id) = (&receipt.order.order_id, &receipt.payment.payment_id);
    let session = start_payment_session(&user, order_id, payment_id, &gateway, &sessions, &config).await;
    Ok(HttpResponse::Ok().json(CheckoutResponse { receipt, session }))
}

async fn start_payment_session<B: DocumentStore>(
    user: &UserId,
    order_id: &OrderId,
    payment_id: &PaymentId,
    gateway: &AdminActionGateway<B>,
    sessions: &SessionRegistry,
    config: &ServerConfig,
) -> SyncStatus {
    // The timer runs detached. If the payment settles first, expiring it is a no-op.
    let _ = gateway.start_session_timer(payment_id.clone(), config.payment_session_timeout);
    sessions.start(user, order_id.clone(), payment_id.clone()).await
}

#[get("/checkout/session/{payment}")]
pub async fn session_status(
    path: web::Path<PaymentId>,
    sessions: web::Data<SessionRegistry>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    trace!("💻️ Session status request for payment {payment_id}");
    let status = sessions
        .status(&payment_id)
        .await
        .ok_or_else(|| ServerError::NoRecordFound(format!("No checkout session for payment {payment_id}")))?;
    Ok(HttpResponse::Ok().json(status))
}

#[delete("/checkout/session/{payment}")]
pub async fn close_session(
    path: web::Path<PaymentId>,
    sessions: web::Data<SessionRegistry>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    if sessions.close(&payment_id).await {
        Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Session for payment {payment_id} closed"))))
    } else {
        Err(ServerError::NoRecordFound(format!("No checkout session for payment {payment_id}")))
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(retry_payment => Post "/orders/{order}/retry" impl DocumentStore);
/// Opens a new payment attempt for an order whose last payment failed or expired, and moves the purchaser's session
/// over to it.
pub async fn retry_payment<B: DocumentStore>(
    path: web::Path<OrderId>,
    body: web::Json<RetryRequest>,
    api: web::Data<CheckoutApi<B>>,
    gateway: web::Data<AdminActionGateway<B>>,
    sessions: web::Data<SessionRegistry>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let RetryRequest { user_id, payment_id } = body.into_inner();
    debug!("💻️ {user_id} is retrying order {order_id} with payment {payment_id}");
    let previous = api.order(&order_id).await?.payment_id;
    let receipt = api.retry_payment(&user_id, &order_id, payment_id).await?;
    if let Some(previous) = previous {
        sessions.close(&previous).await;
    }
    let session =
        start_payment_session(&user_id, &order_id, &receipt.payment.payment_id, &gateway, &sessions, &config).await;
    Ok(HttpResponse::Ok().json(CheckoutResponse { receipt, session }))
}

route!(cancel_order => Post "/orders/{order}/cancel" impl DocumentStore);
pub async fn cancel_order<B: DocumentStore>(
    path: web::Path<OrderId>,
    body: web::Json<CancelRequest>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ {} asked to cancel order {order_id}", body.user_id);
    let order = api.cancel_order(&body.user_id, &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_by_id => Get "/orders/{order}" impl DocumentStore);
pub async fn order_by_id<B: DocumentStore>(
    path: web::Path<OrderId>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = api.order(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(payment_by_id => Get "/payments/{payment}" impl DocumentStore);
pub async fn payment_by_id<B: DocumentStore>(
    path: web::Path<PaymentId>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment = api.payment(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(orders_for_user => Get "/users/{user}/orders" impl DocumentStore);
pub async fn orders_for_user<B: DocumentStore>(
    path: web::Path<UserId>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let orders = api.orders_for_user(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(set_payment_status => Post "/admin/payments/{payment}/status" impl DocumentStore);
pub async fn set_payment_status<B: DocumentStore>(
    path: web::Path<PaymentId>,
    body: web::Json<PaymentStatusUpdate>,
    gateway: web::Data<AdminActionGateway<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    let PaymentStatusUpdate { status, message } = body.into_inner();
    info!("💻️ Operator set payment {payment_id} to {status}");
    let update = gateway.set_payment_status(&payment_id, status, message).await?;
    Ok(HttpResponse::Ok().json(update))
}

route!(set_order_status => Post "/admin/orders/{order}/status" impl DocumentStore);
pub async fn set_order_status<B: DocumentStore>(
    path: web::Path<OrderId>,
    body: web::Json<OrderStatusUpdate>,
    gateway: web::Data<AdminActionGateway<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ Operator set order {order_id} to {}", body.status);
    let update = gateway.set_order_status(&order_id, body.status).await?;
    Ok(HttpResponse::Ok().json(update))
}

route!(set_order_payment_status => Post "/admin/orders/{order}/payment_status" impl DocumentStore);
pub async fn set_order_payment_status<B: DocumentStore>(
    path: web::Path<OrderId>,
    body: web::Json<OrderPaymentStatusUpdate>,
    gateway: web::Data<AdminActionGateway<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    warn!("💻️ Operator wrote payment status {} straight onto order {order_id}", body.status);
    let update = gateway.set_order_payment_status(&order_id, body.status).await?;
    Ok(HttpResponse::Ok().json(update))
}
