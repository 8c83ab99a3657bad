use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use storefront_engine::{
    cart::CartRepository,
    events::{EventHandlers, EventHooks},
    realtime::{PaymentBroadcast, DEFAULT_BROADCAST_CAPACITY},
    traits::{DocumentStore, OrderManagement, PaymentManagement},
    AdminActionGateway,
    CheckoutApi,
    SqliteDatabase,
    SyncCoordinator,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    routes::configure,
    sessions::SessionRegistry,
};

const EVENT_BUFFER_SIZE: usize = 64;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(config.database_url.reveal(), 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
        info!("🗃️ Database migrations are up to date");
    }
    let state = ServerState::new(config.clone(), db).await;
    let _expiry_worker =
        start_expiry_worker(state.gateway.clone(), config.payment_session_timeout, config.expiry_sweep_interval);
    let srv = create_server_instance(config, state.clone())?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    state.sessions.close_all().await;
    result
}

pub fn create_server_instance<B: DocumentStore>(
    config: ServerConfig,
    state: ServerState<B>,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("storefront::access_log"))
            .configure(|cfg| state.register(cfg))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Everything the route handlers share, wired together.
///
/// Payment writes made through the gateway are republished on a [`PaymentBroadcast`], which is the push channel of
/// every checkout session. The poll channel reads the same store directly.
#[derive(Clone)]
pub struct ServerState<B> {
    pub checkout: CheckoutApi<B>,
    pub gateway: AdminActionGateway<B>,
    pub carts: CartRepository,
    pub sessions: SessionRegistry,
    pub config: ServerConfig,
}

impl<B: DocumentStore> ServerState<B> {
    /// Wires up the components and starts the event handlers. Must be called from within a tokio runtime.
    pub async fn new(config: ServerConfig, db: B) -> Self {
        let payments: Arc<dyn PaymentManagement> = Arc::new(db.clone());
        let broadcast = PaymentBroadcast::new(payments, DEFAULT_BROADCAST_CAPACITY);
        let hooks: EventHooks = broadcast.hooks();
        let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;

        let orders: Arc<dyn OrderManagement> = Arc::new(db.clone());
        let coordinator = SyncCoordinator::new(orders, Arc::new(broadcast), config.sync);
        let carts = CartRepository::new(config.pricing, &config.currency);
        let sessions = SessionRegistry::new(coordinator, carts.clone(), config.session_retention);
        let checkout = CheckoutApi::new(db.clone(), producers.clone());
        let gateway = AdminActionGateway::new(db, producers);
        debug!("🪛️ Server state initialised. Sessions poll every {:?}", config.sync.poll_interval);
        Self { checkout, gateway, carts, sessions, config }
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.checkout.clone()))
            .app_data(web::Data::new(self.gateway.clone()))
            .app_data(web::Data::new(self.carts.clone()))
            .app_data(web::Data::new(self.sessions.clone()))
            .app_data(web::Data::new(self.config.clone()));
        configure::<B>(cfg);
    }
}
