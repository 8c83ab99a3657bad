use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use cucumber::World;
use log::*;
use storefront_engine::{
    cart::CartRepository,
    db_types::{OrderId, UserId},
    events::{EventHandlers, EventProducers},
    order_objects::CheckoutReceipt,
    realtime::{PaymentBroadcast, DEFAULT_BROADCAST_CAPACITY},
    sync::{ClearCart, SettleAction, SyncConfig},
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    AdminActionGateway,
    CheckoutApi,
    SqliteDatabase,
    SyncCoordinator,
    SyncSession,
};

pub const POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const REDIRECT_DELAY: Duration = Duration::from_millis(100);

#[derive(Default, Debug, World)]
pub struct CheckoutWorld {
    pub system: Option<Storefront>,
}

impl CheckoutWorld {
    pub fn sys(&mut self) -> &mut Storefront {
        self.system.as_mut().expect("Storefront not initialised")
    }
}

pub struct Storefront {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub carts: CartRepository,
    pub checkout: CheckoutApi<SqliteDatabase>,
    pub gateway: AdminActionGateway<SqliteDatabase>,
    pub coordinator: SyncCoordinator,
    pub session: Option<SyncSession>,
    pub receipt: Option<CheckoutReceipt>,
    pub user: Option<UserId>,
    pub settle_count: Arc<AtomicUsize>,
}

impl Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Storefront ({})", self.db_path)
    }
}

impl Storefront {
    pub async fn new() -> Self {
        let url = random_db_path();
        create_database(&url).await;
        let db = run_migrations(&url).await;
        debug!("Created database: {url}");
        let broadcast = PaymentBroadcast::new(Arc::new(db.clone()), DEFAULT_BROADCAST_CAPACITY);
        let handlers = EventHandlers::new(64, broadcast.hooks());
        let producers: EventProducers = handlers.producers();
        handlers.start_handlers().await;
        let config = SyncConfig { poll_interval: POLL_INTERVAL, redirect_delay: REDIRECT_DELAY, ..Default::default() };
        let coordinator = SyncCoordinator::new(Arc::new(db.clone()), Arc::new(broadcast), config);
        Self {
            db_path: url,
            carts: CartRepository::default(),
            checkout: CheckoutApi::new(db.clone(), producers.clone()),
            gateway: AdminActionGateway::new(db.clone(), producers),
            db,
            coordinator,
            session: None,
            receipt: None,
            user: None,
            settle_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn receipt(&self) -> &CheckoutReceipt {
        self.receipt.as_ref().expect("No checkout has happened yet")
    }

    pub fn session(&self) -> &SyncSession {
        self.session.as_ref().expect("No sync session is running")
    }

    pub fn start_session(&mut self) {
        let receipt = self.receipt().clone();
        let user = self.user.clone().expect("No purchaser");
        let clear_cart = ClearCart::new(self.carts.clone(), user);
        let count = Arc::clone(&self.settle_count);
        let action = move |order_id: &OrderId| {
            count.fetch_add(1, Ordering::SeqCst);
            clear_cart.settle(order_id);
        };
        let session = self.coordinator.start(receipt.order.order_id, receipt.payment.payment_id, Arc::new(action));
        self.session = Some(session);
    }

    pub async fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }

    pub fn settle_count(&self) -> usize {
        self.settle_count.load(Ordering::SeqCst)
    }
}
