use std::sync::Arc;

use log::*;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use super::{
    session::{SessionCore, SyncSession},
    Decision,
    ObservationSource,
    SettleAction,
    SyncConfig,
};
use crate::{
    db_types::{OrderId, PaymentId},
    realtime::{ChannelMessage, RealtimeChannel},
    traits::OrderManagement,
};

/// Starts [`SyncSession`]s. One coordinator serves any number of sessions.
#[derive(Clone)]
pub struct SyncCoordinator {
    orders: Arc<dyn OrderManagement>,
    channel: Arc<dyn RealtimeChannel>,
    config: SyncConfig,
}

impl SyncCoordinator {
    pub fn new(orders: Arc<dyn OrderManagement>, channel: Arc<dyn RealtimeChannel>, config: SyncConfig) -> Self {
        Self { orders, channel, config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Starts watching `payment_id` (push) and `order_id` (poll). The subscription is opened straight away; the first
    /// poll happens one interval later.
    pub fn start(&self, order_id: OrderId, payment_id: PaymentId, action: Arc<dyn SettleAction>) -> SyncSession {
        info!("🔄️ Starting sync session for order {order_id} / payment {payment_id}");
        let core = Arc::new(SessionCore::new(order_id, payment_id, self.config, action));
        let push = tokio::spawn(run_push(Arc::clone(&core), Arc::clone(&self.channel)));
        let poll = tokio::spawn(run_poll(Arc::clone(&core), Arc::clone(&self.orders)));
        SyncSession::new(core, vec![push, poll])
    }
}

async fn run_poll(core: Arc<SessionCore>, orders: Arc<dyn OrderManagement>) {
    let period = core.config().poll_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if core.is_done() {
            break;
        }
        let decision = match orders.fetch_order(core.order_id()).await {
            Ok(Some(order)) => core.observe_order(&order),
            Ok(None) => core.report_failure(ObservationSource::Poll, "order not found"),
            Err(e) => core.report_failure(ObservationSource::Poll, &e.to_string()),
        };
        trace!("🔄️ Poll for {}: {decision:?}", core.order_id());
        if matches!(decision, Decision::Settled | Decision::Discarded) {
            break;
        }
    }
    trace!("🔄️ Poll task for {} has stopped", core.order_id());
}

async fn run_push(core: Arc<SessionCore>, channel: Arc<dyn RealtimeChannel>) {
    let retry_delay = core.config().poll_interval;
    while !core.is_done() {
        match channel.subscribe(core.payment_id()).await {
            Ok(mut subscription) => {
                core.set_push_live(true);
                while let Some(msg) = subscription.recv().await {
                    let decision = match msg {
                        ChannelMessage::Update(payment) => core.observe_payment(&payment),
                        ChannelMessage::Error(e) => core.report_failure(ObservationSource::Push, &e),
                    };
                    if matches!(decision, Decision::Settled | Decision::Discarded) {
                        break;
                    }
                }
                subscription.close();
                core.set_push_live(false);
                if core.is_done() {
                    break;
                }
                core.report_failure(ObservationSource::Push, "subscription ended");
            },
            Err(e) => {
                core.report_failure(ObservationSource::Push, &e.to_string());
            },
        }
        debug!("🔄️ Resubscribing to {} in {:?}", core.payment_id(), retry_delay);
        sleep(retry_delay).await;
    }
    trace!("🔄️ Push task for {} has stopped", core.payment_id());
}

#[cfg(test)]
mod test {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use storefront_common::Cents;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        cart::Cart,
        db_types::{NewOrder, NewPayment, OrderStatusType, PaymentStatus, ShippingAddress},
        realtime::{ChannelError, PaymentBroadcast, Subscription},
        sync::{RetryReason, SyncError, SyncStatus},
        traits::{OrderManagement, PaymentManagement},
        InMemoryStore,
    };

    const POLL: Duration = Duration::from_secs(10);

    struct Fixture {
        store: InMemoryStore,
        channel: PaymentBroadcast,
        coordinator: SyncCoordinator,
        settled: Arc<AtomicUsize>,
    }

    impl Fixture {
        async fn new() -> Self {
            let _ = env_logger::try_init();
            let store = InMemoryStore::new();
            let mut cart = Cart::default();
            cart.add_line("lamp".into(), Cents::from(4_000), 1).unwrap();
            let order = NewOrder::from_cart("o1".into(), "alice".into(), &cart, ShippingAddress::default())
                .with_payment_id("p1".into());
            store.insert_order(order).await.unwrap();
            store.insert_payment(NewPayment::new("p1".into(), "o1".into(), Cents::from(4_919), "USD")).await.unwrap();
            let channel = PaymentBroadcast::new(Arc::new(store.clone()), 16);
            let coordinator =
                SyncCoordinator::new(Arc::new(store.clone()), Arc::new(channel.clone()), SyncConfig::default());
            Self { store, channel, coordinator, settled: Arc::new(AtomicUsize::new(0)) }
        }

        fn start(&self) -> SyncSession {
            let settled = Arc::clone(&self.settled);
            let action = move |_: &OrderId| {
                settled.fetch_add(1, Ordering::SeqCst);
            };
            self.coordinator.start("o1".into(), "p1".into(), Arc::new(action))
        }

        async fn set_payment(&self, status: PaymentStatus, message: Option<&str>) {
            let p = self.store.update_payment_status(&"p1".into(), status, message.map(String::from)).await.unwrap();
            self.channel.publish(p);
        }

        fn settle_count(&self) -> usize {
            self.settled.load(Ordering::SeqCst)
        }
    }

    async fn settle_tasks() {
        sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn push_completion_settles_then_redirects() {
        let f = Fixture::new().await;
        let mut session = f.start();
        settle_tasks().await;
        assert_eq!(session.status(), SyncStatus::Waiting);

        f.set_payment(PaymentStatus::Completed, None).await;
        assert_eq!(session.wait_for_outcome().await, Ok(OrderId::from("o1")));
        assert_eq!(session.status(), SyncStatus::Settled { order_id: "o1".into() });
        assert!(session.is_completed());
        assert_eq!(f.settle_count(), 1);

        sleep(Duration::from_secs(3)).await;
        assert_eq!(session.status(), SyncStatus::Redirect { location: "/orders/o1/confirmation".into() });
        // A later poll sees the mirror too, but the session has already stopped observing
        f.store.update_order_payment_status(&"o1".into(), PaymentStatus::Completed).await.unwrap();
        sleep(POLL * 3).await;
        assert_eq!(f.settle_count(), 1);
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn poll_completion_settles_without_push() {
        let f = Fixture::new().await;
        let mut session = f.start();
        settle_tasks().await;
        // Write both records but never publish, so only the poll can notice
        f.store.update_payment_status(&"p1".into(), PaymentStatus::Completed, None).await.unwrap();
        f.store.update_order_payment_status(&"o1".into(), PaymentStatus::Completed).await.unwrap();
        sleep(POLL - Duration::from_millis(10)).await;
        assert_eq!(f.settle_count(), 0);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(f.settle_count(), 1);
        assert!(session.is_completed());
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn pending_and_processing_never_settle() {
        let f = Fixture::new().await;
        let mut session = f.start();
        settle_tasks().await;
        f.set_payment(PaymentStatus::Processing, None).await;
        f.store.update_order_payment_status(&"o1".into(), PaymentStatus::Processing).await.unwrap();
        sleep(POLL * 5).await;
        assert_eq!(f.settle_count(), 0);
        assert_eq!(session.status(), SyncStatus::Waiting);
        assert!(!session.is_completed());
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_payment_offers_retry_without_completing() {
        let f = Fixture::new().await;
        let mut session = f.start();
        settle_tasks().await;
        f.set_payment(PaymentStatus::Failed, Some("card declined")).await;
        let outcome = session.wait_for_outcome().await;
        assert_eq!(outcome, Err(SyncError::PaymentFailed { message: Some("card declined".into()) }));
        assert!(!session.is_completed());
        assert_eq!(f.settle_count(), 0);
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_order_is_reported() {
        let f = Fixture::new().await;
        let mut session = f.start();
        f.store.update_order_status(&"o1".into(), OrderStatusType::Cancelled).await.unwrap();
        let outcome = session.wait_for_outcome().await;
        assert_eq!(outcome, Err(SyncError::OrderAnnulled(OrderStatusType::Cancelled)));
        assert_eq!(
            session.status(),
            SyncStatus::RetryableFailure { reason: RetryReason::OrderAnnulled { status: OrderStatusType::Cancelled } }
        );
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn mirror_completion_settles_and_records_drift() {
        let f = Fixture::new().await;
        f.set_payment(PaymentStatus::Processing, None).await;
        f.store.update_order_payment_status(&"o1".into(), PaymentStatus::Completed).await.unwrap();
        let mut session = f.start();
        assert_eq!(session.wait_for_outcome().await, Ok(OrderId::from("o1")));
        assert_eq!(f.settle_count(), 1);
        assert!(session.drift_observed());
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_stops_everything() {
        let f = Fixture::new().await;
        let mut session = f.start();
        settle_tasks().await;
        assert_eq!(f.channel.listener_count(), 1);
        let observer = session.observer();
        session.close().await;
        session.close().await;
        assert!(session.is_closed());
        settle_tasks().await;
        assert_eq!(f.channel.listener_count(), 0);

        f.set_payment(PaymentStatus::Completed, None).await;
        let payment = f.store.fetch_payment(&"p1".into()).await.unwrap().unwrap();
        assert_eq!(observer.observe_payment(&payment), Decision::Discarded);
        sleep(POLL * 2).await;
        assert_eq!(f.settle_count(), 0);
        assert_eq!(session.status(), SyncStatus::Waiting);
        assert_eq!(session.wait_for_outcome().await, Err(SyncError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_redirect() {
        let f = Fixture::new().await;
        let mut session = f.start();
        settle_tasks().await;
        f.set_payment(PaymentStatus::Completed, None).await;
        session.wait_for_outcome().await.unwrap();
        session.close().await;
        sleep(Duration::from_secs(5)).await;
        assert_eq!(session.status(), SyncStatus::Settled { order_id: "o1".into() });
    }

    /// Hands out subscriptions that end immediately, and counts how often it was asked.
    struct FlakyChannel {
        subscribes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RealtimeChannel for FlakyChannel {
        async fn subscribe(&self, payment_id: &PaymentId) -> Result<Subscription, ChannelError> {
            let n = self.subscribes.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                return Err(ChannelError::UnknownPayment(payment_id.clone()));
            }
            let (_, rx) = mpsc::channel(1);
            Ok(Subscription::new(payment_id.clone(), rx, None))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn push_resubscribes_on_the_poll_schedule() {
        let f = Fixture::new().await;
        let subscribes = Arc::new(AtomicUsize::new(0));
        let channel = FlakyChannel { subscribes: Arc::clone(&subscribes) };
        let config = SyncConfig { max_consecutive_failures: 100, ..SyncConfig::default() };
        let coordinator = SyncCoordinator::new(Arc::new(f.store.clone()), Arc::new(channel), config);
        let mut session = coordinator.start("o1".into(), "p1".into(), Arc::new(|_: &OrderId| {}));
        settle_tasks().await;
        assert_eq!(subscribes.load(Ordering::SeqCst), 1);
        sleep(POLL).await;
        assert_eq!(subscribes.load(Ordering::SeqCst), 2);
        session.close().await;
        sleep(POLL * 3).await;
        assert_eq!(subscribes.load(Ordering::SeqCst), 2);
    }
}
