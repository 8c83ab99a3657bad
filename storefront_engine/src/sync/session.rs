use std::sync::{
    atomic::{AtomicBool, AtomicU8, Ordering},
    Arc,
    Mutex,
    PoisonError,
};

use log::*;
use tokio::{sync::watch, task::JoinHandle};

use super::{Decision, ObservationSource, RetryReason, SettleAction, SyncConfig, SyncError, SyncStatus};
use crate::db_types::{Order, OrderId, OrderStatusType, Payment, PaymentId, PaymentStatus};

const COMPLETED: u8 = 0b01;
const CLOSED: u8 = 0b10;

#[derive(Debug, Default, Clone, Copy)]
struct LatestObservations {
    push: Option<PaymentStatus>,
    poll: Option<PaymentStatus>,
}

impl LatestObservations {
    /// Both paths have reported, and at least one of them reports an outcome the other does not share.
    fn disagree(&self) -> bool {
        match (self.push, self.poll) {
            (Some(push), Some(poll)) => push != poll && (push.is_terminal() || poll.is_terminal()),
            _ => false,
        }
    }
}

/// Consecutive read failures per path, and whether the push path currently holds a subscription.
#[derive(Debug, Default, Clone, Copy)]
struct ChannelHealth {
    push_failures: u32,
    poll_failures: u32,
    push_live: bool,
}

impl ChannelHealth {
    fn failures_mut(&mut self, source: ObservationSource) -> &mut u32 {
        match source {
            ObservationSource::Push => &mut self.push_failures,
            ObservationSource::Poll => &mut self.poll_failures,
        }
    }

    /// Neither path can deliver an outcome: the poll is over budget, and the push is either over budget or not
    /// subscribed.
    fn exhausted(&self, budget: u32) -> bool {
        let push_down = !self.push_live || self.push_failures > budget;
        push_down && self.poll_failures > budget
    }
}

/// State shared by a session's observation tasks, its observers, and its owner.
pub(crate) struct SessionCore {
    order_id: OrderId,
    payment_id: PaymentId,
    config: SyncConfig,
    action: Arc<dyn SettleAction>,
    state: AtomicU8,
    health: Mutex<ChannelHealth>,
    drift_observed: AtomicBool,
    latest: Mutex<LatestObservations>,
    status: Arc<watch::Sender<SyncStatus>>,
    redirect: Mutex<Option<JoinHandle<()>>>,
}

impl SessionCore {
    pub(crate) fn new(
        order_id: OrderId,
        payment_id: PaymentId,
        config: SyncConfig,
        action: Arc<dyn SettleAction>,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Waiting);
        Self {
            order_id,
            payment_id,
            config,
            action,
            state: AtomicU8::new(0),
            health: Mutex::new(ChannelHealth::default()),
            drift_observed: AtomicBool::new(false),
            latest: Mutex::new(LatestObservations::default()),
            status: Arc::new(status),
            redirect: Mutex::new(None),
        }
    }

    pub(crate) fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub(crate) fn payment_id(&self) -> &PaymentId {
        &self.payment_id
    }

    pub(crate) fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// True once the session has settled or been closed. Observation tasks stop at this point.
    pub(crate) fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) != 0
    }

    fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) & COMPLETED != 0
    }

    fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) & CLOSED != 0
    }

    pub(crate) fn observe_payment(&self, payment: &Payment) -> Decision {
        if payment.payment_id != self.payment_id {
            trace!("🔄️ Ignoring update for {} in session for {}", payment.payment_id, self.payment_id);
            return Decision::Discarded;
        }
        if self.is_done() {
            if !self.is_closed() {
                self.record(ObservationSource::Push, payment.status);
            }
            return Decision::Discarded;
        }
        self.record_success(ObservationSource::Push);
        self.record(ObservationSource::Push, payment.status);
        match payment.status {
            PaymentStatus::Completed => self.try_settle(ObservationSource::Push),
            PaymentStatus::Failed => {
                self.retryable(RetryReason::PaymentFailed { message: payment.message.clone() })
            },
            PaymentStatus::Expired => self.retryable(RetryReason::SessionExpired),
            PaymentStatus::Pending | PaymentStatus::Processing => Decision::Pending,
        }
    }

    pub(crate) fn observe_order(&self, order: &Order) -> Decision {
        if order.order_id != self.order_id {
            return Decision::Discarded;
        }
        // After a payment retry the mirror describes a different attempt.
        let mirror = match &order.payment_id {
            Some(id) if id != &self.payment_id => None,
            _ => Some(order.payment_status),
        };
        if self.is_done() {
            if let (Some(status), false) = (mirror, self.is_closed()) {
                self.record(ObservationSource::Poll, status);
            }
            return Decision::Discarded;
        }
        self.record_success(ObservationSource::Poll);
        if let Some(status) = mirror {
            self.record(ObservationSource::Poll, status);
        }
        if mirror == Some(PaymentStatus::Completed) {
            return self.try_settle(ObservationSource::Poll);
        }
        if matches!(order.status, OrderStatusType::Failed | OrderStatusType::Cancelled) {
            return self.retryable(RetryReason::OrderAnnulled { status: order.status });
        }
        match mirror {
            Some(PaymentStatus::Failed) => self.retryable(RetryReason::PaymentFailed { message: None }),
            Some(PaymentStatus::Expired) => self.retryable(RetryReason::SessionExpired),
            _ => Decision::Pending,
        }
    }

    pub(crate) fn report_failure(&self, source: ObservationSource, reason: &str) -> Decision {
        if self.is_done() {
            return Decision::Discarded;
        }
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        let failures = health.failures_mut(source);
        *failures += 1;
        warn!("🔄️ {source} read for payment {} failed ({} in a row): {reason}", self.payment_id, *failures);
        self.refresh_availability(&health);
        Decision::Pending
    }

    /// Called by the push task when it gains or loses its subscription.
    pub(crate) fn set_push_live(&self, live: bool) {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        health.push_live = live;
        if live {
            health.push_failures = 0;
        }
        self.refresh_availability(&health);
    }

    fn record_success(&self, source: ObservationSource) {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        *health.failures_mut(source) = 0;
        self.refresh_availability(&health);
    }

    fn refresh_availability(&self, health: &ChannelHealth) {
        if health.exhausted(self.config.max_consecutive_failures) {
            let changed = self.status.send_if_modified(|status| {
                if status.is_settled() || *status == SyncStatus::Unavailable {
                    return false;
                }
                *status = SyncStatus::Unavailable;
                true
            });
            if changed {
                error!(
                    "🔄️ Payment {} status unavailable. Poll failed {} times in a row; push is {}",
                    self.payment_id,
                    health.poll_failures,
                    if health.push_live { "failing" } else { "not subscribed" }
                );
            }
        } else {
            self.status.send_if_modified(|status| {
                if *status == SyncStatus::Unavailable {
                    *status = SyncStatus::Waiting;
                    true
                } else {
                    false
                }
            });
        }
    }

    fn record(&self, source: ObservationSource, status: PaymentStatus) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        match source {
            ObservationSource::Push => latest.push = Some(status),
            ObservationSource::Poll => latest.poll = Some(status),
        }
        if latest.disagree() && !self.drift_observed.swap(true, Ordering::AcqRel) {
            warn!(
                "🔄️ Drift on order {}: payment {} reports {:?} but the order mirror reports {:?}",
                self.order_id, self.payment_id, latest.push, latest.poll
            );
        }
    }

    fn retryable(&self, reason: RetryReason) -> Decision {
        let next = SyncStatus::RetryableFailure { reason: reason.clone() };
        let changed = self.status.send_if_modified(|status| {
            if status.is_settled() || *status == next {
                return false;
            }
            *status = next.clone();
            true
        });
        if changed {
            info!("🔄️ Payment {} needs a retry: {reason:?}", self.payment_id);
        }
        Decision::RetryableFailure(reason)
    }

    fn try_settle(&self, source: ObservationSource) -> Decision {
        if self.state.compare_exchange(0, COMPLETED, Ordering::AcqRel, Ordering::Acquire).is_err() {
            trace!("🔄️ {source} completion for {} discarded", self.payment_id);
            return Decision::Discarded;
        }
        info!("🔄️ Payment {} completed ({source}). Settling order {}", self.payment_id, self.order_id);
        self.action.settle(&self.order_id);
        self.status.send_replace(SyncStatus::Settled { order_id: self.order_id.clone() });
        self.schedule_redirect();
        Decision::Settled
    }

    fn schedule_redirect(&self) {
        let location = format!("/orders/{}/confirmation", self.order_id.as_str());
        let mut redirect = self.redirect.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return;
        }
        let status = Arc::clone(&self.status);
        let delay = self.config.redirect_delay;
        *redirect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("🔄️ Redirecting to {location}");
            status.send_replace(SyncStatus::Redirect { location });
        }));
    }

    /// Marks the session closed and cancels any pending redirect. Returns false if it was already closed.
    pub(crate) fn shutdown(&self) -> bool {
        let previous = self.state.fetch_or(CLOSED, Ordering::AcqRel);
        if let Some(redirect) = self.redirect.lock().unwrap_or_else(PoisonError::into_inner).take() {
            redirect.abort();
        }
        // Wake anyone waiting on the status so they can see the session is gone.
        self.status.send_modify(|_| {});
        previous & CLOSED == 0
    }
}

/// A handle for feeding observations to a session by hand. Observation tasks use the same entry points.
#[derive(Clone)]
pub struct SessionObserver {
    core: Arc<SessionCore>,
}

impl SessionObserver {
    pub fn observe_payment(&self, payment: &Payment) -> Decision {
        self.core.observe_payment(payment)
    }

    pub fn observe_order(&self, order: &Order) -> Decision {
        self.core.observe_order(order)
    }

    pub fn report_failure(&self, source: ObservationSource, reason: &str) -> Decision {
        self.core.report_failure(source, reason)
    }
}

/// One purchaser's live view of one order/payment pair.
///
/// Dropping the session tears it down, but [`SyncSession::close`] should be preferred since it also waits for the
/// observation tasks to finish.
pub struct SyncSession {
    core: Arc<SessionCore>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncSession {
    pub(crate) fn new(core: Arc<SessionCore>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { core, tasks }
    }

    pub fn order_id(&self) -> &OrderId {
        self.core.order_id()
    }

    pub fn payment_id(&self) -> &PaymentId {
        self.core.payment_id()
    }

    pub fn status(&self) -> SyncStatus {
        self.core.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.core.status.subscribe()
    }

    pub fn observer(&self) -> SessionObserver {
        SessionObserver { core: Arc::clone(&self.core) }
    }

    pub fn is_completed(&self) -> bool {
        self.core.is_completed()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    pub fn drift_observed(&self) -> bool {
        self.core.drift_observed.load(Ordering::Acquire)
    }

    /// Releases the subscription, cancels the poll timer and any pending redirect, and waits for the observation
    /// tasks to stop. Calling it again is a no-op.
    pub async fn close(&mut self) {
        if self.core.shutdown() {
            debug!("🔄️ Closing sync session for payment {}", self.core.payment_id);
        }
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
    }

    /// Waits until the session settles or reaches a condition the purchaser has to act on.
    pub async fn wait_for_outcome(&self) -> Result<OrderId, SyncError> {
        let mut rx = self.watch();
        loop {
            let outcome = match &*rx.borrow_and_update() {
                SyncStatus::Settled { order_id } => Some(Ok(order_id.clone())),
                SyncStatus::Redirect { .. } => Some(Ok(self.core.order_id.clone())),
                SyncStatus::RetryableFailure { reason } => Some(Err(match reason {
                    RetryReason::SessionExpired => SyncError::SessionExpired,
                    RetryReason::PaymentFailed { message } => SyncError::PaymentFailed { message: message.clone() },
                    RetryReason::OrderAnnulled { status } => SyncError::OrderAnnulled(*status),
                })),
                SyncStatus::Unavailable => Some(Err(SyncError::SyncUnavailable)),
                SyncStatus::Waiting if self.core.is_closed() => Some(Err(SyncError::Closed)),
                SyncStatus::Waiting => None,
            };
            if let Some(outcome) = outcome {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return Err(SyncError::Closed);
            }
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.core.shutdown();
        for task in &self.tasks {
            task.abort();
        }
    }
}
