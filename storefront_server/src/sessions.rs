//! Live checkout sessions, one per payment reference.
//!
//! The purchaser's payment-processing view maps onto a [`SyncSession`]. The registry starts one when the view opens
//! (at checkout, or after a payment retry), answers status queries while the purchaser waits, and tears the session
//! down when the view goes away.
//!
//! Views are often abandoned without saying so. A session that has published its redirect, or that is waiting on a
//! retry, is evicted once it has stayed that way for the retention period.
use std::{collections::HashMap, sync::Arc, time::Duration};

use log::*;
use storefront_engine::{
    cart::CartRepository,
    db_types::{OrderId, PaymentId, UserId},
    sync::{ClearCart, SyncStatus},
    SyncCoordinator,
    SyncSession,
};
use tokio::sync::{watch, Mutex};

use crate::data_objects::SessionResponse;

type SessionMap = Arc<Mutex<HashMap<PaymentId, SyncSession>>>;

#[derive(Clone)]
pub struct SessionRegistry {
    coordinator: SyncCoordinator,
    carts: CartRepository,
    sessions: SessionMap,
    retention: Duration,
}

impl SessionRegistry {
    pub fn new(coordinator: SyncCoordinator, carts: CartRepository, retention: Duration) -> Self {
        Self { coordinator, carts, sessions: Arc::new(Mutex::new(HashMap::new())), retention }
    }

    /// Starts observing `payment_id`. Settling clears `user_id`'s cart. An existing session for the same payment is
    /// closed and replaced.
    pub async fn start(&self, user_id: &UserId, order_id: OrderId, payment_id: PaymentId) -> SyncStatus {
        let action = Arc::new(ClearCart::new(self.carts.clone(), user_id.clone()));
        let session = self.coordinator.start(order_id, payment_id.clone(), action);
        let status = session.status();
        let watcher = session.watch();
        let previous = self.sessions.lock().await.insert(payment_id.clone(), session);
        if let Some(mut previous) = previous {
            debug!("🔄️ Replacing the existing session for payment {payment_id}");
            previous.close().await;
        }
        tokio::spawn(evict_when_finished(Arc::clone(&self.sessions), payment_id, watcher, self.retention));
        status
    }

    pub async fn status(&self, payment_id: &PaymentId) -> Option<SessionResponse> {
        let sessions = self.sessions.lock().await;
        sessions.get(payment_id).map(|s| SessionResponse {
            payment_id: payment_id.clone(),
            status: s.status(),
            drift_observed: s.drift_observed(),
        })
    }

    /// Tears the session down. Returns false if there was no session for this payment.
    pub async fn close(&self, payment_id: &PaymentId) -> bool {
        let session = self.sessions.lock().await.remove(payment_id);
        match session {
            Some(mut session) => {
                session.close().await;
                info!("🔄️ Session for payment {payment_id} closed");
                true
            },
            None => false,
        }
    }

    pub async fn close_all(&self) {
        let sessions = self.sessions.lock().await.drain().map(|(_, s)| s).collect::<Vec<_>>();
        let n = sessions.len();
        for mut session in sessions {
            session.close().await;
        }
        debug!("🔄️ Closed {n} checkout session(s)");
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// The purchaser has nothing left to wait for in this session.
fn is_finished(status: &SyncStatus) -> bool {
    matches!(status, SyncStatus::Redirect { .. } | SyncStatus::RetryableFailure { .. })
}

/// Removes the session behind `watcher` once it has been finished for `retention`. Stops early if the session is closed
/// or replaced.
async fn evict_when_finished(
    sessions: SessionMap,
    payment_id: PaymentId,
    mut watcher: watch::Receiver<SyncStatus>,
    retention: Duration,
) {
    loop {
        while !is_finished(&watcher.borrow_and_update()) {
            if watcher.changed().await.is_err() {
                return;
            }
        }
        tokio::time::sleep(retention).await;
        let mut map = sessions.lock().await;
        let Some(session) = map.get(&payment_id) else {
            return;
        };
        if session.is_closed() || !session.watch().same_channel(&watcher) {
            return;
        }
        if !is_finished(&session.status()) {
            // A late observation moved it on, e.g. a drifted mirror settling a failed payment
            continue;
        }
        if let Some(mut session) = map.remove(&payment_id) {
            drop(map);
            session.close().await;
            debug!("🔄️ Evicted the finished session for payment {payment_id}");
        }
        return;
    }
}
