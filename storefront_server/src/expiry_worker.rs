use std::time::Duration;

use log::*;
use storefront_engine::{db_types::Payment, traits::DocumentStore, AdminActionGateway};
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Session timers expire payments on time while the server is up. This worker catches the ones whose timers were
/// lost, for example across a restart.
pub fn start_expiry_worker<B>(gateway: AdminActionGateway<B>, window: Duration, sweep_interval: Duration) -> JoinHandle<()>
where B: DocumentStore + Send + Sync {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(sweep_interval);
        info!("🕰️ Stale payment expiry worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running stale payment expiry job");
            match gateway.expire_stale_payments(window).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No stale payments found"),
                Ok(expired) => {
                    info!("🕰️ {} payments expired", expired.len());
                    debug!("🕰️ Expired payments: {}", payment_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running stale payment expiry job: {e}");
                },
            }
        }
    })
}

fn payment_list(payments: &[Payment]) -> String {
    payments
        .iter()
        .map(|p| format!("[{}] payment_id: {} order_id: {}", p.id, p.payment_id, p.order_id))
        .collect::<Vec<String>>()
        .join(", ")
}
