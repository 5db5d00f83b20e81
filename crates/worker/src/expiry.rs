//! Periodic credit expiry sweep.
//!
//! Runs across every tenant under the dedicated system scope on a fixed
//! interval. The sweep is idempotent, so overlapping runs from several worker
//! processes are harmless.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use courtbook_core::credits::{CreditLedger, CreditStore};
use courtbook_core::tenant::{Scope, SystemTask};

/// Run the expiry loop until `cancel` is triggered.
pub async fn run<S: CreditStore>(
    ledger: Arc<CreditLedger<S>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Credit expiry job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Credit expiry job stopping");
                break;
            }
            _ = ticker.tick() => {
                match ledger.expire_sweep(Scope::System(SystemTask::CreditExpirySweep)).await {
                    Ok(0) => tracing::debug!("Credit expiry: nothing due"),
                    Ok(expired) => tracing::info!(expired, "Credit expiry: credits flagged"),
                    Err(e) => tracing::error!(error = %e, "Credit expiry sweep failed"),
                }
            }
        }
    }
}
