// src/refresh/scheduler.rs
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::refresh::RefreshController;

/// Spawn the recurring refresh task of one controller.
///
/// Refreshes immediately, then once per interval. Failures are logged and
/// the loop keeps going; only `cancel` stops it. An attempt in flight when
/// `cancel` fires is dropped without publishing anything.
pub fn spawn_refresh_loop(
    controller: Arc<RefreshController>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(controller.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            target: "refresh",
            identifier = controller.identifier(),
            interval_secs = controller.interval().as_secs(),
            "refresh loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = controller.refresh() => {
                    if let Err(e) = res {
                        tracing::debug!(
                            target: "refresh",
                            identifier = controller.identifier(),
                            kind = e.kind(),
                            "scheduled refresh failed; retrying next tick"
                        );
                    }
                }
            }
        }

        tracing::info!(
            target: "refresh",
            identifier = controller.identifier(),
            "refresh loop stopped"
        );
    })
}
