// src/interrupt.rs

//! Ctrl-C handling: the first interrupt cancels the run, a second one quits.

use std::{future::Future, io};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Exit code used when a second interrupt ends the process.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Wait for interrupts from `next_signal`. The first cancels `cancel` so queued work
/// stops and in-flight requests finish up; the function then keeps listening and
/// returns `true` on the second. Returns `false` if the signal source fails.
pub async fn watch_interrupts<F, Fut>(mut next_signal: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(e) = next_signal().await {
        warn!(error = %e, "cannot listen for interrupts");
        return false;
    }
    warn!("interrupt received; finishing in-flight requests (Ctrl-C again to quit)");
    cancel.cancel();

    match next_signal().await {
        Ok(()) => {
            error!("second interrupt; exiting without summary");
            true
        }
        Err(e) => {
            warn!(error = %e, "cannot listen for interrupts");
            false
        }
    }
}
