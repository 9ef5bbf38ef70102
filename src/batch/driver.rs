//! The multiplexed drive loop.
//!
//! One polling loop drives every in-flight transfer of a batch:
//!
//! 1. **Draining**: perform non-blocking [`Multiplexer::drive`] steps while
//!    the multiplexer reports more immediate work.
//! 2. **Waiting**: once nothing is immediately runnable but handles remain
//!    active, block on [`Multiplexer::wait`]. The first wait uses a near-zero
//!    timeout to catch fast transfers without stalling; every subsequent wait
//!    uses the configured select timeout.
//! 3. A failed wait with handles still active triggers a short fixed backoff
//!    sleep before the loop retries; it never aborts in-flight transfers.
//! 4. **Drained**: the loop ends when no handles remain active.
//!
//! The loop is generic over [`Multiplexer`], so the timing logic is unit
//! tested against a scripted fake without real sockets.

use crate::error::Result;
use std::time::Duration;

/// Scheduler-level options shared by all members of a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Timeout for every readiness wait after the first.
    pub select_timeout: Duration,
    /// Timeout for the first readiness wait. Kept near zero so batches whose
    /// members all finish immediately never stall a full select interval.
    pub first_wait: Duration,
    /// Fixed sleep after a failed readiness wait while handles remain active.
    pub wait_error_backoff: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            select_timeout: Duration::from_secs(1),
            first_wait: Duration::from_millis(1),
            wait_error_backoff: Duration::from_micros(150),
        }
    }
}

/// Outcome of one non-blocking drive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drive {
    /// More work is immediately runnable; drive again before waiting.
    pub again: bool,
    /// Transfers still in flight after this step.
    pub active: usize,
}

/// A set of concurrent in-flight transfers driven by one polling loop.
///
/// Production batches use the reqwest-backed implementation; tests inject a
/// scripted fake to pin down the loop's timing behavior.
pub trait Multiplexer {
    /// Perform a non-blocking work step.
    fn drive(&mut self) -> Result<Drive>;

    /// Block until readiness or timeout. An `Err` reports a spurious wait
    /// failure; in-flight transfers are unaffected.
    fn wait(&mut self, timeout: Duration) -> Result<()>;
}

/// Drive a multiplexer until no handles remain active.
///
/// Blocks the calling thread. There is no overall deadline: only individual
/// wait steps are time-bounded, and a timed-out wait simply revisits the
/// loop.
pub fn drive_to_completion<M: Multiplexer + ?Sized>(
    mux: &mut M,
    options: &BatchOptions,
) -> Result<()> {
    let mut timeout = options.first_wait;
    loop {
        let mut progress = mux.drive()?;
        while progress.again {
            progress = mux.drive()?;
        }
        if progress.active == 0 {
            break;
        }
        if mux.wait(timeout).is_err() {
            // Spurious wait failures happen with handles still active; back
            // off briefly instead of spinning.
            tracing::warn!("readiness wait failed, backing off");
            std::thread::sleep(options.wait_error_backoff);
        }
        timeout = options.select_timeout;
    }
    Ok(())
}
