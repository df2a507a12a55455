//! Cancellable fixed-interval background task.
//!
//! One [`PeriodicTask`] owns one spawned loop and the token that stops it.
//! Ticks never overlap: the loop awaits each tick before waiting for the
//! next deadline, and deadlines missed while a tick ran are skipped.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// What the loop does after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    /// Wait for the next deadline.
    Continue,
    /// End the loop.
    Break,
}

/// Handle to a running periodic loop. Dropping the handle cancels the loop.
#[derive(Debug)]
pub struct PeriodicTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawns a loop that calls `tick` every `period`, first after one full
    /// period. Must be called inside a tokio runtime.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickFlow> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = child.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let flow = tokio::select! {
                    biased;
                    () = child.cancelled() => break,
                    flow = tick() => flow,
                };
                if flow == TickFlow::Break {
                    break;
                }
            }
        });
        Self { token, handle }
    }

    /// Stops the loop. Calling it again is a no-op.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `true` once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
