use std::time::Duration as StdDuration;

use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

// Roughly thirty years, the same horizon tokio uses for "never".
const FAR_FUTURE: StdDuration = StdDuration::from_secs(86_400 * 365 * 30);

/// A cancellation signal plus an absolute expiry shared by every attempt of
/// one race. Cloning shares both.
#[derive(Debug, Clone)]
pub struct DeadlineContext {
    token: CancellationToken,
    deadline: Instant,
}

impl DeadlineContext {
    pub fn new(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline,
        }
    }

    /// Zero and negative timeouts yield a context that is already expired.
    pub fn with_timeout(timeout: time::Duration) -> Self {
        let now = Instant::now();
        let deadline = if timeout.is_positive() {
            StdDuration::try_from(timeout)
                .ok()
                .and_then(|timeout| now.checked_add(timeout))
                .unwrap_or_else(|| now + FAR_FUTURE)
        } else {
            now
        };

        Self::new(deadline)
    }

    pub fn remaining(&self) -> StdDuration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels the context once the returned guard goes out of scope.
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    pub async fn expired(&self) {
        tokio::time::sleep_until(self.deadline).await;
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = self.expired() => {}
        }
    }
}

/// Enqueues `value` unless the context finishes first. Returns whether the
/// value was delivered.
pub async fn send_or_abandon<T>(ctx: &DeadlineContext, tx: &mpsc::Sender<T>, value: T) -> bool {
    if ctx.is_done() {
        return false;
    }

    tokio::select! {
        biased;
        _ = ctx.done() => false,
        sent = tx.send(value) => sent.is_ok(),
    }
}
