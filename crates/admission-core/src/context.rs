//! # Dispatch Context
//!
//! Ambient deadline and cancellation for one admission dispatch.
//!
//! A [`DispatchContext`] is created by the caller (usually per incoming API
//! request) and handed to every dispatch operation. Each webhook call is
//! bounded by the smaller of the remaining deadline and the webhook's own
//! timeout, and is abandoned as soon as the context is cancelled.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

// ============================================================================
// Cancellation
// ============================================================================

/// Owner side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    /// Create a handle that has not been cancelled
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Cancel every context holding the paired signal
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Check if `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Signal observing this handle
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    receiver: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation is requested
    ///
    /// Never resolves if every handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        let cancelled = receiver.wait_for(|cancelled| *cancelled).await.is_ok();
        if !cancelled {
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================================
// Dispatch Context
// ============================================================================

/// Deadline and cancellation carried through a dispatch
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    deadline: Option<Instant>,
    cancellation: Option<CancellationSignal>,
}

impl DispatchContext {
    /// Context with no deadline that is never cancelled
    pub fn background() -> Self {
        Self::default()
    }

    /// Set an absolute deadline, keeping an earlier one if already present
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Set a deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach a cancellation signal
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = Some(signal);
        self
    }

    /// Absolute deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Budget for one call with the given per-webhook timeout
    ///
    /// Returns `None` when the deadline has already passed.
    pub fn call_budget(&self, timeout: Duration) -> Option<Duration> {
        match self.remaining() {
            None => Some(timeout),
            Some(remaining) if remaining.is_zero() => None,
            Some(remaining) => Some(timeout.min(remaining)),
        }
    }

    /// Check if the context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationSignal::is_cancelled)
    }

    /// Resolve once the context is cancelled, never if it cannot be
    pub async fn cancelled(&self) {
        match &self.cancellation {
            Some(signal) => signal.cancelled().await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
