//! Bounded admission control for provisioning tasks.

use std::sync::Arc;

use permload_core::{Error, Result};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};

/// Shared cancellation signal. Cloning shares the same signal.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Caps how many units of work run at once.
#[derive(Debug, Clone)]
pub struct Governor {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    cancel: CancelSignal,
}

/// A held governor slot. Dropping it returns the slot.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl Permit {
    /// Return the slot explicitly.
    pub fn release(self) {}
}

impl Governor {
    /// `capacity` is clamped to what the underlying semaphore can hold.
    pub fn new(capacity: usize, cancel: CancelSignal) -> Self {
        let capacity = capacity.min(Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            cancel,
        }
    }

    /// Wait for a free slot. Fails with [`Error::Cancelled`] if the signal
    /// fires first, or straight away if it already has.
    pub async fn acquire(&self) -> Result<Permit> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            permit = self.semaphore.clone().acquire_owned() => permit
                .map(|p| Permit { _permit: p })
                .map_err(|_| Error::Cancelled),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
