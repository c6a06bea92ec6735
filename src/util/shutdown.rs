//! Process-wide shutdown signal
//!
//! A cloneable handle around a watch channel. Triggering is idempotent;
//! every subscriber observes the flag exactly once regardless of how many
//! components ask for shutdown.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared shutdown trigger
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown; repeated calls are no-ops
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver that flips to true once shutdown is requested
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
