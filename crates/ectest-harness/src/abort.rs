//! Cooperative cancellation for a run in flight.
//!
//! The CLI wires Ctrl-C to an [`AbortHandle`]; workers hold an
//! [`AbortSignal`] and race it against the engine, so a triggered abort
//! kills in-flight subprocesses instead of waiting them out.

use std::sync::Arc;

use tokio::sync::watch;

/// Create a connected handle/signal pair.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { inner: Arc::new(tx) }, AbortSignal { rx })
}

/// Trigger side. Cheap to clone; any clone can trigger the abort.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    inner: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Request cancellation. Idempotent.
    pub fn trigger(&self) {
        let _ = self.inner.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.borrow()
    }

    /// A fresh signal observing this handle.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.inner.subscribe(),
        }
    }
}

/// Observer side, cloned into every worker.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the abort is triggered. If every handle is dropped
    /// without triggering, this pends forever.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
