//! Cancellation signals built on `tokio::sync::watch`
//!
//! A [`CancelSource`] flips a shared flag to `true` exactly once; any number
//! of [`CancelSignal`]s observe it. [`CancelSignal::child`] derives a new
//! source whose signal also fires when the parent does, so a caller's outer
//! shutdown reaches every reader while the session can still stop its own
//! readers independently.

use std::sync::Arc;

use tokio::sync::watch;

/// Owning side of a cancellation signal
#[derive(Debug, Clone)]
pub struct CancelSource {
    tx: Arc<watch::Sender<bool>>,
}

/// Observing side of a cancellation signal
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires.
    ///
    /// If every source is dropped without cancelling, this never resolves.
    pub async fn cancelled(&mut self) {
        if !self.wait().await {
            std::future::pending::<()>().await;
        }
    }

    /// `true` once cancelled, `false` if every source was dropped first
    async fn wait(&mut self) -> bool {
        self.rx.wait_for(|cancelled| *cancelled).await.is_ok()
    }

    /// Derive a child source that is cancelled along with this signal.
    ///
    /// Must be called inside a tokio runtime: a small task forwards the
    /// parent's cancellation and lives no longer than the parent source.
    pub fn child(&self) -> CancelSource {
        let child = CancelSource::new();
        if self.is_cancelled() {
            child.cancel();
            return child;
        }

        let mut parent = self.clone();
        let child_tx = Arc::downgrade(&child.tx);
        tokio::spawn(async move {
            if parent.wait().await {
                if let Some(tx) = child_tx.upgrade() {
                    tx.send_replace(true);
                }
            }
        });

        child
    }
}

impl From<watch::Receiver<bool>> for CancelSignal {
    /// Adapt an existing shutdown channel
    fn from(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }
}
