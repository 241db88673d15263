//! One-way shutdown signal shared by the client's tasks.

use std::sync::Arc;

use tokio::sync::watch;

/// Trigger side. Cheap to clone; triggering twice is a no-op.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

/// Observer side, handed to every loop that must stop.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownListener) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, ShutdownListener { rx })
    }

    pub fn trigger(&self) {
        self.tx.send_if_modified(|stopped| !std::mem::replace(stopped, true));
    }

    /// Another listener for a task started after `new`.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownListener {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is triggered, or when every trigger handle is gone.
    pub async fn wait(&mut self) {
        // Err: every trigger handle was dropped.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
