use tokio::sync::watch;

/// Fires the shutdown signal for every [`Shutdown`] handed out from it.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Cooperative cancellation observed at every blocking wait.
///
/// Dropping the [`ShutdownTrigger`] counts as triggering it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown { rx: self.tx.subscribe() }
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        let stopped = *self.rx.borrow();
        stopped || self.rx.has_changed().is_err()
    }

    /// Resolves once shutdown has been requested.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        // Err means the trigger is gone, which is also a shutdown.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}
