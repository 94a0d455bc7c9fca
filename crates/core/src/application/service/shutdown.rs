// Cooperative cancellation for admission cycles

use tokio::sync::watch;
use tracing::debug;

/// Cancellation handle observed by the service loop and by a running cycle.
///
/// A cycle checks it between queues, never mid-walk. Dropping the
/// `ShutdownSender` counts as a shutdown request.
#[derive(Clone)]
pub struct ShutdownToken {
    requested: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.requested.borrow() || self.requested.has_changed().is_err()
    }

    /// Resolves once shutdown is requested or the sender is gone
    pub async fn wait(&mut self) {
        let sender_dropped = self.requested.wait_for(|requested| *requested).await.is_err();
        if sender_dropped {
            debug!("Shutdown sender dropped, treating as shutdown");
        }
    }
}

pub struct ShutdownSender {
    requested: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Request shutdown. Safe to call repeatedly and with no tokens alive.
    pub fn shutdown(&self) {
        self.requested.send_replace(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (requested_tx, requested_rx) = watch::channel(false);
    (
        ShutdownSender {
            requested: requested_tx,
        },
        ShutdownToken {
            requested: requested_rx,
        },
    )
}
