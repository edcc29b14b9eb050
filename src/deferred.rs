use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::error::GpioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    Elapsed,
    Cancelled,
}

#[derive(Clone)]
pub struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

impl Canceller {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// An action scheduled after a delay. Cancelling does not skip the action,
/// it runs it right away.
pub struct Deferred {
    handle: JoinHandle<Fired>,
    canceller: Canceller,
}

impl Deferred {
    pub fn spawn<F>(delay: Duration, action: F) -> Self
    where
        F: FnOnce(Fired) + Send + 'static,
    {
        let (tx, mut rx) = watch::channel(false);
        let deadline = Instant::now() + delay;

        let handle = tokio::spawn(async move {
            let fired = tokio::select! {
                _ = sleep_until(deadline) => Fired::Elapsed,
                cancelled = async { rx.wait_for(|c| *c).await.is_ok() } => {
                    if cancelled {
                        Fired::Cancelled
                    } else {
                        // every canceller is gone, nothing can interrupt the timer
                        sleep_until(deadline).await;
                        Fired::Elapsed
                    }
                }
            };
            debug!("deferred action fired: {fired:?}");
            action(fired);
            fired
        });
        info!("deferred action scheduled in {} ms", delay.as_millis());

        Self {
            handle,
            canceller: Canceller { tx: Arc::new(tx) },
        }
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Waits for the action. Only cancellers taken beforehand can still
    /// interrupt the timer.
    pub async fn join(self) -> Result<Fired, GpioError> {
        let Deferred { handle, canceller } = self;
        drop(canceller);
        handle
            .await
            .map_err(|e| GpioError::Gpio(format!("deferred action failed: {e}")))
    }
}
