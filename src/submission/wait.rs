//! Cancellable confirmation wait
//!
//! Time comes from the tokio clock, so a paused runtime drives the loop
//! without real delay.

use std::time::Duration;

use ethereum_types::H256;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{BootstrapError, BootstrapResult};
use crate::rpc::ChainRpc;

// ============================================================================
// CANCELLATION
// ============================================================================

/// Owner side: flips the token for every clone.
#[derive(Debug)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side, cloned into each wait.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

/// Creates a linked handle / token pair.
pub fn cancellation() -> (CancellationHandle, CancellationToken) {
    let (tx, rx) = watch::channel(false);
    (CancellationHandle { tx }, CancellationToken { rx })
}

impl CancellationToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_, token) = cancellation();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle is gone.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

// ============================================================================
// WAIT LOOP
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationWait {
    pub poll_interval: Duration,
    /// `None` waits until the node answers or the token fires
    pub max_wait: Option<Duration>,
}

impl ConfirmationWait {
    /// Sleeps one interval, then asks whether `tx_hash` is still pending.
    ///
    /// RPC errors are logged and the poll repeats. Returns once the node
    /// reports the transaction mined.
    pub async fn until_mined(
        &self,
        rpc: &dyn ChainRpc,
        tx_hash: H256,
        cancel: &mut CancellationToken,
    ) -> BootstrapResult<()> {
        let started = Instant::now();
        let deadline = self.max_wait.map(|w| started + w);
        let mut polls: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(BootstrapError::Cancelled { tx_hash });
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(BootstrapError::Cancelled { tx_hash }),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            polls += 1;

            match rpc.is_pending(tx_hash).await {
                Ok(false) => {
                    debug!("Transaction {:?} left the pending pool after {} polls", tx_hash, polls);
                    return Ok(());
                }
                Ok(true) => {}
                Err(e) => warn!("Failed to query transaction {:?}: {}", tx_hash, e),
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(BootstrapError::ConfirmationTimeout {
                        tx_hash,
                        waited: started.elapsed(),
                    });
                }
            }
        }
    }
}
