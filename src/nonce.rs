//! Nonce allocation for a single signing account
//!
//! The allocator assumes it is the only source of nonces for its address while
//! it lives. It seeds once from the node's pending nonce and then counts
//! locally.

use std::sync::Arc;

use ethereum_types::Address;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::BootstrapResult;
use crate::rpc::ChainRpc;

pub struct NonceAllocator {
    address: Address,
    rpc: Arc<dyn ChainRpc>,
    /// Next nonce to hand out; `None` until seeded
    next: Mutex<Option<u64>>,
}

impl NonceAllocator {
    pub fn new(address: Address, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            address,
            rpc,
            next: Mutex::new(None),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns the next nonce, seeding from the chain on first use.
    ///
    /// Concurrent callers are serialized; each value is handed out exactly
    /// once. If seeding fails the allocator stays unseeded.
    pub async fn allocate(&self) -> BootstrapResult<u64> {
        let mut next = self.next.lock().await;
        let nonce = match *next {
            Some(n) => n,
            None => {
                let seeded = self.rpc.pending_nonce(self.address).await?;
                info!("Seeded nonce for {:?} at {}", self.address, seeded);
                seeded
            }
        };
        *next = Some(nonce + 1);
        debug!("Allocated nonce {} for {:?}", nonce, self.address);
        Ok(nonce)
    }

    /// Next nonce that `allocate` would return, if seeded.
    pub async fn peek(&self) -> Option<u64> {
        *self.next.lock().await
    }

    /// Forget the local counter so the next allocation re-reads the chain.
    ///
    /// Only valid when no allocated nonce reached the pending pool since the
    /// last seed, e.g. after the node rejected a broadcast outright.
    pub async fn resync(&self) {
        let mut next = self.next.lock().await;
        if next.take().is_some() {
            info!("Nonce for {:?} will be re-read from chain", self.address);
        }
    }
}
