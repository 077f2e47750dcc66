//! Transaction Submission & Confirmation Engine
//!
//! Turns a destination and payload into a confirmed, receipted transaction:
//! sample gas price, allocate nonce, sign, broadcast, wait for the node to
//! mine it, then validate the receipt.
//!
//! The engine composes a signing [`Credential`] with a [`ChainRpc`] transport;
//! neither knows about the other.

mod transaction;
mod wait;

pub use transaction::sign_transaction;
pub use wait::{cancellation, CancellationHandle, CancellationToken, ConfirmationWait};

use std::sync::Arc;
use std::time::Duration;

use chain_clients_common::bytes_to_hex;
use chain_clients_evm::CallOutcome;
use ethereum_types::{Address, H256, U256};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::abi::AbiRegistry;
use crate::config::SubmissionConfig;
use crate::crypto::Credential;
use crate::error::{BootstrapError, BootstrapResult};
use crate::nonce::NonceAllocator;
use crate::rpc::ChainRpc;
use crate::types::{BlockTag, ConfirmationRecord, PendingCall, SignedTransaction};

/// Per-chain submission parameters.
#[derive(Debug, Clone)]
pub struct SubmissionSettings {
    /// EIP-155 chain id baked into each signature
    pub chain_id: u64,
    pub gas_limit: u64,
    pub gas_price_multiplier: u64,
    pub wait: ConfirmationWait,
}

impl SubmissionSettings {
    pub fn from_config(chain_id: u64, config: &SubmissionConfig) -> Self {
        Self {
            chain_id,
            gas_limit: config.gas_limit,
            gas_price_multiplier: config.gas_price_multiplier,
            wait: ConfirmationWait {
                poll_interval: Duration::from_millis(config.poll_interval_ms),
                max_wait: config.max_wait_ms.map(Duration::from_millis),
            },
        }
    }
}

pub struct SubmissionEngine {
    credential: Arc<Credential>,
    rpc: Arc<dyn ChainRpc>,
    nonces: Arc<NonceAllocator>,
    registry: Arc<AbiRegistry>,
    settings: SubmissionSettings,
    /// Held from nonce allocation through broadcast
    submit_lock: Mutex<()>,
}

impl SubmissionEngine {
    pub fn new(
        credential: Arc<Credential>,
        rpc: Arc<dyn ChainRpc>,
        registry: Arc<AbiRegistry>,
        settings: SubmissionSettings,
    ) -> Self {
        let nonces = Arc::new(NonceAllocator::new(credential.address(), rpc.clone()));
        Self {
            credential,
            rpc,
            nonces,
            registry,
            settings,
            submit_lock: Mutex::new(()),
        }
    }

    /// Uses an existing allocator, e.g. one shared with another engine for the same account.
    ///
    /// # Returns
    ///
    /// * `Ok(SubmissionEngine)` - Allocator counts nonces for the signing address
    /// * `Err(Signing)` - Allocator belongs to a different address
    pub fn with_nonce_allocator(
        credential: Arc<Credential>,
        rpc: Arc<dyn ChainRpc>,
        nonces: Arc<NonceAllocator>,
        registry: Arc<AbiRegistry>,
        settings: SubmissionSettings,
    ) -> BootstrapResult<Self> {
        if nonces.address() != credential.address() {
            return Err(BootstrapError::Signing(format!(
                "nonce allocator for {:?} cannot sign for {:?}",
                nonces.address(),
                credential.address()
            )));
        }
        Ok(Self {
            credential,
            rpc,
            nonces,
            registry,
            settings,
            submit_lock: Mutex::new(()),
        })
    }

    pub fn address(&self) -> Address {
        self.credential.address()
    }

    pub fn nonces(&self) -> &Arc<NonceAllocator> {
        &self.nonces
    }

    pub fn rpc(&self) -> &Arc<dyn ChainRpc> {
        &self.rpc
    }

    pub fn registry(&self) -> &Arc<AbiRegistry> {
        &self.registry
    }

    /// Submits a call and blocks until it is mined.
    ///
    /// # Returns
    ///
    /// * `Ok(ConfirmationRecord)` - Mined with success status
    /// * `Err(TransactionReverted)` - Mined with failure status; nonce consumed
    /// * `Err(ConfirmationTimeout)` - `max_wait` elapsed
    /// * `Err(ChainUnavailable)` - Transport failure before broadcast, or receipt missing
    pub async fn submit(&self, to: Address, payload: Vec<u8>) -> BootstrapResult<ConfirmationRecord> {
        self.submit_with_cancel(to, payload, CancellationToken::never())
            .await
    }

    /// Like [`submit`](Self::submit), but the confirmation wait stops with
    /// `Cancelled` once `cancel` fires. The broadcast itself is never undone.
    pub async fn submit_with_cancel(
        &self,
        to: Address,
        payload: Vec<u8>,
        mut cancel: CancellationToken,
    ) -> BootstrapResult<ConfirmationRecord> {
        let signed = self.broadcast(to, payload).await?;
        self.confirm(signed.hash, &mut cancel).await
    }

    /// Prices, signs and broadcasts one transaction without waiting.
    pub async fn broadcast(&self, to: Address, payload: Vec<u8>) -> BootstrapResult<SignedTransaction> {
        let _guard = self.submit_lock.lock().await;

        let suggested = self.rpc.suggest_gas_price().await?;
        let gas_price = suggested.saturating_mul(U256::from(self.settings.gas_price_multiplier));
        let nonce = self.nonces.allocate().await?;

        let call = PendingCall {
            to,
            value: U256::zero(),
            payload,
            gas_limit: self.settings.gas_limit,
            gas_price,
            nonce,
        };

        let signed = match sign_transaction(&self.credential, call, self.settings.chain_id) {
            Ok(signed) => signed,
            Err(e) => {
                self.nonces.resync().await;
                return Err(e);
            }
        };

        let tx_hash = match self.rpc.broadcast(&signed).await {
            Ok(hash) => hash,
            Err(e) => {
                // The pool never saw this nonce
                self.nonces.resync().await;
                return Err(e);
            }
        };

        info!(
            "Broadcast tx {:?}: from={:?}, to={:?}, nonce={}, gas_price={}, chain_id={}{}",
            tx_hash,
            signed.from,
            to,
            nonce,
            gas_price,
            self.settings.chain_id,
            self.registry
                .function_for(&signed.call.payload)
                .map(|f| format!(", call={}", f))
                .unwrap_or_default()
        );

        Ok(SignedTransaction {
            hash: tx_hash,
            ..signed
        })
    }

    /// Waits for `tx_hash` to be mined, fetches and dumps its receipt, and
    /// rejects a failure status.
    pub async fn confirm(
        &self,
        tx_hash: H256,
        cancel: &mut CancellationToken,
    ) -> BootstrapResult<ConfirmationRecord> {
        self.settings
            .wait
            .until_mined(self.rpc.as_ref(), tx_hash, cancel)
            .await?;

        let record = self.rpc.receipt(tx_hash).await?.ok_or_else(|| {
            BootstrapError::ChainUnavailable(anyhow::anyhow!(
                "Receipt for {:?} not available after the transaction left the pending pool",
                tx_hash
            ))
        })?;
        dump_logs(&self.registry, &record);

        if !record.success {
            warn!("Transaction {:?} failed in block {}", tx_hash, record.block_number);
            return Err(BootstrapError::TransactionReverted {
                tx_hash,
                block_number: record.block_number,
            });
        }
        Ok(record)
    }

    /// Executes the call against the latest state without committing.
    ///
    /// A revert comes back as `ProtocolViolation` carrying the node's
    /// message unchanged.
    pub async fn preflight(&self, to: Address, payload: &[u8]) -> BootstrapResult<Vec<u8>> {
        match self
            .rpc
            .simulate(self.address(), to, payload, BlockTag::Latest)
            .await?
        {
            CallOutcome::Success(data) => Ok(data),
            CallOutcome::Reverted { message, .. } => Err(BootstrapError::ProtocolViolation(message)),
        }
    }
}

/// Logs every event of a receipt, labelling known topics.
pub fn dump_logs(registry: &AbiRegistry, record: &ConfirmationRecord) {
    info!(
        "txhash {:?}, block height {}, {} logs",
        record.tx_hash,
        record.block_number,
        record.logs.len()
    );
    for (i, log) in record.logs.iter().enumerate() {
        let name = log
            .topic0()
            .and_then(|t| registry.event_name(t))
            .unwrap_or("unknown");
        info!("eventlog[{}] {} address {:?}", i, name, log.address);
        info!("eventlog[{}] data {}", i, bytes_to_hex(&log.data));
        for (j, topic) in log.topics.iter().enumerate() {
            info!("eventlog[{}] topic[{}] {:?}", i, j, topic);
        }
    }
}
