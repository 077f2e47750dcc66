//! Chain RPC facade
//!
//! The engine and orchestrator only see these traits. [`EvmClient`] implements
//! them for real nodes; tests substitute in-memory chains. Every failure from
//! this boundary is a transport failure ([`BootstrapError::ChainUnavailable`])
//! except when a node answer cannot be interpreted at all.

use std::sync::Arc;

use async_trait::async_trait;
use chain_clients_common::bytes_to_hex;
use chain_clients_evm::{CallOutcome, EvmBlockHeader, EvmClient};
use ethereum_types::{Address, H256, U256};
use tracing::warn;

use crate::abi::{self, AbiKind, AbiRegistry, AbiToken};
use crate::error::{BootstrapError, BootstrapResult};
use crate::types::{parse_h256, parse_u256, BlockTag, ConfirmationRecord, SignedTransaction};

/// Node operations needed to submit and confirm transactions.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Nonce for `address` counting pending-pool transactions.
    async fn pending_nonce(&self, address: Address) -> BootstrapResult<u64>;

    async fn suggest_gas_price(&self) -> BootstrapResult<U256>;

    async fn block_number(&self) -> BootstrapResult<u64>;

    async fn header(&self, tag: BlockTag) -> BootstrapResult<Option<EvmBlockHeader>>;

    /// True while the node reports the transaction unmined (or not yet indexed).
    async fn is_pending(&self, tx_hash: H256) -> BootstrapResult<bool>;

    async fn receipt(&self, tx_hash: H256) -> BootstrapResult<Option<ConfirmationRecord>>;

    /// Hands the signed transaction to the node; returns the hash it reports.
    async fn broadcast(&self, tx: &SignedTransaction) -> BootstrapResult<H256>;

    /// Executes the call without committing it.
    async fn simulate(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
        block: BlockTag,
    ) -> BootstrapResult<CallOutcome>;
}

/// Source of a chain's validator (bookkeeper) public keys.
#[async_trait]
pub trait ValidatorSource: Send + Sync {
    /// Raw public keys authorised at `height`, in the chain's own order.
    async fn validator_keys(&self, height: u64) -> BootstrapResult<Vec<Vec<u8>>>;
}

fn unavailable(e: anyhow::Error) -> BootstrapError {
    BootstrapError::ChainUnavailable(e)
}

fn address_hex(address: &Address) -> String {
    bytes_to_hex(address.as_bytes())
}

fn hash_hex(hash: &H256) -> String {
    bytes_to_hex(hash.as_bytes())
}

// ============================================================================
// EVM JSON-RPC BACKING
// ============================================================================

#[async_trait]
impl ChainRpc for EvmClient {
    async fn pending_nonce(&self, address: Address) -> BootstrapResult<u64> {
        EvmClient::pending_nonce(self, &address_hex(&address))
            .await
            .map_err(unavailable)
    }

    async fn suggest_gas_price(&self) -> BootstrapResult<U256> {
        let hex = self.gas_price().await.map_err(unavailable)?;
        parse_u256(&hex)
    }

    async fn block_number(&self) -> BootstrapResult<u64> {
        EvmClient::block_number(self).await.map_err(unavailable)
    }

    async fn header(&self, tag: BlockTag) -> BootstrapResult<Option<EvmBlockHeader>> {
        self.block_header(&tag.to_rpc()).await.map_err(unavailable)
    }

    async fn is_pending(&self, tx_hash: H256) -> BootstrapResult<bool> {
        let tx = self
            .transaction(&hash_hex(&tx_hash))
            .await
            .map_err(unavailable)?;
        Ok(tx.map(|t| t.is_pending()).unwrap_or(true))
    }

    async fn receipt(&self, tx_hash: H256) -> BootstrapResult<Option<ConfirmationRecord>> {
        let receipt = self
            .transaction_receipt(&hash_hex(&tx_hash))
            .await
            .map_err(unavailable)?;
        receipt.as_ref().map(ConfirmationRecord::try_from).transpose()
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> BootstrapResult<H256> {
        let reported = self
            .send_raw_transaction(&bytes_to_hex(&tx.raw))
            .await
            .map_err(unavailable)?;
        let reported = parse_h256(&reported)?;
        if reported != tx.hash {
            warn!(
                "Node reported hash {:?} for transaction signed as {:?}",
                reported, tx.hash
            );
        }
        Ok(reported)
    }

    async fn simulate(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
        block: BlockTag,
    ) -> BootstrapResult<CallOutcome> {
        self.call(
            &address_hex(&from),
            &address_hex(&to),
            &bytes_to_hex(data),
            &block.to_rpc(),
        )
        .await
        .map_err(unavailable)
    }
}

/// Validator keys fetched through a chain-specific JSON-RPC method that
/// takes a hex height and returns an array of hex public keys.
pub struct RpcValidatorSource {
    client: Arc<EvmClient>,
    method: String,
}

impl RpcValidatorSource {
    pub fn new(client: Arc<EvmClient>, method: impl Into<String>) -> Self {
        Self {
            client,
            method: method.into(),
        }
    }
}

#[async_trait]
impl ValidatorSource for RpcValidatorSource {
    async fn validator_keys(&self, height: u64) -> BootstrapResult<Vec<Vec<u8>>> {
        let keys: Vec<String> = self
            .client
            .request(
                &self.method,
                vec![serde_json::json!(chain_clients_common::format_hex_u64(height))],
            )
            .await
            .map_err(unavailable)?
            .ok_or_else(|| {
                BootstrapError::ChainUnavailable(anyhow::anyhow!(
                    "{} returned no validators for height {}",
                    self.method,
                    height
                ))
            })?;

        keys.iter()
            .map(|k| chain_clients_common::hex_to_bytes(k).map_err(BootstrapError::from))
            .collect()
    }
}

// ============================================================================
// READ-ONLY QUERIES
// ============================================================================

/// Token balance of `owner` via `balanceOf(address)` at `block`.
pub async fn balance_of(
    rpc: &dyn ChainRpc,
    registry: &AbiRegistry,
    token: Address,
    owner: Address,
    block: BlockTag,
) -> BootstrapResult<U256> {
    let data = registry.encode_call(abi::BALANCE_OF, &[AbiToken::Address(owner)])?;
    match rpc.simulate(owner, token, &data, block).await? {
        CallOutcome::Success(bytes) => abi::decode(&[AbiKind::Uint], &bytes)?
            .into_iter()
            .next()
            .and_then(AbiToken::into_uint)
            .ok_or_else(|| BootstrapError::Decode("balanceOf returned no value".to_string())),
        CallOutcome::Reverted { message, .. } => Err(BootstrapError::ProtocolViolation(message)),
    }
}
