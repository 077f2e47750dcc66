//! Core data model shared by the submission engine, event decoder and orchestrator.

use chain_clients_common::{hex_to_array, hex_to_bytes, parse_hex_u64};
use chain_clients_evm::{EvmLog, EvmTransactionReceipt};
use ethereum_types::{Address, H256, U256};

use crate::error::{BootstrapError, BootstrapResult};

/// Block selector for header lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    pub fn to_rpc(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Number(n) => chain_clients_common::format_hex_u64(*n),
        }
    }
}

/// One emitted log: emitter, topics, opaque data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

impl LogEntry {
    pub fn topic0(&self) -> Option<&H256> {
        self.topics.first()
    }
}

/// Mined outcome of one transaction.
///
/// A record whose `success` is false never yields a transfer event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRecord {
    pub tx_hash: H256,
    pub block_number: u64,
    pub success: bool,
    pub logs: Vec<LogEntry>,
}

/// A prepared, unsigned call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    pub to: Address,
    /// Native amount transferred with the call; zero for every bridge entry point
    pub value: U256,
    pub payload: Vec<u8>,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub nonce: u64,
}

/// A signed call ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub call: PendingCall,
    pub from: Address,
    /// RLP-encoded signed transaction
    pub raw: Vec<u8>,
    /// keccak256 of `raw`
    pub hash: H256,
}

// ============================================================================
// CONVERSIONS FROM RPC SHAPES
// ============================================================================

pub fn parse_address(s: &str) -> BootstrapResult<Address> {
    let bytes: [u8; 20] = hex_to_array(s)?;
    Ok(Address::from(bytes))
}

pub fn parse_h256(s: &str) -> BootstrapResult<H256> {
    let bytes: [u8; 32] = hex_to_array(s)?;
    Ok(H256::from(bytes))
}

/// Parses a hex quantity of up to 256 bits.
pub fn parse_u256(s: &str) -> BootstrapResult<U256> {
    let bytes = hex_to_bytes(s)?;
    if bytes.len() > 32 {
        return Err(BootstrapError::Decode(format!(
            "quantity '{}' exceeds 256 bits",
            s
        )));
    }
    Ok(U256::from_big_endian(&bytes))
}

impl TryFrom<&EvmLog> for LogEntry {
    type Error = BootstrapError;

    fn try_from(log: &EvmLog) -> BootstrapResult<Self> {
        let topics = log
            .topics
            .iter()
            .map(|t| parse_h256(t))
            .collect::<BootstrapResult<Vec<_>>>()?;
        Ok(LogEntry {
            address: parse_address(&log.address)?,
            topics,
            data: hex_to_bytes(&log.data)?,
        })
    }
}

impl TryFrom<&EvmTransactionReceipt> for ConfirmationRecord {
    type Error = BootstrapError;

    fn try_from(receipt: &EvmTransactionReceipt) -> BootstrapResult<Self> {
        let block_number = match receipt.block_number.as_deref() {
            Some(n) => parse_hex_u64(n)?,
            None => {
                return Err(BootstrapError::Decode(format!(
                    "receipt for {} has no block number",
                    receipt.transaction_hash
                )))
            }
        };
        let logs = receipt
            .logs
            .iter()
            .map(LogEntry::try_from)
            .collect::<BootstrapResult<Vec<_>>>()?;
        Ok(ConfirmationRecord {
            tx_hash: parse_h256(&receipt.transaction_hash)?,
            block_number,
            success: receipt.status.as_deref().map(parse_hex_u64).transpose()? == Some(1),
            logs,
        })
    }
}
