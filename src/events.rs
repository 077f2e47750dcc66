//! Lock / unlock event decoding
//!
//! Locates the transfer event a lock proxy emitted in a receipt and decodes
//! it with the fixed event schema. Used after submission as the check that a
//! transfer actually happened.

use std::sync::Arc;

use ethereum_types::{Address, H256, U256};
use tracing::warn;

use crate::abi::{self, AbiKind, AbiRegistry, AbiToken};
use crate::config::{EventsConfig, LogCountSeverity};
use crate::error::{BootstrapError, BootstrapResult};
use crate::rpc::ChainRpc;
use crate::types::{ConfirmationRecord, LogEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Lock,
    Unlock,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Lock => "lock",
            EventKind::Unlock => "unlock",
        }
    }

    fn schema(&self) -> &'static [AbiKind] {
        match self {
            // fromAssetHash, fromAddress, toChainId, toAssetHash, toAddress, amount
            EventKind::Lock => &[
                AbiKind::Address,
                AbiKind::Address,
                AbiKind::Uint,
                AbiKind::Bytes,
                AbiKind::Bytes,
                AbiKind::Uint,
            ],
            // toAssetHash, toAddress, amount
            EventKind::Unlock => &[AbiKind::Address, AbiKind::Address, AbiKind::Uint],
        }
    }
}

/// Decoded transfer intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Lock {
        from_asset: Address,
        from_address: Address,
        to_chain_id: u64,
        /// Asset on the target chain, in that chain's encoding
        to_asset: Vec<u8>,
        /// Recipient on the target chain, in that chain's encoding
        to_address: Vec<u8>,
        amount: U256,
    },
    Unlock {
        to_asset: Address,
        to_address: Address,
        amount: U256,
    },
}

impl TransferEvent {
    pub fn amount(&self) -> U256 {
        match self {
            TransferEvent::Lock { amount, .. } | TransferEvent::Unlock { amount, .. } => *amount,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            TransferEvent::Lock { .. } => EventKind::Lock,
            TransferEvent::Unlock { .. } => EventKind::Unlock,
        }
    }
}

/// Interprets raw target-chain bytes as an EVM address (last 20 bytes).
pub fn bytes_as_evm_address(raw: &[u8]) -> Option<Address> {
    if raw.len() < 20 {
        return None;
    }
    Some(Address::from_slice(&raw[raw.len() - 20..]))
}

// ============================================================================
// DECODER
// ============================================================================

pub struct EventDecoder {
    registry: Arc<AbiRegistry>,
    min_log_count: usize,
    severity: LogCountSeverity,
}

impl EventDecoder {
    pub fn new(registry: Arc<AbiRegistry>, config: &EventsConfig) -> Self {
        Self {
            registry,
            min_log_count: config.min_log_count,
            severity: config.log_count_severity,
        }
    }

    /// Finds and decodes the `kind` event emitted by `expected_emitter`.
    ///
    /// # Returns
    ///
    /// * `Ok(TransferEvent)` - Matching log decoded
    /// * `Err(UnexpectedEmitter)` - Only logs from other addresses carry the topic
    /// * `Err(EventNotFound)` - No log carries the topic
    /// * `Err(TransactionReverted)` - Receipt has failure status
    /// * `Err(InsufficientLogs)` - Too few logs and severity is `reject`
    pub fn decode(
        &self,
        record: &ConfirmationRecord,
        expected_emitter: Address,
        kind: EventKind,
    ) -> BootstrapResult<TransferEvent> {
        if !record.success {
            return Err(BootstrapError::TransactionReverted {
                tx_hash: record.tx_hash,
                block_number: record.block_number,
            });
        }

        self.check_log_count(record)?;

        let topic = self.registry.event_topic(kind.name())?;
        let log = find_event_log(&record.logs, &topic, expected_emitter, kind)?;
        decode_log(log, kind)
    }

    /// Fetches the receipt for `tx_hash` and decodes it.
    pub async fn decode_by_hash(
        &self,
        rpc: &dyn ChainRpc,
        tx_hash: H256,
        expected_emitter: Address,
        kind: EventKind,
    ) -> BootstrapResult<TransferEvent> {
        let record = rpc.receipt(tx_hash).await?.ok_or_else(|| {
            BootstrapError::ChainUnavailable(anyhow::anyhow!("No receipt for transaction {:?}", tx_hash))
        })?;
        self.decode(&record, expected_emitter, kind)
    }

    /// Minimum-log-count precondition.
    ///
    /// A lock or unlock normally emits the asset transfer, the proxy event
    /// and the cross-chain manager event.
    pub fn check_log_count(&self, record: &ConfirmationRecord) -> BootstrapResult<()> {
        let actual = record.logs.len();
        if actual >= self.min_log_count {
            return Ok(());
        }
        match self.severity {
            LogCountSeverity::Ignore => Ok(()),
            LogCountSeverity::Warn => {
                warn!(
                    "Receipt {:?} carries {} logs, expected at least {}",
                    record.tx_hash, actual, self.min_log_count
                );
                Ok(())
            }
            LogCountSeverity::Reject => Err(BootstrapError::InsufficientLogs {
                expected: self.min_log_count,
                actual,
            }),
        }
    }
}

fn find_event_log<'a>(
    logs: &'a [LogEntry],
    topic: &H256,
    expected_emitter: Address,
    kind: EventKind,
) -> BootstrapResult<&'a LogEntry> {
    let mut matching = logs.iter().filter(|log| log.topic0() == Some(topic));

    let first = matching.next().ok_or(BootstrapError::EventNotFound { event: kind.name() })?;
    if first.address == expected_emitter {
        return Ok(first);
    }
    if let Some(from_expected) = matching.find(|log| log.address == expected_emitter) {
        return Ok(from_expected);
    }
    Err(BootstrapError::UnexpectedEmitter {
        event: kind.name(),
        expected: expected_emitter,
        actual: first.address,
    })
}

fn decode_log(log: &LogEntry, kind: EventKind) -> BootstrapResult<TransferEvent> {
    let mut tokens = abi::decode(kind.schema(), &log.data)?.into_iter();
    let mut next = || {
        tokens
            .next()
            .ok_or_else(|| BootstrapError::Decode(format!("{} event data truncated", kind.name())))
    };
    let malformed = |field: &str| BootstrapError::Decode(format!("{} event field {} malformed", kind.name(), field));

    Ok(match kind {
        EventKind::Lock => {
            let from_asset = next()?.into_address().ok_or_else(|| malformed("fromAssetHash"))?;
            let from_address = next()?.into_address().ok_or_else(|| malformed("fromAddress"))?;
            let to_chain_id = next()?.into_uint().ok_or_else(|| malformed("toChainId"))?;
            if to_chain_id > U256::from(u64::MAX) {
                return Err(malformed("toChainId"));
            }
            let to_asset = next()?.into_bytes().ok_or_else(|| malformed("toAssetHash"))?;
            let to_address = next()?.into_bytes().ok_or_else(|| malformed("toAddress"))?;
            let amount = next()?.into_uint().ok_or_else(|| malformed("amount"))?;
            TransferEvent::Lock {
                from_asset,
                from_address,
                to_chain_id: to_chain_id.low_u64(),
                to_asset,
                to_address,
                amount,
            }
        }
        EventKind::Unlock => {
            let to_asset = next()?.into_address().ok_or_else(|| malformed("toAssetHash"))?;
            let to_address = next()?.into_address().ok_or_else(|| malformed("toAddress"))?;
            let amount = next()?.into_uint().ok_or_else(|| malformed("amount"))?;
            TransferEvent::Unlock {
                to_asset,
                to_address,
                amount,
            }
        }
    })
}

/// Encodes event data with the same schema; used to build fixtures.
pub fn encode_event_data(event: &TransferEvent) -> Vec<u8> {
    match event {
        TransferEvent::Lock {
            from_asset,
            from_address,
            to_chain_id,
            to_asset,
            to_address,
            amount,
        } => abi::encode(&[
            AbiToken::Address(*from_asset),
            AbiToken::Address(*from_address),
            AbiToken::Uint(U256::from(*to_chain_id)),
            AbiToken::Bytes(to_asset.clone()),
            AbiToken::Bytes(to_address.clone()),
            AbiToken::Uint(*amount),
        ]),
        TransferEvent::Unlock {
            to_asset,
            to_address,
            amount,
        } => abi::encode(&[
            AbiToken::Address(*to_asset),
            AbiToken::Address(*to_address),
            AbiToken::Uint(*amount),
        ]),
    }
}
