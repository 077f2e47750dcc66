//! Error types

use std::fmt;
use std::time::Duration;

use ethereum_types::{Address, H256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
    /// RPC transport failure. Retryable by the caller.
    #[error("Chain unavailable: {0:#}")]
    ChainUnavailable(anyhow::Error),

    /// The transaction was mined with a failure status. Its nonce is consumed.
    #[error("Transaction {tx_hash:?} reverted in block {block_number}")]
    TransactionReverted { tx_hash: H256, block_number: u64 },

    #[error("Transaction {tx_hash:?} not confirmed after {waited:?}")]
    ConfirmationTimeout { tx_hash: H256, waited: Duration },

    #[error("Confirmation wait for {tx_hash:?} cancelled")]
    Cancelled { tx_hash: H256 },

    #[error("No {event} event found in receipt")]
    EventNotFound { event: &'static str },

    #[error("Expected {event} event from {expected:?}, got {actual:?}")]
    UnexpectedEmitter {
        event: &'static str,
        expected: Address,
        actual: Address,
    },

    #[error("Receipt carries {actual} logs, expected at least {expected}")]
    InsufficientLogs { expected: usize, actual: usize },

    /// Rejection reported by a consumed entry point, message kept verbatim.
    #[error("{0}")]
    ProtocolViolation(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Signing error: {0}")]
    Signing(String),
}

impl BootstrapError {
    /// Hash of the transaction the error refers to, when there is one.
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            BootstrapError::TransactionReverted { tx_hash, .. }
            | BootstrapError::ConfirmationTimeout { tx_hash, .. }
            | BootstrapError::Cancelled { tx_hash } => Some(*tx_hash),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BootstrapError::ChainUnavailable(_) | BootstrapError::ConfirmationTimeout { .. }
        )
    }
}

impl From<chain_clients_common::HexError> for BootstrapError {
    fn from(e: chain_clients_common::HexError) -> Self {
        BootstrapError::Decode(e.to_string())
    }
}

pub type BootstrapResult<T> = std::result::Result<T, BootstrapError>;

// ============================================================================
// PHASE FAILURES
// ============================================================================

/// The four operator-triggered bootstrap phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Register,
    Approve,
    PushGenesis,
    PullGenesis,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Register => "register side chain",
            Phase::Approve => "approve side chain registration",
            Phase::PushGenesis => "push side chain genesis",
            Phase::PullGenesis => "pull relay chain genesis",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failed phase: what was attempted, why it failed, and which transaction to inspect.
#[derive(Debug)]
pub struct PhaseError {
    pub phase: Phase,
    pub tx_hash: Option<H256>,
    pub source: BootstrapError,
}

impl PhaseError {
    pub fn new(phase: Phase, source: BootstrapError) -> Self {
        Self {
            phase,
            tx_hash: source.tx_hash(),
            source,
        }
    }
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase '{}' failed: {}", self.phase, self.source)?;
        if let Some(hash) = self.tx_hash {
            write!(f, " (tx {:?})", hash)?;
        }
        Ok(())
    }
}

impl std::error::Error for PhaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
