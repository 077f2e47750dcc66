//! Bridge Bootstrap Library
//!
//! Genesis bootstrap and transaction lifecycle for bridging a side chain into
//! a relay chain: nonce allocation, transaction submission and confirmation,
//! the four-phase genesis exchange, lock submission, and lock / unlock event
//! decoding.

pub mod abi;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod events;
pub mod genesis;
pub mod nonce;
pub mod rlp;
pub mod rpc;
pub mod submission;
pub mod transfer;
pub mod types;

// Re-export commonly used types
pub use abi::AbiRegistry;
pub use config::{Config, EventsConfig, LogCountSeverity, RelayChainConfig, SideChainConfig, SubmissionConfig};
pub use crypto::Credential;
pub use error::{BootstrapError, BootstrapResult, Phase, PhaseError};
pub use events::{EventDecoder, EventKind, TransferEvent};
pub use genesis::{GenesisBootstrap, GenesisHeader, PhaseReport, RouterMode, SideChainDescriptor, ValidatorSet};
pub use nonce::NonceAllocator;
pub use rpc::{ChainRpc, ValidatorSource};
pub use submission::{CancellationToken, ConfirmationWait, SubmissionEngine, SubmissionSettings};
pub use transfer::{LockReport, LockRequest};
pub use types::{BlockTag, ConfirmationRecord, LogEntry, PendingCall, SignedTransaction};
