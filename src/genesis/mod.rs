//! Genesis Bootstrap Orchestrator
//!
//! Four operator-triggered phases between side chain S and relay chain R:
//!
//! 1. Register: S's descriptor goes to R's side chain manager
//! 2. Approve: one relay validator approves S's registration per invocation
//! 3. PushGenesis: S's current header goes to R as the trusted anchor
//! 4. PullGenesis: R's genesis header and validator set go to S's manager
//!
//! No phase triggers the next and nothing is persisted locally. Each phase
//! re-reads what it needs from chain, simulates the call, then submits.

mod header;
mod validators;

pub use header::{rlp_encode_header, GenesisHeader};
pub use validators::ValidatorSet;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ethereum_types::{Address, U256};
use tracing::{error, info};

use crate::abi::{self, AbiRegistry, AbiToken};
use crate::config::Config;
use crate::error::{BootstrapError, BootstrapResult, Phase, PhaseError};
use crate::rpc::{ChainRpc, ValidatorSource};
use crate::submission::{CancellationToken, SubmissionEngine};
use crate::types::{parse_address, BlockTag, ConfirmationRecord};

/// Relay router tag for quorum-approved side chains.
pub const QUORUM_ROUTER_TAG: u64 = 8;

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// How the relay chain routes messages for a side chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterMode {
    Quorum,
    /// Any other router, by numeric tag
    Tag(u64),
}

impl RouterMode {
    pub fn tag(&self) -> u64 {
        match self {
            RouterMode::Quorum => QUORUM_ROUTER_TAG,
            RouterMode::Tag(tag) => *tag,
        }
    }
}

impl FromStr for RouterMode {
    type Err = BootstrapError;

    fn from_str(s: &str) -> BootstrapResult<Self> {
        if s.eq_ignore_ascii_case("quorum") {
            return Ok(RouterMode::Quorum);
        }
        s.parse::<u64>()
            .map(RouterMode::Tag)
            .map_err(|_| BootstrapError::Decode(format!("unknown router '{}'", s)))
    }
}

impl fmt::Display for RouterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterMode::Quorum => f.write_str("QUORUM"),
            RouterMode::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

/// What the relay chain records about a side chain at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideChainDescriptor {
    pub chain_id: u64,
    /// Side chain's cross-chain data contract
    pub data_contract: Address,
    pub router: RouterMode,
    pub name: String,
}

/// Contract addresses the phases call into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapTargets {
    /// R: registerSideChain / approveRegisterSideChain
    pub relay_side_chain_manager: Address,
    /// R: syncGenesisBlock
    pub relay_header_sync: Address,
    /// S: initGenesisBlock
    pub side_chain_manager: Address,
    /// Height of R's genesis validator set
    pub relay_genesis_height: u64,
    /// Tag for headers originating on R
    pub relay_chain_id: u64,
}

impl BootstrapTargets {
    pub fn from_config(config: &Config) -> BootstrapResult<Self> {
        Ok(Self {
            relay_side_chain_manager: parse_address(&config.relay_chain.side_chain_manager_addr)?,
            relay_header_sync: parse_address(&config.relay_chain.header_sync_addr)?,
            side_chain_manager: parse_address(&config.side_chain.manager_addr)?,
            relay_genesis_height: config.relay_chain.genesis_epoch_height,
            relay_chain_id: config.relay_chain.chain_id,
        })
    }
}

impl SideChainDescriptor {
    pub fn from_config(config: &Config) -> BootstrapResult<Self> {
        Ok(Self {
            chain_id: config.side_chain.cross_chain_id,
            data_contract: parse_address(&config.side_chain.data_contract_addr)?,
            router: config.side_chain.router.parse()?,
            name: config.side_chain.name.clone(),
        })
    }
}

/// Outcome of a successful phase.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase: Phase,
    pub record: ConfirmationRecord,
    /// Header sent in phases 3 and 4
    pub genesis: Option<GenesisHeader>,
    /// Validators sent in phase 4
    pub validators: Option<ValidatorSet>,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct GenesisBootstrap {
    registry: Arc<AbiRegistry>,
    descriptor: SideChainDescriptor,
    targets: BootstrapTargets,
    side_rpc: Arc<dyn ChainRpc>,
    relay_validators: Arc<dyn ValidatorSource>,
    relay_rpc: Arc<dyn ChainRpc>,
    cancel: CancellationToken,
}

impl GenesisBootstrap {
    pub fn new(
        registry: Arc<AbiRegistry>,
        descriptor: SideChainDescriptor,
        targets: BootstrapTargets,
        side_rpc: Arc<dyn ChainRpc>,
        relay_rpc: Arc<dyn ChainRpc>,
        relay_validators: Arc<dyn ValidatorSource>,
    ) -> Self {
        Self {
            registry,
            descriptor,
            targets,
            side_rpc,
            relay_rpc,
            relay_validators,
            cancel: CancellationToken::never(),
        }
    }

    /// Confirmation waits stop with `Cancelled` once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn descriptor(&self) -> &SideChainDescriptor {
        &self.descriptor
    }

    /// Phase 1: register the side chain with the relay chain.
    ///
    /// `operator` signs on the relay chain. A chain id already registered is
    /// rejected by the relay chain and reported as `ProtocolViolation`.
    pub async fn register_side_chain(&self, operator: &SubmissionEngine) -> Result<PhaseReport, PhaseError> {
        let phase = Phase::Register;
        let d = &self.descriptor;
        info!(
            "Registering side chain {} ({}) data contract {:?} router {}",
            d.chain_id, d.name, d.data_contract, d.router
        );

        let payload = self
            .registry
            .encode_call(
                abi::REGISTER_SIDE_CHAIN,
                &[
                    AbiToken::Uint(U256::from(d.chain_id)),
                    AbiToken::Address(d.data_contract),
                    AbiToken::Uint(U256::from(d.router.tag())),
                    AbiToken::String(d.name.clone()),
                ],
            )
            .map_err(|e| PhaseError::new(phase, e))?;

        let record = self
            .execute(phase, operator, self.targets.relay_side_chain_manager, payload)
            .await?;
        info!("Register side chain {} succeeded, tx {:?}", d.chain_id, record.tx_hash);
        Ok(PhaseReport {
            phase,
            record,
            genesis: None,
            validators: None,
        })
    }

    /// Phase 2: one approval of the registration, signed by `validator`.
    ///
    /// Activation needs a quorum of distinct validators; call once per
    /// validator credential.
    pub async fn approve_registration(&self, validator: &SubmissionEngine) -> Result<PhaseReport, PhaseError> {
        let phase = Phase::Approve;
        let chain_id = self.descriptor.chain_id;
        info!("Approving side chain {} as validator {:?}", chain_id, validator.address());

        let payload = self
            .registry
            .encode_call(
                abi::APPROVE_REGISTER_SIDE_CHAIN,
                &[AbiToken::Uint(U256::from(chain_id))],
            )
            .map_err(|e| PhaseError::new(phase, e))?;

        let record = self
            .execute(phase, validator, self.targets.relay_side_chain_manager, payload)
            .await?;
        info!(
            "Approval of side chain {} by {:?} confirmed, tx {:?}",
            chain_id,
            validator.address(),
            record.tx_hash
        );
        Ok(PhaseReport {
            phase,
            record,
            genesis: None,
            validators: None,
        })
    }

    /// Phase 3: anchor the side chain's current header on the relay chain.
    pub async fn push_side_chain_genesis(&self, operator: &SubmissionEngine) -> Result<PhaseReport, PhaseError> {
        let phase = Phase::PushGenesis;
        let fail = |e: BootstrapError| PhaseError::new(phase, e);

        let header = self
            .side_rpc
            .header(BlockTag::Latest)
            .await
            .map_err(fail)?
            .ok_or_else(|| fail(BootstrapError::ChainUnavailable(anyhow::anyhow!("side chain returned no latest header"))))?;
        let genesis = GenesisHeader::from_json_header(self.descriptor.chain_id, &header).map_err(fail)?;
        info!(
            "Side chain header at height {} hash {:?} ({} bytes)",
            genesis.height,
            genesis.hash,
            genesis.encoded.len()
        );

        let payload = self
            .registry
            .encode_call(
                abi::SYNC_GENESIS_BLOCK,
                &[
                    AbiToken::Uint(U256::from(self.descriptor.chain_id)),
                    AbiToken::Bytes(genesis.encoded.clone()),
                ],
            )
            .map_err(fail)?;

        let record = self
            .execute(phase, operator, self.targets.relay_header_sync, payload)
            .await?;
        info!(
            "Synced side chain genesis to relay chain, header hash {:?}, block number {}, tx {:?}",
            genesis.hash, genesis.height, record.tx_hash
        );
        Ok(PhaseReport {
            phase,
            record,
            genesis: Some(genesis),
            validators: None,
        })
    }

    /// Phase 4: seed the side chain with the relay genesis header and validators.
    pub async fn pull_relay_genesis(&self, side_admin: &SubmissionEngine) -> Result<PhaseReport, PhaseError> {
        let phase = Phase::PullGenesis;
        let fail = |e: BootstrapError| PhaseError::new(phase, e);
        let height = self.targets.relay_genesis_height;

        let header = self
            .relay_rpc
            .header(BlockTag::Number(height))
            .await
            .map_err(fail)?
            .ok_or_else(|| {
                fail(BootstrapError::ChainUnavailable(anyhow::anyhow!(
                    "relay chain returned no block at height {}",
                    height
                )))
            })?;
        let genesis = GenesisHeader::from_rlp_header(self.targets.relay_chain_id, &header).map_err(fail)?;

        let raw_keys = self.relay_validators.validator_keys(height).await.map_err(fail)?;
        let validators = ValidatorSet::from_raw(height, &raw_keys).map_err(fail)?;
        let validators_enc = validators.encode_uncompressed();
        info!(
            "Relay genesis at height {}: hash {:?}, {} validators",
            genesis.height,
            genesis.hash,
            validators.len()
        );

        let payload = self
            .registry
            .encode_call(
                abi::INIT_GENESIS_BLOCK,
                &[
                    AbiToken::Bytes(genesis.encoded.clone()),
                    AbiToken::Bytes(validators_enc),
                ],
            )
            .map_err(fail)?;

        let record = self
            .execute(phase, side_admin, self.targets.side_chain_manager, payload)
            .await?;
        info!(
            "Synced relay genesis to side chain, tx {:?}, block number {}",
            record.tx_hash, genesis.height
        );
        Ok(PhaseReport {
            phase,
            record,
            genesis: Some(genesis),
            validators: Some(validators),
        })
    }

    /// Simulate, then submit and wait.
    async fn execute(
        &self,
        phase: Phase,
        engine: &SubmissionEngine,
        to: Address,
        payload: Vec<u8>,
    ) -> Result<ConfirmationRecord, PhaseError> {
        let result = async {
            engine.preflight(to, &payload).await?;
            engine.submit_with_cancel(to, payload, self.cancel.clone()).await
        }
        .await;

        result.map_err(|e| {
            let err = PhaseError::new(phase, e);
            error!("{}", err);
            err
        })
    }
}
