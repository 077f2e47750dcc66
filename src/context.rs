//! Wiring from configuration to live components.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use chain_clients_evm::EvmClient;
use ethereum_types::Address;
use tracing::info;

use crate::abi::AbiRegistry;
use crate::config::Config;
use crate::crypto::Credential;
use crate::events::EventDecoder;
use crate::genesis::{BootstrapTargets, GenesisBootstrap, SideChainDescriptor};
use crate::rpc::{ChainRpc, RpcValidatorSource};
use crate::submission::{CancellationToken, SubmissionEngine, SubmissionSettings};
use crate::types::parse_address;

/// Clients and shared tables for one side chain / relay chain pair.
pub struct BridgeContext {
    pub config: Config,
    pub registry: Arc<AbiRegistry>,
    pub side_client: Arc<EvmClient>,
    pub relay_client: Arc<EvmClient>,
}

impl BridgeContext {
    pub fn new(config: Config) -> Result<Self> {
        let side_client = Arc::new(
            EvmClient::new(&config.side_chain.rpc_url).context("Failed to create side chain client")?,
        );
        let relay_client = Arc::new(
            EvmClient::new(&config.relay_chain.rpc_url).context("Failed to create relay chain client")?,
        );
        info!(
            "Side chain {} at {}, relay chain {} at {}",
            config.side_chain.name, config.side_chain.rpc_url, config.relay_chain.name, config.relay_chain.rpc_url
        );
        Ok(Self {
            config,
            registry: Arc::new(AbiRegistry::new()),
            side_client,
            relay_client,
        })
    }

    pub fn side_rpc(&self) -> Arc<dyn ChainRpc> {
        self.side_client.clone()
    }

    pub fn relay_rpc(&self) -> Arc<dyn ChainRpc> {
        self.relay_client.clone()
    }

    fn engine(&self, credential: Credential, rpc: Arc<dyn ChainRpc>, chain_id: u64) -> SubmissionEngine {
        SubmissionEngine::new(
            Arc::new(credential),
            rpc,
            self.registry.clone(),
            SubmissionSettings::from_config(chain_id, &self.config.submission),
        )
    }

    /// Engine signing on the side chain with the admin key.
    pub fn side_admin_engine(&self) -> Result<SubmissionEngine> {
        let credential = Credential::from_hex(&self.config.side_chain.get_private_key()?)
            .context("Failed to load side chain admin key")?;
        Ok(self.engine(credential, self.side_rpc(), self.config.side_chain.chain_id))
    }

    /// Engine signing on the relay chain with the operator key.
    pub fn relay_operator_engine(&self) -> Result<SubmissionEngine> {
        let credential = Credential::from_hex(&self.config.relay_chain.get_operator_private_key()?)
            .context("Failed to load relay operator key")?;
        Ok(self.engine(credential, self.relay_rpc(), self.config.relay_chain.chain_id))
    }

    /// Engine signing on the relay chain with validator `index`'s key.
    pub fn relay_validator_engine(&self, index: usize) -> Result<SubmissionEngine> {
        let credential = Credential::from_hex(&self.config.relay_chain.get_validator_private_key(index)?)
            .with_context(|| format!("Failed to load relay validator {} key", index))?;
        Ok(self.engine(credential, self.relay_rpc(), self.config.relay_chain.chain_id))
    }

    pub fn validator_count(&self) -> usize {
        self.config.relay_chain.validator_private_key_envs.len()
    }

    pub fn orchestrator(&self, cancel: CancellationToken) -> Result<GenesisBootstrap> {
        let descriptor = SideChainDescriptor::from_config(&self.config)?;
        let targets = BootstrapTargets::from_config(&self.config)?;
        let validators = Arc::new(RpcValidatorSource::new(
            self.relay_client.clone(),
            self.config.relay_chain.validator_set_method.clone(),
        ));
        Ok(GenesisBootstrap::new(
            self.registry.clone(),
            descriptor,
            targets,
            self.side_rpc(),
            self.relay_rpc(),
            validators,
        )
        .with_cancellation(cancel))
    }

    pub fn event_decoder(&self) -> EventDecoder {
        EventDecoder::new(self.registry.clone(), &self.config.events)
    }

    pub fn lock_proxy(&self) -> Result<Address> {
        Ok(parse_address(&self.config.side_chain.lock_proxy_addr)?)
    }

    pub fn wrapper(&self) -> Result<Address> {
        let wrapper = self
            .config
            .side_chain
            .wrapper_addr
            .as_deref()
            .context("side_chain.wrapper_addr is not configured")?;
        Ok(parse_address(wrapper)?)
    }
}
