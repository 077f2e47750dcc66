//! Configuration Management Module
//!
//! Loads the bootstrap tool's settings: both chain endpoints, the contract
//! addresses the four phases talk to, submission tuning, and event-check policy.
//! Private keys never live in the file; it names the environment variables
//! that hold them.

use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The chain being bridged in
    pub side_chain: SideChainConfig,
    /// The relay chain anchoring validator sets
    pub relay_chain: RelayChainConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// Side chain connection and bridge contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideChainConfig {
    /// Human-readable name, also registered on the relay chain
    pub name: String,
    pub rpc_url: String,
    /// EIP-155 chain id used when signing
    pub chain_id: u64,
    /// Identifier under which the relay chain knows this side chain
    pub cross_chain_id: u64,
    /// Cross-chain data contract (registered with the relay chain)
    pub data_contract_addr: String,
    /// Cross-chain manager contract (receives the relay genesis)
    pub manager_addr: String,
    /// Lock proxy contract that emits lock / unlock events
    pub lock_proxy_addr: String,
    /// Asset wrapper whose `lock` forwards to the lock proxy
    #[serde(default)]
    pub wrapper_addr: Option<String>,
    /// Routing mode tag, e.g. "QUORUM"
    #[serde(default = "default_router")]
    pub router: String,
    /// Environment variable holding the side-chain admin key (hex)
    #[serde(default = "default_side_private_key_env")]
    pub private_key_env: String,
}

/// Relay chain connection and management contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayChainConfig {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    /// Side chain manager entry point (register / approve)
    pub side_chain_manager_addr: String,
    /// Header sync entry point (syncGenesisBlock)
    pub header_sync_addr: String,
    /// JSON-RPC method returning the validator public keys at a height
    #[serde(default = "default_validator_set_method")]
    pub validator_set_method: String,
    /// Epoch height holding the genesis validator set
    #[serde(default)]
    pub genesis_epoch_height: u64,
    /// Environment variable holding the relay operator key (hex)
    #[serde(default = "default_operator_private_key_env")]
    pub operator_private_key_env: String,
    /// Environment variables holding each approving validator's key (hex)
    #[serde(default)]
    pub validator_private_key_envs: Vec<String>,
}

/// Transaction submission and confirmation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Applied to the node's suggested gas price
    #[serde(default = "default_gas_price_multiplier")]
    pub gas_price_multiplier: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on the confirmation wait; unbounded when absent
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

/// Event decoding policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Minimum number of logs a lock / unlock receipt is expected to carry
    #[serde(default = "default_min_log_count")]
    pub min_log_count: usize,
    #[serde(default)]
    pub log_count_severity: LogCountSeverity,
}

/// What to do when a receipt carries fewer logs than `min_log_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCountSeverity {
    Ignore,
    #[default]
    Warn,
    Reject,
}

fn default_router() -> String {
    "QUORUM".to_string()
}

fn default_side_private_key_env() -> String {
    "SIDE_CHAIN_PRIVATE_KEY".to_string()
}

fn default_operator_private_key_env() -> String {
    "RELAY_OPERATOR_PRIVATE_KEY".to_string()
}

fn default_validator_set_method() -> String {
    "relay_getValidators".to_string()
}

fn default_gas_limit() -> u64 {
    100_000
}

fn default_gas_price_multiplier() -> u64 {
    1
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_min_log_count() -> usize {
    3
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            gas_limit: default_gas_limit(),
            gas_price_multiplier: default_gas_price_multiplier(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: None,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            min_log_count: default_min_log_count(),
            log_count_severity: LogCountSeverity::default(),
        }
    }
}

fn read_key_env(env_name: &str, role: &str) -> anyhow::Result<String> {
    std::env::var(env_name).map_err(|_| {
        anyhow::anyhow!(
            "Environment variable '{}' not set. Please set it with the {} private key (hex encoded).",
            env_name,
            role
        )
    })
}

impl SideChainConfig {
    /// Loads the side-chain admin private key from the environment.
    pub fn get_private_key(&self) -> anyhow::Result<String> {
        read_key_env(&self.private_key_env, "side chain admin")
    }
}

impl RelayChainConfig {
    /// Loads the relay operator private key from the environment.
    pub fn get_operator_private_key(&self) -> anyhow::Result<String> {
        read_key_env(&self.operator_private_key_env, "relay operator")
    }

    /// Loads the private key of the validator at `index`.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The private key (hex encoded)
    /// * `Err(anyhow::Error)` - Index out of range or variable unset
    pub fn get_validator_private_key(&self, index: usize) -> anyhow::Result<String> {
        let env_name = self.validator_private_key_envs.get(index).ok_or_else(|| {
            anyhow::anyhow!(
                "Validator index {} out of range: {} validator key variables configured",
                index,
                self.validator_private_key_envs.len()
            )
        })?;
        read_key_env(env_name, "relay validator")
    }
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

fn validate_address(field: &str, value: &str) -> anyhow::Result<()> {
    chain_clients_common::normalize_evm_address(value)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("Configuration error: {} is not a valid address: {}", field, e))
}

fn validate_rpc_url(field: &str, value: &str) -> anyhow::Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("Configuration error: {} '{}' is not a valid URL: {}", field, value, e))
}

impl Config {
    /// Validates cross-field constraints.
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Configuration is valid
    /// - `Err(anyhow::Error)` - First violated constraint
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.side_chain.chain_id == self.relay_chain.chain_id {
            return Err(anyhow::anyhow!(
                "Configuration error: Side chain and relay chain have the same chain ID {}. Each chain must have a unique chain ID.",
                self.side_chain.chain_id
            ));
        }

        if self.side_chain.name.trim().is_empty() {
            return Err(anyhow::anyhow!("Configuration error: side_chain.name must not be empty"));
        }

        self.side_chain
            .router
            .parse::<crate::genesis::RouterMode>()
            .map_err(|e| anyhow::anyhow!("Configuration error: side_chain.router: {}", e))?;

        validate_rpc_url("side_chain.rpc_url", &self.side_chain.rpc_url)?;
        validate_rpc_url("relay_chain.rpc_url", &self.relay_chain.rpc_url)?;

        validate_address("side_chain.data_contract_addr", &self.side_chain.data_contract_addr)?;
        validate_address("side_chain.manager_addr", &self.side_chain.manager_addr)?;
        validate_address("side_chain.lock_proxy_addr", &self.side_chain.lock_proxy_addr)?;
        if let Some(wrapper_addr) = &self.side_chain.wrapper_addr {
            validate_address("side_chain.wrapper_addr", wrapper_addr)?;
        }
        validate_address(
            "relay_chain.side_chain_manager_addr",
            &self.relay_chain.side_chain_manager_addr,
        )?;
        validate_address("relay_chain.header_sync_addr", &self.relay_chain.header_sync_addr)?;

        if self.submission.gas_price_multiplier == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: submission.gas_price_multiplier must be at least 1"
            ));
        }
        if self.submission.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: submission.poll_interval_ms must be greater than 0"
            ));
        }
        if let Some(max_wait_ms) = self.submission.max_wait_ms {
            if max_wait_ms < self.submission.poll_interval_ms {
                return Err(anyhow::anyhow!(
                    "Configuration error: submission.max_wait_ms ({}) is shorter than poll_interval_ms ({})",
                    max_wait_ms,
                    self.submission.poll_interval_ms
                ));
            }
        }

        Ok(())
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the TOML file.
    ///
    /// The path comes from `BRIDGE_BOOTSTRAP_CONFIG_PATH`, falling back to
    /// `config/bridge-bootstrap.toml`. A missing file is an error asking the
    /// operator to copy the template.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("BRIDGE_BOOTSTRAP_CONFIG_PATH")
            .unwrap_or_else(|_| "config/bridge-bootstrap.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/bridge-bootstrap.template.toml config/bridge-bootstrap.toml\n\
                Then edit config/bridge-bootstrap.toml with your actual values.",
                config_path
            ))
        }
    }
}
