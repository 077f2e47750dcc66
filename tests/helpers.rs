//! Shared test helpers for bridge bootstrap tests
//!
//! Constants plus an in-memory chain that implements `ChainRpc`, including a
//! minimal relay chain side chain manager and a side chain bridge manager.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_bootstrap::abi::{self, AbiKind, AbiRegistry, AbiToken};
use bridge_bootstrap::config::{EventsConfig, LogCountSeverity};
use bridge_bootstrap::crypto::{keccak256, Credential};
use bridge_bootstrap::error::{BootstrapError, BootstrapResult};
use bridge_bootstrap::events::{encode_event_data, TransferEvent};
use bridge_bootstrap::genesis::rlp_encode_header;
use bridge_bootstrap::rpc::{ChainRpc, ValidatorSource};
use bridge_bootstrap::submission::{ConfirmationWait, SubmissionEngine, SubmissionSettings};
use bridge_bootstrap::types::{BlockTag, ConfirmationRecord, LogEntry, SignedTransaction};
use chain_clients_evm::{CallOutcome, EvmBlockHeader};
use ethereum_types::{Address, H256, U256};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Side chain EIP-155 chain id
pub const DUMMY_SIDE_CHAIN_ID: u64 = 101;

/// Relay chain EIP-155 chain id
pub const DUMMY_RELAY_CHAIN_ID: u64 = 60801;

/// Cross-chain id of the side chain on the relay chain
pub const DUMMY_CROSS_CHAIN_ID: u64 = 201;

/// Side chain name registered on the relay chain
pub const DUMMY_SIDE_CHAIN_NAME: &str = "palette-test";

/// Cross-chain data contract on the side chain
pub const DUMMY_DATA_CONTRACT_ADDR: &str = "0xabcd000000000000000000000000000000000001";

/// Cross-chain manager contract on the side chain
pub const DUMMY_SIDE_MANAGER_ADDR: &str = "0x0000000000000000000000000000000000000102";

/// Lock proxy on the side chain
pub const DUMMY_LOCK_PROXY_ADDR: &str = "0x0000000000000000000000000000000000000103";

/// Relay side chain manager entry point
pub const DUMMY_RELAY_MANAGER_ADDR: &str = "0x0000000000000000000000000000000000001004";

/// Relay header sync entry point
pub const DUMMY_HEADER_SYNC_ADDR: &str = "0x0000000000000000000000000000000000001005";

/// Token asset on the side chain
pub const DUMMY_TOKEN_ADDR: &str = "0x000000000000000000000000000000000000000a";

/// A user account
pub const DUMMY_USER_ADDR: &str = "0x0000000000000000000000000000000000000006";

/// Suggested gas price returned by fake nodes
pub const DUMMY_GAS_PRICE: u64 = 1_000_000_000;

pub fn addr(s: &str) -> Address {
    bridge_bootstrap::types::parse_address(s).unwrap()
}

/// Deterministic credential for test index `i`.
pub fn test_credential(i: u8) -> Arc<Credential> {
    let mut secret = [0u8; 32];
    secret[31] = i + 1;
    secret[0] = 0x42;
    Arc::new(Credential::from_bytes(&secret).unwrap())
}

pub fn settings(chain_id: u64) -> SubmissionSettings {
    SubmissionSettings {
        chain_id,
        gas_limit: 100_000,
        gas_price_multiplier: 1,
        wait: ConfirmationWait {
            poll_interval: Duration::from_secs(1),
            max_wait: None,
        },
    }
}

pub fn engine(chain: &Arc<FakeChain>, credential: Arc<Credential>, chain_id: u64) -> SubmissionEngine {
    SubmissionEngine::new(
        credential,
        chain.clone(),
        Arc::new(AbiRegistry::new()),
        settings(chain_id),
    )
}

pub fn events_config(min_log_count: usize, severity: LogCountSeverity) -> EventsConfig {
    EventsConfig {
        min_log_count,
        log_count_severity: severity,
    }
}

/// A header whose fields are all well-formed hex.
/// London-era header whose `hash` is the keccak of its own RLP encoding.
pub fn sample_header(number: u64) -> EvmBlockHeader {
    let mut header = EvmBlockHeader {
        parent_hash: format!("0x{}", "11".repeat(32)),
        sha3_uncles: format!("0x{}", "1d".repeat(32)),
        miner: "0x0000000000000000000000000000000000000000".to_string(),
        state_root: format!("0x{}", "22".repeat(32)),
        transactions_root: format!("0x{}", "33".repeat(32)),
        receipts_root: format!("0x{}", "44".repeat(32)),
        logs_bloom: format!("0x{}", "00".repeat(256)),
        difficulty: "0x1".to_string(),
        number: format!("0x{:x}", number),
        gas_limit: "0x1c9c380".to_string(),
        gas_used: "0x0".to_string(),
        timestamp: "0x6553f100".to_string(),
        extra_data: "0x".to_string(),
        mix_hash: format!("0x{}", "55".repeat(32)),
        nonce: "0x0000000000000000".to_string(),
        base_fee_per_gas: Some("0x7".to_string()),
        withdrawals_root: None,
        blob_gas_used: None,
        excess_blob_gas: None,
        parent_beacon_block_root: None,
        requests_hash: None,
        hash: String::new(),
    };
    let encoded = rlp_encode_header(&header).unwrap();
    header.hash = chain_clients_common::bytes_to_hex(&keccak256(&encoded));
    header
}

// ============================================================================
// FAKE CHAIN
// ============================================================================

/// Relay chain registration record.
#[derive(Debug, Clone)]
pub struct SideChainEntry {
    pub data_contract: Address,
    pub router: u64,
    pub name: String,
    pub approvals: HashSet<Address>,
    pub active: bool,
}

#[derive(Debug, Clone)]
struct FakeTx {
    signed: SignedTransaction,
    polls_until_mined: u32,
    record: ConfirmationRecord,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub pending_nonces: HashMap<Address, u64>,
    pub gas_price: U256,
    /// Remaining pending-nonce queries that fail
    pub nonce_failures: u32,
    pub nonce_queries: u32,
    /// Polls each new transaction stays pending
    pub pending_polls: u32,
    /// Transactions never leave the pool
    pub never_mine: bool,
    /// Remaining is_pending calls that fail
    pub poll_failures: u32,
    pub poll_count: u32,
    /// Remaining broadcasts the node rejects
    pub broadcast_failures: u32,
    pub block_number: u64,
    pub broadcasts: Vec<SignedTransaction>,
    pub simulations: u32,
    txs: HashMap<H256, FakeTx>,
    /// Destinations whose execution fails on chain
    pub reverting: HashSet<Address>,
    /// Destinations that pass simulation but fail once mined
    pub revert_after_simulation: HashSet<Address>,
    /// Logs emitted by calls to a destination
    pub emitted_logs: HashMap<Address, Vec<LogEntry>>,
    pub headers: HashMap<u64, EvmBlockHeader>,
    pub latest_header: Option<u64>,

    // relay chain side chain manager
    pub quorum: usize,
    pub side_chains: HashMap<u64, SideChainEntry>,
    pub synced_genesis: HashMap<u64, Vec<u8>>,

    // side chain bridge manager
    pub initialized_genesis: Option<(Vec<u8>, Vec<u8>)>,

    // side chain asset wrappers
    /// Wrapper address to the lock proxy it forwards to
    pub lock_wrappers: HashMap<Address, Address>,
    /// Subtracted from the amount the proxy reports locking
    pub lock_shortfall: U256,
}

pub struct FakeChain {
    pub registry: AbiRegistry,
    pub state: Mutex<FakeState>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: AbiRegistry::new(),
            state: Mutex::new(FakeState {
                gas_price: U256::from(DUMMY_GAS_PRICE),
                block_number: 100,
                quorum: 1,
                ..FakeState::default()
            }),
        })
    }

    pub fn with_state(f: impl FnOnce(&mut FakeState)) -> Arc<Self> {
        let chain = Self::new();
        chain.update(f);
        chain
    }

    pub fn update(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn read<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    pub fn broadcast_nonces(&self) -> Vec<u64> {
        self.read(|s| s.broadcasts.iter().map(|t| t.call.nonce).collect())
    }

    /// Checks a call against contract state; `Err(message)` is a revert.
    fn check_call(&self, state: &FakeState, from: Address, to: Address, data: &[u8]) -> Result<(), String> {
        if state.reverting.contains(&to) {
            return Err("execution reverted".to_string());
        }
        let Some(function) = self.registry.function_for(data) else {
            return Ok(());
        };
        let args = &data[4..];
        match function {
            abi::REGISTER_SIDE_CHAIN => {
                let tokens = abi::decode(&[AbiKind::Uint, AbiKind::Address, AbiKind::Uint, AbiKind::String], args)
                    .map_err(|e| e.to_string())?;
                let id = tokens[0].clone().into_uint().unwrap_or_default().low_u64();
                if state.side_chains.contains_key(&id) {
                    return Err(format!("execution reverted: side chain {} already registered", id));
                }
                Ok(())
            }
            abi::APPROVE_REGISTER_SIDE_CHAIN => {
                let tokens = abi::decode(&[AbiKind::Uint], args).map_err(|e| e.to_string())?;
                let id = tokens[0].clone().into_uint().unwrap_or_default().low_u64();
                match state.side_chains.get(&id) {
                    None => Err(format!("execution reverted: side chain {} not registered", id)),
                    Some(entry) if entry.approvals.contains(&from) => {
                        Err("execution reverted: sender already approved".to_string())
                    }
                    Some(_) => Ok(()),
                }
            }
            abi::SYNC_GENESIS_BLOCK => {
                let tokens = abi::decode(&[AbiKind::Uint, AbiKind::Bytes], args).map_err(|e| e.to_string())?;
                let id = tokens[0].clone().into_uint().unwrap_or_default().low_u64();
                if state.synced_genesis.contains_key(&id) {
                    return Err("execution reverted: genesis header already synced".to_string());
                }
                Ok(())
            }
            abi::INIT_GENESIS_BLOCK => {
                if state.initialized_genesis.is_some() {
                    return Err("execution reverted: genesis already initialized".to_string());
                }
                Ok(())
            }
            abi::WRAPPER_LOCK => {
                let lock = decode_wrapper_lock(args).map_err(|e| e.to_string())?;
                if lock.amount <= lock.fee {
                    return Err("execution reverted: amount should be greater than fee".to_string());
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Applies a successful call's effects and returns any logs it emits.
    fn apply_call(&self, state: &mut FakeState, from: Address, to: Address, data: &[u8]) -> Vec<LogEntry> {
        let Some(function) = self.registry.function_for(data) else {
            return vec![];
        };
        let args = &data[4..];
        match function {
            abi::REGISTER_SIDE_CHAIN => {
                let tokens = abi::decode(&[AbiKind::Uint, AbiKind::Address, AbiKind::Uint, AbiKind::String], args).unwrap();
                let mut it = tokens.into_iter();
                let id = it.next().and_then(AbiToken::into_uint).unwrap().low_u64();
                let data_contract = it.next().and_then(AbiToken::into_address).unwrap();
                let router = it.next().and_then(AbiToken::into_uint).unwrap().low_u64();
                let name = it.next().and_then(AbiToken::into_string).unwrap();
                state.side_chains.insert(
                    id,
                    SideChainEntry {
                        data_contract,
                        router,
                        name,
                        approvals: HashSet::new(),
                        active: false,
                    },
                );
            }
            abi::APPROVE_REGISTER_SIDE_CHAIN => {
                let tokens = abi::decode(&[AbiKind::Uint], args).unwrap();
                let id = tokens[0].clone().into_uint().unwrap().low_u64();
                let quorum = state.quorum;
                if let Some(entry) = state.side_chains.get_mut(&id) {
                    entry.approvals.insert(from);
                    if entry.approvals.len() >= quorum {
                        entry.active = true;
                    }
                }
            }
            abi::SYNC_GENESIS_BLOCK => {
                let tokens = abi::decode(&[AbiKind::Uint, AbiKind::Bytes], args).unwrap();
                let mut it = tokens.into_iter();
                let id = it.next().and_then(AbiToken::into_uint).unwrap().low_u64();
                let header = it.next().and_then(AbiToken::into_bytes).unwrap();
                state.synced_genesis.insert(id, header);
            }
            abi::INIT_GENESIS_BLOCK => {
                let tokens = abi::decode(&[AbiKind::Bytes, AbiKind::Bytes], args).unwrap();
                let mut it = tokens.into_iter();
                let header = it.next().and_then(AbiToken::into_bytes).unwrap();
                let keys = it.next().and_then(AbiToken::into_bytes).unwrap();
                state.initialized_genesis = Some((header, keys));
            }
            abi::WRAPPER_LOCK => {
                let Some(proxy) = state.lock_wrappers.get(&to).copied() else {
                    return vec![];
                };
                let lock = decode_wrapper_lock(args).unwrap();
                let event = TransferEvent::Lock {
                    from_asset: lock.from_asset,
                    from_address: to,
                    to_chain_id: lock.to_chain_id,
                    to_asset: lock.from_asset.as_bytes().to_vec(),
                    to_address: lock.to_address,
                    amount: lock.amount - lock.fee - state.lock_shortfall,
                };
                return vec![
                    LogEntry {
                        address: lock.from_asset,
                        topics: vec![abi::event_topic("Transfer(address,address,uint256)")],
                        data: abi::uint_word(lock.amount).to_vec(),
                    },
                    LogEntry {
                        address: proxy,
                        topics: vec![self.registry.event_topic("lock").unwrap()],
                        data: encode_event_data(&event),
                    },
                    LogEntry {
                        address: addr(DUMMY_SIDE_MANAGER_ADDR),
                        topics: vec![H256::repeat_byte(0xcc)],
                        data: vec![],
                    },
                ];
            }
            _ => {}
        }
        vec![]
    }
}

/// Wrapper `lock` arguments as the fake chain sees them.
struct WrapperLock {
    from_asset: Address,
    to_chain_id: u64,
    to_address: Vec<u8>,
    amount: U256,
    fee: U256,
}

fn decode_wrapper_lock(args: &[u8]) -> BootstrapResult<WrapperLock> {
    let kinds = [
        AbiKind::Address,
        AbiKind::Uint,
        AbiKind::Bytes,
        AbiKind::Uint,
        AbiKind::Uint,
        AbiKind::Uint,
    ];
    let mut it = abi::decode(&kinds, args)?.into_iter();
    let malformed = || BootstrapError::Decode("malformed wrapper lock".to_string());
    Ok(WrapperLock {
        from_asset: it.next().and_then(AbiToken::into_address).ok_or_else(malformed)?,
        to_chain_id: it.next().and_then(AbiToken::into_uint).ok_or_else(malformed)?.low_u64(),
        to_address: it.next().and_then(AbiToken::into_bytes).ok_or_else(malformed)?,
        amount: it.next().and_then(AbiToken::into_uint).ok_or_else(malformed)?,
        fee: it.next().and_then(AbiToken::into_uint).ok_or_else(malformed)?,
    })
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn pending_nonce(&self, address: Address) -> BootstrapResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.nonce_queries += 1;
        if state.nonce_failures > 0 {
            state.nonce_failures -= 1;
            return Err(BootstrapError::ChainUnavailable(anyhow::anyhow!("connection refused")));
        }
        Ok(*state.pending_nonces.get(&address).unwrap_or(&0))
    }

    async fn suggest_gas_price(&self) -> BootstrapResult<U256> {
        Ok(self.state.lock().unwrap().gas_price)
    }

    async fn block_number(&self) -> BootstrapResult<u64> {
        Ok(self.state.lock().unwrap().block_number)
    }

    async fn header(&self, tag: BlockTag) -> BootstrapResult<Option<EvmBlockHeader>> {
        let state = self.state.lock().unwrap();
        let height = match tag {
            BlockTag::Latest => match state.latest_header {
                Some(h) => h,
                None => return Ok(None),
            },
            BlockTag::Number(n) => n,
        };
        Ok(state.headers.get(&height).cloned())
    }

    async fn is_pending(&self, tx_hash: H256) -> BootstrapResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.poll_count += 1;
        if state.poll_failures > 0 {
            state.poll_failures -= 1;
            return Err(BootstrapError::ChainUnavailable(anyhow::anyhow!("poll timed out")));
        }
        if state.never_mine {
            return Ok(true);
        }
        match state.txs.get_mut(&tx_hash) {
            Some(tx) if tx.polls_until_mined > 0 => {
                tx.polls_until_mined -= 1;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(true),
        }
    }

    async fn receipt(&self, tx_hash: H256) -> BootstrapResult<Option<ConfirmationRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .txs
            .get(&tx_hash)
            .filter(|tx| tx.polls_until_mined == 0 && !state.never_mine)
            .map(|tx| tx.record.clone()))
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> BootstrapResult<H256> {
        let mut state = self.state.lock().unwrap();
        if state.broadcast_failures > 0 {
            state.broadcast_failures -= 1;
            return Err(BootstrapError::ChainUnavailable(anyhow::anyhow!("nonce too low")));
        }

        state.block_number += 1;
        let success = !state.revert_after_simulation.contains(&tx.call.to)
            && self
                .check_call(&state, tx.from, tx.call.to, &tx.call.payload)
                .is_ok();
        let mut logs = vec![];
        if success {
            logs = state.emitted_logs.get(&tx.call.to).cloned().unwrap_or_default();
            logs.extend(self.apply_call(&mut state, tx.from, tx.call.to, &tx.call.payload));
        }
        let record = ConfirmationRecord {
            tx_hash: tx.hash,
            block_number: state.block_number,
            success,
            logs,
        };
        let next = state.pending_nonces.entry(tx.from).or_insert(0);
        *next = (*next).max(tx.call.nonce + 1);
        let polls_until_mined = state.pending_polls;
        state.txs.insert(
            tx.hash,
            FakeTx {
                signed: tx.clone(),
                polls_until_mined,
                record,
            },
        );
        state.broadcasts.push(tx.clone());
        Ok(tx.hash)
    }

    async fn simulate(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
        _block: BlockTag,
    ) -> BootstrapResult<CallOutcome> {
        let mut state = self.state.lock().unwrap();
        state.simulations += 1;
        Ok(match self.check_call(&state, from, to, data) {
            Ok(()) => CallOutcome::Success(vec![]),
            Err(message) => CallOutcome::Reverted { message, data: None },
        })
    }
}

/// Fixed validator keys per height.
pub struct FakeValidators {
    pub keys: HashMap<u64, Vec<Vec<u8>>>,
}

#[async_trait]
impl ValidatorSource for FakeValidators {
    async fn validator_keys(&self, height: u64) -> BootstrapResult<Vec<Vec<u8>>> {
        self.keys.get(&height).cloned().ok_or_else(|| {
            BootstrapError::ChainUnavailable(anyhow::anyhow!("no validators at height {}", height))
        })
    }
}
