//! ABI registry and word codec
//!
//! Function selectors and event topics are computed once in [`AbiRegistry::new`]
//! and the registry is shared by reference. The codec covers the handful of
//! static and dynamic types the bridge entry points use.

use ethereum_types::{Address, H256, U256};

use crate::crypto::keccak256;
use crate::error::{BootstrapError, BootstrapResult};

pub const REGISTER_SIDE_CHAIN: &str = "registerSideChain(uint64,address,uint64,string)";
pub const APPROVE_REGISTER_SIDE_CHAIN: &str = "approveRegisterSideChain(uint64)";
pub const SYNC_GENESIS_BLOCK: &str = "syncGenesisBlock(uint64,bytes)";
pub const INIT_GENESIS_BLOCK: &str = "initGenesisBlock(bytes,bytes)";
pub const BALANCE_OF: &str = "balanceOf(address)";
/// Asset wrapper entry point: fromAsset, toChainId, toAddress, amount, fee, id
pub const WRAPPER_LOCK: &str = "lock(address,uint64,bytes,uint256,uint256,uint256)";

pub const LOCK_EVENT: &str = "lock(address,address,uint64,bytes,bytes,uint256)";
pub const UNLOCK_EVENT: &str = "unlock(address,address,uint256)";

// ============================================================================
// REGISTRY
// ============================================================================

/// Immutable table of selectors and event topics.
#[derive(Debug, Clone)]
pub struct AbiRegistry {
    functions: Vec<(&'static str, [u8; 4])>,
    events: Vec<(&'static str, H256)>,
}

impl AbiRegistry {
    pub fn new() -> Self {
        let functions = [
            REGISTER_SIDE_CHAIN,
            APPROVE_REGISTER_SIDE_CHAIN,
            SYNC_GENESIS_BLOCK,
            INIT_GENESIS_BLOCK,
            BALANCE_OF,
            WRAPPER_LOCK,
        ]
        .into_iter()
        .map(|sig| (sig, selector(sig)))
        .collect();

        let events = [("lock", LOCK_EVENT), ("unlock", UNLOCK_EVENT)]
            .into_iter()
            .map(|(name, sig)| (name, event_topic(sig)))
            .collect();

        Self { functions, events }
    }

    /// Selector for a known function signature.
    pub fn selector(&self, signature: &str) -> BootstrapResult<[u8; 4]> {
        self.functions
            .iter()
            .find(|(sig, _)| *sig == signature)
            .map(|(_, sel)| *sel)
            .ok_or_else(|| BootstrapError::Decode(format!("unknown function signature {}", signature)))
    }

    /// Topic hash for a known event name ("lock" / "unlock").
    pub fn event_topic(&self, name: &str) -> BootstrapResult<H256> {
        self.events
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, topic)| *topic)
            .ok_or_else(|| BootstrapError::Decode(format!("unknown event {}", name)))
    }

    /// Reverse lookup used when dumping receipt logs.
    pub fn event_name(&self, topic: &H256) -> Option<&'static str> {
        self.events
            .iter()
            .find(|(_, t)| t == topic)
            .map(|(name, _)| *name)
    }

    /// Reverse lookup of a calldata selector.
    pub fn function_for(&self, calldata: &[u8]) -> Option<&'static str> {
        let sel = calldata.get(..4)?;
        self.functions
            .iter()
            .find(|(_, s)| s.as_slice() == sel)
            .map(|(sig, _)| *sig)
    }

    /// Selector followed by the ABI-encoded arguments.
    pub fn encode_call(&self, signature: &str, args: &[AbiToken]) -> BootstrapResult<Vec<u8>> {
        let mut data = self.selector(signature)?.to_vec();
        data.extend(encode(args));
        Ok(data)
    }
}

impl Default for AbiRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn event_topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

// ============================================================================
// ENCODING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiToken {
    Address(Address),
    Uint(U256),
    Bytes(Vec<u8>),
    String(String),
}

/// Parameter kinds understood by [`decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiKind {
    Address,
    Uint,
    Bytes,
    String,
}

impl AbiToken {
    fn is_dynamic(&self) -> bool {
        matches!(self, AbiToken::Bytes(_) | AbiToken::String(_))
    }

    pub fn into_address(self) -> Option<Address> {
        match self {
            AbiToken::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_uint(self) -> Option<U256> {
        match self {
            AbiToken::Uint(u) => Some(u),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            AbiToken::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            AbiToken::String(s) => Some(s),
            _ => None,
        }
    }
}

pub fn uint_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Length word followed by the data right-padded to a 32-byte boundary.
fn dynamic_tail(data: &[u8]) -> Vec<u8> {
    let mut out = uint_word(U256::from(data.len())).to_vec();
    out.extend_from_slice(data);
    let padding = (32 - (data.len() % 32)) % 32;
    out.extend(std::iter::repeat(0u8).take(padding));
    out
}

/// ABI-encodes a parameter tuple: static heads, then offsets into the dynamic tail.
pub fn encode(tokens: &[AbiToken]) -> Vec<u8> {
    let head_len = tokens.len() * 32;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word(U256::from(head_len + tail.len())));
        }
        match token {
            AbiToken::Address(a) => head.extend_from_slice(&address_word(a)),
            AbiToken::Uint(u) => head.extend_from_slice(&uint_word(*u)),
            AbiToken::Bytes(b) => tail.extend(dynamic_tail(b)),
            AbiToken::String(s) => tail.extend(dynamic_tail(s.as_bytes())),
        }
    }

    head.extend(tail);
    head
}

// ============================================================================
// DECODING
// ============================================================================

fn word_at(data: &[u8], offset: usize) -> BootstrapResult<&[u8]> {
    data.get(offset..offset + 32).ok_or_else(|| {
        BootstrapError::Decode(format!(
            "ABI data too short: need word at {}, have {} bytes",
            offset,
            data.len()
        ))
    })
}

fn word_as_usize(word: &[u8]) -> BootstrapResult<usize> {
    let value = U256::from_big_endian(word);
    if value > U256::from(u32::MAX) {
        return Err(BootstrapError::Decode(format!("ABI offset or length {} out of range", value)));
    }
    Ok(value.low_u64() as usize)
}

fn decode_dynamic(data: &[u8], head_word: &[u8]) -> BootstrapResult<Vec<u8>> {
    let offset = word_as_usize(head_word)?;
    let len = word_as_usize(word_at(data, offset)?)?;
    let start = offset + 32;
    data.get(start..start + len)
        .map(|b| b.to_vec())
        .ok_or_else(|| BootstrapError::Decode(format!("ABI dynamic value of {} bytes overruns data", len)))
}

/// Decodes a parameter tuple laid out as [`encode`] produces it.
pub fn decode(kinds: &[AbiKind], data: &[u8]) -> BootstrapResult<Vec<AbiToken>> {
    kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let word = word_at(data, i * 32)?;
            Ok(match kind {
                AbiKind::Address => {
                    if word[..12].iter().any(|b| *b != 0) {
                        return Err(BootstrapError::Decode(format!(
                            "ABI word {} is not a left-padded address",
                            i
                        )));
                    }
                    AbiToken::Address(Address::from_slice(&word[12..]))
                }
                AbiKind::Uint => AbiToken::Uint(U256::from_big_endian(word)),
                AbiKind::Bytes => AbiToken::Bytes(decode_dynamic(data, word)?),
                AbiKind::String => {
                    let raw = decode_dynamic(data, word)?;
                    AbiToken::String(
                        String::from_utf8(raw)
                            .map_err(|e| BootstrapError::Decode(format!("ABI string is not UTF-8: {}", e)))?,
                    )
                }
            })
        })
        .collect()
}
