//! Genesis header encodings
//!
//! The relay chain verifies side-chain headers from the node's JSON header
//! object; the side chain's manager contract verifies relay headers from their
//! RLP form. Both must match the consumer byte for byte.

use chain_clients_common::{hex_to_bytes, parse_hex_u64};
use chain_clients_evm::EvmBlockHeader;
use ethereum_types::H256;

use crate::crypto::keccak256;
use crate::error::{BootstrapError, BootstrapResult};
use crate::rlp;
use crate::types::parse_h256;

/// A serialized header tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisHeader {
    pub chain_id: u64,
    pub height: u64,
    pub hash: H256,
    pub encoded: Vec<u8>,
}

impl GenesisHeader {
    /// JSON encoding of a side-chain header.
    ///
    /// Only fields modelled by [`EvmBlockHeader`] are serialized, so the
    /// header must first hash back to the reported block hash.
    pub fn from_json_header(chain_id: u64, header: &EvmBlockHeader) -> BootstrapResult<Self> {
        let hash = verify_header_hash(header, &rlp_encode_header(header)?)?;
        let encoded = serde_json::to_vec(header)
            .map_err(|e| BootstrapError::Decode(format!("Failed to serialize header: {}", e)))?;
        Ok(Self {
            chain_id,
            height: parse_hex_u64(&header.number)?,
            hash,
            encoded,
        })
    }

    /// Recovers height and hash from bytes produced by [`from_json_header`](Self::from_json_header).
    pub fn decode_json(chain_id: u64, encoded: &[u8]) -> BootstrapResult<Self> {
        let header: EvmBlockHeader = serde_json::from_slice(encoded)
            .map_err(|e| BootstrapError::Decode(format!("Invalid header JSON: {}", e)))?;
        Ok(Self {
            chain_id,
            height: parse_hex_u64(&header.number)?,
            hash: parse_h256(&header.hash)?,
            encoded: encoded.to_vec(),
        })
    }

    /// RLP encoding of a relay-chain header in canonical field order.
    ///
    /// The keccak of the encoding must equal the hash the node reports;
    /// otherwise the side chain would be seeded with a header it cannot link.
    pub fn from_rlp_header(chain_id: u64, header: &EvmBlockHeader) -> BootstrapResult<Self> {
        let encoded = rlp_encode_header(header)?;
        let hash = verify_header_hash(header, &encoded)?;
        Ok(Self {
            chain_id,
            height: parse_hex_u64(&header.number)?,
            hash,
            encoded,
        })
    }
}

fn verify_header_hash(header: &EvmBlockHeader, encoded: &[u8]) -> BootstrapResult<H256> {
    let hash = parse_h256(&header.hash)?;
    let computed = H256::from(keccak256(encoded));
    if computed != hash {
        return Err(BootstrapError::Decode(format!(
            "Header {} encodes to {:?} but node reports hash {:?}",
            header.number, computed, hash
        )));
    }
    Ok(hash)
}

/// `[parentHash, uncles, miner, stateRoot, txRoot, receiptRoot, bloom,
/// difficulty, number, gasLimit, gasUsed, time, extra, mixDigest, nonce,
/// baseFee?, withdrawalsRoot?, blobGasUsed?, excessBlobGas?,
/// parentBeaconRoot?, requestsHash?]`
///
/// Fork fields are positional, so a later one present without an earlier
/// one is rejected.
pub fn rlp_encode_header(header: &EvmBlockHeader) -> BootstrapResult<Vec<u8>> {
    let bytes = |s: &str| hex_to_bytes(s).map_err(BootstrapError::from);
    let scalar = |s: &str| hex_to_bytes(s).map(|b| rlp::trim_scalar(&b)).map_err(BootstrapError::from);

    let mut items = vec![
        bytes(&header.parent_hash)?,
        bytes(&header.sha3_uncles)?,
        bytes(&header.miner)?,
        bytes(&header.state_root)?,
        bytes(&header.transactions_root)?,
        bytes(&header.receipts_root)?,
        bytes(&header.logs_bloom)?,
        scalar(&header.difficulty)?,
        scalar(&header.number)?,
        scalar(&header.gas_limit)?,
        scalar(&header.gas_used)?,
        scalar(&header.timestamp)?,
        bytes(&header.extra_data)?,
        bytes(&header.mix_hash)?,
        bytes(&header.nonce)?,
    ];

    let forks: [(&str, &Option<String>, bool); 6] = [
        ("baseFeePerGas", &header.base_fee_per_gas, true),
        ("withdrawalsRoot", &header.withdrawals_root, false),
        ("blobGasUsed", &header.blob_gas_used, true),
        ("excessBlobGas", &header.excess_blob_gas, true),
        ("parentBeaconBlockRoot", &header.parent_beacon_block_root, false),
        ("requestsHash", &header.requests_hash, false),
    ];
    let mut missing = None;
    for (name, field, is_scalar) in forks {
        match (field, missing) {
            (Some(_), Some(gap)) => {
                return Err(BootstrapError::Decode(format!(
                    "Header {} carries {} without {}",
                    header.number, name, gap
                )));
            }
            (Some(value), None) if is_scalar => items.push(scalar(value.as_str())?),
            (Some(value), None) => items.push(bytes(value.as_str())?),
            (None, _) => missing = missing.or(Some(name)),
        }
    }
    Ok(rlp::encode_list(&items))
}
