//! RLP encoding helpers
//!
//! Flat lists of byte strings are all the legacy transaction and block header
//! encodings need. Items passed to [`encode_list`] are raw bytes, NOT already
//! RLP-encoded.

use ethereum_types::U256;

/// Encode a u64 as big-endian bytes with no leading zeros (RLP integer format).
pub fn encode_u64(val: u64) -> Vec<u8> {
    if val == 0 {
        return vec![];
    }
    let bytes = val.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(8);
    bytes[start..].to_vec()
}

/// Same as [`encode_u64`] for 256-bit quantities.
pub fn encode_u256(val: U256) -> Vec<u8> {
    let mut bytes = [0u8; 32];
    val.to_big_endian(&mut bytes);
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(32);
    bytes[start..].to_vec()
}

/// Drops leading zero bytes from a big-endian scalar.
pub fn trim_scalar(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn length_prefix(len: usize, short_base: u8, long_base: u8) -> Vec<u8> {
    if len <= 55 {
        vec![short_base + len as u8]
    } else {
        let len_bytes = encode_u64(len as u64);
        let mut out = vec![long_base + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out
    }
}

/// RLP-encode a single byte-string item.
pub fn encode_item(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        // Single byte below 0x80: encoded as itself
        return vec![data[0]];
    }
    let mut out = length_prefix(data.len(), 0x80, 0xb7);
    out.extend_from_slice(data);
    out
}

/// RLP-encode a list of raw byte-string items.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.iter().flat_map(|item| encode_item(item)).collect();
    let mut out = length_prefix(payload.len(), 0xc0, 0xf7);
    out.extend(payload);
    out
}
