//! Shared utilities for the bridge chain clients
//!
//! Hex handling used by both the JSON-RPC transport and the bootstrap tooling.
//! Nodes hand back quantities and byte strings as `0x`-prefixed hex; these
//! helpers keep the parsing rules in one place.

use std::fmt;

// ============================================================================
// ERRORS
// ============================================================================

/// Error returned when a hex string cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexError {
    pub input: String,
    pub reason: String,
}

impl fmt::Display for HexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid hex '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for HexError {}

fn hex_error(input: &str, reason: impl Into<String>) -> HexError {
    HexError {
        input: input.to_string(),
        reason: reason.into(),
    }
}

// ============================================================================
// HEX HELPERS
// ============================================================================

/// Strips a leading `0x` or `0X` if present.
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parses a hex quantity (`"0x1a"`) into a u64.
///
/// An empty quantity (`"0x"`) is treated as zero, matching how some nodes
/// encode a zero nonce.
pub fn parse_hex_u64(s: &str) -> Result<u64, HexError> {
    let digits = strip_0x(s);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| hex_error(s, e.to_string()))
}

/// Formats a u64 as a JSON-RPC quantity (`0x` prefix, no leading zeros).
pub fn format_hex_u64(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Decodes a hex byte string, accepting an optional `0x` prefix and an odd
/// number of digits (left-padded with a zero nibble).
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, HexError> {
    let digits = strip_0x(s);
    let decoded = if digits.len() % 2 == 1 {
        hex::decode(format!("0{}", digits))
    } else {
        hex::decode(digits)
    };
    decoded.map_err(|e| hex_error(s, e.to_string()))
}

/// Encodes bytes as a `0x`-prefixed lowercase hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decodes a hex string that must be exactly `N` bytes long.
pub fn hex_to_array<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let bytes = hex_to_bytes(s)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| hex_error(s, format!("expected {} bytes, got {}", N, bytes.len())))
}

/// Normalizes a 20-byte EVM address to lowercase `0x` form.
pub fn normalize_evm_address(s: &str) -> Result<String, HexError> {
    let bytes: [u8; 20] = hex_to_array(s)?;
    Ok(bytes_to_hex(&bytes))
}
