//! Relay validator (bookkeeper) sets

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;

use crate::error::{BootstrapError, BootstrapResult};

/// Key-type byte for ECDSA in the relay chain's key serialization.
const KEY_TYPE_ECDSA: u8 = 0x12;
/// Curve label for secp256k1 in the relay chain's key serialization.
const CURVE_SECP256K1: u8 = 0x05;

/// Ordered public keys authorised at `epoch_height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSet {
    pub epoch_height: u64,
    pub keys: Vec<PublicKey>,
}

impl ValidatorSet {
    /// Parses keys as reported by the relay chain.
    ///
    /// Accepts 33-byte compressed, 65-byte uncompressed, and the relay's
    /// typed form (`0x12 0x05` followed by either).
    pub fn from_raw(epoch_height: u64, raw_keys: &[Vec<u8>]) -> BootstrapResult<Self> {
        if raw_keys.is_empty() {
            return Err(BootstrapError::Decode(format!(
                "empty validator set at height {}",
                epoch_height
            )));
        }
        let keys = raw_keys
            .iter()
            .enumerate()
            .map(|(i, raw)| parse_key(raw).map_err(|e| BootstrapError::Decode(format!("validator {}: {}", i, e))))
            .collect::<BootstrapResult<Vec<_>>>()?;
        Ok(Self { epoch_height, keys })
    }

    /// Non-compressed encoding: for each key in order,
    /// `0x12 || 0x05 || 65-byte uncompressed SEC1 point`, concatenated.
    pub fn encode_uncompressed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.keys.len() * 67);
        for key in &self.keys {
            out.push(KEY_TYPE_ECDSA);
            out.push(CURVE_SECP256K1);
            out.extend_from_slice(key.to_encoded_point(false).as_bytes());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn parse_key(raw: &[u8]) -> Result<PublicKey, String> {
    let sec1 = match raw {
        [KEY_TYPE_ECDSA, CURVE_SECP256K1, rest @ ..] if rest.len() == 33 || rest.len() == 65 => rest,
        [KEY_TYPE_ECDSA, curve, ..] if *curve != CURVE_SECP256K1 => return Err(format!("unsupported curve label 0x{:02x}", curve)),
        _ if raw.len() == 33 || raw.len() == 65 => raw,
        _ => return Err(format!("unexpected key length {}", raw.len())),
    };
    PublicKey::from_sec1_bytes(sec1).map_err(|e| format!("invalid secp256k1 key: {}", e))
}
