//! Cryptographic Operations Module
//!
//! Holds a local secp256k1 signing credential and derives its EVM address.
//! The credential only signs; it never talks to a node.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: Private keys must never be exposed or logged. `Debug` output
//! of [`Credential`] shows the address only.

use std::fmt;

use ethereum_types::Address;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::error::{BootstrapError, BootstrapResult};

// ============================================================================
// SIGNING CREDENTIAL
// ============================================================================

/// ECDSA signature split into its EVM components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// 0 or 1
    pub recovery_id: u8,
}

/// One local signing key plus its derived address.
pub struct Credential {
    signing_key: SigningKey,
    address: Address,
}

impl Credential {
    /// Builds a credential from a 32-byte hex private key (optional `0x`).
    pub fn from_hex(private_key_hex: &str) -> anyhow::Result<Self> {
        let bytes: [u8; 32] = chain_clients_common::hex_to_array(private_key_hex.trim())
            .map_err(|_| anyhow::anyhow!("Invalid private key: expected 32 hex-encoded bytes"))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(secret: &[u8; 32]) -> anyhow::Result<Self> {
        let signing_key = SigningKey::from_bytes(&(*secret).into())
            .map_err(|e| anyhow::anyhow!("Failed to create ECDSA signing key: {}", e))?;
        let address = ethereum_address(signing_key.verifying_key());
        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// 65-byte uncompressed SEC1 public key (`0x04 || x || y`).
    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Signs a 32-byte prehash (no message prefix) and works out the recovery id.
    pub fn sign_prehash(&self, hash: &[u8; 32]) -> BootstrapResult<RecoverableSignature> {
        let signature: Signature = self
            .signing_key
            .sign_prehash(hash)
            .map_err(|e| BootstrapError::Signing(format!("Failed to sign transaction hash: {}", e)))?;
        // Low-S form; the chain rejects high-S signatures
        let signature = signature.normalize_s().unwrap_or(signature);

        let sig_bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&sig_bytes[..32]);
        s.copy_from_slice(&sig_bytes[32..64]);

        let own_key = self.signing_key.verifying_key();
        let recovery_id = [0u8, 1u8]
            .into_iter()
            .find(|candidate| {
                RecoveryId::try_from(*candidate)
                    .ok()
                    .and_then(|rid| VerifyingKey::recover_from_prehash(hash, &signature, rid).ok())
                    .map(|recovered| &recovered == own_key)
                    .unwrap_or(false)
            })
            .ok_or_else(|| BootstrapError::Signing("Could not determine recovery id".to_string()))?;

        Ok(RecoverableSignature { r, s, recovery_id })
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// keccak256(uncompressed public key without 0x04)[12..32]
pub fn ethereum_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let mut hasher = Keccak256::new();
    hasher.update(&point.as_bytes()[1..]);
    let hash = hasher.finalize();
    Address::from_slice(&hash[12..32])
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}
