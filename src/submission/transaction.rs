//! Legacy EIP-155 transaction signing

use ethereum_types::H256;

use crate::crypto::{keccak256, Credential};
use crate::error::BootstrapResult;
use crate::rlp;
use crate::types::{PendingCall, SignedTransaction};

/// Signs `call` as a legacy (pre-EIP-1559) transaction for `chain_id`.
///
/// 1. RLP-encode `[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]`
/// 2. keccak256 and sign the digest
/// 3. `v = recovery_id + chainId * 2 + 35`
/// 4. RLP-encode `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`
pub fn sign_transaction(
    credential: &Credential,
    call: PendingCall,
    chain_id: u64,
) -> BootstrapResult<SignedTransaction> {
    let unsigned_items: Vec<Vec<u8>> = vec![
        rlp::encode_u64(call.nonce),
        rlp::encode_u256(call.gas_price),
        rlp::encode_u64(call.gas_limit),
        call.to.as_bytes().to_vec(),
        rlp::encode_u256(call.value),
        call.payload.clone(),
        rlp::encode_u64(chain_id),
        vec![],
        vec![],
    ];
    let sighash = keccak256(&rlp::encode_list(&unsigned_items));

    let signature = credential.sign_prehash(&sighash)?;
    let v = signature.recovery_id as u64 + chain_id * 2 + 35;

    let signed_items: Vec<Vec<u8>> = vec![
        rlp::encode_u64(call.nonce),
        rlp::encode_u256(call.gas_price),
        rlp::encode_u64(call.gas_limit),
        call.to.as_bytes().to_vec(),
        rlp::encode_u256(call.value),
        call.payload.clone(),
        rlp::encode_u64(v),
        rlp::trim_scalar(&signature.r),
        rlp::trim_scalar(&signature.s),
    ];
    let raw = rlp::encode_list(&signed_items);
    let hash = H256::from(keccak256(&raw));

    Ok(SignedTransaction {
        from: credential.address(),
        call,
        raw,
        hash,
    })
}
