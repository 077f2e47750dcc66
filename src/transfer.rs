//! Lock submission through the asset wrapper
//!
//! The wrapper keeps its fee and forwards the rest to the lock proxy, whose
//! `lock` event is then decoded from the same receipt and compared with the
//! request.

use ethereum_types::{Address, U256};
use tracing::info;

use crate::abi::{self, AbiRegistry, AbiToken};
use crate::error::{BootstrapError, BootstrapResult};
use crate::events::{EventDecoder, EventKind, TransferEvent};
use crate::submission::{CancellationToken, SubmissionEngine};
use crate::types::ConfirmationRecord;

/// Arguments of the wrapper's `lock` entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub from_asset: Address,
    pub to_chain_id: u64,
    /// Recipient on the target chain, in that chain's encoding
    pub to_address: Vec<u8>,
    /// Gross amount pulled from the sender, fee included
    pub amount: U256,
    pub fee: U256,
    pub id: U256,
}

impl LockRequest {
    pub fn encode_call(&self, registry: &AbiRegistry) -> BootstrapResult<Vec<u8>> {
        registry.encode_call(
            abi::WRAPPER_LOCK,
            &[
                AbiToken::Address(self.from_asset),
                AbiToken::Uint(U256::from(self.to_chain_id)),
                AbiToken::Bytes(self.to_address.clone()),
                AbiToken::Uint(self.amount),
                AbiToken::Uint(self.fee),
                AbiToken::Uint(self.id),
            ],
        )
    }

    /// Amount the lock proxy receives after the wrapper fee.
    pub fn net_amount(&self) -> BootstrapResult<U256> {
        match self.amount.checked_sub(self.fee) {
            Some(net) if !net.is_zero() => Ok(net),
            _ => Err(BootstrapError::ProtocolViolation(format!(
                "lock amount {} must exceed fee {}",
                self.amount, self.fee
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockReport {
    pub record: ConfirmationRecord,
    pub event: TransferEvent,
}

/// Submits `request` to `wrapper` and verifies the proxy's lock event.
///
/// # Returns
///
/// * `Ok(LockReport)` - Mined, and the lock event matches the request
/// * `Err(ProtocolViolation)` - Fee not below amount, simulation revert, or
///   an event that disagrees with the request
/// * `Err(EventNotFound / UnexpectedEmitter)` - Mined without a proxy lock event
/// * Any submission error from [`SubmissionEngine::submit_with_cancel`]
pub async fn submit_lock(
    engine: &SubmissionEngine,
    decoder: &EventDecoder,
    wrapper: Address,
    lock_proxy: Address,
    request: &LockRequest,
    cancel: CancellationToken,
) -> BootstrapResult<LockReport> {
    let expected_amount = request.net_amount()?;
    let payload = request.encode_call(engine.registry())?;

    engine.preflight(wrapper, &payload).await?;
    let record = engine.submit_with_cancel(wrapper, payload, cancel).await?;
    info!(
        "Lock of {} to chain {} mined, tx {:?} in block {}",
        request.amount, request.to_chain_id, record.tx_hash, record.block_number
    );

    let event = decoder.decode(&record, lock_proxy, EventKind::Lock)?;
    check_lock_matches(&event, request, expected_amount)?;
    Ok(LockReport { record, event })
}

fn check_lock_matches(event: &TransferEvent, request: &LockRequest, expected_amount: U256) -> BootstrapResult<()> {
    let TransferEvent::Lock {
        from_asset,
        to_chain_id,
        to_address,
        amount,
        ..
    } = event
    else {
        return Err(BootstrapError::EventNotFound { event: "lock" });
    };

    let mismatch = |field: &str, got: String, want: String| {
        BootstrapError::ProtocolViolation(format!("lock event {} is {} but request has {}", field, got, want))
    };
    if *from_asset != request.from_asset {
        return Err(mismatch(
            "fromAssetHash",
            format!("{:?}", from_asset),
            format!("{:?}", request.from_asset),
        ));
    }
    if *to_chain_id != request.to_chain_id {
        return Err(mismatch("toChainId", to_chain_id.to_string(), request.to_chain_id.to_string()));
    }
    if *to_address != request.to_address {
        return Err(mismatch(
            "toAddress",
            hex::encode(to_address),
            hex::encode(&request.to_address),
        ));
    }
    if *amount != expected_amount {
        return Err(mismatch("amount", amount.to_string(), expected_amount.to_string()));
    }
    Ok(())
}
