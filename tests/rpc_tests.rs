//! Integration tests for the JSON-RPC backed chain facade
//!
//! A wiremock server stands in for the node; each mock answers one method.

use std::sync::Arc;

use bridge_bootstrap::abi::AbiRegistry;
use bridge_bootstrap::config::LogCountSeverity;
use bridge_bootstrap::error::BootstrapError;
use bridge_bootstrap::events::{encode_event_data, EventDecoder, EventKind, TransferEvent};
use bridge_bootstrap::rpc::{balance_of, ChainRpc, RpcValidatorSource, ValidatorSource};
use bridge_bootstrap::types::{parse_h256, BlockTag};
use chain_clients_common::bytes_to_hex;
use chain_clients_evm::{CallOutcome, EvmClient};
use ethereum_types::U256;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "helpers.rs"]
mod helpers;
use helpers::{
    addr, events_config, test_credential, DUMMY_LOCK_PROXY_ADDR, DUMMY_SIDE_MANAGER_ADDR, DUMMY_TOKEN_ADDR,
    DUMMY_USER_ADDR,
};

const DUMMY_TX_HASH: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

// ============================================================================
// MOCK SERVER SETUP
// ============================================================================

async fn mount_result(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result
        })))
        .mount(server)
        .await;
}

async fn mount_error(server: &MockServer, rpc_method: &str, code: i64, message: &str) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": code, "message": message }
        })))
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> Arc<EvmClient> {
    Arc::new(EvmClient::new(&server.uri()).unwrap())
}

fn lock_receipt_json(status: &str) -> serde_json::Value {
    let registry = AbiRegistry::new();
    let lock = TransferEvent::Lock {
        from_asset: addr(DUMMY_TOKEN_ADDR),
        from_address: addr(DUMMY_USER_ADDR),
        to_chain_id: 7,
        to_asset: addr(DUMMY_TOKEN_ADDR).as_bytes().to_vec(),
        to_address: addr(DUMMY_USER_ADDR).as_bytes().to_vec(),
        amount: U256::from(1000u64),
    };
    let lock_topic = registry.event_topic("lock").unwrap();
    json!({
        "transactionHash": DUMMY_TX_HASH,
        "blockNumber": "0x10",
        "blockHash": format!("0x{}", "ab".repeat(32)),
        "status": status,
        "gasUsed": "0x5208",
        "logs": [
            {
                "address": DUMMY_TOKEN_ADDR,
                "topics": [format!("0x{}", "dd".repeat(32))],
                "data": format!("0x{}", "00".repeat(32))
            },
            {
                "address": DUMMY_LOCK_PROXY_ADDR,
                "topics": [bytes_to_hex(lock_topic.as_bytes())],
                "data": bytes_to_hex(&encode_event_data(&lock))
            },
            {
                "address": DUMMY_SIDE_MANAGER_ADDR,
                "topics": [format!("0x{}", "ee".repeat(32))],
                "data": "0x"
            }
        ]
    })
}

// ============================================================================
// TRANSACTION LIFECYCLE QUERIES
// ============================================================================

/// 1. Test: Receipt Converted To Confirmation Record
/// Verifies that status, block number and logs survive conversion from the node's receipt.
#[tokio::test]
async fn test_receipt_converted_to_confirmation_record() {
    let server = MockServer::start().await;
    mount_result(&server, "eth_getTransactionReceipt", lock_receipt_json("0x1")).await;
    let rpc = client(&server);

    let record = rpc.receipt(parse_h256(DUMMY_TX_HASH).unwrap()).await.unwrap().unwrap();

    assert!(record.success);
    assert_eq!(record.block_number, 16);
    assert_eq!(record.logs.len(), 3);
    assert_eq!(record.logs[1].address, addr(DUMMY_LOCK_PROXY_ADDR));
    assert!(record.logs[2].data.is_empty());
}

/// 2. Test: Decode Lock By Hash Through Node
/// Verifies the full path from a transaction hash to a decoded lock event.
/// Why: This is what an operator runs to confirm a cross-chain transfer.
#[tokio::test]
async fn test_decode_lock_by_hash_through_node() {
    let server = MockServer::start().await;
    mount_result(&server, "eth_getTransactionReceipt", lock_receipt_json("0x1")).await;
    let rpc = client(&server);
    let decoder = EventDecoder::new(Arc::new(AbiRegistry::new()), &events_config(3, LogCountSeverity::Reject));

    let event = decoder
        .decode_by_hash(
            rpc.as_ref(),
            parse_h256(DUMMY_TX_HASH).unwrap(),
            addr(DUMMY_LOCK_PROXY_ADDR),
            EventKind::Lock,
        )
        .await
        .unwrap();

    assert_eq!(event.amount(), U256::from(1000u64));
    match event {
        TransferEvent::Lock { to_chain_id, .. } => assert_eq!(to_chain_id, 7),
        other => panic!("Expected lock event, got {:?}", other),
    }
}

/// 3. Test: Failed Receipt Through Node
/// Verifies that a 0x0 status is never decoded as a transfer.
#[tokio::test]
async fn test_failed_receipt_through_node() {
    let server = MockServer::start().await;
    mount_result(&server, "eth_getTransactionReceipt", lock_receipt_json("0x0")).await;
    let rpc = client(&server);
    let decoder = EventDecoder::new(Arc::new(AbiRegistry::new()), &events_config(3, LogCountSeverity::Warn));

    let err = decoder
        .decode_by_hash(
            rpc.as_ref(),
            parse_h256(DUMMY_TX_HASH).unwrap(),
            addr(DUMMY_LOCK_PROXY_ADDR),
            EventKind::Lock,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::TransactionReverted { block_number: 16, .. }), "got {:?}", err);
}

/// 4. Test: Pending Until Block Number Present
/// Verifies that an unknown or unmined transaction counts as pending and a mined one does not.
#[tokio::test]
async fn test_pending_until_block_number_present() {
    let hash = parse_h256(DUMMY_TX_HASH).unwrap();

    let server = MockServer::start().await;
    mount_result(&server, "eth_getTransactionByHash", json!(null)).await;
    assert!(client(&server).is_pending(hash).await.unwrap());

    let server = MockServer::start().await;
    mount_result(
        &server,
        "eth_getTransactionByHash",
        json!({ "hash": DUMMY_TX_HASH, "blockNumber": null }),
    )
    .await;
    assert!(client(&server).is_pending(hash).await.unwrap());

    let server = MockServer::start().await;
    mount_result(
        &server,
        "eth_getTransactionByHash",
        json!({ "hash": DUMMY_TX_HASH, "blockNumber": "0x10" }),
    )
    .await;
    assert!(!client(&server).is_pending(hash).await.unwrap());
}

/// 5. Test: Broadcast Returns Node Hash
/// Verifies that the hash the node reports is the one returned.
#[tokio::test]
async fn test_broadcast_returns_node_hash() {
    let server = MockServer::start().await;
    mount_result(&server, "eth_sendRawTransaction", json!(DUMMY_TX_HASH)).await;
    let rpc = client(&server);
    let credential = test_credential(0);
    let signed = bridge_bootstrap::submission::sign_transaction(
        &credential,
        bridge_bootstrap::PendingCall {
            to: addr(DUMMY_TOKEN_ADDR),
            value: U256::zero(),
            payload: vec![],
            gas_limit: 21_000,
            gas_price: U256::from(1u64),
            nonce: 0,
        },
        101,
    )
    .unwrap();

    let hash = rpc.broadcast(&signed).await.unwrap();

    assert_eq!(hash, parse_h256(DUMMY_TX_HASH).unwrap());
}

/// 6. Test: Transport Failure Is Chain Unavailable
/// Verifies that an unreachable node surfaces as the retryable ChainUnavailable.
#[tokio::test]
async fn test_transport_failure_is_chain_unavailable() {
    let rpc = EvmClient::new("http://127.0.0.1:1").unwrap();

    let err = ChainRpc::block_number(&rpc).await.unwrap_err();

    assert!(matches!(err, BootstrapError::ChainUnavailable(_)), "got {:?}", err);
    assert!(err.is_retryable());
}

/// 7. Test: Gas Price Parsed As U256
#[tokio::test]
async fn test_gas_price_parsed_as_u256() {
    let server = MockServer::start().await;
    mount_result(&server, "eth_gasPrice", json!("0x3b9aca00")).await;

    let price = client(&server).suggest_gas_price().await.unwrap();

    assert_eq!(price, U256::from(1_000_000_000u64));
}

// ============================================================================
// SIMULATION AND QUERIES
// ============================================================================

/// 8. Test: Simulation Revert Keeps Node Message
/// Verifies that a revert from eth_call is returned as an outcome with the message untouched.
/// Why: Duplicate registrations are reported to the operator in the relay chain's own words.
#[tokio::test]
async fn test_simulation_revert_keeps_node_message() {
    let server = MockServer::start().await;
    mount_error(&server, "eth_call", 3, "execution reverted: side chain already registered").await;

    let outcome = client(&server)
        .simulate(
            addr(DUMMY_USER_ADDR),
            addr(DUMMY_TOKEN_ADDR),
            &[0x01, 0x02, 0x03, 0x04],
            BlockTag::Latest,
        )
        .await
        .unwrap();

    match outcome {
        CallOutcome::Reverted { message, .. } => {
            assert_eq!(message, "execution reverted: side chain already registered")
        }
        other => panic!("Expected revert, got {:?}", other),
    }
}

/// 9. Test: Balance Of Decodes Uint
#[tokio::test]
async fn test_balance_of_decodes_uint() {
    let server = MockServer::start().await;
    mount_result(&server, "eth_call", json!(format!("0x{:064x}", 12345u64))).await;
    let rpc = client(&server);

    let balance = balance_of(
        rpc.as_ref(),
        &AbiRegistry::new(),
        addr(DUMMY_TOKEN_ADDR),
        addr(DUMMY_USER_ADDR),
        BlockTag::Number(16),
    )
    .await
    .unwrap();

    assert_eq!(balance, U256::from(12345u64));
}

/// 10. Test: Validator Keys From Configured Method
/// Verifies that the validator source calls its configured method and decodes hex keys.
#[tokio::test]
async fn test_validator_keys_from_configured_method() {
    let key = test_credential(3).public_key_uncompressed();
    let server = MockServer::start().await;
    mount_result(&server, "relay_getValidators", json!([bytes_to_hex(&key)])).await;
    let source = RpcValidatorSource::new(client(&server), "relay_getValidators");

    let keys = source.validator_keys(0).await.unwrap();

    assert_eq!(keys, vec![key]);
}
