//! Contract tests for the JSON-RPC chain client.

use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zkms_client::{ChainError, ChainRpc, ChainRpcConfig, JsonRpcChain};
use zkms_core::{Address, CallData, OnChainCall, TxHash};

const HASH: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

fn client(server: &MockServer) -> JsonRpcChain {
    JsonRpcChain::new(ChainRpcConfig {
        rpc_url: server.uri().parse().unwrap(),
        relayer: Address::from_bytes([0x11; 20]),
        timeout_secs: 5,
        receipt_poll_interval_ms: 10,
    })
    .unwrap()
}

fn call() -> OnChainCall {
    OnChainCall {
        to: Address::from_bytes([0x22; 20]),
        value: 255,
        data: CallData::new(vec![0xab, 0xcd]),
    }
}

#[tokio::test]
async fn send_transaction_returns_hash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_sendTransaction",
            "params": [{
                "from": "0x1111111111111111111111111111111111111111",
                "to": "0x2222222222222222222222222222222222222222",
                "value": "0xff",
                "data": "0xabcd"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": HASH
        })))
        .expect(1)
        .mount(&server)
        .await;

    let hash = client(&server).call(&call()).await.unwrap();
    assert_eq!(hash, HASH.parse::<TxHash>().unwrap());
}

#[tokio::test]
async fn rpc_error_object_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "nonce too low" }
        })))
        .mount(&server)
        .await;

    let err = client(&server).call(&call()).await.unwrap_err();
    match &err {
        ChainError::Rpc { code, message, .. } => {
            assert_eq!(*code, -32000);
            assert_eq!(message, "nonce too low");
        }
        other => panic!("expected Rpc error, got {other:?}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn gateway_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = client(&server).call(&call()).await.unwrap_err();
    assert!(matches!(err, ChainError::Status { status: 502, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn receipt_is_polled_until_mined() {
    let server = MockServer::start().await;
    // First poll: not mined yet.
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "method": "eth_getTransactionReceipt",
            "params": [HASH]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": null
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "method": "eth_getTransactionReceipt"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {
                "transactionHash": HASH,
                "blockNumber": "0x10",
                "status": "0x1",
                "gasUsed": "0x5208"
            }
        })))
        .mount(&server)
        .await;

    let hash: TxHash = HASH.parse().unwrap();
    let receipt = client(&server).wait_for_receipt(&hash).await.unwrap();
    assert_eq!(receipt.tx_hash, hash);
    assert_eq!(receipt.block_number, 16);
    assert_eq!(receipt.gas_used, 21000);
    assert!(receipt.success);
}

#[tokio::test]
async fn reverted_receipt_reports_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "transactionHash": HASH,
                "blockNumber": "0x11",
                "status": "0x0",
                "gasUsed": "0x7530"
            }
        })))
        .mount(&server)
        .await;

    let receipt = client(&server)
        .wait_for_receipt(&HASH.parse().unwrap())
        .await
        .unwrap();
    assert!(!receipt.success);
}
