//! JSON-RPC chain client for nodes that manage the sender account.

use async_trait::async_trait;
use reqwest::Client;
use rns_core::{Address, Bytes, B256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::ChainClient;
use crate::error::{ChainError, Result};
use crate::submission::{SubmissionEvent, SubmissionReceiver};
use crate::types::{CallRequest, Receipt, TxParams};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_CONSECUTIVE_POLL_ERRORS: u32 = 3;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: String,
    gas_used: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    contract_address: Option<Address>,
}

impl RpcReceipt {
    fn into_receipt(self) -> Result<Receipt> {
        Ok(Receipt {
            tx_hash: self.transaction_hash,
            block_number: parse_quantity(&self.block_number)?,
            gas_used: parse_quantity(&self.gas_used)?,
            // Receipts without a status field predate status codes; inclusion means success.
            status: self.status.as_deref().map_or(true, |s| s != "0x0"),
            contract_address: self.contract_address,
        })
    }
}

#[derive(Clone)]
struct RpcTransport {
    url: String,
    client: Client,
    next_id: Arc<AtomicU64>,
}

impl RpcTransport {
    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::InvalidResponse(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let body: JsonRpcResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(ChainError::from_rpc(method, error.code, error.message));
        }
        Ok(serde_json::from_value(body.result.unwrap_or(Value::Null))?)
    }
}

pub struct JsonRpcClient {
    transport: RpcTransport,
    sender: Address,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl JsonRpcClient {
    /// Connect to `url` and send from the node's first account.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        let mut client = Self::with_sender(url, Address::ZERO);
        let accounts: Vec<Address> = client.transport.request("eth_accounts", json!([])).await?;
        client.sender = *accounts.first().ok_or(ChainError::NoAccounts)?;
        debug!(sender = %client.sender, url = %client.transport.url, "Connected to node");
        Ok(client)
    }

    pub fn with_sender(url: impl Into<String>, sender: Address) -> Self {
        Self {
            transport: RpcTransport {
                url: url.into(),
                client: Client::new(),
                next_id: Arc::new(AtomicU64::new(1)),
            },
            sender,
            poll_interval: DEFAULT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.transport.url
    }

    /// Fast-forward the node's clock and mine a block so the new timestamp
    /// is visible. Only development nodes support this.
    pub async fn increase_time(&self, seconds: u64) -> Result<()> {
        let _: Value = self
            .transport
            .request("evm_increaseTime", json!([seconds]))
            .await?;
        let _: Value = self.transport.request("evm_mine", json!([])).await?;
        Ok(())
    }

    fn tx_object(&self, call: &CallRequest, params: Option<TxParams>) -> Value {
        let mut tx = json!({
            "from": self.sender,
            "data": call.data,
        });
        if let Some(to) = call.to {
            tx["to"] = json!(to);
        }
        if !call.value.is_zero() {
            tx["value"] = json!(call.value);
        }
        if let Some(params) = params {
            tx["gas"] = json!(quantity(params.gas));
            tx["nonce"] = json!(quantity(params.nonce));
            if let Some(gas_price) = params.gas_price {
                tx["gasPrice"] = json!(gas_price);
            }
        }
        tx
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn pending_nonce(&self) -> Result<u64> {
        let count: String = self
            .transport
            .request("eth_getTransactionCount", json!([self.sender, "pending"]))
            .await?;
        parse_quantity(&count)
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64> {
        let gas: String = self
            .transport
            .request("eth_estimateGas", json!([self.tx_object(call, None)]))
            .await?;
        parse_quantity(&gas)
    }

    async fn submit(&self, call: &CallRequest, params: TxParams) -> Result<SubmissionReceiver> {
        let tx = self.tx_object(call, Some(params));
        let hash: B256 = self
            .transport
            .request("eth_sendTransaction", json!([tx]))
            .await?;
        debug!(tx_hash = %hash, nonce = params.nonce, "Transaction accepted by node");

        let (events, receiver) = SubmissionReceiver::channel();
        tokio::spawn(watch_receipt(
            self.transport.clone(),
            hash,
            events,
            self.poll_interval,
            self.receipt_timeout,
        ));
        Ok(receiver)
    }

    async fn call(&self, call: &CallRequest) -> Result<Bytes> {
        self.transport
            .request("eth_call", json!([self.tx_object(call, None), "latest"]))
            .await
    }
}

async fn watch_receipt(
    transport: RpcTransport,
    hash: B256,
    events: mpsc::Sender<SubmissionEvent>,
    poll_interval: Duration,
    timeout: Duration,
) {
    if events.send(SubmissionEvent::Submitted(hash)).await.is_err() {
        return;
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let mut consecutive_errors = 0;
    let terminal = loop {
        match transport
            .request::<Option<RpcReceipt>>("eth_getTransactionReceipt", json!([hash]))
            .await
        {
            Ok(Some(receipt)) => match receipt.into_receipt() {
                Ok(receipt) => break SubmissionEvent::Confirmed(receipt),
                Err(e) => break SubmissionEvent::Failed(e.to_string()),
            },
            Ok(None) => consecutive_errors = 0,
            Err(e) => {
                consecutive_errors += 1;
                warn!(tx_hash = %hash, error = %e, "Receipt poll failed");
                if consecutive_errors >= MAX_CONSECUTIVE_POLL_ERRORS {
                    break SubmissionEvent::Failed(e.to_string());
                }
            }
        }

        if tokio::time::Instant::now() + poll_interval > deadline {
            break SubmissionEvent::Failed(format!(
                "timed out after {:?} waiting for receipt of {}",
                timeout, hash
            ));
        }
        tokio::time::sleep(poll_interval).await;
    };

    let _ = events.send(terminal).await;
}

fn quantity(value: u64) -> String {
    format!("{:#x}", value)
}

fn parse_quantity(value: &str) -> Result<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad quantity {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_rpc(server: &MockServer, rpc_method: &str, result: Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": result,
            })))
            .mount(server)
            .await;
    }

    async fn mock_rpc_error(server: &MockServer, rpc_method: &str, code: i64, message: &str) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": code, "message": message },
            })))
            .mount(server)
            .await;
    }

    const SENDER: &str = "0xcd2a3d9f938e13cd947ec05abc7fe734df8dd826";

    #[tokio::test]
    async fn test_connect_uses_first_account() {
        let server = MockServer::start().await;
        mock_rpc(&server, "eth_accounts", json!([SENDER])).await;

        let client = JsonRpcClient::connect(server.uri()).await.unwrap();
        assert_eq!(client.sender(), SENDER.parse::<Address>().unwrap());
    }

    #[tokio::test]
    async fn test_connect_without_accounts_fails() {
        let server = MockServer::start().await;
        mock_rpc(&server, "eth_accounts", json!([])).await;

        let err = JsonRpcClient::connect(server.uri()).await.err().unwrap();
        assert!(matches!(err, ChainError::NoAccounts));
    }

    #[tokio::test]
    async fn test_estimate_and_nonce_parse_quantities() {
        let server = MockServer::start().await;
        mock_rpc(&server, "eth_estimateGas", json!("0x5208")).await;
        mock_rpc(&server, "eth_getTransactionCount", json!("0x2a")).await;

        let client = JsonRpcClient::with_sender(server.uri(), SENDER.parse().unwrap());
        let call = CallRequest::call(Address::repeat_byte(1), vec![0u8; 4]);
        assert_eq!(client.estimate_gas(&call).await.unwrap(), 21_000);
        assert_eq!(client.pending_nonce().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_estimate_revert_is_classified() {
        let server = MockServer::start().await;
        mock_rpc_error(&server, "eth_estimateGas", -32000, "execution reverted").await;

        let client = JsonRpcClient::with_sender(server.uri(), SENDER.parse().unwrap());
        let err = client
            .estimate_gas(&CallRequest::create(vec![0x60]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_submit_reports_submitted_then_confirmed() {
        let server = MockServer::start().await;
        let hash = B256::repeat_byte(0xab);
        mock_rpc(&server, "eth_sendTransaction", json!(hash)).await;
        mock_rpc(
            &server,
            "eth_getTransactionReceipt",
            json!({
                "transactionHash": hash,
                "blockNumber": "0x10",
                "gasUsed": "0x5208",
                "status": "0x1",
                "contractAddress": "0x0000000000000000000000000000000000000abc",
            }),
        )
        .await;

        let client = JsonRpcClient::with_sender(server.uri(), SENDER.parse().unwrap())
            .with_poll_interval(Duration::from_millis(10));
        let params = TxParams {
            gas: 21_000,
            gas_price: None,
            nonce: 0,
        };
        let mut receiver = client
            .submit(&CallRequest::create(vec![0x60, 0x80]), params)
            .await
            .unwrap();

        assert_eq!(receiver.next_event().await, Some(SubmissionEvent::Submitted(hash)));
        match receiver.next_event().await {
            Some(SubmissionEvent::Confirmed(receipt)) => {
                assert_eq!(receipt.tx_hash, hash);
                assert_eq!(receipt.block_number, 16);
                assert!(receipt.status);
                assert!(receipt.contract_address.is_some());
            }
            other => panic!("Expected confirmation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_times_out_without_receipt() {
        let server = MockServer::start().await;
        mock_rpc(&server, "eth_sendTransaction", json!(B256::repeat_byte(1))).await;
        mock_rpc(&server, "eth_getTransactionReceipt", Value::Null).await;

        let client = JsonRpcClient::with_sender(server.uri(), SENDER.parse().unwrap())
            .with_poll_interval(Duration::from_millis(5))
            .with_receipt_timeout(Duration::from_millis(20));
        let params = TxParams {
            gas: 21_000,
            gas_price: None,
            nonce: 3,
        };
        let mut receiver = client
            .submit(&CallRequest::call(Address::ZERO, vec![]), params)
            .await
            .unwrap();

        assert!(matches!(
            receiver.next_event().await,
            Some(SubmissionEvent::Submitted(_))
        ));
        match receiver.next_event().await {
            Some(SubmissionEvent::Failed(reason)) => assert!(reason.contains("timed out")),
            other => panic!("Expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_increase_time_unsupported() {
        let server = MockServer::start().await;
        mock_rpc_error(&server, "evm_increaseTime", -32601, "Method not found").await;

        let client = JsonRpcClient::with_sender(server.uri(), SENDER.parse().unwrap());
        let err = client.increase_time(60).await.unwrap_err();
        assert!(matches!(err, ChainError::Unsupported(_)));
    }

    #[test]
    fn test_quantities() {
        assert_eq!(quantity(255), "0xff");
        assert_eq!(parse_quantity("0xff").unwrap(), 255);
        assert!(parse_quantity("0xzz").is_err());
    }
}
