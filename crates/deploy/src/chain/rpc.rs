//! Ethereum JSON-RPC chain client.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use super::{ChainClient, TxReceipt, TxRequest};

/// Default timeout for a single RPC request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`ChainClient`] backed by a node's JSON-RPC endpoint.
///
/// Transactions are sent with `eth_sendTransaction`, so the node must hold the
/// keys of every signer role (a local Hardhat or Anvil node does).
#[derive(Debug, Clone)]
pub struct JsonRpcChain {
    client: reqwest::Client,
    url: Url,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl JsonRpcChain {
    pub fn new(url: Url, poll_interval: Duration, confirmation_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url,
            poll_interval,
            confirmation_timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Make a JSON-RPC call and deserialize the result.
    async fn json_rpc_call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let result: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = result.get("error") {
            anyhow::bail!(
                "RPC error from {}: {}",
                method,
                error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown")
            );
        }

        let result_value = result
            .get("result")
            .context("No result in response")?
            .clone();

        serde_json::from_value(result_value)
            .with_context(|| format!("Failed to deserialize {} result", method))
    }

    async fn fetch_receipt(&self, tx_hash: B256) -> Result<TxReceipt> {
        let receipt: Option<RpcReceipt> = self
            .json_rpc_call("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await?;

        let Some(receipt) = receipt else {
            return Err(NotMined(tx_hash).into());
        };

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            contract_address: receipt.contract_address,
            success: receipt.status == 1,
            block_number: receipt.block_number,
        })
    }

    fn max_polls(&self) -> usize {
        let interval = self.poll_interval.as_millis().max(1);
        (self.confirmation_timeout.as_millis() / interval).max(1) as usize
    }
}

impl ChainClient for JsonRpcChain {
    async fn chain_id(&self) -> Result<u64> {
        let chain_id: String = self.json_rpc_call("eth_chainId", vec![]).await?;
        parse_hex_u64(&chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        self.json_rpc_call("eth_accounts", vec![]).await
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256> {
        let mut request = serde_json::json!({
            "from": tx.from,
            "data": tx.data,
        });
        if let Some(to) = tx.to {
            request["to"] = serde_json::json!(to);
        }
        if let Some(gas_limit) = tx.gas_limit {
            request["gas"] = Value::String(format!("{gas_limit:#x}"));
        }

        self.json_rpc_call("eth_sendTransaction", vec![request])
            .await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt> {
        let poll = (|| self.fetch_receipt(tx_hash))
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(self.max_polls()),
            )
            .when(|err: &anyhow::Error| err.is::<NotMined>())
            .notify(|err: &anyhow::Error, dur: Duration| {
                tracing::trace!(%tx_hash, error = %err, "Receipt not available, retrying after {:?}", dur);
            });

        match tokio::time::timeout(self.confirmation_timeout, poll).await {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(err)) if !err.is::<NotMined>() => {
                Err(err.context(format!("Failed to fetch receipt of transaction {tx_hash}")))
            }
            Ok(Err(_)) | Err(_) => anyhow::bail!(
                "Timeout waiting for transaction {tx_hash} after {}s",
                self.confirmation_timeout.as_secs()
            ),
        }
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        self.json_rpc_call(
            "eth_call",
            vec![serde_json::json!({ "to": to, "data": data }), "latest".into()],
        )
        .await
    }
}

/// The node has no receipt for the transaction yet.
#[derive(Debug, thiserror::Error)]
#[error("transaction {0} is not mined yet")]
struct NotMined(B256);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    contract_address: Option<Address>,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    status: u64,
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    block_number: u64,
}

fn parse_hex_u64(s: &str) -> Result<u64> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .with_context(|| format!("Failed to parse hex quantity '{s}'"))
}

fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use super::*;

    /// Serve `body` as the JSON response to every request, counting requests.
    async fn serve_json(body: &'static str) -> (Url, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap())
            .parse()
            .unwrap();
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    read_request(&mut stream).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        (url, requests)
    }

    async fn read_request(stream: &mut TcpStream) {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            request.extend_from_slice(&buf[..n]);

            let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= end + 4 + content_length {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_rpc_error_is_not_retried() {
        let (url, requests) = serve_json(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"header not found"}}"#,
        )
        .await;
        let chain =
            JsonRpcChain::new(url, Duration::from_millis(10), Duration::from_secs(5)).unwrap();

        let err = chain.wait_for_receipt(B256::ZERO).await.unwrap_err();

        assert!(format!("{err:#}").contains("header not found"), "{err:#}");
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unmined_transaction_times_out() {
        let (url, requests) = serve_json(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).await;
        let chain =
            JsonRpcChain::new(url, Duration::from_millis(20), Duration::from_millis(300)).unwrap();

        let err = chain.wait_for_receipt(B256::ZERO).await.unwrap_err();

        assert!(err.to_string().contains("Timeout"), "{err:#}");
        assert!(requests.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0x7a69").unwrap(), 31337);
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn test_deserialize_receipt() {
        let receipt: RpcReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000ab",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "status": "0x1",
            "blockNumber": "0x1a",
            "gasUsed": "0x5208"
        }))
        .unwrap();

        assert_eq!(receipt.transaction_hash, B256::with_last_byte(0xab));
        assert!(receipt.contract_address.is_some());
        assert_eq!(receipt.status, 1);
        assert_eq!(receipt.block_number, 26);
    }

    #[test]
    fn test_deserialize_call_receipt_without_contract_address() {
        let receipt: RpcReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000ab",
            "contractAddress": null,
            "status": "0x0",
            "blockNumber": "0x2"
        }))
        .unwrap();

        assert!(receipt.contract_address.is_none());
        assert_eq!(receipt.status, 0);
    }

    #[test]
    fn test_max_polls() {
        let chain = JsonRpcChain::new(
            "http://127.0.0.1:8545".parse().unwrap(),
            Duration::from_millis(500),
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(chain.max_polls(), 20);
    }
}
