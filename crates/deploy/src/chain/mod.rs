//! Chain access for deployment runs.
//!
//! [`ChainClient`] is the only way the crate talks to a network: it submits
//! transactions from node-managed accounts, waits for their receipts and
//! performs read-only calls.

mod memory;
mod rpc;

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Result;

pub use memory::{InMemoryChain, RecordedTx};
pub use rpc::JsonRpcChain;

/// A transaction to submit from a node-managed account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    /// `None` creates a contract from `data`.
    pub to: Option<Address>,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
}

impl TxRequest {
    pub fn create(from: Address, data: Bytes, gas_limit: Option<u64>) -> Self {
        Self {
            from,
            to: None,
            data,
            gas_limit,
        }
    }

    pub fn call(from: Address, to: Address, data: Bytes, gas_limit: Option<u64>) -> Self {
        Self {
            from,
            to: Some(to),
            data,
            gas_limit,
        }
    }
}

/// The outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub contract_address: Option<Address>,
    pub success: bool,
    pub block_number: u64,
}

/// A network the deployment runs against.
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Accounts the node can sign for, in the node's order.
    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>>> + Send;

    /// Submit a transaction and return its hash.
    fn send_transaction(&self, tx: TxRequest) -> impl Future<Output = Result<B256>> + Send;

    /// Wait until a submitted transaction is mined.
    fn wait_for_receipt(&self, tx_hash: B256) -> impl Future<Output = Result<TxReceipt>> + Send;

    /// Execute a read-only call against the latest state.
    fn call(&self, to: Address, data: Bytes) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Submit a transaction and wait for it to be mined successfully.
///
/// A reverted transaction is an error.
pub async fn send_and_confirm<C: ChainClient>(chain: &C, tx: TxRequest) -> Result<TxReceipt> {
    let tx_hash = chain.send_transaction(tx).await?;
    tracing::debug!(%tx_hash, "Transaction submitted, waiting for receipt...");

    let receipt = chain.wait_for_receipt(tx_hash).await?;
    if !receipt.success {
        anyhow::bail!(
            "transaction {tx_hash} reverted in block {}",
            receipt.block_number
        );
    }

    tracing::debug!(%tx_hash, block = receipt.block_number, "Transaction confirmed");
    Ok(receipt)
}
