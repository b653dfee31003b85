//! In-process chain used for dry runs and tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use alloy_core::primitives::{Address, B256, Bytes, U256, hex, keccak256};
use anyhow::{Result, bail};

use super::{ChainClient, TxReceipt, TxRequest};
use crate::{artifacts::ArtifactStore, deployer::PROXY_CONTRACT};

/// Chain id reported by the in-memory chain (the Hardhat/Anvil default).
pub const IN_MEMORY_CHAIN_ID: u64 = 31337;

/// A transaction submitted to an [`InMemoryChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTx {
    pub tx_hash: B256,
    pub from: Address,
    /// `None` for contract creations.
    pub to: Option<Address>,
    /// Artifact whose code handled the transaction. Calls through a proxy
    /// report the implementation's artifact.
    pub contract: Option<String>,
    /// Called function, `None` for contract creations.
    pub function: Option<String>,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
    pub success: bool,
}

impl RecordedTx {
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

#[derive(Debug, Clone)]
struct DeployedCode {
    contract: String,
    implementation: Option<Address>,
}

#[derive(Debug, Default)]
struct ChainState {
    accounts: Vec<Address>,
    artifacts: ArtifactStore,
    nonces: HashMap<Address, u64>,
    code: HashMap<Address, DeployedCode>,
    receipts: HashMap<B256, TxReceipt>,
    transactions: Vec<RecordedTx>,
    reverting_functions: HashSet<String>,
    reverting_deploys: HashSet<String>,
    uint_stubs: HashMap<(Address, String), U256>,
    block_number: u64,
}

impl ChainState {
    /// The artifact whose bytecode is the longest prefix of `data`.
    fn match_creation_code(&self, data: &[u8]) -> Option<(String, usize)> {
        self.artifacts
            .iter()
            .filter(|artifact| {
                !artifact.bytecode.is_empty() && data.starts_with(&artifact.bytecode)
            })
            .max_by_key(|artifact| artifact.bytecode.len())
            .map(|artifact| (artifact.contract_name.clone(), artifact.bytecode.len()))
    }

    /// The artifact executing calls sent to `address`, following proxies.
    fn logic_contract(&self, address: Address) -> Option<&str> {
        let code = self.code.get(&address)?;
        match code.implementation {
            Some(implementation) => self
                .code
                .get(&implementation)
                .map(|code| code.contract.as_str()),
            None => Some(code.contract.as_str()),
        }
    }

    fn function_name(&self, contract: Option<&str>, data: &[u8]) -> Option<String> {
        let selector = data.get(..4)?;
        let resolved = contract
            .and_then(|contract| self.artifacts.get(contract).ok())
            .and_then(|artifact| {
                artifact
                    .abi
                    .functions()
                    .find(|function| function.selector().as_slice() == selector)
                    .map(|function| function.name.clone())
            });

        Some(resolved.unwrap_or_else(|| format!("0x{}", hex::encode(selector))))
    }
}

/// A deterministic, in-process [`ChainClient`].
///
/// Contract creations are labelled with the artifact whose bytecode prefixes
/// the creation data, and calls are decoded against that artifact's ABI, so
/// tests can assert on "which function was called on which contract". View
/// calls return zero unless stubbed with [`InMemoryChain::stub_uint`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryChain {
    state: Arc<Mutex<ChainState>>,
}

impl InMemoryChain {
    /// A chain with `account_count` unlocked accounts and no known artifacts.
    pub fn new(account_count: usize) -> Self {
        Self::with_artifacts(account_count, &ArtifactStore::new())
    }

    /// A chain with `account_count` unlocked accounts that recognizes the
    /// given artifacts.
    pub fn with_artifacts(account_count: usize, artifacts: &ArtifactStore) -> Self {
        let accounts = (1..=account_count as u64)
            .map(|i| Address::left_padding_from(&i.to_be_bytes()))
            .collect();

        let state = ChainState {
            accounts,
            artifacts: artifacts.clone(),
            ..Default::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every transaction calling `function` revert.
    pub fn revert_on(&self, function: impl Into<String>) {
        self.state().reverting_functions.insert(function.into());
    }

    /// Make every creation of `contract` revert.
    pub fn revert_deploy(&self, contract: impl Into<String>) {
        self.state().reverting_deploys.insert(contract.into());
    }

    pub fn clear_reverts(&self) {
        let mut state = self.state();
        state.reverting_functions.clear();
        state.reverting_deploys.clear();
    }

    /// Make view calls of `function` on `to` return `value`.
    pub fn stub_uint(&self, to: Address, function: impl Into<String>, value: impl Into<U256>) {
        self.state()
            .uint_stubs
            .insert((to, function.into()), value.into());
    }

    pub fn transactions(&self) -> Vec<RecordedTx> {
        self.state().transactions.clone()
    }

    pub fn transaction_count(&self) -> usize {
        self.state().transactions.len()
    }

    /// Contract creations, in submission order.
    pub fn deployments(&self) -> Vec<RecordedTx> {
        self.state()
            .transactions
            .iter()
            .filter(|tx| tx.is_create())
            .cloned()
            .collect()
    }

    /// Calls handled by `contract`'s code, in submission order.
    pub fn calls_to(&self, contract: &str) -> Vec<RecordedTx> {
        self.state()
            .transactions
            .iter()
            .filter(|tx| !tx.is_create() && tx.contract.as_deref() == Some(contract))
            .cloned()
            .collect()
    }

    /// Calls sent to `address`, in submission order.
    pub fn calls_to_address(&self, address: Address) -> Vec<RecordedTx> {
        self.state()
            .transactions
            .iter()
            .filter(|tx| tx.to == Some(address))
            .cloned()
            .collect()
    }

    /// The artifact deployed at `address`.
    pub fn contract_at(&self, address: Address) -> Option<String> {
        self.state()
            .code
            .get(&address)
            .map(|code| code.contract.clone())
    }

    /// The implementation a proxy at `address` forwards to.
    pub fn implementation_of(&self, address: Address) -> Option<Address> {
        self.state()
            .code
            .get(&address)
            .and_then(|code| code.implementation)
    }
}

impl ChainClient for InMemoryChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(IN_MEMORY_CHAIN_ID)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.state().accounts.clone())
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256> {
        let mut state = self.state();

        if !state.accounts.contains(&tx.from) {
            bail!("unknown account {}", tx.from);
        }

        let nonce = state.nonces.entry(tx.from).or_default();
        let current_nonce = *nonce;
        *nonce += 1;

        let mut preimage = tx.from.to_vec();
        preimage.extend_from_slice(&current_nonce.to_be_bytes());
        let tx_hash = keccak256(&preimage);

        state.block_number += 1;
        let block_number = state.block_number;

        let (recorded, contract_address) = match tx.to {
            None => {
                let Some((contract, code_len)) = state.match_creation_code(&tx.data) else {
                    bail!("creation data matches no known artifact");
                };

                let success = !state.reverting_deploys.contains(&contract);
                let contract_address = success.then(|| tx.from.create(current_nonce));

                if let Some(address) = contract_address {
                    let implementation = (contract == PROXY_CONTRACT)
                        .then(|| tx.data.get(code_len..code_len + 32))
                        .flatten()
                        .map(|word| Address::from_word(B256::from_slice(word)));

                    state.code.insert(
                        address,
                        DeployedCode {
                            contract: contract.clone(),
                            implementation,
                        },
                    );
                }

                let recorded = RecordedTx {
                    tx_hash,
                    from: tx.from,
                    to: None,
                    contract: Some(contract),
                    function: None,
                    data: tx.data,
                    gas_limit: tx.gas_limit,
                    success,
                };
                (recorded, contract_address)
            }
            Some(to) => {
                let contract = state.logic_contract(to).map(str::to_string);
                let function = state.function_name(contract.as_deref(), &tx.data);
                let success = contract.is_some()
                    && !function
                        .as_ref()
                        .is_some_and(|function| state.reverting_functions.contains(function));

                let recorded = RecordedTx {
                    tx_hash,
                    from: tx.from,
                    to: Some(to),
                    contract,
                    function,
                    data: tx.data,
                    gas_limit: tx.gas_limit,
                    success,
                };
                (recorded, None)
            }
        };

        let receipt = TxReceipt {
            tx_hash,
            contract_address,
            success: recorded.success,
            block_number,
        };
        state.receipts.insert(tx_hash, receipt);
        state.transactions.push(recorded);

        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt> {
        match self.state().receipts.get(&tx_hash) {
            Some(receipt) => Ok(*receipt),
            None => bail!("unknown transaction {tx_hash}"),
        }
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let state = self.state();

        let Some(contract) = state.logic_contract(to) else {
            bail!("no contract deployed at {to}");
        };

        let value = state
            .function_name(Some(contract), &data)
            .and_then(|function| state.uint_stubs.get(&(to, function)).copied())
            .unwrap_or_default();

        Ok(Bytes::from(value.to_be_bytes::<32>().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::json_abi::JsonAbi;

    use super::*;
    use crate::{Arg, artifacts::Artifact, chain::send_and_confirm};

    fn artifacts() -> ArtifactStore {
        let token = JsonAbi::parse([
            "constructor()",
            "function mint(address to, uint256 amount)",
            "function balanceOf(address account) view returns (uint256)",
        ])
        .unwrap();
        let proxy =
            JsonAbi::parse(["constructor(address _logic, address admin_, bytes _data)"]).unwrap();

        ArtifactStore::from_artifacts([
            Artifact::new("TestToken", token, Bytes::from_static(&[0xfe, 0x01])),
            Artifact::new(PROXY_CONTRACT, proxy, Bytes::from_static(&[0xfe, 0x02])),
        ])
    }

    async fn create(chain: &InMemoryChain, from: Address, data: Bytes) -> TxReceipt {
        let tx_hash = chain
            .send_transaction(TxRequest::create(from, data, None))
            .await
            .unwrap();
        chain.wait_for_receipt(tx_hash).await.unwrap()
    }

    #[tokio::test]
    async fn test_accounts_are_deterministic() {
        let chain = InMemoryChain::new(3);
        let accounts = chain.accounts().await.unwrap();

        assert_eq!(
            accounts,
            vec![
                Address::with_last_byte(1),
                Address::with_last_byte(2),
                Address::with_last_byte(3)
            ]
        );
        assert_eq!(chain.chain_id().await.unwrap(), IN_MEMORY_CHAIN_ID);
    }

    #[tokio::test]
    async fn test_calls_through_proxy_reach_implementation() {
        let artifacts = artifacts();
        let chain = InMemoryChain::with_artifacts(2, &artifacts);
        let from = Address::with_last_byte(1);
        let token = artifacts.get("TestToken").unwrap();

        let implementation = create(&chain, from, token.encode_deploy(&[]).unwrap())
            .await
            .contract_address
            .unwrap();
        let proxy_data = artifacts
            .get(PROXY_CONTRACT)
            .unwrap()
            .encode_deploy(&[
                Arg::Address(implementation),
                Arg::Address(from),
                Arg::Bytes(Bytes::new()),
            ])
            .unwrap();
        let proxy = create(&chain, from, proxy_data).await.contract_address.unwrap();

        assert_ne!(implementation, proxy);
        assert_eq!(chain.implementation_of(proxy), Some(implementation));
        assert_eq!(chain.contract_at(proxy).as_deref(), Some(PROXY_CONTRACT));

        let calldata = token
            .encode_call("mint", &[Arg::Address(from), Arg::uint(U256::from(10u64))])
            .unwrap();
        let receipt = send_and_confirm(&chain, TxRequest::call(from, proxy, calldata, None))
            .await
            .unwrap();
        assert!(receipt.success);

        let calls = chain.calls_to("TestToken");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to, Some(proxy));
        assert_eq!(calls[0].function.as_deref(), Some("mint"));
        assert_eq!(chain.deployments().len(), 2);
    }

    #[tokio::test]
    async fn test_reverts_and_stubs() {
        let artifacts = artifacts();
        let chain = InMemoryChain::with_artifacts(1, &artifacts);
        let from = Address::with_last_byte(1);
        let token = artifacts.get("TestToken").unwrap();

        let address = create(&chain, from, token.encode_deploy(&[]).unwrap())
            .await
            .contract_address
            .unwrap();

        chain.revert_on("mint");
        let calldata = token
            .encode_call("mint", &[Arg::Address(from), Arg::uint(U256::from(1u64))])
            .unwrap();
        let err = send_and_confirm(&chain, TxRequest::call(from, address, calldata, None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reverted"));
        assert!(!chain.transactions()[1].success);

        let balance_of = token
            .encode_call("balanceOf", &[Arg::Address(from)])
            .unwrap();
        let output = chain.call(address, balance_of.clone()).await.unwrap();
        assert_eq!(U256::from_be_slice(&output), U256::ZERO);

        chain.stub_uint(address, "balanceOf", U256::from(7u64));
        let output = chain.call(address, balance_of).await.unwrap();
        assert_eq!(U256::from_be_slice(&output), U256::from(7u64));

        // views don't create transactions
        assert_eq!(chain.transaction_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_creation_deploys_nothing() {
        let artifacts = artifacts();
        let chain = InMemoryChain::with_artifacts(1, &artifacts);
        let from = Address::with_last_byte(1);
        chain.revert_deploy("TestToken");

        let data = artifacts.get("TestToken").unwrap().encode_deploy(&[]).unwrap();
        let receipt = create(&chain, from, data).await;

        assert!(!receipt.success);
        assert!(receipt.contract_address.is_none());
        assert!(
            chain
                .call(Address::with_last_byte(9), Bytes::new())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_unknown_sender_is_rejected() {
        let chain = InMemoryChain::new(1);
        let result = chain
            .send_transaction(TxRequest::call(
                Address::with_last_byte(42),
                Address::ZERO,
                Bytes::new(),
                None,
            ))
            .await;
        assert!(result.is_err());
    }
}
