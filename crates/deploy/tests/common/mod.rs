//! Shared fixtures: compiled-artifact stand-ins and an in-memory test context.

#![allow(dead_code)]

use alloy_core::{json_abi::JsonAbi, primitives::Bytes};
use huma_deploy::{
    Artifact, ArtifactStore, ChainClient, InMemoryChain, Ledger, Registry, Session, SignerRoles,
};

/// Contract interfaces of the base credit pool release.
const BASE_CONTRACTS: &[(&str, &[&str])] = &[
    (
        "TestToken",
        &[
            "constructor()",
            "function mint(address to, uint256 amount)",
            "function approve(address spender, uint256 amount) returns (bool)",
            "function balanceOf(address account) view returns (uint256)",
        ],
    ),
    (
        "EvaluationAgentNFT",
        &[
            "constructor()",
            "function mintNFT(address recipient) returns (uint256)",
            "function balanceOf(address owner) view returns (uint256)",
        ],
    ),
    ("InvoiceNFT", &["constructor(address usdcAddress)"]),
    (
        "HumaConfig",
        &[
            "constructor()",
            "function setHumaTreasury(address treasury)",
            "function setTreasuryFee(uint256 fee)",
            "function setEANFTContractAddress(address contractAddress)",
            "function setEAServiceAccount(address accountAddress)",
            "function setPDSServiceAccount(address accountAddress)",
            "function setProtocolDefaultGracePeriod(uint256 gracePeriod)",
            "function setLiquidityAsset(address asset, bool valid)",
        ],
    ),
    (
        "BaseFeeManager",
        &[
            "constructor()",
            "function setFees(uint256 frontLoadingFeeFlat, uint256 frontLoadingFeeBps, uint256 lateFeeFlat, uint256 lateFeeBps, uint256 membershipFee)",
        ],
    ),
    (
        "HDT",
        &[
            "constructor()",
            "function initialize(string name, string symbol, address underlyingToken)",
            "function setPool(address poolAddress)",
            "function balanceOf(address account) view returns (uint256)",
        ],
    ),
    (
        "BasePoolConfig",
        &[
            "constructor()",
            "function initialize(string poolName, address poolToken, address humaConfig, address feeManager)",
            "function setPoolLiquidityCap(uint256 liquidityCap)",
            "function setPool(address poolAddress)",
            "function setPoolOwnerRewardsAndLiquidity(uint256 rewardsRate, uint256 liquidityRate)",
            "function setEARewardsAndLiquidity(uint256 rewardsRate, uint256 liquidityRate)",
            "function setEvaluationAgent(uint256 eaId, address agent)",
            "function setMaxCreditLine(uint256 creditLine)",
            "function setAPR(uint256 aprInBps)",
            "function setReceivableRequiredInBps(uint256 receivableInBps)",
            "function setPoolPayPeriod(uint256 periodInDays)",
            "function setPoolToken(address poolToken)",
            "function setWithdrawalLockoutPeriod(uint256 lockoutPeriodInDays)",
            "function setPoolDefaultGracePeriod(uint256 gracePeriodInDays)",
            "function setPoolOwnerTreasury(address treasury)",
            "function setCreditApprovalExpiration(uint256 durationInDays)",
            "function addPoolOperator(address operator)",
        ],
    ),
    (
        "BaseCreditPool",
        &[
            "constructor()",
            "function initialize(address poolConfigAddr)",
            "function addApprovedLender(address lender)",
            "function makeInitialDeposit(uint256 amount)",
            "function enablePool()",
        ],
    ),
    (
        "TransparentUpgradeableProxy",
        &["constructor(address _logic, address admin_, bytes _data)"],
    ),
    (
        "ProtocolConfig",
        &[
            "constructor(address nft, address token)",
            "function setTreasury(address treasury)",
            "function setFee(uint256 fee)",
            "function setCap(uint256 cap)",
            "function fee() view returns (uint256)",
        ],
    ),
];

/// Contract interfaces that differ in the receivable factoring pool release.
const RECEIVABLE_FACTORING_CONTRACTS: &[(&str, &[&str])] = &[
    ("HumaConfig", &["constructor(address owner)"]),
    (
        "BasePoolConfig",
        &["constructor(string poolName, address poolToken, address humaConfig, address feeManager)"],
    ),
    (
        "TimelockController",
        &["constructor(uint256 minDelay, address[] proposers, address[] executors)"],
    ),
    ("ReceivableFactoringPool", &["constructor()"]),
];

/// Build an artifact with a short, unique creation bytecode.
pub fn artifact(index: usize, name: &str, abi: &[&str]) -> Artifact {
    let abi = JsonAbi::parse(abi.iter().copied())
        .unwrap_or_else(|e| panic!("invalid ABI for {name}: {e}"));
    Artifact::new(name, abi, Bytes::from(vec![0xfe, index as u8]))
}

/// Artifacts of the base credit pool contracts.
pub fn base_artifacts() -> ArtifactStore {
    ArtifactStore::from_artifacts(
        BASE_CONTRACTS
            .iter()
            .enumerate()
            .map(|(index, (name, abi))| artifact(index, name, abi)),
    )
}

/// Artifacts of the receivable factoring pool contracts.
pub fn receivable_factoring_artifacts() -> ArtifactStore {
    let mut store = base_artifacts();
    for (index, (name, abi)) in RECEIVABLE_FACTORING_CONTRACTS.iter().enumerate() {
        store.insert(artifact(100 + index, name, abi));
    }
    store
}

/// Initialize tracing for tests (idempotent).
pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init()
        .ok();
}

/// An in-memory chain with its artifacts and resolved signer roles.
pub struct TestContext {
    pub chain: InMemoryChain,
    pub artifacts: ArtifactStore,
    pub roles: SignerRoles,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_artifacts(base_artifacts()).await
    }

    pub async fn with_artifacts(artifacts: ArtifactStore) -> Self {
        let chain = InMemoryChain::with_artifacts(SignerRoles::MIN_REQUIRED_ACCOUNTS, &artifacts);
        let accounts = chain.accounts().await.expect("in-memory accounts");
        let roles = SignerRoles::from_accounts(&accounts).expect("enough accounts");

        Self {
            chain,
            artifacts,
            roles,
        }
    }

    /// A session with empty, in-memory state.
    pub fn session(&self) -> Session<'_, InMemoryChain> {
        self.session_with(Registry::in_memory(), Ledger::in_memory())
    }

    pub fn session_with(&self, registry: Registry, ledger: Ledger) -> Session<'_, InMemoryChain> {
        Session::new(
            &self.chain,
            &self.artifacts,
            self.roles.clone(),
            registry,
            ledger,
        )
    }

    /// Names of the functions called on `contract`'s code, in order.
    pub fn functions_called(&self, contract: &str) -> Vec<String> {
        self.chain
            .calls_to(contract)
            .into_iter()
            .filter_map(|tx| tx.function)
            .collect()
    }
}
