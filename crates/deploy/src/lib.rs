//! huma-deploy - Resumable deployment of the Huma lending-pool protocol.
//!
//! This crate deploys the protocol contracts onto an EVM network and runs
//! their one-time setup sequences. Deployed addresses are kept in a
//! [`Registry`] and completed setup sequences in a [`Ledger`], both persisted
//! after every confirmed step, so an interrupted run can simply be started
//! again.

mod args;
pub use args::{Arg, TxOptions};

pub mod artifacts;
pub use artifacts::{Artifact, ArtifactStore};

pub mod chain;
pub use chain::{ChainClient, InMemoryChain, JsonRpcChain, TxReceipt, TxRequest};

mod config;
pub use config::{CONFIG_FILENAME, DeployConfig, LEDGER_FILENAME, REGISTRY_FILENAME};

mod deployer;
pub use deployer::{
    DeployMode, DeployRequest, Deployer, PROXY_CONTRACT, validate_logical_name,
};

mod driver;
pub use driver::{RunOptions, run};

mod error;
pub use error::DeployError;

mod fs;

mod ledger;
pub use ledger::{ADDRESS_SEPARATOR, Ledger, LedgerEntry, PHASE_SEPARATOR, ledger_key};

mod orchestrator;
pub use orchestrator::{Guard, InitOutcome, Orchestrator, SetupStep, StepContext};

mod registry;
pub use registry::{Deployment, Registry, RegistryEntry};

mod report;
pub use report::RunReport;

pub mod scenarios;
pub use scenarios::Scenario;

mod session;
pub use session::Session;

mod signers;
pub use signers::{Role, SignerRoles};
