//! Error taxonomy for deployment runs.

use std::path::PathBuf;

use alloy_core::primitives::Address;
use thiserror::Error;

/// Every failure a deployment run can surface.
///
/// Nothing in the crate retries or swallows these: they bubble up to the run
/// driver, which aborts the remaining sequence. Re-running is the recovery
/// mechanism, and it is safe because a failed deploy never writes the registry
/// and a failed setup sequence never writes the ledger.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(
        "not enough signer accounts: {required} roles need {required} accounts, the network provides {available}"
    )]
    SignerConfiguration { required: usize, available: usize },

    #[error("invalid logical contract name '{name}': {reason}")]
    InvalidLogicalName { name: String, reason: &'static str },

    #[error(
        "'{name}' is already deployed at {address}. request an explicit redeploy to overwrite it"
    )]
    AlreadyDeployed { name: String, address: Address },

    #[error("failed to deploy '{name}': {source:#}")]
    DeploymentFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("'{name}' depends on '{dependency}', which has not been deployed")]
    MissingDependency { name: String, dependency: String },

    #[error("failed to initialize '{name}' at step {failed_step_index} ({step}): {source:#}")]
    InitializationFailure {
        name: String,
        failed_step_index: usize,
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("artifact error for '{contract}': {reason}")]
    Artifact { contract: String, reason: String },

    #[error("failed to encode call to {contract}.{function}: {reason}")]
    Encoding {
        contract: String,
        function: String,
        reason: String,
    },

    #[error("failed to {action} state file '{}': {source:#}", path.display())]
    State {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("chain request failed: {0:#}")]
    Chain(#[source] anyhow::Error),
}
