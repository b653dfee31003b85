//! Deployment scenarios of the lending-pool protocol.
//!
//! Each scenario is a fixed, dependency-ordered sequence of deploys and setup
//! sequences. Logical names are shared across scenarios, so a later scenario
//! (e.g. `enable-pool`) picks up what an earlier one registered.

mod base_credit_pool;
mod maintenance;
mod receivable_factoring_pool;

use alloy_core::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{ChainClient, DeployConfig, DeployError, DeployMode, DeployRequest, Session};

/// Decimals of the test USDC token.
pub const USDC_DECIMALS: u8 = 6;

/// `amount` whole USDC in base units.
pub fn usdc(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(USDC_DECIMALS))
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Deploy and fully initialize a base credit pool, resuming any earlier
    /// partial run.
    BaseCreditPool,
    /// Deploy the base credit pool contracts and the invoice NFT, without
    /// initialization.
    BaseCreditPoolDeploy,
    /// Deploy the receivable factoring pool contracts, without initialization.
    ReceivableFactoringPool,
    /// Approve the evaluation agent and treasury as lenders of the deployed
    /// base credit pool.
    ApproveLenders,
    /// Enable the deployed base credit pool.
    EnablePool,
}

impl Scenario {
    /// The [`DeployMode`] used when the caller does not pick one.
    pub fn default_deploy_mode(&self) -> DeployMode {
        match self {
            Self::BaseCreditPool => DeployMode::Reuse,
            Self::BaseCreditPoolDeploy
            | Self::ReceivableFactoringPool
            | Self::ApproveLenders
            | Self::EnablePool => DeployMode::Reject,
        }
    }

    /// Whether the scenario deploys contracts, as opposed to only acting on
    /// registered ones.
    pub fn deploys(&self) -> bool {
        !matches!(self, Self::ApproveLenders | Self::EnablePool)
    }

    pub async fn execute<C: ChainClient>(
        &self,
        session: &mut Session<'_, C>,
        config: &DeployConfig,
        mode: DeployMode,
    ) -> Result<(), DeployError> {
        tracing::info!(scenario = %self, %mode, "Running scenario...");

        match self {
            Self::BaseCreditPool => {
                base_credit_pool::deploy_contracts(session, config, mode, false).await?;
                base_credit_pool::initialize(session).await?;
            }
            Self::BaseCreditPoolDeploy => {
                base_credit_pool::deploy_contracts(session, config, mode, true).await?;
            }
            Self::ReceivableFactoringPool => {
                receivable_factoring_pool::deploy_contracts(session, config, mode).await?;
            }
            Self::ApproveLenders => maintenance::approve_lenders(session).await?,
            Self::EnablePool => maintenance::enable_pool(session).await?,
        }

        tracing::info!(scenario = %self, "Scenario complete");
        Ok(())
    }
}

/// Admin of the proxies deployed by a scenario.
fn proxy_admin<C: ChainClient>(session: &Session<'_, C>, config: &DeployConfig) -> Address {
    config
        .proxy_admin_owner
        .unwrap_or(session.roles().proxy_owner)
}

/// A deploy request carrying the configured options for `name`.
fn request(
    config: &DeployConfig,
    mode: DeployMode,
    name: &str,
    contract: &str,
) -> DeployRequest {
    DeployRequest::new(name, contract)
        .options(config.tx_options(name))
        .mode(mode)
}
