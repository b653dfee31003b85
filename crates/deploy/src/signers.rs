//! Signer roles resolved from the network's account list.

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// The accounts a deployment run acts as.
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
pub enum Role {
    /// Deploys and owns the protocol contracts.
    Deployer,
    /// Receives protocol fees and seeds pool liquidity.
    Treasury,
    /// Evaluation-agent service account; mints the EA NFT contract.
    EaService,
    /// Protocol-data service account.
    PdsService,
    /// The pool's evaluation agent.
    EvaluationAgent,
    /// Admin of every transparent upgradeable proxy.
    ProxyOwner,
}

/// Accounts bound to each [`Role`] for the duration of a run.
///
/// Roles map to the node's account list by fixed index:
/// - Index 0: deployer
/// - Index 1: treasury
/// - Index 2: ea_service
/// - Index 3: pds_service
/// - Index 4: evaluation_agent
/// - Index 5: proxy_owner
/// - Index 6+: extra_accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerRoles {
    pub deployer: Address,
    pub treasury: Address,
    pub ea_service: Address,
    pub pds_service: Address,
    pub evaluation_agent: Address,
    pub proxy_owner: Address,
    /// Accounts beyond the named roles (index 6+).
    pub extra_accounts: Vec<Address>,
}

impl SignerRoles {
    /// The minimum number of accounts required to fill every role.
    pub const MIN_REQUIRED_ACCOUNTS: usize = 6;

    /// Bind roles to accounts by index.
    ///
    /// Returns [`DeployError::SignerConfiguration`] if fewer than
    /// [`Self::MIN_REQUIRED_ACCOUNTS`] accounts are provided.
    pub fn from_accounts(accounts: &[Address]) -> Result<Self, DeployError> {
        let [
            deployer,
            treasury,
            ea_service,
            pds_service,
            evaluation_agent,
            proxy_owner,
            extra @ ..,
        ] = accounts
        else {
            return Err(DeployError::SignerConfiguration {
                required: Self::MIN_REQUIRED_ACCOUNTS,
                available: accounts.len(),
            });
        };

        Ok(Self {
            deployer: *deployer,
            treasury: *treasury,
            ea_service: *ea_service,
            pds_service: *pds_service,
            evaluation_agent: *evaluation_agent,
            proxy_owner: *proxy_owner,
            extra_accounts: extra.to_vec(),
        })
    }

    pub fn get(&self, role: Role) -> Address {
        match role {
            Role::Deployer => self.deployer,
            Role::Treasury => self.treasury,
            Role::EaService => self.ea_service,
            Role::PdsService => self.pds_service,
            Role::EvaluationAgent => self.evaluation_agent,
            Role::ProxyOwner => self.proxy_owner,
        }
    }
}
