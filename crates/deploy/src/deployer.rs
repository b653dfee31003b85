//! Deploy-or-reuse of logical contracts.

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::{
    Arg, ArtifactStore, ChainClient, DeployError, Deployment, Registry, RegistryEntry, Role,
    SignerRoles, TxOptions,
    chain::{TxRequest, send_and_confirm},
};

/// Artifact of the transparent upgradeable proxy placed in front of upgradeable contracts.
pub const PROXY_CONTRACT: &str = "TransparentUpgradeableProxy";

/// What to do when a logical name is already in the registry.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeployMode {
    /// Fail with [`DeployError::AlreadyDeployed`].
    #[default]
    Reject,
    /// Return the recorded deployment without touching the chain.
    Reuse,
    /// Deploy again and overwrite the registry entry.
    Redeploy,
}

/// A request to deploy one logical contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    /// Logical name the deployment is registered under.
    pub name: String,
    /// Artifact to deploy.
    pub contract: String,
    pub args: Vec<Arg>,
    pub signer: Role,
    pub options: TxOptions,
    pub mode: DeployMode,
}

impl DeployRequest {
    pub fn new(name: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: contract.into(),
            args: Vec::new(),
            signer: Role::Deployer,
            options: TxOptions::default(),
            mode: DeployMode::default(),
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = Arg>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn signer(mut self, signer: Role) -> Self {
        self.signer = signer;
        self
    }

    pub fn options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }

    pub fn mode(mut self, mode: DeployMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Check that a logical name can key the registry and ledger.
pub fn validate_logical_name(name: &str) -> Result<(), DeployError> {
    let invalid = |reason| DeployError::InvalidLogicalName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid(
            "only ASCII letters, digits, '_' and '-' are allowed",
        ));
    }

    Ok(())
}

/// Deploys contracts and owns the [`Registry`].
#[derive(Debug)]
pub struct Deployer {
    registry: Registry,
}

impl Deployer {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn into_registry(self) -> Registry {
        self.registry
    }

    /// Deploy `request.contract` and register it as `request.name`.
    ///
    /// The registry is only written once the creation is confirmed.
    pub async fn deploy<C: ChainClient>(
        &mut self,
        chain: &C,
        artifacts: &ArtifactStore,
        roles: &SignerRoles,
        request: DeployRequest,
    ) -> Result<Deployment, DeployError> {
        if let Some(existing) = self.check_existing(&request)? {
            return Ok(existing);
        }

        let from = roles.get(request.signer);
        let (address, tx_hash) = self.create(chain, artifacts, from, &request).await?;

        let deployment = Deployment::Plain { address };
        self.registry.record(
            &request.name,
            RegistryEntry {
                contract: request.contract.clone(),
                deployment,
                deployed_by: from,
                tx_hash,
            },
        )?;

        Ok(deployment)
    }

    /// Deploy `request.contract` as an implementation behind a transparent
    /// upgradeable proxy administered by `admin`.
    ///
    /// The implementation is created first, then the proxy with
    /// `(implementation, admin, 0x)`, both with `request.options`. Only the proxy is exposed through the
    /// registry, and nothing is recorded unless both creations succeed.
    pub async fn deploy_proxy<C: ChainClient>(
        &mut self,
        chain: &C,
        artifacts: &ArtifactStore,
        roles: &SignerRoles,
        request: DeployRequest,
        admin: Address,
    ) -> Result<Deployment, DeployError> {
        if let Some(existing) = self.check_existing(&request)? {
            if !existing.is_proxy() {
                return Err(DeployError::DeploymentFailure {
                    name: request.name,
                    source: anyhow!("registered deployment is not behind a proxy"),
                });
            }
            return Ok(existing);
        }

        let from = roles.get(request.signer);
        let (implementation, _) = self.create(chain, artifacts, from, &request).await?;

        let proxy_request = DeployRequest {
            name: request.name.clone(),
            contract: PROXY_CONTRACT.to_string(),
            args: vec![
                Arg::Address(implementation),
                Arg::Address(admin),
                Arg::Bytes(Bytes::new()),
            ],
            signer: request.signer,
            options: request.options,
            mode: request.mode,
        };
        let (proxy, tx_hash) = self.create(chain, artifacts, from, &proxy_request).await?;

        let deployment = Deployment::Proxy {
            implementation,
            proxy,
            admin,
        };
        self.registry.record(
            &request.name,
            RegistryEntry {
                contract: request.contract.clone(),
                deployment,
                deployed_by: from,
                tx_hash,
            },
        )?;

        tracing::info!(
            name = %request.name,
            %implementation,
            %proxy,
            %admin,
            "Proxy deployment registered"
        );

        Ok(deployment)
    }

    /// Apply the [`DeployMode`] to an already registered name.
    fn check_existing(&self, request: &DeployRequest) -> Result<Option<Deployment>, DeployError> {
        validate_logical_name(&request.name)?;

        let Some(existing) = self.registry.get(&request.name) else {
            return Ok(None);
        };

        match request.mode {
            DeployMode::Reject => Err(DeployError::AlreadyDeployed {
                name: request.name.clone(),
                address: existing.address(),
            }),
            DeployMode::Reuse => {
                tracing::info!(
                    name = %request.name,
                    address = %existing.address(),
                    "Reusing existing deployment"
                );
                Ok(Some(existing.deployment))
            }
            DeployMode::Redeploy => {
                tracing::warn!(
                    name = %request.name,
                    previous = %existing.address(),
                    "Redeploying over existing registry entry"
                );
                Ok(None)
            }
        }
    }

    /// Submit one creation transaction and wait for the contract address.
    async fn create<C: ChainClient>(
        &self,
        chain: &C,
        artifacts: &ArtifactStore,
        from: Address,
        request: &DeployRequest,
    ) -> Result<(Address, B256), DeployError> {
        let args = resolve_args(&self.registry, &request.name, &request.args)?;
        let data = artifacts.get(&request.contract)?.encode_deploy(&args)?;

        tracing::info!(
            name = %request.name,
            contract = %request.contract,
            %from,
            gas_limit = ?request.options.gas_limit,
            "Deploying contract..."
        );

        let failure = |source: anyhow::Error| DeployError::DeploymentFailure {
            name: request.name.clone(),
            source,
        };

        let receipt = send_and_confirm(
            chain,
            TxRequest::create(from, data, request.options.gas_limit),
        )
        .await
        .map_err(|e| {
            tracing::error!(name = %request.name, contract = %request.contract, error = %e, "Deployment failed");
            failure(e)
        })?;

        let address = receipt
            .contract_address
            .ok_or_else(|| failure(anyhow!("receipt of {} has no contract address", receipt.tx_hash)))?;

        tracing::info!(
            name = %request.name,
            contract = %request.contract,
            %address,
            tx_hash = %receipt.tx_hash,
            "Contract deployed"
        );

        Ok((address, receipt.tx_hash))
    }
}

/// Replace [`Arg::Contract`] references in `args` with their registered
/// callable addresses.
pub(crate) fn resolve_args(
    registry: &Registry,
    name: &str,
    args: &[Arg],
) -> Result<Vec<Arg>, DeployError> {
    args.iter()
        .map(|arg| match arg.dependency() {
            Some(dependency) => registry
                .address(dependency)
                .map(Arg::Address)
                .ok_or_else(|| DeployError::MissingDependency {
                    name: name.to_string(),
                    dependency: dependency.to_string(),
                }),
            None => Ok(arg.clone()),
        })
        .collect()
}
