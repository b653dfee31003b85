//! The state threaded through one deployment run.

use alloy_core::primitives::Address;

use crate::{
    ArtifactStore, ChainClient, DeployError, DeployRequest, Deployer, Deployment, InitOutcome,
    Ledger, Orchestrator, Registry, SetupStep, SignerRoles, StepContext,
};

/// A deployment run in progress: the chain, the artifacts, the bound signer
/// roles, and the Deployer and Orchestrator with their persisted state.
pub struct Session<'a, C> {
    chain: &'a C,
    artifacts: &'a ArtifactStore,
    roles: SignerRoles,
    deployer: Deployer,
    orchestrator: Orchestrator,
}

impl<'a, C: ChainClient> Session<'a, C> {
    pub fn new(
        chain: &'a C,
        artifacts: &'a ArtifactStore,
        roles: SignerRoles,
        registry: Registry,
        ledger: Ledger,
    ) -> Self {
        Self {
            chain,
            artifacts,
            roles,
            deployer: Deployer::new(registry),
            orchestrator: Orchestrator::new(ledger),
        }
    }

    pub fn chain(&self) -> &C {
        self.chain
    }

    pub fn roles(&self) -> &SignerRoles {
        &self.roles
    }

    pub fn registry(&self) -> &Registry {
        self.deployer.registry()
    }

    pub fn ledger(&self) -> &Ledger {
        self.orchestrator.ledger()
    }

    /// The callable address of a registered contract.
    pub fn address(&self, name: &str) -> Result<Address, DeployError> {
        self.registry()
            .address(name)
            .ok_or_else(|| DeployError::MissingDependency {
                name: name.to_string(),
                dependency: name.to_string(),
            })
    }

    pub async fn deploy(&mut self, request: DeployRequest) -> Result<Deployment, DeployError> {
        self.deployer
            .deploy(self.chain, self.artifacts, &self.roles, request)
            .await
    }

    pub async fn deploy_proxy(
        &mut self,
        request: DeployRequest,
        admin: Address,
    ) -> Result<Deployment, DeployError> {
        self.deployer
            .deploy_proxy(self.chain, self.artifacts, &self.roles, request, admin)
            .await
    }

    pub async fn ensure_initialized(
        &mut self,
        name: &str,
        steps: &[SetupStep],
    ) -> Result<InitOutcome, DeployError> {
        let ctx = StepContext {
            chain: self.chain,
            artifacts: self.artifacts,
            registry: self.deployer.registry(),
            roles: &self.roles,
        };
        self.orchestrator.ensure_initialized(ctx, name, steps).await
    }

    pub async fn ensure_phase(
        &mut self,
        name: &str,
        phase: &str,
        steps: &[SetupStep],
    ) -> Result<InitOutcome, DeployError> {
        let ctx = StepContext {
            chain: self.chain,
            artifacts: self.artifacts,
            registry: self.deployer.registry(),
            roles: &self.roles,
        };
        self.orchestrator.ensure_phase(ctx, name, phase, steps).await
    }

    /// Hand back the registry and ledger.
    pub fn finish(self) -> (Registry, Ledger) {
        (self.deployer.into_registry(), self.orchestrator.into_ledger())
    }
}
