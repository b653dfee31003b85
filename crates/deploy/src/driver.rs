//! Run driver: one scenario, start to finish.

use crate::{
    ArtifactStore, ChainClient, DeployConfig, DeployError, DeployMode, Ledger, Registry,
    RunReport, Scenario, Session, SignerRoles,
};

/// How to run a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub scenario: Scenario,
    /// Overrides the scenario's default [`DeployMode`].
    pub mode: Option<DeployMode>,
    /// Keep the registry and ledger in memory instead of the state directory.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            mode: None,
            dry_run: false,
        }
    }

    pub fn with_mode(mut self, mode: Option<DeployMode>) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Run a scenario against `chain`.
///
/// Signer roles are resolved before anything else, so a misconfigured
/// network fails without sending a transaction. The first failure aborts the
/// run; whatever was confirmed before it is already persisted, and re-running
/// resumes from there.
pub async fn run<C: ChainClient>(
    config: &DeployConfig,
    chain: &C,
    artifacts: &ArtifactStore,
    options: RunOptions,
) -> Result<RunReport, DeployError> {
    let chain_id = chain.chain_id().await.map_err(DeployError::Chain)?;
    let accounts = chain.accounts().await.map_err(DeployError::Chain)?;
    let roles = SignerRoles::from_accounts(&accounts)?;

    tracing::info!(
        network = %config.network,
        chain_id,
        deployer = %roles.deployer,
        treasury = %roles.treasury,
        ea_service = %roles.ea_service,
        pds_service = %roles.pds_service,
        evaluation_agent = %roles.evaluation_agent,
        proxy_owner = %roles.proxy_owner,
        "Signer roles resolved"
    );

    let (registry, ledger) = if options.dry_run {
        tracing::info!("Dry run: deployment state is kept in memory");
        (Registry::in_memory(), Ledger::in_memory())
    } else {
        (
            Registry::load_or_create(config.registry_path())?,
            Ledger::load_or_create(config.ledger_path())?,
        )
    };

    let mode = options
        .mode
        .unwrap_or_else(|| options.scenario.default_deploy_mode());

    let mut session = Session::new(chain, artifacts, roles, registry, ledger);
    options.scenario.execute(&mut session, config, mode).await?;

    let (registry, ledger) = session.finish();
    Ok(RunReport::new(
        options.scenario,
        config.network.clone(),
        chain_id,
        options.dry_run,
        &registry,
        &ledger,
    ))
}
