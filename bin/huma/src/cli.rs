use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use huma_deploy::{CONFIG_FILENAME, DeployConfig, DeployMode, RunOptions, Scenario};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "huma")]
#[command(
    author,
    version,
    about = "Deploy and initialize the Huma lending-pool contracts, resuming where the last run stopped"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "HUMA_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Huma.toml configuration file (or a directory containing one).
    ///
    /// If not provided, ./Huma.toml is used when it exists.
    #[arg(long, alias = "conf", env = "HUMA_CONFIG")]
    pub config: Option<PathBuf>,

    /// The network name. Deployment state is kept per network.
    #[arg(short, long, env = "HUMA_NETWORK")]
    pub network: Option<String>,

    /// The JSON-RPC endpoint of a node holding the signer accounts.
    #[arg(long, alias = "rpc", env = "HUMA_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Directory holding the persisted registry and ledger.
    #[arg(long, env = "HUMA_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Hardhat artifacts directory.
    #[arg(long, env = "HUMA_ARTIFACTS_DIR")]
    pub artifacts_dir: Option<PathBuf>,

    /// What to do with contracts that are already deployed: reject, reuse or redeploy.
    ///
    /// Defaults to `reuse` for `base-credit-pool` and `reject` otherwise.
    #[arg(long, env = "HUMA_DEPLOY_MODE")]
    pub mode: Option<DeployMode>,

    /// Run against an in-memory chain and keep all state in memory.
    ///
    /// The in-memory registry starts empty, so only scenarios that deploy
    /// contracts can be dry-run.
    #[arg(long, env = "HUMA_DRY_RUN")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Deploy and fully initialize a base credit pool.
    BaseCreditPool,
    /// Deploy the base credit pool contracts without initializing them.
    BaseCreditPoolDeploy,
    /// Deploy the receivable factoring pool contracts.
    ReceivableFactoringPool,
    /// Approve the evaluation agent and treasury as lenders of the base credit pool.
    ApproveLenders,
    /// Enable the base credit pool.
    EnablePool,
    /// Write the effective configuration to a file.
    Config {
        /// Output path.
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        output: PathBuf,
    },
}

impl Command {
    /// The scenario this command runs, if any.
    pub fn scenario(&self) -> Option<Scenario> {
        match self {
            Command::BaseCreditPool => Some(Scenario::BaseCreditPool),
            Command::BaseCreditPoolDeploy => Some(Scenario::BaseCreditPoolDeploy),
            Command::ReceivableFactoringPool => Some(Scenario::ReceivableFactoringPool),
            Command::ApproveLenders => Some(Scenario::ApproveLenders),
            Command::EnablePool => Some(Scenario::EnablePool),
            Command::Config { .. } => None,
        }
    }
}

impl Cli {
    /// Options for the scenario to run, `None` for commands that run none.
    pub fn run_options(&self) -> Result<Option<RunOptions>> {
        let Some(scenario) = self.command.scenario() else {
            return Ok(None);
        };

        if self.dry_run && !scenario.deploys() {
            bail!(
                "'{scenario}' acts on an already deployed pool and cannot be dry-run: \
                 a dry run starts from an empty registry"
            );
        }

        Ok(Some(
            RunOptions::new(scenario)
                .with_mode(self.mode)
                .with_dry_run(self.dry_run),
        ))
    }

    /// Apply the command-line overrides on top of the loaded configuration.
    pub fn apply(&self, mut config: DeployConfig) -> DeployConfig {
        if let Some(network) = &self.network {
            config.network = network.clone();
        }
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = rpc_url.clone();
        }
        if let Some(state_dir) = &self.state_dir {
            config.state_dir = state_dir.clone();
        }
        if let Some(artifacts_dir) = &self.artifacts_dir {
            config.artifacts_dir = artifacts_dir.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_subcommands() {
        let cli = Cli::try_parse_from(["huma", "--network", "goerli", "base-credit-pool-deploy"])
            .unwrap();
        assert_eq!(cli.command.scenario(), Some(Scenario::BaseCreditPoolDeploy));

        let config = cli.apply(DeployConfig::default());
        assert_eq!(config.network, "goerli");
        assert_eq!(config.rpc_url, DeployConfig::default().rpc_url);
    }

    #[test]
    fn test_mode_flag() {
        let cli = Cli::try_parse_from(["huma", "--mode", "redeploy", "receivable-factoring-pool"])
            .unwrap();
        assert_eq!(cli.mode, Some(DeployMode::Redeploy));

        assert!(Cli::try_parse_from(["huma", "--mode", "overwrite", "enable-pool"]).is_err());
    }

    #[test]
    fn test_dry_run_needs_a_deploying_scenario() {
        let cli = Cli::try_parse_from(["huma", "--dry-run", "enable-pool"]).unwrap();
        let err = cli.run_options().unwrap_err();
        assert!(err.to_string().contains("enable-pool"), "{err}");

        let cli = Cli::try_parse_from(["huma", "--dry-run", "base-credit-pool"]).unwrap();
        let options = cli.run_options().unwrap().unwrap();
        assert!(options.dry_run);
        assert_eq!(options.scenario, Scenario::BaseCreditPool);
    }

    #[test]
    fn test_config_subcommand() {
        let cli = Cli::try_parse_from(["huma", "config", "-o", "out.toml"]).unwrap();
        assert!(cli.command.scenario().is_none());
        assert!(cli.run_options().unwrap().is_none());
        assert!(matches!(cli.command, Command::Config { output } if output == PathBuf::from("out.toml")));
    }
}
