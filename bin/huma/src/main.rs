//! huma deploys and initializes the Huma lending-pool contracts.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use huma_deploy::{ArtifactStore, DeployConfig, InMemoryChain, JsonRpcChain};

/// Accounts available on the dry-run chain.
const DRY_RUN_ACCOUNTS: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = cli.apply(DeployConfig::load(cli.config.as_deref())?);

    let Some(options) = cli.run_options()? else {
        if let cli::Command::Config { output } = &cli.command {
            config.save_to_file(output)?;
        }
        return Ok(());
    };

    let artifacts = ArtifactStore::load_dir(&config.artifacts_dir).with_context(|| {
        format!(
            "Failed to load contract artifacts from {} (did you compile the contracts?)",
            config.artifacts_dir.display()
        )
    })?;

    let report = if options.dry_run {
        let chain = InMemoryChain::with_artifacts(DRY_RUN_ACCOUNTS, &artifacts);
        huma_deploy::run(&config, &chain, &artifacts, options).await?
    } else {
        let chain = JsonRpcChain::new(
            config.rpc_url()?,
            config.poll_interval(),
            config.confirmation_timeout(),
        )?;

        tracing::info!(
            network = %config.network,
            rpc_url = %chain.url(),
            state_dir = %config.network_dir().display(),
            scenario = %options.scenario,
            "Starting deployment..."
        );

        huma_deploy::run(&config, &chain, &artifacts, options).await?
    };

    println!("{report}");

    Ok(())
}
