//! Run configuration.
//!
//! Values are layered: built-in defaults, then `Huma.toml`, then `HUMA_*`
//! environment variables. Command-line flags are applied on top by the binary.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::TxOptions;

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Huma.toml";

/// Prefix of the environment variables overriding configuration values.
pub const ENV_PREFIX: &str = "HUMA_";

/// Registry file name inside a network's state directory.
pub const REGISTRY_FILENAME: &str = "deployed-contracts.json";

/// Ledger file name inside a network's state directory.
pub const LEDGER_FILENAME: &str = "initialized-contracts.json";

/// Gas limit of the test token creation.
pub const USDC_GAS_LIMIT: u64 = 3_000_000;

/// Gas limit of the evaluation agent NFT creation.
pub const EANFT_GAS_LIMIT: u64 = 2_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Network name; state is kept per network.
    pub network: String,
    /// JSON-RPC endpoint of a node holding the signer accounts.
    pub rpc_url: String,
    /// Root of the persisted registry and ledger.
    pub state_dir: PathBuf,
    /// Hardhat artifacts directory.
    pub artifacts_dir: PathBuf,
    /// How long to wait for a transaction to be mined.
    pub confirmation_timeout_secs: u64,
    /// Delay between two receipt polls.
    pub poll_interval_ms: u64,
    /// Fixed admin of every proxy. Defaults to the proxy-owner signer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_admin_owner: Option<Address>,
    /// Gas limit overrides, by logical contract name. For proxied contracts
    /// the limit applies to the implementation and the proxy creation.
    pub gas_limits: BTreeMap<String, u64>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            network: "localhost".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            state_dir: PathBuf::from("deployment"),
            artifacts_dir: PathBuf::from("artifacts"),
            confirmation_timeout_secs: 120,
            poll_interval_ms: 1_000,
            proxy_admin_owner: None,
            gas_limits: BTreeMap::from([
                ("USDC".to_string(), USDC_GAS_LIMIT),
                ("EANFT".to_string(), EANFT_GAS_LIMIT),
            ]),
        }
    }
}

impl DeployConfig {
    /// Load the configuration from defaults, a TOML file and the environment.
    ///
    /// Without an explicit `path`, `Huma.toml` in the working directory is
    /// used if present. An explicit path must exist; a directory is searched
    /// for `Huma.toml`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file or directory not found: {}",
                        path.display()
                    );
                }
                if path.is_dir() {
                    path.join(CONFIG_FILENAME)
                } else {
                    path.to_path_buf()
                }
            }
            None => PathBuf::from(CONFIG_FILENAME),
        };

        Self::figment(&file)
            .extract()
            .with_context(|| format!("Failed to load configuration (file: {})", file.display()))
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// State directory of the configured network.
    pub fn network_dir(&self) -> PathBuf {
        self.state_dir.join(&self.network)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.network_dir().join(REGISTRY_FILENAME)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.network_dir().join(LEDGER_FILENAME)
    }

    pub fn rpc_url(&self) -> Result<Url> {
        self.rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL '{}'", self.rpc_url))
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Transaction options for deploying `name`.
    pub fn tx_options(&self, name: &str) -> TxOptions {
        TxOptions {
            gas_limit: self.gas_limits.get(name).copied(),
        }
    }
}
