//! Contract registry: logical contract name to deployed address.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::{error::DeployError, fs::FsHandler};

/// Where a logical contract lives on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Deployment {
    /// A contract called directly at its creation address.
    Plain { address: Address },
    /// An implementation behind a transparent upgradeable proxy.
    ///
    /// The implementation is never called directly; everything goes through
    /// `proxy`, whose admin functions are reserved to `admin`.
    Proxy {
        implementation: Address,
        proxy: Address,
        admin: Address,
    },
}

impl Deployment {
    /// The address all interaction with the contract goes through.
    pub fn address(&self) -> Address {
        match self {
            Self::Plain { address } => *address,
            Self::Proxy { proxy, .. } => *proxy,
        }
    }

    /// The logic contract behind a proxy.
    pub fn implementation(&self) -> Option<Address> {
        match self {
            Self::Plain { .. } => None,
            Self::Proxy { implementation, .. } => Some(*implementation),
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy { .. })
    }
}

/// A registry record for one logical contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Name of the compiled artifact whose ABI the contract exposes. For a
    /// proxy this is the implementation's artifact.
    pub contract: String,
    #[serde(flatten)]
    pub deployment: Deployment,
    /// The account that submitted the creation transaction(s).
    pub deployed_by: Address,
    /// Hash of the transaction that created the callable address.
    pub tx_hash: B256,
}

impl RegistryEntry {
    pub fn address(&self) -> Address {
        self.deployment.address()
    }
}

/// Persisted mapping from logical contract name to [`RegistryEntry`].
///
/// Only the [`Deployer`](crate::Deployer) mutates it. Entries are written to
/// disk as soon as they are recorded so an interrupted run can resume.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    path: Option<PathBuf>,
    entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    /// A registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the registry stored at `path`, or start an empty one there.
    pub fn load_or_create(path: impl Into<PathBuf>) -> Result<Self, DeployError> {
        let path = path.into();
        let entries = FsHandler::read_json(&path)
            .map_err(|source| DeployError::State {
                action: "load",
                path: path.clone(),
                source,
            })?
            .unwrap_or_default();

        let registry = Self {
            path: Some(path),
            entries,
        };
        tracing::debug!(
            path = ?registry.path(),
            contracts = registry.len(),
            "Contract registry loaded"
        );
        Ok(registry)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// The callable address of a logical contract.
    pub fn address(&self, name: &str) -> Option<Address> {
        self.get(name).map(RegistryEntry::address)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an entry and persist it.
    ///
    /// If persisting fails the in-memory map is rolled back, so the registry
    /// never claims a deployment the state file does not hold.
    pub(crate) fn record(&mut self, name: &str, entry: RegistryEntry) -> Result<(), DeployError> {
        let previous = self.entries.insert(name.to_string(), entry);

        if let Err(err) = self.persist() {
            match previous {
                Some(previous) => self.entries.insert(name.to_string(), previous),
                None => self.entries.remove(name),
            };
            return Err(err);
        }

        Ok(())
    }

    fn persist(&self) -> Result<(), DeployError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        FsHandler::write_json_atomic(path, &self.entries).map_err(|source| DeployError::State {
            action: "write",
            path: path.clone(),
            source,
        })
    }
}
