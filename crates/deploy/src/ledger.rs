//! Initialization ledger: which setup sequences have completed.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::{error::DeployError, fs::FsHandler};

/// Separator between a contract name and a phase in a ledger key.
pub const PHASE_SEPARATOR: char = '#';

/// Separator between a ledger key and the address it was completed against,
/// used once the logical contract has been redeployed.
pub const ADDRESS_SEPARATOR: char = '@';

/// The ledger key for a setup sequence: the bare contract name, or
/// `<contract>#<phase>` for a named phase.
pub fn ledger_key(contract: &str, phase: Option<&str>) -> String {
    match phase {
        Some(phase) => format!("{contract}{PHASE_SEPARATOR}{phase}"),
        None => contract.to_string(),
    }
}

/// Completion record for one setup sequence.
///
/// Existence means completion: `completed` is always `true`, and a state file
/// holding `false` is rejected on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub completed: bool,
    /// Callable address of the contract the sequence ran against.
    pub address: Address,
    /// Unix timestamp (seconds) of completion.
    pub initialized_at: i64,
    /// Steps whose transaction was submitted in the completing run.
    pub steps_executed: usize,
    /// Steps skipped because their guard reported the effect already present.
    pub steps_skipped: usize,
}

impl LedgerEntry {
    pub fn completed_now(address: Address, steps_executed: usize, steps_skipped: usize) -> Self {
        Self {
            completed: true,
            address,
            initialized_at: chrono::Utc::now().timestamp(),
            steps_executed,
            steps_skipped,
        }
    }
}

/// Persisted set of completed setup sequences.
///
/// Only the [`Orchestrator`](crate::Orchestrator) mutates it, and only by adding
/// entries: nothing is ever removed or reset. This is what makes re-running
/// a deployment safe.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    path: Option<PathBuf>,
    entries: BTreeMap<String, LedgerEntry>,
}

impl Ledger {
    /// A ledger that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the ledger stored at `path`, or start an empty one there.
    pub fn load_or_create(path: impl Into<PathBuf>) -> Result<Self, DeployError> {
        let path = path.into();
        let entries: BTreeMap<String, LedgerEntry> = FsHandler::read_json(&path)
            .map_err(|source| DeployError::State {
                action: "load",
                path: path.clone(),
                source,
            })?
            .unwrap_or_default();

        if let Some((key, _)) = entries.iter().find(|(_, entry)| !entry.completed) {
            return Err(DeployError::State {
                action: "load",
                path,
                source: anyhow!("entry '{key}' is present but not completed"),
            });
        }

        tracing::debug!(path = %path.display(), entries = entries.len(), "Initialization ledger loaded");

        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_initialized(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The key the sequence `key` of the contract deployed at `address` is
    /// recorded under.
    ///
    /// This is `key` itself unless `key` already holds a sequence completed
    /// against another address (the contract was redeployed since). The new
    /// instance is then tracked under `key@address`, leaving the old entry
    /// untouched.
    pub fn resolve_key(&self, key: &str, address: Address) -> String {
        match self.entries.get(key) {
            Some(entry) if entry.address != address => {
                format!("{key}{ADDRESS_SEPARATOR}{address}")
            }
            _ => key.to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &LedgerEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark a sequence complete and persist the ledger.
    ///
    /// An existing entry is kept as is.
    pub(crate) fn mark_initialized(
        &mut self,
        key: &str,
        entry: LedgerEntry,
    ) -> Result<(), DeployError> {
        if self.entries.contains_key(key) {
            return Ok(());
        }

        self.entries.insert(key.to_string(), entry);
        if let Err(err) = self.persist() {
            self.entries.remove(key);
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_ledger_key() {
        assert_eq!(ledger_key("HumaConfig", None), "HumaConfig");
        assert_eq!(
            ledger_key("BaseCreditPool", Some("liquidity")),
            "BaseCreditPool#liquidity"
        );
    }

    #[test]
    fn test_mark_persists_and_reloads() {
        let temp_dir = TempDir::new("huma-ledger").unwrap();
        let path = temp_dir.path().join("initialized-contracts.json");

        let mut ledger = Ledger::load_or_create(&path).unwrap();
        assert!(!ledger.is_initialized("HumaConfig"));

        ledger
            .mark_initialized("HumaConfig", LedgerEntry::completed_now(Address::with_last_byte(1), 7, 0))
            .unwrap();

        let reloaded = Ledger::load_or_create(&path).unwrap();
        assert!(reloaded.is_initialized("HumaConfig"));
        assert_eq!(reloaded.get("HumaConfig").unwrap().steps_executed, 7);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["HumaConfig"]["completed"], true);
    }

    #[test]
    fn test_existing_entry_is_never_replaced() {
        let mut ledger = Ledger::in_memory();
        let first = LedgerEntry {
            completed: true,
            address: Address::with_last_byte(2),
            initialized_at: 1,
            steps_executed: 3,
            steps_skipped: 0,
        };
        ledger.mark_initialized("EANFT", first.clone()).unwrap();
        ledger
            .mark_initialized("EANFT", LedgerEntry::completed_now(Address::with_last_byte(2), 0, 1))
            .unwrap();

        assert_eq!(ledger.get("EANFT"), Some(&first));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_redeployed_contract_resolves_to_qualified_key() {
        let original = Address::with_last_byte(1);
        let redeployed = Address::with_last_byte(2);

        let mut ledger = Ledger::in_memory();
        assert_eq!(ledger.resolve_key("HumaConfig", original), "HumaConfig");

        ledger
            .mark_initialized("HumaConfig", LedgerEntry::completed_now(original, 7, 0))
            .unwrap();
        assert_eq!(ledger.resolve_key("HumaConfig", original), "HumaConfig");

        let key = ledger.resolve_key("HumaConfig", redeployed);
        assert_eq!(key, format!("HumaConfig@{redeployed}"));
        assert!(!ledger.is_initialized(&key));

        ledger
            .mark_initialized(&key, LedgerEntry::completed_now(redeployed, 7, 0))
            .unwrap();
        assert_eq!(ledger.resolve_key("HumaConfig", redeployed), key);
        assert!(ledger.is_initialized("HumaConfig"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_incomplete_entry_is_rejected_on_load() {
        let temp_dir = TempDir::new("huma-ledger").unwrap();
        let path = temp_dir.path().join("initialized-contracts.json");
        std::fs::write(
            &path,
            r#"{"HumaConfig": {"completed": false, "address": "0x0000000000000000000000000000000000000001", "initialized_at": 0, "steps_executed": 0, "steps_skipped": 0}}"#,
        )
        .unwrap();

        let err = Ledger::load_or_create(&path).unwrap_err();
        assert!(err.to_string().contains("not completed"), "{err}");
    }
}
