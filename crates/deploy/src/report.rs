//! Summary of a finished run.

use std::fmt;

use chrono::DateTime;
use comfy_table::Table;

use crate::{Deployment, Ledger, LedgerEntry, Registry, RegistryEntry, Scenario};

/// What a run left in the registry and ledger.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scenario: Scenario,
    pub network: String,
    pub chain_id: u64,
    pub dry_run: bool,
    pub contracts: Vec<(String, RegistryEntry)>,
    pub initialized: Vec<(String, LedgerEntry)>,
}

impl RunReport {
    pub fn new(
        scenario: Scenario,
        network: impl Into<String>,
        chain_id: u64,
        dry_run: bool,
        registry: &Registry,
        ledger: &Ledger,
    ) -> Self {
        Self {
            scenario,
            network: network.into(),
            chain_id,
            dry_run,
            contracts: registry
                .entries()
                .map(|(name, entry)| (name.to_string(), entry.clone()))
                .collect(),
            initialized: ledger
                .entries()
                .map(|(key, entry)| (key.to_string(), entry.clone()))
                .collect(),
        }
    }

    pub fn contracts_table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["Name", "Contract", "Address", "Implementation", "Admin"]);

        for (name, entry) in &self.contracts {
            let (implementation, admin) = match entry.deployment {
                Deployment::Plain { .. } => (String::new(), String::new()),
                Deployment::Proxy {
                    implementation,
                    admin,
                    ..
                } => (implementation.to_string(), admin.to_string()),
            };

            table.add_row(vec![
                name.clone(),
                entry.contract.clone(),
                entry.address().to_string(),
                implementation,
                admin,
            ]);
        }

        table
    }

    pub fn initialized_table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["Setup", "Address", "Executed", "Skipped", "Completed at"]);

        for (key, entry) in &self.initialized {
            let completed_at = DateTime::from_timestamp(entry.initialized_at, 0)
                .map(|time| time.to_rfc3339())
                .unwrap_or_else(|| entry.initialized_at.to_string());

            table.add_row(vec![
                key.clone(),
                entry.address.to_string(),
                entry.steps_executed.to_string(),
                entry.steps_skipped.to_string(),
                completed_at,
            ]);
        }

        table
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Scenario '{}' complete on {} (chain id {}){}",
            self.scenario,
            self.network,
            self.chain_id,
            if self.dry_run { " [dry run]" } else { "" }
        )?;
        writeln!(f)?;
        writeln!(f, "Deployed contracts:")?;
        writeln!(f, "{}", self.contracts_table())?;
        writeln!(f)?;
        writeln!(f, "Initialized:")?;
        write!(f, "{}", self.initialized_table())
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::{Address, B256};

    use super::*;

    #[test]
    fn test_report_lists_registry_and_ledger() {
        let mut registry = Registry::in_memory();
        registry
            .record(
                "BaseCreditPool",
                RegistryEntry {
                    contract: "BaseCreditPool".to_string(),
                    deployment: Deployment::Proxy {
                        implementation: Address::with_last_byte(1),
                        proxy: Address::with_last_byte(2),
                        admin: Address::with_last_byte(3),
                    },
                    deployed_by: Address::with_last_byte(4),
                    tx_hash: B256::ZERO,
                },
            )
            .unwrap();

        let mut ledger = Ledger::in_memory();
        ledger
            .mark_initialized(
                "BaseCreditPool#liquidity",
                LedgerEntry {
                    completed: true,
                    address: Address::with_last_byte(2),
                    initialized_at: 0,
                    steps_executed: 9,
                    steps_skipped: 0,
                },
            )
            .unwrap();

        let report = RunReport::new(
            Scenario::BaseCreditPool,
            "localhost",
            31337,
            true,
            &registry,
            &ledger,
        );
        let rendered = report.to_string();

        assert!(rendered.contains("base-credit-pool"));
        assert!(rendered.contains("[dry run]"));
        assert!(rendered.contains(&Address::with_last_byte(2).to_string()));
        assert!(rendered.contains("BaseCreditPool#liquidity"));
        assert!(rendered.contains("1970-01-01"));
    }
}
