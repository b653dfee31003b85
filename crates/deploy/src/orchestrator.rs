//! Initialization orchestrator: runs a contract's one-time setup sequence.
//!
//! A setup sequence is an ordered list of calls against deployed contracts. It
//! runs at most once per ledger key: once every step has been confirmed the key
//! is written to the [`Ledger`], and later runs skip the sequence entirely. A
//! failed sequence leaves no trace in the ledger and starts again from its
//! first step on the next run, so steps must be safe to repeat. Steps that are
//! not (minting, deposits) carry a [`Guard`].

use std::fmt;

use alloy_core::primitives::{Address, Bytes, U256};
use anyhow::anyhow;

use crate::{
    Arg, ArtifactStore, ChainClient, DeployError, Ledger, LedgerEntry, Registry, Role,
    SignerRoles, TxOptions,
    artifacts::first_uint,
    chain::{TxRequest, send_and_confirm},
    deployer::resolve_args,
    ledger::ledger_key,
};

/// A read-only call whose non-zero result means a step's effect is already
/// present on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub target: String,
    pub function: String,
    pub args: Vec<Arg>,
}

impl Guard {
    pub fn view(
        target: impl Into<String>,
        function: impl Into<String>,
        args: impl IntoIterator<Item = Arg>,
    ) -> Self {
        Self {
            target: target.into(),
            function: function.into(),
            args: args.into_iter().collect(),
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.function)
    }
}

/// One call of a setup sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupStep {
    /// Contract the call is sent to. `None` targets the contract being
    /// initialized.
    pub target: Option<String>,
    pub function: String,
    pub args: Vec<Arg>,
    pub signer: Role,
    pub options: TxOptions,
    /// The step is skipped when any of these returns a non-zero value.
    pub guards: Vec<Guard>,
}

impl SetupStep {
    pub fn new(function: impl Into<String>, args: impl IntoIterator<Item = Arg>) -> Self {
        Self {
            target: None,
            function: function.into(),
            args: args.into_iter().collect(),
            signer: Role::Deployer,
            options: TxOptions::default(),
            guards: Vec::new(),
        }
    }

    /// Send the call to another registered contract.
    pub fn on(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Send the call from another signer role.
    pub fn from(mut self, signer: Role) -> Self {
        self.signer = signer;
        self
    }

    pub fn options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }

    /// Skip the step when `guard` returns a non-zero value. Can be given
    /// several times; any one guard holding skips the step.
    pub fn skip_if_nonzero(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// Human-readable label, e.g. `USDC.approve`.
    pub fn label(&self, default_target: &str) -> String {
        format!(
            "{}.{}",
            self.target.as_deref().unwrap_or(default_target),
            self.function
        )
    }

    fn target_or<'a>(&'a self, default_target: &'a str) -> &'a str {
        self.target.as_deref().unwrap_or(default_target)
    }

    /// Every logical contract this step needs in the registry.
    fn dependencies<'a>(&'a self, default_target: &'a str) -> impl Iterator<Item = &'a str> {
        let guard_deps = self
            .guards
            .iter()
            .flat_map(|guard| std::iter::once(guard.target.as_str()).chain(guard.args.iter().filter_map(Arg::dependency)));

        std::iter::once(self.target_or(default_target))
            .chain(self.args.iter().filter_map(Arg::dependency))
            .chain(guard_deps)
    }
}

/// What [`Orchestrator::ensure_initialized`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The ledger already held the sequence; nothing was sent.
    AlreadyInitialized,
    /// The sequence ran to completion and the ledger entry was written.
    Initialized { executed: usize, skipped: usize },
}

/// Everything a setup sequence reads while executing.
pub struct StepContext<'a, C> {
    pub chain: &'a C,
    pub artifacts: &'a ArtifactStore,
    pub registry: &'a Registry,
    pub roles: &'a SignerRoles,
}

/// A step with its calldata and addresses resolved ahead of execution.
struct PreparedStep {
    label: String,
    from: Address,
    to: Address,
    data: Bytes,
    gas_limit: Option<u64>,
    guards: Vec<PreparedGuard>,
}

struct PreparedGuard {
    label: String,
    to: Address,
    contract: String,
    function: String,
    arg_count: usize,
    data: Bytes,
}

/// Runs setup sequences and owns the [`Ledger`].
#[derive(Debug)]
pub struct Orchestrator {
    ledger: Ledger,
}

impl Orchestrator {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    /// Run the setup sequence of `name` unless the ledger records it complete.
    ///
    /// Completion is tied to the address `name` is registered at. Once `name`
    /// is redeployed its earlier entry no longer counts, and the sequence runs
    /// again for the new instance under `name@<address>`.
    pub async fn ensure_initialized<C: ChainClient>(
        &mut self,
        ctx: StepContext<'_, C>,
        name: &str,
        steps: &[SetupStep],
    ) -> Result<InitOutcome, DeployError> {
        self.run_sequence(ctx, name, None, steps).await
    }

    /// Run a named follow-up sequence of `name`, recorded under `name#phase`.
    pub async fn ensure_phase<C: ChainClient>(
        &mut self,
        ctx: StepContext<'_, C>,
        name: &str,
        phase: &str,
        steps: &[SetupStep],
    ) -> Result<InitOutcome, DeployError> {
        crate::deployer::validate_logical_name(phase)?;
        self.run_sequence(ctx, name, Some(phase), steps).await
    }

    async fn run_sequence<C: ChainClient>(
        &mut self,
        ctx: StepContext<'_, C>,
        name: &str,
        phase: Option<&str>,
        steps: &[SetupStep],
    ) -> Result<InitOutcome, DeployError> {
        let key = ledger_key(name, phase);

        let Some(address) = ctx.registry.address(name) else {
            return Err(DeployError::MissingDependency {
                name: key,
                dependency: name.to_string(),
            });
        };

        let key = self.ledger.resolve_key(&key, address);
        if self.ledger.is_initialized(&key) {
            tracing::info!(key = %key, "Already initialized, skipping setup sequence");
            return Ok(InitOutcome::AlreadyInitialized);
        }

        // Resolve everything up front so an ordering mistake fails before any
        // transaction is sent.
        let prepared = steps
            .iter()
            .map(|step| prepare_step(&ctx, &key, name, step))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(key = %key, steps = prepared.len(), "Running setup sequence...");

        let mut executed = 0;
        let mut skipped = 0;
        for (index, step) in prepared.into_iter().enumerate() {
            let failure = |source: anyhow::Error| {
                tracing::error!(key = %key, step_index = index, step = %step.label, error = %source, "Setup step failed");
                DeployError::InitializationFailure {
                    name: key.clone(),
                    failed_step_index: index,
                    step: step.label.clone(),
                    source,
                }
            };

            let mut effect_present = false;
            for guard in &step.guards {
                let value = evaluate_guard(ctx.chain, ctx.artifacts, guard)
                    .await
                    .map_err(&failure)?;
                if !value.is_zero() {
                    tracing::info!(
                        key = %key,
                        step_index = index,
                        step = %step.label,
                        guard = %guard.label,
                        %value,
                        "Step effect already present, skipping"
                    );
                    effect_present = true;
                    break;
                }
            }
            if effect_present {
                skipped += 1;
                continue;
            }

            tracing::debug!(key = %key, step_index = index, step = %step.label, from = %step.from, "Executing setup step");
            send_and_confirm(
                ctx.chain,
                TxRequest::call(step.from, step.to, step.data.clone(), step.gas_limit),
            )
            .await
            .map_err(&failure)?;
            executed += 1;
        }

        self.ledger
            .mark_initialized(&key, LedgerEntry::completed_now(address, executed, skipped))?;
        tracing::info!(key = %key, executed, skipped, "Initialization complete");

        Ok(InitOutcome::Initialized { executed, skipped })
    }
}

fn prepare_step<C>(
    ctx: &StepContext<'_, C>,
    key: &str,
    name: &str,
    step: &SetupStep,
) -> Result<PreparedStep, DeployError> {
    for dependency in step.dependencies(name) {
        if !ctx.registry.contains(dependency) {
            return Err(DeployError::MissingDependency {
                name: key.to_string(),
                dependency: dependency.to_string(),
            });
        }
    }

    let (to, data) = encode_call(ctx, key, step.target_or(name), &step.function, &step.args)?;

    let guards = step
        .guards
        .iter()
        .map(|guard| {
            let (to, data) = encode_call(ctx, key, &guard.target, &guard.function, &guard.args)?;
            let contract = contract_of(ctx.registry, &guard.target)?;
            Ok(PreparedGuard {
                label: guard.to_string(),
                to,
                contract,
                function: guard.function.clone(),
                arg_count: guard.args.len(),
                data,
            })
        })
        .collect::<Result<Vec<_>, DeployError>>()?;

    Ok(PreparedStep {
        label: step.label(name),
        from: ctx.roles.get(step.signer),
        to,
        data,
        gas_limit: step.options.gas_limit,
        guards,
    })
}

fn contract_of(registry: &Registry, name: &str) -> Result<String, DeployError> {
    registry
        .get(name)
        .map(|entry| entry.contract.clone())
        .ok_or_else(|| DeployError::MissingDependency {
            name: name.to_string(),
            dependency: name.to_string(),
        })
}

/// Resolve `target` and encode `function(args)` against its artifact.
fn encode_call<C>(
    ctx: &StepContext<'_, C>,
    key: &str,
    target: &str,
    function: &str,
    args: &[Arg],
) -> Result<(Address, Bytes), DeployError> {
    let entry = ctx
        .registry
        .get(target)
        .ok_or_else(|| DeployError::MissingDependency {
            name: key.to_string(),
            dependency: target.to_string(),
        })?;

    let args = resolve_args(ctx.registry, key, args)?;
    let data = ctx
        .artifacts
        .get(&entry.contract)?
        .encode_call(function, &args)?;

    Ok((entry.address(), data))
}

async fn evaluate_guard<C: ChainClient>(
    chain: &C,
    artifacts: &ArtifactStore,
    guard: &PreparedGuard,
) -> anyhow::Result<U256> {
    let output = chain.call(guard.to, guard.data.clone()).await?;
    let values = artifacts
        .get(&guard.contract)?
        .decode_output(&guard.function, guard.arg_count, &output)?;

    first_uint(&values).ok_or_else(|| anyhow!("guard {} did not return a number", guard.label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_label_and_dependencies() {
        let step = SetupStep::new("approve", [Arg::contract("BaseCreditPool"), Arg::uint(U256::from(1u64))])
            .on("USDC")
            .from(Role::Treasury)
            .skip_if_nonzero(Guard::view("BaseCreditHDT", "balanceOf", [Arg::Address(Address::ZERO)]));

        assert_eq!(step.label("BaseCreditPool"), "USDC.approve");
        assert_eq!(step.signer, Role::Treasury);
        assert_eq!(
            step.dependencies("BaseCreditPool").collect::<Vec<_>>(),
            vec!["USDC", "BaseCreditPool", "BaseCreditHDT"]
        );
    }

    #[test]
    fn test_default_target() {
        let step = SetupStep::new("enablePool", []);
        assert_eq!(step.label("BaseCreditPool"), "BaseCreditPool.enablePool");
        assert_eq!(
            step.dependencies("BaseCreditPool").collect::<Vec<_>>(),
            vec!["BaseCreditPool"]
        );
    }
}
