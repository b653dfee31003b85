//! Compiled contract artifacts and ABI encoding.
//!
//! Artifacts are read from a Hardhat `artifacts/` tree: every
//! `<ContractName>.json` file carrying an `abi` and a creation `bytecode`.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::{Function, JsonAbi, Param},
    primitives::{Bytes, U256},
};
use anyhow::Context;
use serde::Deserialize;

use crate::{args::Arg, error::DeployError};

/// On-disk Hardhat artifact layout (only the fields we need).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    abi: JsonAbi,
    bytecode: Bytes,
}

/// A compiled contract: its ABI and creation bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub contract_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

impl Artifact {
    pub fn new(contract_name: impl Into<String>, abi: JsonAbi, bytecode: Bytes) -> Self {
        Self {
            contract_name: contract_name.into(),
            abi,
            bytecode,
        }
    }

    /// Creation payload: bytecode followed by the encoded constructor arguments.
    ///
    /// All [`Arg::Contract`] references must already be resolved.
    pub fn encode_deploy(&self, args: &[Arg]) -> Result<Bytes, DeployError> {
        if self.bytecode.is_empty() {
            return Err(DeployError::Artifact {
                contract: self.contract_name.clone(),
                reason: "artifact has no creation bytecode (abstract contract or interface?)"
                    .to_string(),
            });
        }

        let inputs = self
            .abi
            .constructor
            .as_ref()
            .map(|constructor| constructor.inputs.as_slice())
            .unwrap_or_default();

        let encoded = encode_params(inputs, args).map_err(|reason| DeployError::Encoding {
            contract: self.contract_name.clone(),
            function: "constructor".to_string(),
            reason,
        })?;

        let mut data = self.bytecode.to_vec();
        data.extend_from_slice(&encoded);
        Ok(data.into())
    }

    /// Calldata for `function(args...)`.
    ///
    /// Overloads are disambiguated by argument count, then by which one the
    /// arguments encode into.
    pub fn encode_call(&self, function: &str, args: &[Arg]) -> Result<Bytes, DeployError> {
        let encoding_error = |reason: String| DeployError::Encoding {
            contract: self.contract_name.clone(),
            function: function.to_string(),
            reason,
        };

        let mut last_error = None;
        for candidate in self.overloads(function, args.len())? {
            match encode_params(&candidate.inputs, args) {
                Ok(encoded) => {
                    let mut data = candidate.selector().to_vec();
                    data.extend_from_slice(&encoded);
                    return Ok(data.into());
                }
                Err(reason) => last_error = Some(reason),
            }
        }

        Err(encoding_error(last_error.unwrap_or_else(|| {
            format!("no overload takes {} arguments", args.len())
        })))
    }

    /// Decode the return data of a call to `function` with `arg_count` arguments.
    pub fn decode_output(
        &self,
        function: &str,
        arg_count: usize,
        data: &[u8],
    ) -> Result<Vec<DynSolValue>, DeployError> {
        let decoding_error = |reason: String| DeployError::Encoding {
            contract: self.contract_name.clone(),
            function: function.to_string(),
            reason,
        };

        let candidate = self
            .overloads(function, arg_count)?
            .next()
            .ok_or_else(|| decoding_error(format!("no overload takes {arg_count} arguments")))?;

        let types = resolve_types(&candidate.outputs).map_err(decoding_error)?;
        match DynSolType::Tuple(types)
            .abi_decode_params(data)
            .map_err(|e| decoding_error(format!("invalid return data: {e}")))?
        {
            DynSolValue::Tuple(values) => Ok(values),
            other => Ok(vec![other]),
        }
    }

    /// Whether the ABI declares `function` at all.
    pub fn has_function(&self, function: &str) -> bool {
        self.abi.function(function).is_some()
    }

    fn overloads<'a>(
        &'a self,
        function: &str,
        arg_count: usize,
    ) -> Result<impl Iterator<Item = &'a Function> + 'a, DeployError> {
        let overloads = self
            .abi
            .function(function)
            .ok_or_else(|| DeployError::Encoding {
                contract: self.contract_name.clone(),
                function: function.to_string(),
                reason: "function not found in ABI".to_string(),
            })?;

        Ok(overloads
            .iter()
            .filter(move |candidate| candidate.inputs.len() == arg_count))
    }
}

/// Interpret the first return value of a call as an unsigned integer.
pub fn first_uint(values: &[DynSolValue]) -> Option<U256> {
    match values.first()? {
        DynSolValue::Uint(value, _) => Some(*value),
        DynSolValue::Bool(value) => Some(U256::from(*value as u8)),
        DynSolValue::Address(address) => Some(U256::from_be_slice(address.as_slice())),
        _ => None,
    }
}

fn resolve_types(params: &[Param]) -> Result<Vec<DynSolType>, String> {
    params
        .iter()
        .map(|param| {
            param
                .resolve()
                .map_err(|e| format!("unsupported parameter type {}: {e}", param.ty))
        })
        .collect()
}

fn encode_params(params: &[Param], args: &[Arg]) -> Result<Vec<u8>, String> {
    if params.len() != args.len() {
        return Err(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        ));
    }

    let values = resolve_types(params)?
        .iter()
        .zip(args)
        .map(|(ty, arg)| arg.to_sol_value(ty))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// All known artifacts, by contract name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    artifacts: HashMap<String, Artifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_artifacts(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let mut store = Self::new();
        for artifact in artifacts {
            store.insert(artifact);
        }
        store
    }

    /// Load every artifact under a Hardhat artifacts directory.
    ///
    /// Debug files (`*.dbg.json`) and the `build-info` directory are skipped,
    /// as is any JSON file that is not a contract artifact.
    pub fn load_dir(dir: &Path) -> Result<Self, DeployError> {
        let mut files = Vec::new();
        collect_json_files(dir, &mut files).map_err(|source| DeployError::State {
            action: "scan",
            path: dir.to_path_buf(),
            source,
        })?;

        let mut store = Self::new();
        for path in files {
            let content = std::fs::read_to_string(&path).map_err(|e| DeployError::State {
                action: "read",
                path: path.clone(),
                source: e.into(),
            })?;

            match serde_json::from_str::<HardhatArtifact>(&content) {
                Ok(artifact) => {
                    tracing::trace!(
                        contract = %artifact.contract_name,
                        path = %path.display(),
                        "Loaded contract artifact"
                    );
                    store.insert(Artifact::new(
                        artifact.contract_name,
                        artifact.abi,
                        artifact.bytecode,
                    ));
                }
                Err(e) => {
                    tracing::trace!(path = %path.display(), error = %e, "Skipping non-artifact JSON file");
                }
            }
        }

        tracing::debug!(dir = %dir.display(), artifacts = store.len(), "Contract artifacts loaded");
        Ok(store)
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts
            .insert(artifact.contract_name.clone(), artifact);
    }

    pub fn get(&self, contract: &str) -> Result<&Artifact, DeployError> {
        self.artifacts
            .get(contract)
            .ok_or_else(|| DeployError::Artifact {
                contract: contract.to_string(),
                reason: "no compiled artifact with this name".to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

fn collect_json_files(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|name| name == "build-info") {
                continue;
            }
            collect_json_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "json")
            && !path.to_string_lossy().ends_with(".dbg.json")
        {
            files.push(path);
        }
    }

    Ok(())
}
