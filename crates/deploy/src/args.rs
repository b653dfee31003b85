//! Constructor/function arguments and per-transaction options.

use std::fmt;

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::{Address, Bytes, U256},
};
use serde::{Deserialize, Serialize};

/// A single constructor or function argument.
///
/// [`Arg::Contract`] names another logical contract. It is resolved to that
/// contract's callable address from the registry right before encoding, which
/// is also how a call declares that it depends on the contract being deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Arg {
    Address(Address),
    Contract(String),
    Uint(U256),
    Bool(bool),
    String(String),
    Bytes(Bytes),
    Addresses(Vec<Address>),
}

impl Arg {
    pub fn address(address: Address) -> Self {
        Self::Address(address)
    }

    pub fn contract(name: impl Into<String>) -> Self {
        Self::Contract(name.into())
    }

    pub fn uint(value: impl Into<U256>) -> Self {
        Self::Uint(value.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// The logical contract this argument refers to, if any.
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Self::Contract(name) => Some(name),
            _ => None,
        }
    }

    /// Convert to an ABI value of the given parameter type.
    ///
    /// Integer widths are taken from the parameter, so `Uint` encodes into any
    /// `uintN` slot.
    pub(crate) fn to_sol_value(&self, ty: &DynSolType) -> Result<DynSolValue, String> {
        match (self, ty) {
            (Self::Address(address), DynSolType::Address) => Ok(DynSolValue::Address(*address)),
            (Self::Uint(value), DynSolType::Uint(bits)) => {
                if *bits < 256 && value.bit_len() > *bits {
                    return Err(format!("{value} does not fit in uint{bits}"));
                }
                Ok(DynSolValue::Uint(*value, *bits))
            }
            (Self::Bool(value), DynSolType::Bool) => Ok(DynSolValue::Bool(*value)),
            (Self::String(value), DynSolType::String) => Ok(DynSolValue::String(value.clone())),
            (Self::Bytes(value), DynSolType::Bytes) => Ok(DynSolValue::Bytes(value.to_vec())),
            (Self::Addresses(values), DynSolType::Array(inner))
                if **inner == DynSolType::Address =>
            {
                Ok(DynSolValue::Array(
                    values.iter().copied().map(DynSolValue::Address).collect(),
                ))
            }
            (Self::Contract(name), _) => Err(format!(
                "reference to contract '{name}' was not resolved to an address"
            )),
            (arg, ty) => Err(format!("cannot encode {arg} as {}", ty.sol_type_name())),
        }
    }
}

impl From<Address> for Arg {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }
}

impl From<U256> for Arg {
    fn from(value: U256) -> Self {
        Self::Uint(value)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{address}"),
            Self::Contract(name) => write!(f, "@{name}"),
            Self::Uint(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Bytes(value) => write!(f, "{value}"),
            Self::Addresses(values) => {
                write!(f, "[")?;
                for (i, address) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{address}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Transaction overrides applied to a single deploy or call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxOptions {
    /// Explicit gas limit. When unset the node estimates it.
    pub gas_limit: Option<u64>,
}

impl TxOptions {
    pub fn gas_limit(gas_limit: u64) -> Self {
        Self {
            gas_limit: Some(gas_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_adopts_parameter_width() {
        let value = Arg::uint(U256::from(500u64)).to_sol_value(&DynSolType::Uint(16)).unwrap();
        assert_eq!(value, DynSolValue::Uint(U256::from(500u64), 16));
    }

    #[test]
    fn test_uint_overflowing_parameter_width_is_rejected() {
        let err = Arg::uint(U256::from(70_000u64))
            .to_sol_value(&DynSolType::Uint(16))
            .unwrap_err();
        assert!(err.contains("uint16"), "unexpected error: {err}");
    }

    #[test]
    fn test_unresolved_contract_reference_is_rejected() {
        let err = Arg::contract("USDC")
            .to_sol_value(&DynSolType::Address)
            .unwrap_err();
        assert!(err.contains("USDC"));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        assert!(Arg::Bool(true).to_sol_value(&DynSolType::Address).is_err());
        assert!(
            Arg::string("CHDT")
                .to_sol_value(&DynSolType::Uint(256))
                .is_err()
        );
    }

    #[test]
    fn test_address_array() {
        let owner = Address::with_last_byte(7);
        let value = Arg::Addresses(vec![owner])
            .to_sol_value(&DynSolType::Array(Box::new(DynSolType::Address)))
            .unwrap();
        assert_eq!(value, DynSolValue::Array(vec![DynSolValue::Address(owner)]));
    }

    #[test]
    fn test_dependency() {
        assert_eq!(Arg::contract("HDT").dependency(), Some("HDT"));
        assert_eq!(Arg::from(5u64).dependency(), None);
    }
}
