//! Contract metadata and ABI access
//!
//! [`ContractMetadata`] is the structured interface description that travels
//! with every compiled artifact: the contract name, its JSON ABI and the
//! optional developer documentation emitted by the compiler.

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::{Function, JsonAbi, Param, StateMutability as AlloyStateMutability};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ArgSpec, ConstructorSpec, StateMutability};

/// Label given to the single EVM constructor
pub const CONSTRUCTOR_LABEL: &str = "constructor";

// =============================================================================
// ContractMetadata
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractMetadata {
    name: String,
    abi: JsonAbi,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    devdoc: Option<serde_json::Value>,
}

impl ContractMetadata {
    pub fn new(name: impl Into<String>, abi: JsonAbi) -> Self {
        Self {
            name: name.into(),
            abi,
            devdoc: None,
        }
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let metadata: Self = serde_json::from_value(value.clone())
            .map_err(|e| Error::Metadata(format!("Failed to parse metadata: {}", e)))?;
        if metadata.name.is_empty() {
            return Err(Error::Metadata("contract name is empty".into()));
        }
        Ok(metadata)
    }

    pub fn parse(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    // -------------------------------------------------------------------------
    // Constructors
    // -------------------------------------------------------------------------

    /// All the ways to instantiate this contract.
    ///
    /// EVM contracts have exactly one constructor; a contract that declares
    /// none gets the implicit zero-argument one.
    pub fn constructors(&self) -> Vec<ConstructorSpec> {
        let (inputs, payable) = match &self.abi.constructor {
            Some(c) => (
                c.inputs.as_slice(),
                c.state_mutability == AlloyStateMutability::Payable,
            ),
            None => (&[][..], false),
        };

        vec![ConstructorSpec {
            label: CONSTRUCTOR_LABEL.to_string(),
            args: inputs.iter().map(arg_spec).collect(),
            is_default: true,
            docs: self.constructor_docs(inputs),
            payable,
        }]
    }

    pub fn constructor(&self, label: &str) -> Result<ConstructorSpec> {
        self.constructors()
            .into_iter()
            .find(|c| c.label == label)
            .ok_or_else(|| Error::ConstructorNotFound(label.to_string()))
    }

    pub fn default_constructor(&self) -> ConstructorSpec {
        // constructors() always yields the default one
        let mut all = self.constructors();
        let idx = all.iter().position(|c| c.is_default).unwrap_or(0);
        all.swap_remove(idx)
    }

    fn constructor_docs(&self, inputs: &[Param]) -> Vec<String> {
        let Some(doc) = self
            .devdoc
            .as_ref()
            .and_then(|d| d.get("methods"))
            .and_then(|m| m.get("constructor"))
        else {
            return Vec::new();
        };

        let mut docs = Vec::new();
        if let Some(details) = doc.get("details").and_then(|d| d.as_str()) {
            docs.push(details.to_string());
        }
        if let Some(params) = doc.get("params") {
            for input in inputs {
                if let Some(text) = params.get(&input.name).and_then(|t| t.as_str()) {
                    docs.push(format!("{}: {}", input.name, text));
                }
            }
        }
        docs
    }

    // -------------------------------------------------------------------------
    // Functions
    // -------------------------------------------------------------------------

    /// Look up a function by name or full signature (`transfer(address,uint256)`).
    ///
    /// A bare name picks the first overload.
    pub fn function(&self, name: &str) -> Result<&Function> {
        if name.contains('(') {
            return self
                .abi
                .functions()
                .find(|f| f.signature() == name)
                .ok_or_else(|| Error::FunctionNotFound(name.to_string()));
        }
        self.abi
            .functions
            .get(name)
            .and_then(|funcs| funcs.first())
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))
    }

    /// Functions split into read (view/pure) and write (nonpayable/payable)
    pub fn functions(&self) -> ParsedFunctions {
        let (mut read, mut write): (Vec<_>, Vec<_>) = self
            .abi
            .functions()
            .map(FunctionInfo::from_abi_function)
            .partition(|f| f.is_read_only());

        read.sort_by(|a, b| a.signature.cmp(&b.signature));
        write.sort_by(|a, b| a.signature.cmp(&b.signature));

        ParsedFunctions { read, write }
    }
}

fn arg_spec(param: &Param) -> ArgSpec {
    ArgSpec::new(param.name.clone(), param.selector_type().into_owned())
}

/// Argument specs for a function's inputs
pub fn function_args(func: &Function) -> Vec<ArgSpec> {
    func.inputs.iter().map(arg_spec).collect()
}

// =============================================================================
// Function Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFunctions {
    pub read: Vec<FunctionInfo>,
    pub write: Vec<FunctionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub signature: String,
    pub inputs: Vec<ParamInfo>,
    pub outputs: Vec<ParamInfo>,
    pub state_mutability: StateMutability,
}

impl FunctionInfo {
    pub fn from_abi_function(func: &Function) -> Self {
        Self {
            name: func.name.clone(),
            signature: func.signature(),
            inputs: func.inputs.iter().map(ParamInfo::from_abi_param).collect(),
            outputs: func.outputs.iter().map(ParamInfo::from_abi_param).collect(),
            state_mutability: convert_state_mutability(func.state_mutability),
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.state_mutability.is_read_only()
    }

    pub fn is_payable(&self) -> bool {
        self.state_mutability.is_payable()
    }
}

/// A function or constructor parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    pub param_type: String,
}

impl ParamInfo {
    pub fn from_abi_param(param: &Param) -> Self {
        Self {
            name: param.name.clone(),
            param_type: param.selector_type().into_owned(),
        }
    }
}

pub fn convert_state_mutability(sm: AlloyStateMutability) -> StateMutability {
    match sm {
        AlloyStateMutability::Pure => StateMutability::Pure,
        AlloyStateMutability::View => StateMutability::View,
        AlloyStateMutability::NonPayable => StateMutability::NonPayable,
        AlloyStateMutability::Payable => StateMutability::Payable,
    }
}

/// Render a decoded ABI value as JSON. Integers become decimal strings.
pub fn sol_value_to_json(value: &DynSolValue) -> serde_json::Value {
    use serde_json::Value;
    match value {
        DynSolValue::Address(a) => Value::String(a.to_checksum(None)),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Uint(n, _) => Value::String(n.to_string()),
        DynSolValue::Int(n, _) => Value::String(n.to_string()),
        DynSolValue::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        DynSolValue::FixedBytes(b, size) => {
            Value::String(format!("0x{}", hex::encode(&b[..*size])))
        }
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(items)
        | DynSolValue::FixedArray(items)
        | DynSolValue::Tuple(items) => Value::Array(items.iter().map(sol_value_to_json).collect()),
        _ => Value::Null,
    }
}
