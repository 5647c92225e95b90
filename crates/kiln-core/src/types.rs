use std::fmt;
use std::path::PathBuf;

use alloy::primitives::{Bytes, I256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::abi::ContractMetadata;
use crate::bytecode::Bytecode;
use crate::error::{Error, Result};

/// Re-export alloy types for convenience
pub use alloy::primitives::{Address, B256};

// =============================================================================
// Build Inputs
// =============================================================================

/// Opaque reference to a project's file set, persisted by someone else
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectHandle {
    pub path: PathBuf,
    /// Contract to build; the build service picks the first deployable one when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
}

impl ProjectHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contract: None,
        }
    }

    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }
}

impl fmt::Display for ProjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.contract {
            Some(contract) => write!(f, "{}:{}", self.path.display(), contract),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

// =============================================================================
// Artifact Model
// =============================================================================

/// One declared argument of a constructor or message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgSpec {
    pub label: String,
    pub type_descriptor: String,
}

impl ArgSpec {
    pub fn new(label: impl Into<String>, type_descriptor: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            type_descriptor: type_descriptor.into(),
        }
    }
}

/// One way to instantiate a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructorSpec {
    pub label: String,
    pub args: Vec<ArgSpec>,
    pub is_default: bool,
    pub docs: Vec<String>,
    pub payable: bool,
}

/// Output of a successful build: the deployable binary plus its interface
/// description, keyed by a content hash of the binary.
///
/// There is no way to mutate an artifact; a new build produces a new one.
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    binary: Bytecode,
    metadata: ContractMetadata,
    code_hash: String,
    built_at: DateTime<Utc>,
    build_log: String,
}

impl CompiledArtifact {
    /// Validate raw build output and wrap it.
    ///
    /// The code hash is always derived from `binary` here, never accepted from
    /// the build service.
    pub fn from_build(
        binary: Vec<u8>,
        metadata: &serde_json::Value,
        build_log: impl Into<String>,
    ) -> Result<Self> {
        let binary = Bytecode::from_bytes(binary);
        if binary.is_empty() {
            return Err(Error::InvalidArtifact(
                "binary is empty (interface or abstract contract?)".into(),
            ));
        }
        let metadata = ContractMetadata::from_value(metadata)
            .map_err(|e| Error::InvalidArtifact(e.to_string()))?;
        let code_hash = binary.hash();

        Ok(Self {
            binary,
            metadata,
            code_hash,
            built_at: Utc::now(),
            build_log: build_log.into(),
        })
    }

    pub fn binary(&self) -> &[u8] {
        self.binary.as_bytes()
    }

    /// Creation code with encoded constructor arguments appended
    pub fn init_code(&self, encoded_args: &[u8]) -> Vec<u8> {
        self.binary.init_code(encoded_args)
    }

    pub fn metadata(&self) -> &ContractMetadata {
        &self.metadata
    }

    pub fn code_hash(&self) -> &str {
        &self.code_hash
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn build_log(&self) -> &str {
        &self.build_log
    }

    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    /// All constructors declared by the metadata
    pub fn constructors(&self) -> Vec<ConstructorSpec> {
        self.metadata.constructors()
    }
}

/// A value produced by argument coercion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Primitive {
    Integer(U256),
    Signed(I256),
    Decimal(f64),
    Bool(bool),
    Text(String),
    Address(Address),
    Bytes(Bytes),
    List(Vec<Primitive>),
}

impl Primitive {
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Integer(_) => "integer",
            Primitive::Signed(_) => "signed integer",
            Primitive::Decimal(_) => "decimal",
            Primitive::Bool(_) => "bool",
            Primitive::Text(_) => "string",
            Primitive::Address(_) => "address",
            Primitive::Bytes(_) => "bytes",
            Primitive::List(_) => "list",
        }
    }

    /// Plain JSON rendering, used when recording arguments
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Primitive::Integer(n) => Value::String(n.to_string()),
            Primitive::Signed(n) => Value::String(n.to_string()),
            Primitive::Decimal(d) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Primitive::Bool(b) => Value::Bool(*b),
            Primitive::Text(s) => Value::String(s.clone()),
            Primitive::Address(a) => Value::String(a.to_checksum(None)),
            Primitive::Bytes(b) => Value::String(b.to_string()),
            Primitive::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

/// Two-dimensional execution budget.
///
/// `ref_time` is the caller's gas limit. `proof_size` is derived as half of it
/// until the chain adapter offers a real estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weight {
    pub ref_time: u64,
    pub proof_size: u64,
}

impl Weight {
    pub fn from_gas_limit(gas_limit: u64) -> Self {
        Self {
            ref_time: gas_limit,
            proof_size: gas_limit / 2,
        }
    }
}

/// Input for one deployment attempt. Build a fresh one for every attempt.
#[derive(Debug, Clone)]
pub struct DeploymentRequest<'a> {
    pub artifact: &'a CompiledArtifact,
    pub constructor_label: String,
    pub coerced_args: Vec<Primitive>,
    pub gas_limit: u64,
    pub storage_deposit_limit: Option<u128>,
    pub salt: Option<Vec<u8>>,
    /// Native value sent to a payable constructor
    pub value: Option<U256>,
}

impl<'a> DeploymentRequest<'a> {
    pub fn new(
        artifact: &'a CompiledArtifact,
        constructor_label: impl Into<String>,
        coerced_args: Vec<Primitive>,
        gas_limit: u64,
    ) -> Self {
        Self {
            artifact,
            constructor_label: constructor_label.into(),
            coerced_args,
            gas_limit,
            storage_deposit_limit: None,
            salt: None,
            value: None,
        }
    }

    pub fn with_storage_deposit_limit(mut self, limit: u128) -> Self {
        self.storage_deposit_limit = Some(limit);
        self
    }

    pub fn with_salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn weight(&self) -> Weight {
        Weight::from_gas_limit(self.gas_limit)
    }
}

/// Stage of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxStage {
    Connecting,
    AwaitingSignature,
    Broadcasting,
    InBlock,
    Finalized,
    Failed,
}

impl TxStage {
    /// `Finalized` and `Failed` end a submission for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStage::Finalized | TxStage::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxStage::Connecting => "connecting",
            TxStage::AwaitingSignature => "awaiting-signature",
            TxStage::Broadcasting => "broadcasting",
            TxStage::InBlock => "in-block",
            TxStage::Finalized => "finalized",
            TxStage::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress report for a deployment or state-mutating call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub stage: TxStage,
    pub detail: String,
}

impl TransactionOutcome {
    pub fn new(stage: TxStage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            detail: detail.into(),
        }
    }
}

/// Durable record of a finalized deployment.
///
/// Only the deployment manager can create one, and only from a finalized
/// transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct DeployedContract {
    pub address: Address,
    pub code_hash: String,
    pub deployed_at: DateTime<Utc>,
    pub deploying_account: Address,
    pub tx_hash: B256,
    pub block_number: u64,
    pub network: String,
    pub constructor_args: Vec<Primitive>,
}

// =============================================================================
// Domain Enums
// =============================================================================

/// Type of contract call (read-only or state-changing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CallType {
    Read,
    Write,
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Read => "read",
            CallType::Write => "write",
        }
    }
}

/// Status of a recorded invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Unknown,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Unknown => "unknown",
        }
    }
}

/// State mutability of a contract function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

impl StateMutability {
    /// Returns true if this function does not modify state
    pub fn is_read_only(&self) -> bool {
        matches!(self, StateMutability::Pure | StateMutability::View)
    }

    pub fn is_payable(&self) -> bool {
        matches!(self, StateMutability::Payable)
    }
}

// =============================================================================
// ID Newtypes
// =============================================================================

/// Deployment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(transparent)]
pub struct DeploymentId(pub i64);

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DeploymentId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"{
        "name": "Flipper",
        "abi": [
            {"type": "constructor", "inputs": [{"name": "initial", "type": "bool"}], "stateMutability": "nonpayable"},
            {"type": "function", "name": "get", "inputs": [], "outputs": [{"name": "", "type": "bool"}], "stateMutability": "view"}
        ]
    }"#;

    fn metadata() -> serde_json::Value {
        serde_json::from_str(METADATA).unwrap()
    }

    #[test]
    fn test_artifact_hash_is_content_hash() {
        let a = CompiledArtifact::from_build(vec![0x60, 0x80, 0x60, 0x40], &metadata(), "").unwrap();
        let b = CompiledArtifact::from_build(vec![0x60, 0x80, 0x60, 0x40], &metadata(), "").unwrap();
        let c = CompiledArtifact::from_build(vec![0x60, 0x80], &metadata(), "").unwrap();

        assert_eq!(a.code_hash(), b.code_hash());
        assert_ne!(a.code_hash(), c.code_hash());
        assert_eq!(a.code_hash().len(), 64);
        assert_eq!(a.name(), "Flipper");
    }

    #[test]
    fn test_artifact_rejects_empty_binary() {
        let err = CompiledArtifact::from_build(Vec::new(), &metadata(), "log").unwrap_err();
        assert!(matches!(err, Error::InvalidArtifact(_)));
    }

    #[test]
    fn test_artifact_rejects_bad_metadata() {
        let bad = serde_json::json!({"name": "X", "abi": "not an abi"});
        let err = CompiledArtifact::from_build(vec![0x60], &bad, "").unwrap_err();
        assert!(matches!(err, Error::InvalidArtifact(_)));
    }

    #[test]
    fn test_weight_proof_size_is_half() {
        let weight = Weight::from_gas_limit(100_000_000_001);
        assert_eq!(weight.ref_time, 100_000_000_001);
        assert_eq!(weight.proof_size, 50_000_000_000);
    }

    #[test]
    fn test_tx_stage_terminal() {
        assert!(TxStage::Finalized.is_terminal());
        assert!(TxStage::Failed.is_terminal());
        assert!(!TxStage::InBlock.is_terminal());
        assert_eq!(
            serde_json::to_string(&TxStage::AwaitingSignature).unwrap(),
            "\"awaiting-signature\""
        );
    }

    #[test]
    fn test_project_handle_display() {
        let handle = ProjectHandle::new("/tmp/flipper").with_contract("Flipper");
        assert_eq!(handle.to_string(), "/tmp/flipper:Flipper");
        assert_eq!(ProjectHandle::new("/tmp/x").to_string(), "/tmp/x");
    }

    #[test]
    fn test_primitive_to_json() {
        let list = Primitive::List(vec![
            Primitive::Integer(U256::from(42u64)),
            Primitive::Text("hello".into()),
            Primitive::Bool(true),
        ]);
        assert_eq!(list.to_json(), serde_json::json!(["42", "hello", true]));
    }
}
