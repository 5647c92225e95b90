use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Pipeline stage a failure is attributed to.
///
/// Raw transport errors are always wrapped with one of these labels before
/// they reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Build,
    Connecting,
    AwaitingSignature,
    Broadcasting,
    InBlock,
    Finalized,
    Query,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Connecting => "connecting",
            Stage::AwaitingSignature => "awaiting-signature",
            Stage::Broadcasting => "broadcasting",
            Stage::InBlock => "in-block",
            Stage::Finalized => "finalized",
            Stage::Query => "query",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Build service unreachable: {0}")]
    BuildTransport(String),

    #[error("Build failed: {message}")]
    BuildFailure { message: String, log: String },

    #[error("A build is already running for {0}")]
    BuildInProgress(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Argument '{argument}': {reason}")]
    Coercion { argument: String, reason: String },

    #[error("Wallet unavailable: {0}")]
    WalletUnavailable(String),

    #[error("[{stage}] chain unreachable: {message}")]
    ChainConnectivity { stage: Stage, message: String },

    #[error("[{stage}] transaction {tx_hash} ran but failed: {reason}")]
    ExecutionFailure {
        stage: Stage,
        tx_hash: String,
        reason: String,
    },

    #[error("[{stage}] no response after {}s; outcome unknown{}", .after.as_secs(), tx_hint(.tx_hash))]
    Timeout {
        stage: Stage,
        after: Duration,
        tx_hash: Option<String>,
    },

    /// Node-level error reported by a chain adapter, before a stage label is attached
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Constructor not found: {0}")]
    ConstructorNotFound(String),

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Wallet {0} already exists")]
    WalletExists(String),

    #[error("Deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

fn tx_hint(tx_hash: &Option<String>) -> String {
    match tx_hash {
        Some(hash) => format!(", check transaction {hash} later"),
        None => String::new(),
    }
}

impl Error {
    pub fn coercion(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Coercion {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Attach a stage label to an adapter-level RPC error
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            Error::Rpc(message) => Error::ChainConnectivity { stage, message },
            other => other,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::BuildTransport(_) => "BUILD_TRANSPORT_ERROR",
            Error::BuildFailure { .. } => "BUILD_FAILURE",
            Error::BuildInProgress(_) => "BUILD_IN_PROGRESS",
            Error::InvalidArtifact(_) => "INVALID_ARTIFACT",
            Error::Coercion { .. } => "COERCION_ERROR",
            Error::WalletUnavailable(_) => "WALLET_UNAVAILABLE",
            Error::ChainConnectivity { .. } => "CHAIN_CONNECTIVITY_ERROR",
            Error::ExecutionFailure { .. } => "EXECUTION_FAILURE",
            Error::Timeout { .. } => "TIMEOUT",
            Error::Rpc(_) => "RPC_ERROR",
            Error::Metadata(_) => "METADATA_ERROR",
            Error::ConstructorNotFound(_) => "CONSTRUCTOR_NOT_FOUND",
            Error::FunctionNotFound(_) => "FUNCTION_NOT_FOUND",
            Error::InvalidParameter { .. } => "INVALID_PARAMETER",
            Error::Keyring(_) => "KEYRING_ERROR",
            Error::WalletNotFound(_) => "WALLET_NOT_FOUND",
            Error::WalletExists(_) => "WALLET_EXISTS",
            Error::DeploymentNotFound(_) => "DEPLOYMENT_NOT_FOUND",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::HexDecode(_) => "HEX_DECODE_ERROR",
        }
    }

    /// Whether retrying the same request unchanged can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::BuildTransport(_)
                | Error::BuildInProgress(_)
                | Error::ChainConnectivity { .. }
                | Error::Rpc(_)
                | Error::WalletUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
