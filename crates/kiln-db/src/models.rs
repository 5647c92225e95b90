//! Database entity models
//!
//! Read models derive `FromRow`; write models are the `New*` structs.

use kiln_core::{CallType, ContractMetadata, DeployedContract, Result, TransactionStatus};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// =============================================================================
// Wallets
// =============================================================================

/// Wallet metadata (for listing without key)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub created_at: String,
}

/// Wallet with encrypted private key (for internal use)
#[derive(Debug, Clone, FromRow)]
pub struct WalletWithKey {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub encrypted_key: Vec<u8>,
    pub created_at: String,
}

/// Input for creating a new wallet
#[derive(Debug, Clone)]
pub struct NewWallet {
    pub name: String,
    pub address: String,
    pub encrypted_key: Vec<u8>,
}

// =============================================================================
// Deployments
// =============================================================================

/// A recorded deployment
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: i64,
    pub contract_name: String,
    pub network: String,
    pub address: String,
    pub code_hash: String,
    pub deployer: String,
    pub tx_hash: String,
    pub block_number: i64,
    pub constructor_args: String, // JSON
    #[serde(skip)]
    pub metadata: String, // JSON
    pub deployed_at: String,
}

impl Deployment {
    /// Metadata captured from the artifact that was deployed
    pub fn contract_metadata(&self) -> Result<ContractMetadata> {
        ContractMetadata::parse(&self.metadata)
    }
}

/// Input for recording a deployment
#[derive(Debug, Clone)]
pub struct NewDeployment {
    pub contract_name: String,
    pub network: String,
    pub address: String,
    pub code_hash: String,
    pub deployer: String,
    pub tx_hash: String,
    pub block_number: i64,
    pub constructor_args: String,
    pub metadata: String,
    pub deployed_at: String,
}

impl NewDeployment {
    pub fn from_deployed(deployed: &DeployedContract, metadata: &ContractMetadata) -> Result<Self> {
        Ok(Self {
            contract_name: metadata.name().to_string(),
            network: deployed.network.clone(),
            address: deployed.address.to_checksum(None),
            code_hash: deployed.code_hash.clone(),
            deployer: deployed.deploying_account.to_checksum(None),
            tx_hash: deployed.tx_hash.to_string(),
            block_number: deployed.block_number as i64,
            constructor_args: serde_json::to_string(&deployed.constructor_args)?,
            metadata: metadata.to_value().to_string(),
            deployed_at: deployed.deployed_at.to_rfc3339(),
        })
    }
}

// =============================================================================
// Invocations
// =============================================================================

/// A message sent to a recorded deployment
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub id: i64,
    pub deployment_id: i64,
    pub wallet_id: Option<i64>,
    pub function_name: String,
    pub function_signature: String,
    pub input_params: String, // JSON
    pub call_type: CallType,
    pub result: Option<String>, // JSON for read results
    pub tx_hash: Option<String>,
    pub block_number: Option<i64>,
    pub status: Option<TransactionStatus>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub confirmed_at: Option<String>,
}

/// Input for recording an invocation before it is sent
#[derive(Debug, Clone)]
pub struct NewInvocation {
    pub deployment_id: i64,
    pub wallet_id: Option<i64>,
    pub function_name: String,
    pub function_signature: String,
    pub input_params: String,
    pub call_type: CallType,
}

/// Outcome of an invocation
#[derive(Debug, Clone)]
pub struct InvocationUpdate {
    pub result: Option<String>,
    pub tx_hash: Option<String>,
    pub block_number: Option<i64>,
    pub status: TransactionStatus,
    pub error_message: Option<String>,
}

impl InvocationUpdate {
    pub fn success(tx_hash: impl Into<String>, block_number: Option<i64>) -> Self {
        Self {
            result: None,
            tx_hash: Some(tx_hash.into()),
            block_number,
            status: TransactionStatus::Success,
            error_message: None,
        }
    }

    /// Read-only call that returned `result` (JSON)
    pub fn returned(result: impl Into<String>) -> Self {
        Self {
            result: Some(result.into()),
            tx_hash: None,
            block_number: None,
            status: TransactionStatus::Success,
            error_message: None,
        }
    }

    pub fn failed(tx_hash: Option<String>, error: impl Into<String>) -> Self {
        Self {
            result: None,
            tx_hash,
            block_number: None,
            status: TransactionStatus::Failed,
            error_message: Some(error.into()),
        }
    }

    /// Broadcast but never observed as final
    pub fn unknown(tx_hash: Option<String>, error: impl Into<String>) -> Self {
        Self {
            status: TransactionStatus::Unknown,
            ..Self::failed(tx_hash, error)
        }
    }
}
