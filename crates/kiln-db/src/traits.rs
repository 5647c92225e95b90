//! Repository traits for the registry
//!
//! Handlers and commands depend on these rather than on [`crate::Database`]
//! directly, so a different backend or an in-memory fake can stand in.

use async_trait::async_trait;
use kiln_core::{DeploymentId, Result};

use crate::models::{
    Deployment, Invocation, InvocationUpdate, NewDeployment, NewInvocation, NewWallet, Wallet,
    WalletWithKey,
};

// =============================================================================
// Filter Types
// =============================================================================

/// Filter for listing deployments
#[derive(Debug, Default, Clone)]
pub struct DeploymentFilter {
    /// Filter by network name
    pub network: Option<String>,
    /// Filter by contract name
    pub contract: Option<String>,
}

impl DeploymentFilter {
    pub fn for_network(network: impl Into<String>) -> Self {
        Self {
            network: Some(network.into()),
            ..Default::default()
        }
    }

    pub fn for_contract(contract: impl Into<String>) -> Self {
        Self {
            contract: Some(contract.into()),
            ..Default::default()
        }
    }
}

/// Filter for listing invocations
#[derive(Debug, Default, Clone)]
pub struct InvocationFilter {
    pub deployment_id: Option<DeploymentId>,
    pub limit: Option<u32>,
}

// =============================================================================
// Repository Traits
// =============================================================================

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// List all wallets (without encrypted keys), ordered by name
    async fn list(&self) -> Result<Vec<Wallet>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Wallet>>;

    /// Get a wallet by name with encrypted key
    async fn get_with_key(&self, name: &str) -> Result<Option<WalletWithKey>>;

    /// Store a new wallet; a taken name or address is `Error::WalletExists`
    async fn create(&self, wallet: &NewWallet) -> Result<Wallet>;

    /// Delete a wallet by name, returning whether it existed
    async fn delete(&self, name: &str) -> Result<bool>;
}

#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    /// List deployments, newest first
    async fn list(&self, filter: DeploymentFilter) -> Result<Vec<Deployment>>;

    async fn get_by_id(&self, id: DeploymentId) -> Result<Option<Deployment>>;

    /// Most recent deployment of a contract on a network
    async fn get_latest(&self, contract: &str, network: &str) -> Result<Option<Deployment>>;

    async fn exists_by_tx_hash(&self, tx_hash: &str) -> Result<bool>;

    async fn create(&self, deployment: &NewDeployment) -> Result<Deployment>;
}

#[async_trait]
pub trait InvocationRepository: Send + Sync {
    /// List invocations, newest first
    async fn list(&self, filter: InvocationFilter) -> Result<Vec<Invocation>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Invocation>>;

    /// Record an invocation in `pending` state
    async fn create(&self, entry: &NewInvocation) -> Result<Invocation>;

    /// Record the outcome of an invocation
    async fn update(&self, id: i64, update: &InvocationUpdate) -> Result<()>;
}

// =============================================================================
// Aggregate Repository
// =============================================================================

/// Combined access to all repositories
pub trait Repositories: Send + Sync {
    fn wallets(&self) -> &dyn WalletRepository;

    fn deployments(&self) -> &dyn DeploymentRepository;

    fn invocations(&self) -> &dyn InvocationRepository;
}
