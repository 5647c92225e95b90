//! Capability providers for the chain and the wallet
//!
//! The deployment manager and the invocation gateway only talk to these traits.
//! Concrete adapters live at the application boundary.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{Error, Result, Stage};
use crate::timeouts::bounded;
use crate::types::Weight;

/// A named RPC endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub rpc_url: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rpc_url: rpc_url.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.rpc_url)
    }
}

// =============================================================================
// Wallet
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub label: String,
}

/// Authority to sign on behalf of one account
#[derive(Clone)]
pub struct Signer {
    pub account: Account,
    pub wallet: EthereumWallet,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Accounts the wallet exposes, in preference order. Empty when no wallet
    /// is connected.
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    async fn signer(&self, account: &Account) -> Result<Signer>;
}

// =============================================================================
// Chain
// =============================================================================

/// Contract creation
#[derive(Debug, Clone)]
pub struct CreateCall {
    /// Creation bytecode followed by encoded constructor arguments
    pub init_code: Bytes,
    pub weight: Weight,
    pub storage_deposit_limit: Option<u128>,
    /// Deterministic deployment when set
    pub salt: Option<B256>,
    pub value: U256,
}

/// State-mutating message to a deployed contract
#[derive(Debug, Clone)]
pub struct MessageCall {
    pub to: Address,
    pub data: Bytes,
    pub weight: Weight,
    pub value: U256,
}

#[derive(Debug, Clone)]
pub enum Submission {
    Create(CreateCall),
    Message(MessageCall),
}

/// Status notification for a broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    InBlock {
        block_number: u64,
        block_hash: B256,
    },
    Finalized {
        block_number: u64,
        block_hash: B256,
        /// Created contract, for creation transactions
        contract_address: Option<Address>,
    },
    /// Executed and reverted
    Failed { block_number: u64, reason: String },
}

#[async_trait]
pub trait ChainConnector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn ChainConnection>>;
}

#[async_trait]
pub trait ChainConnection: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    /// Unsigned read against the latest state
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// Sign and broadcast. Returns once the node accepted the transaction.
    async fn submit(&self, signer: &Signer, submission: Submission) -> Result<Box<dyn TransactionWatch>>;
}

/// Subscription to the status of one broadcast transaction.
///
/// Implementations yield `InBlock` before `Finalized` when they can observe
/// both, and stop after `Finalized` or `Failed`.
#[async_trait]
pub trait TransactionWatch: Send {
    fn tx_hash(&self) -> B256;

    async fn next_status(&mut self) -> Result<ChainStatus>;
}

// =============================================================================
// Connection Pool
// =============================================================================

/// Chain connections shared by deploy, query and execute, one per network name
#[derive(Clone)]
pub struct ConnectionPool {
    connector: Arc<dyn ChainConnector>,
    connections: Arc<DashMap<String, Arc<dyn ChainConnection>>>,
    connect_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn ChainConnector>, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connections: Arc::new(DashMap::new()),
            connect_timeout,
        }
    }

    /// Reuse the pooled connection for this network or open a new one.
    ///
    /// A pooled connection whose URL no longer matches the endpoint is replaced.
    pub async fn get(&self, endpoint: &Endpoint) -> Result<Arc<dyn ChainConnection>> {
        let cached = self
            .connections
            .get(&endpoint.name)
            .map(|entry| entry.value().clone());
        if let Some(conn) = cached {
            if conn.endpoint().rpc_url == endpoint.rpc_url {
                debug!(network = %endpoint.name, "reusing pooled connection");
                return Ok(conn);
            }
        }

        debug!(network = %endpoint.name, url = %endpoint.rpc_url, "opening chain connection");
        let conn = bounded(
            Stage::Connecting,
            self.connect_timeout,
            None,
            self.connector.connect(endpoint),
        )
        .await?;
        self.connections.insert(endpoint.name.clone(), conn.clone());
        Ok(conn)
    }

    /// Drop a pooled connection so the next use reconnects
    pub fn evict(&self, network: &str) {
        self.connections.remove(network);
    }

    /// Evict the connection for `network` when `err` says the node stopped answering
    pub fn evict_if_unreachable(&self, network: &str, err: &Error) {
        if matches!(err, Error::ChainConnectivity { .. }) {
            debug!(network, error = %err, "dropping pooled connection");
            self.evict(network);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
