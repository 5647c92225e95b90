//! Fake capability providers for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, B256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::chain::{
    Account, ChainConnection, ChainConnector, ChainStatus, Endpoint, Signer, Submission,
    TransactionWatch, WalletProvider,
};
use crate::error::{Error, Result};
use crate::types::CompiledArtifact;

pub const TX_HASH: B256 = B256::repeat_byte(0xab);

pub fn contract_address() -> Address {
    Address::repeat_byte(0xcc)
}

/// `Counter(uint256 start, string label)` with a view getter and a setter
pub fn counter_artifact() -> CompiledArtifact {
    let metadata = serde_json::json!({
        "name": "Counter",
        "abi": [
            {
                "type": "constructor",
                "inputs": [
                    {"name": "start", "type": "uint256"},
                    {"name": "label", "type": "string"}
                ],
                "stateMutability": "nonpayable"
            },
            {
                "type": "function",
                "name": "count",
                "inputs": [],
                "outputs": [{"name": "", "type": "uint256"}],
                "stateMutability": "view"
            },
            {
                "type": "function",
                "name": "setCount",
                "inputs": [{"name": "value", "type": "uint256"}],
                "outputs": [],
                "stateMutability": "nonpayable"
            }
        ]
    });
    CompiledArtifact::from_build(vec![0x60, 0x80, 0x60, 0x40, 0x52], &metadata, "ok").unwrap()
}

// =============================================================================
// Chain
// =============================================================================

#[derive(Default)]
struct ChainScript {
    /// `None` answers the status query with an RPC error
    statuses: Vec<Option<ChainStatus>>,
    call_result: Bytes,
    calls: usize,
    submissions: Vec<Submission>,
    reject: Option<String>,
    hang: bool,
}

/// Scripted chain shared by every connection a [`FakeConnector`] hands out
#[derive(Clone, Default)]
pub struct FakeChain {
    script: Arc<Mutex<ChainScript>>,
}

impl FakeChain {
    /// Every submission goes in-block at #1 and finalizes at #1
    pub fn finalizing() -> Self {
        Self::with_statuses(vec![
            ChainStatus::InBlock {
                block_number: 1,
                block_hash: B256::repeat_byte(1),
            },
            ChainStatus::Finalized {
                block_number: 1,
                block_hash: B256::repeat_byte(1),
                contract_address: Some(contract_address()),
            },
        ])
    }

    /// Every submission lands in a block and reverts
    pub fn reverting(reason: &str) -> Self {
        Self::with_statuses(vec![
            ChainStatus::InBlock {
                block_number: 1,
                block_hash: B256::repeat_byte(1),
            },
            ChainStatus::Failed {
                block_number: 1,
                reason: reason.to_string(),
            },
        ])
    }

    pub fn with_statuses(statuses: Vec<ChainStatus>) -> Self {
        let chain = Self::default();
        chain.script.lock().unwrap().statuses = statuses.into_iter().map(Some).collect();
        chain
    }

    /// The status query at `index` fails once before the script carries on
    pub fn dropping_status_query(self, index: usize) -> Self {
        self.script.lock().unwrap().statuses.insert(index, None);
        self
    }

    /// The watch never reports anything after the scripted statuses
    pub fn hanging(self) -> Self {
        self.script.lock().unwrap().hang = true;
        self
    }

    /// The node answers every call and submission with an RPC error
    pub fn rejecting(self, reason: &str) -> Self {
        self.script.lock().unwrap().reject = Some(reason.to_string());
        self
    }

    pub fn with_call_result(self, data: Vec<u8>) -> Self {
        self.script.lock().unwrap().call_result = data.into();
        self
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.script.lock().unwrap().submissions.clone()
    }

    pub fn calls(&self) -> usize {
        self.script.lock().unwrap().calls
    }
}

pub struct FakeConnection {
    endpoint: Endpoint,
    chain: FakeChain,
}

#[async_trait]
impl ChainConnection for FakeConnection {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes> {
        let mut script = self.chain.script.lock().unwrap();
        script.calls += 1;
        if let Some(reason) = &script.reject {
            return Err(Error::Rpc(reason.clone()));
        }
        Ok(script.call_result.clone())
    }

    async fn submit(&self, _signer: &Signer, submission: Submission) -> Result<Box<dyn TransactionWatch>> {
        let mut script = self.chain.script.lock().unwrap();
        if let Some(reason) = &script.reject {
            return Err(Error::Rpc(reason.clone()));
        }
        script.submissions.push(submission);
        Ok(Box::new(FakeWatch {
            statuses: script.statuses.iter().cloned().collect(),
            hang: script.hang,
        }))
    }
}

struct FakeWatch {
    statuses: VecDeque<Option<ChainStatus>>,
    hang: bool,
}

#[async_trait]
impl TransactionWatch for FakeWatch {
    fn tx_hash(&self) -> B256 {
        TX_HASH
    }

    async fn next_status(&mut self) -> Result<ChainStatus> {
        match self.statuses.pop_front() {
            Some(Some(status)) => Ok(status),
            Some(None) => Err(Error::Rpc("connection reset by peer".into())),
            None if self.hang => std::future::pending().await,
            None => Err(Error::Rpc("status subscription closed".into())),
        }
    }
}

#[derive(Clone)]
pub struct FakeConnector {
    chain: FakeChain,
    connects: Arc<AtomicUsize>,
    unreachable: bool,
}

impl FakeConnector {
    pub fn new(chain: FakeChain) -> Self {
        Self {
            chain,
            connects: Arc::new(AtomicUsize::new(0)),
            unreachable: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::new(FakeChain::default())
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainConnector for FakeConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn ChainConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(Error::Rpc("connection refused".into()));
        }
        Ok(Arc::new(FakeConnection {
            endpoint: endpoint.clone(),
            chain: self.chain.clone(),
        }))
    }
}

// =============================================================================
// Wallet
// =============================================================================

#[derive(Clone, Default)]
pub struct FakeWallet {
    keys: Vec<(Account, PrivateKeySigner)>,
    list_calls: Arc<AtomicUsize>,
}

impl FakeWallet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_accounts(n: usize) -> Self {
        let keys = (0..n)
            .map(|i| {
                let key = PrivateKeySigner::random();
                let account = Account {
                    address: key.address(),
                    label: format!("account-{i}"),
                };
                (account, key)
            })
            .collect();
        Self {
            keys,
            list_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn address(&self, index: usize) -> Address {
        self.keys[index].0.address
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.iter().map(|(account, _)| account.clone()).collect())
    }

    async fn signer(&self, account: &Account) -> Result<Signer> {
        let (account, key) = self
            .keys
            .iter()
            .find(|(a, _)| a == account)
            .ok_or_else(|| Error::WalletNotFound(account.label.clone()))?;
        Ok(Signer {
            account: account.clone(),
            wallet: EthereumWallet::from(key.clone()),
        })
    }
}
