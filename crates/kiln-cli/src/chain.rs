//! EVM chain adapter on top of alloy
//!
//! `in-block` means a receipt exists, `failed` means the receipt reports a
//! revert, and `finalized` means the node's `finalized` block has reached the
//! receipt's block. Nodes without a `finalized` tag fall back to the latest
//! block. A salted creation only counts once code exists at the predicted
//! address.

use std::sync::Arc;
use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::primitives::{address, Address, Bytes, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportError;
use async_trait::async_trait;
use kiln_core::{
    ChainConnection, ChainConnector, ChainStatus, Endpoint, Error, Result, Signer, Submission,
    TransactionWatch,
};
use reqwest::Url;
use tracing::{debug, trace, warn};

/// Deterministic deployment proxy used for salted creation
pub const CREATE2_DEPLOYER: Address = address!("4e59b44847b379578588920ca78fbf26c0b4956c");

const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn rpc(err: impl std::fmt::Display) -> Error {
    Error::Rpc(err.to_string())
}

/// Nodes that predate the `finalized` tag reject it as an invalid parameter
fn is_unsupported_tag(err: &TransportError) -> bool {
    err.as_error_resp().is_some_and(|payload| {
        payload.code == -32602 || payload.message.to_lowercase().contains("finalized")
    })
}

/// Opens connections to JSON-RPC endpoints
#[derive(Debug, Clone)]
pub struct AlloyConnector {
    poll_interval: Duration,
}

impl Default for AlloyConnector {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
        }
    }
}

#[async_trait]
impl ChainConnector for AlloyConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn ChainConnection>> {
        let url: Url = endpoint
            .rpc_url
            .parse()
            .map_err(|e| Error::invalid_param("rpc_url", format!("Invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new().connect_http(url.clone()).erased();

        let chain_id = provider.get_chain_id().await.map_err(rpc)?;
        debug!(network = %endpoint.name, chain_id, "connected");

        Ok(Arc::new(AlloyConnection {
            endpoint: endpoint.clone(),
            url,
            chain_id,
            provider,
            poll_interval: self.poll_interval,
        }))
    }
}

pub struct AlloyConnection {
    endpoint: Endpoint,
    url: Url,
    chain_id: u64,
    provider: DynProvider,
    poll_interval: Duration,
}

/// Transaction request plus the address CREATE2 will produce, if salted
fn build_request(submission: Submission) -> (TransactionRequest, Option<Address>) {
    match submission {
        Submission::Create(create) => {
            debug!(
                gas = create.weight.ref_time,
                proof_size = create.weight.proof_size,
                storage_deposit_limit = ?create.storage_deposit_limit,
                "creation budget"
            );
            let base = TransactionRequest::default()
                .gas_limit(create.weight.ref_time)
                .value(create.value);
            match create.salt {
                Some(salt) => {
                    let predicted = CREATE2_DEPLOYER.create2_from_code(salt, &create.init_code);
                    let mut data = salt.to_vec();
                    data.extend_from_slice(&create.init_code);
                    let request = base.to(CREATE2_DEPLOYER).input(Bytes::from(data).into());
                    (request, Some(predicted))
                }
                None => (base.with_deploy_code(create.init_code), None),
            }
        }
        Submission::Message(message) => {
            let request = TransactionRequest::default()
                .to(message.to)
                .input(message.data.into())
                .gas_limit(message.weight.ref_time)
                .value(message.value);
            (request, None)
        }
    }
}

#[async_trait]
impl ChainConnection for AlloyConnection {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().to(to).input(data.into());
        self.provider.call(tx).await.map_err(rpc)
    }

    async fn submit(
        &self,
        signer: &Signer,
        submission: Submission,
    ) -> Result<Box<dyn TransactionWatch>> {
        let (request, predicted) = build_request(submission);
        if predicted.is_some() {
            self.ensure_deployer().await?;
        }
        let request = request
            .from(signer.account.address)
            .with_chain_id(self.chain_id);

        let provider = ProviderBuilder::new()
            .wallet(signer.wallet.clone())
            .connect_http(self.url.clone());
        let pending = provider.send_transaction(request).await.map_err(rpc)?;
        let tx_hash = *pending.tx_hash();
        debug!(tx = %tx_hash, network = %self.endpoint.name, "accepted by node");

        Ok(Box::new(ReceiptWatch {
            provider: self.provider.clone(),
            tx_hash,
            predicted,
            included: None,
            poll_interval: self.poll_interval,
        }))
    }
}

impl AlloyConnection {
    /// Salted creation needs the deterministic deployer on this chain
    async fn ensure_deployer(&self) -> Result<()> {
        let code = self.provider.get_code_at(CREATE2_DEPLOYER).await.map_err(rpc)?;
        if code.is_empty() {
            return Err(Error::invalid_param(
                "salt",
                format!(
                    "no CREATE2 deployer at {} on {}; deploy without a salt",
                    CREATE2_DEPLOYER, self.endpoint.name
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Inclusion {
    block_number: u64,
    block_hash: B256,
    contract_address: Option<Address>,
}

/// Polls the receipt, then the finalized head
struct ReceiptWatch {
    provider: DynProvider,
    tx_hash: B256,
    predicted: Option<Address>,
    included: Option<Inclusion>,
    poll_interval: Duration,
}

impl ReceiptWatch {
    /// Current receipt position, or `Failed` when the transaction reverted
    async fn receipt(&self) -> Result<Option<std::result::Result<Inclusion, ChainStatus>>> {
        let Some(receipt) = self
            .provider
            .get_transaction_receipt(self.tx_hash)
            .await
            .map_err(rpc)?
        else {
            return Ok(None);
        };
        let (Some(block_number), Some(block_hash)) = (receipt.block_number, receipt.block_hash)
        else {
            return Ok(None);
        };

        if !receipt.status() {
            return Ok(Some(Err(ChainStatus::Failed {
                block_number,
                reason: "execution reverted".to_string(),
            })));
        }

        let contract_address = match (receipt.contract_address, self.predicted) {
            (Some(created), _) => Some(created),
            (None, Some(predicted)) => {
                let code = self.provider.get_code_at(predicted).await.map_err(rpc)?;
                if code.is_empty() {
                    return Ok(Some(Err(ChainStatus::Failed {
                        block_number,
                        reason: format!("no contract code at predicted address {}", predicted),
                    })));
                }
                Some(predicted)
            }
            (None, None) => None,
        };

        Ok(Some(Ok(Inclusion {
            block_number,
            block_hash,
            contract_address,
        })))
    }

    async fn finalized_head(&self) -> Result<u64> {
        match self.provider.get_block_by_number(BlockNumberOrTag::Finalized).await {
            Ok(Some(block)) => Ok(block.header.number),
            Ok(None) => {
                trace!("no finalized block, using latest block");
                self.latest_head().await
            }
            Err(err) if is_unsupported_tag(&err) => {
                trace!(error = %err, "finalized tag unsupported, using latest block");
                self.latest_head().await
            }
            Err(err) => {
                warn!(tx = %self.tx_hash, error = %err, "finalized head unavailable");
                Err(rpc(err))
            }
        }
    }

    async fn latest_head(&self) -> Result<u64> {
        self.provider.get_block_number().await.map_err(rpc)
    }
}

#[async_trait]
impl TransactionWatch for ReceiptWatch {
    fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    async fn next_status(&mut self) -> Result<ChainStatus> {
        loop {
            match self.included {
                None => match self.receipt().await? {
                    Some(Ok(inclusion)) => {
                        self.included = Some(inclusion);
                        return Ok(ChainStatus::InBlock {
                            block_number: inclusion.block_number,
                            block_hash: inclusion.block_hash,
                        });
                    }
                    Some(Err(failed)) => return Ok(failed),
                    None => {}
                },
                Some(included) => {
                    if self.finalized_head().await? >= included.block_number {
                        // confirm the receipt survived any reorg before reporting
                        match self.receipt().await? {
                            Some(Ok(current)) if current.block_hash == included.block_hash => {
                                return Ok(ChainStatus::Finalized {
                                    block_number: current.block_number,
                                    block_hash: current.block_hash,
                                    contract_address: current.contract_address,
                                });
                            }
                            Some(Ok(moved)) => {
                                self.included = Some(moved);
                                return Ok(ChainStatus::InBlock {
                                    block_number: moved.block_number,
                                    block_hash: moved.block_hash,
                                });
                            }
                            Some(Err(failed)) => return Ok(failed),
                            None => self.included = None,
                        }
                    }
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
