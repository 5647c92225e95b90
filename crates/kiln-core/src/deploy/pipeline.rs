//! Stages shared by deployments and state-mutating calls
//!
//! connect → awaiting-signature → broadcasting → in-block → finalized.
//! Tracking after broadcast is typestate: [`Broadcast`] can only become
//! [`Included`], which can only become [`Finalized`]. Nothing else can produce
//! a `Finalized`. Once broadcast, errors from the watch are retried until the
//! stage deadline; the only outcomes are finalized, failed on-chain, or a
//! timeout that carries the transaction hash.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use tracing::{debug, info, warn};

use crate::chain::{
    ChainConnection, ChainStatus, ConnectionPool, Endpoint, Signer, Submission, TransactionWatch,
    WalletProvider,
};
use crate::error::{Error, Result, Stage};
use crate::timeouts::{bounded, Timeouts};
use crate::types::{TransactionOutcome, TxStage};

/// Pause before asking the watch again after an RPC error
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Borrowed view of everything a pipeline run needs
pub(crate) struct Pipeline<'a> {
    pub pool: &'a ConnectionPool,
    pub wallet: &'a dyn WalletProvider,
    pub endpoint: &'a Endpoint,
    pub timeouts: &'a Timeouts,
}

impl Pipeline<'_> {
    pub async fn connect(&self) -> Result<Arc<dyn ChainConnection>> {
        self.pool.get(self.endpoint).await
    }

    /// Ask the wallet for accounts and take the first one
    pub async fn acquire_signer(&self) -> Result<Signer> {
        let limit = self.timeouts.signature;
        let accounts = bounded(
            Stage::AwaitingSignature,
            limit,
            None,
            self.wallet.list_accounts(),
        )
        .await?;

        let account = accounts.into_iter().next().ok_or_else(|| {
            Error::WalletUnavailable("No accounts found. Add one with `kiln wallet add`.".into())
        })?;
        debug!(account = %account.address, label = %account.label, "selected deploying account");

        bounded(
            Stage::AwaitingSignature,
            limit,
            None,
            self.wallet.signer(&account),
        )
        .await
    }

    /// Sign and hand the transaction to the node
    pub async fn broadcast(
        &self,
        conn: &dyn ChainConnection,
        signer: &Signer,
        submission: Submission,
    ) -> Result<Broadcast> {
        let watch = bounded(
            Stage::Broadcasting,
            self.timeouts.signature,
            None,
            conn.submit(signer, submission),
        )
        .await
        .inspect_err(|err| self.pool.evict_if_unreachable(&self.endpoint.name, err))?;
        let tx_hash = watch.tx_hash();
        info!(tx = %tx_hash, network = %self.endpoint.name, "transaction broadcast");
        Ok(Broadcast { watch, tx_hash })
    }
}

/// Notify an observer, logging every transition
pub(crate) fn emit<F>(observer: &mut F, stage: TxStage, detail: impl Into<String>)
where
    F: FnMut(&TransactionOutcome),
{
    let outcome = TransactionOutcome::new(stage, detail);
    info!(stage = %outcome.stage, "{}", outcome.detail);
    observer(&outcome);
}

/// Report a pipeline error as `failed`, except timeouts whose outcome is unknown.
/// After broadcast only on-chain failures and timeouts reach this point.
pub(crate) fn report_error<F>(observer: &mut F, err: &Error)
where
    F: FnMut(&TransactionOutcome),
{
    if matches!(err, Error::Timeout { .. }) {
        warn!(error = %err, "transaction outcome unknown");
    } else {
        emit(observer, TxStage::Failed, err.to_string());
    }
}

// =============================================================================
// Tracking
// =============================================================================

pub(crate) struct Broadcast {
    watch: Box<dyn TransactionWatch>,
    tx_hash: B256,
}

pub(crate) struct Included {
    watch: Box<dyn TransactionWatch>,
    tx_hash: B256,
    pub block_number: u64,
    pub block_hash: B256,
    /// Finalization already reported together with inclusion
    finalized: Option<Finalized>,
}

#[derive(Debug)]
pub(crate) struct Finalized {
    pub tx_hash: B256,
    pub block_number: u64,
    pub block_hash: B256,
    pub contract_address: Option<Address>,
}

impl Broadcast {
    pub async fn await_inclusion(mut self, timeouts: &Timeouts) -> Result<Included> {
        let tx_hash = self.tx_hash;
        let watch = &mut *self.watch;
        let status = bounded(
            Stage::InBlock,
            timeouts.inclusion,
            Some(tx_hash.to_string()),
            async move { Ok(next_status(watch, tx_hash, Stage::InBlock).await) },
        )
        .await?;
        match status {
            ChainStatus::InBlock {
                block_number,
                block_hash,
            } => Ok(Included {
                watch: self.watch,
                tx_hash,
                block_number,
                block_hash,
                finalized: None,
            }),
            ChainStatus::Finalized {
                block_number,
                block_hash,
                contract_address,
            } => Ok(Included {
                watch: self.watch,
                tx_hash,
                block_number,
                block_hash,
                finalized: Some(Finalized {
                    tx_hash,
                    block_number,
                    block_hash,
                    contract_address,
                }),
            }),
            ChainStatus::Failed { reason, .. } => Err(execution_failure(Stage::InBlock, tx_hash, reason)),
        }
    }
}

impl Included {
    pub fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    pub async fn await_finality(mut self, timeouts: &Timeouts) -> Result<Finalized> {
        if let Some(finalized) = self.finalized.take() {
            return Ok(finalized);
        }
        let tx_hash = self.tx_hash;
        let watch = &mut *self.watch;
        let tracking = async move {
            loop {
                match next_status(&mut *watch, tx_hash, Stage::Finalized).await {
                    // reorg moved the transaction; keep waiting
                    ChainStatus::InBlock { block_number, .. } => {
                        debug!(tx = %tx_hash, block_number, "transaction re-included");
                    }
                    ChainStatus::Finalized {
                        block_number,
                        block_hash,
                        contract_address,
                    } => {
                        return Ok(Finalized {
                            tx_hash,
                            block_number,
                            block_hash,
                            contract_address,
                        })
                    }
                    ChainStatus::Failed { reason, .. } => {
                        return Err(execution_failure(Stage::Finalized, tx_hash, reason))
                    }
                }
            }
        };
        bounded(
            Stage::Finalized,
            timeouts.finalization,
            Some(tx_hash.to_string()),
            tracking,
        )
        .await
    }
}

/// Next status from the watch, retrying RPC errors until the caller's deadline
async fn next_status(watch: &mut dyn TransactionWatch, tx_hash: B256, stage: Stage) -> ChainStatus {
    loop {
        match watch.next_status().await {
            Ok(status) => return status,
            Err(err) => {
                warn!(tx = %tx_hash, %stage, error = %err, "status check failed, retrying");
                tokio::time::sleep(STATUS_RETRY_DELAY).await;
            }
        }
    }
}

fn execution_failure(stage: Stage, tx_hash: B256, reason: String) -> Error {
    Error::ExecutionFailure {
        stage,
        tx_hash: tx_hash.to_string(),
        reason,
    }
}
