//! Deployment lifecycle
//!
//! [`DeploymentManager::deploy`] takes a compiled artifact with coerced
//! constructor arguments through connecting, awaiting-signature, broadcasting,
//! in-block and finalized. A [`DeployedContract`] exists only once the creation
//! transaction is finalized.

pub(crate) mod pipeline;

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::debug;

use crate::bytecode::salt_to_b256;
use crate::chain::{ConnectionPool, CreateCall, Endpoint, Submission, WalletProvider};
use crate::coerce::abi_encode_args;
use crate::error::{Error, Result, Stage};
use crate::timeouts::Timeouts;
use crate::types::{DeployedContract, DeploymentRequest, TransactionOutcome, TxStage};

use pipeline::{emit, report_error, Finalized, Pipeline};

pub struct DeploymentManager {
    pool: ConnectionPool,
    wallet: Arc<dyn WalletProvider>,
    endpoint: Endpoint,
    timeouts: Timeouts,
}

impl DeploymentManager {
    pub fn new(
        pool: ConnectionPool,
        wallet: Arc<dyn WalletProvider>,
        endpoint: Endpoint,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            pool,
            wallet,
            endpoint,
            timeouts,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn deploy(&self, request: DeploymentRequest<'_>) -> Result<DeployedContract> {
        self.deploy_with_progress(request, |_| {}).await
    }

    /// Deploy, reporting every stage transition to `observer`.
    ///
    /// Request validation and argument encoding happen before anything is
    /// sent. A timeout is not reported as `failed`: the transaction may still
    /// land.
    pub async fn deploy_with_progress<F>(
        &self,
        request: DeploymentRequest<'_>,
        mut observer: F,
    ) -> Result<DeployedContract>
    where
        F: FnMut(&TransactionOutcome) + Send,
    {
        let call = prepare_creation(&request)?;

        let result = self.run(&request, call, &mut observer).await;
        if let Err(err) = &result {
            report_error(&mut observer, err);
        }
        result
    }

    async fn run<F>(
        &self,
        request: &DeploymentRequest<'_>,
        call: CreateCall,
        observer: &mut F,
    ) -> Result<DeployedContract>
    where
        F: FnMut(&TransactionOutcome) + Send,
    {
        let pipeline = Pipeline {
            pool: &self.pool,
            wallet: self.wallet.as_ref(),
            endpoint: &self.endpoint,
            timeouts: &self.timeouts,
        };

        emit(observer, TxStage::Connecting, format!("connecting to {}", self.endpoint));
        let conn = pipeline.connect().await?;

        emit(observer, TxStage::AwaitingSignature, "requesting accounts from wallet");
        let signer = pipeline.acquire_signer().await?;

        emit(
            observer,
            TxStage::Broadcasting,
            format!(
                "deploying {} from {} (gas limit {})",
                request.artifact.name(),
                signer.account.address,
                call.weight.ref_time
            ),
        );
        let broadcast = pipeline
            .broadcast(conn.as_ref(), &signer, Submission::Create(call))
            .await?;

        let included = broadcast.await_inclusion(&self.timeouts).await?;
        emit(
            observer,
            TxStage::InBlock,
            format!(
                "transaction {} in block #{} ({})",
                included.tx_hash(),
                included.block_number,
                included.block_hash
            ),
        );

        let finalized = included.await_finality(&self.timeouts).await?;
        let block_hash = finalized.block_hash;
        let deployed = into_deployed(
            finalized,
            request,
            signer.account.address,
            &self.endpoint.name,
        )?;
        emit(
            observer,
            TxStage::Finalized,
            format!(
                "{} deployed at {} in block #{} ({})",
                request.artifact.name(),
                deployed.address,
                deployed.block_number,
                block_hash
            ),
        );
        Ok(deployed)
    }
}

/// Validate the request and build the creation call
fn prepare_creation(request: &DeploymentRequest<'_>) -> Result<CreateCall> {
    let constructor = request
        .artifact
        .metadata()
        .constructor(&request.constructor_label)?;

    let value = request.value.unwrap_or(U256::ZERO);
    if !value.is_zero() && !constructor.payable {
        return Err(Error::invalid_param("value", "constructor is not payable"));
    }

    let encoded = abi_encode_args(&constructor.args, &request.coerced_args)?;
    let salt = request.salt.as_deref().map(salt_to_b256).transpose()?;

    let weight = request.weight();
    debug!(
        ref_time = weight.ref_time,
        proof_size = weight.proof_size,
        storage_deposit_limit = ?request.storage_deposit_limit,
        "creation budget"
    );

    Ok(CreateCall {
        init_code: request.artifact.init_code(&encoded).into(),
        weight,
        storage_deposit_limit: request.storage_deposit_limit,
        salt,
        value,
    })
}

fn into_deployed(
    finalized: Finalized,
    request: &DeploymentRequest<'_>,
    deployer: Address,
    network: &str,
) -> Result<DeployedContract> {
    let address = finalized.contract_address.ok_or_else(|| Error::ExecutionFailure {
        stage: Stage::Finalized,
        tx_hash: finalized.tx_hash.to_string(),
        reason: "finalized without a contract address".into(),
    })?;

    Ok(DeployedContract {
        address,
        code_hash: request.artifact.code_hash().to_string(),
        deployed_at: Utc::now(),
        deploying_account: deployer,
        tx_hash: finalized.tx_hash,
        block_number: finalized.block_number,
        network: network.to_string(),
        constructor_args: request.coerced_args.clone(),
    })
}
