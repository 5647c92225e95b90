//! Post-deployment invocation
//!
//! Read-only queries go out as unsigned calls. State-mutating messages reuse
//! the deployment pipeline up to finalization.

use std::sync::Arc;

use alloy::dyn_abi::{FunctionExt, JsonAbiExt};
use alloy::json_abi::Function;
use alloy::primitives::{Address, Bytes, B256, U256};
use tracing::{debug, info};

use crate::abi::{convert_state_mutability, function_args, sol_value_to_json, ContractMetadata};
use crate::chain::{ConnectionPool, Endpoint, MessageCall, Submission, WalletProvider};
use crate::coerce::encode_args;
use crate::deploy::pipeline::{emit, report_error, Pipeline};
use crate::error::{Error, Result, Stage};
use crate::timeouts::{bounded, Timeouts};
use crate::types::{Primitive, TransactionOutcome, TxStage, Weight};

/// Gas budget used when the caller does not give one
pub const DEFAULT_GAS_LIMIT: u64 = 5_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub gas_limit: u64,
    /// Native value for payable messages
    pub value: Option<U256>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            value: None,
        }
    }
}

pub struct InvocationGateway {
    pool: ConnectionPool,
    wallet: Arc<dyn WalletProvider>,
    endpoint: Endpoint,
    timeouts: Timeouts,
}

impl InvocationGateway {
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

    /// Call a view or pure function without signing anything.
    ///
    /// One round trip, no retries.
    pub async fn query(
        &self,
        address: Address,
        metadata: &ContractMetadata,
        method: &str,
        args: &[Primitive],
    ) -> Result<serde_json::Value> {
        let func = metadata.function(method)?;
        if !is_read_only(func) {
            return Err(Error::invalid_param(
                "method",
                format!("{} changes state; send it as a transaction", func.signature()),
            ));
        }
        let data = encode_call(func, args)?;

        let conn = self.pool.get(&self.endpoint).await?;
        debug!(to = %address, method = %func.signature(), "query");
        let output = bounded(
            Stage::Query,
            self.timeouts.query,
            None,
            conn.call(address, data),
        )
        .await
        .inspect_err(|err| self.pool.evict_if_unreachable(&self.endpoint.name, err))?;

        decode_output(func, &output)
    }

    pub async fn execute(
        &self,
        address: Address,
        metadata: &ContractMetadata,
        method: &str,
        args: &[Primitive],
        options: ExecuteOptions,
    ) -> Result<B256> {
        self.execute_with_progress(address, metadata, method, args, options, |_| {})
            .await
    }

    /// Send a state-mutating message and wait for it to finalize
    pub async fn execute_with_progress<F>(
        &self,
        address: Address,
        metadata: &ContractMetadata,
        method: &str,
        args: &[Primitive],
        options: ExecuteOptions,
        mut observer: F,
    ) -> Result<B256>
    where
        F: FnMut(&TransactionOutcome) + Send,
    {
        let func = metadata.function(method)?;
        if is_read_only(func) {
            return Err(Error::invalid_param(
                "method",
                format!("{} is read-only; query it instead", func.signature()),
            ));
        }
        let value = options.value.unwrap_or(U256::ZERO);
        if !value.is_zero() && !convert_state_mutability(func.state_mutability).is_payable() {
            return Err(Error::invalid_param(
                "value",
                format!("{} is not payable", func.signature()),
            ));
        }
        let call = MessageCall {
            to: address,
            data: encode_call(func, args)?,
            weight: Weight::from_gas_limit(options.gas_limit),
            value,
        };

        let result = self.run(func, call, &mut observer).await;
        if let Err(err) = &result {
            report_error(&mut observer, err);
        }
        result
    }

    async fn run<F>(&self, func: &Function, call: MessageCall, observer: &mut F) -> Result<B256>
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
                "calling {} on {} from {}",
                func.signature(),
                call.to,
                signer.account.address
            ),
        );
        let broadcast = pipeline
            .broadcast(conn.as_ref(), &signer, Submission::Message(call))
            .await?;

        let included = broadcast.await_inclusion(&self.timeouts).await?;
        emit(
            observer,
            TxStage::InBlock,
            format!(
                "transaction {} in block #{}",
                included.tx_hash(),
                included.block_number
            ),
        );

        let finalized = included.await_finality(&self.timeouts).await?;
        info!(
            tx = %finalized.tx_hash,
            block = finalized.block_number,
            block_hash = %finalized.block_hash,
            "message finalized"
        );
        emit(
            observer,
            TxStage::Finalized,
            format!(
                "finalized in block #{} ({})",
                finalized.block_number, finalized.block_hash
            ),
        );
        Ok(finalized.tx_hash)
    }
}

fn is_read_only(func: &Function) -> bool {
    convert_state_mutability(func.state_mutability).is_read_only()
}

/// Selector followed by ABI-encoded arguments
pub fn encode_call(func: &Function, args: &[Primitive]) -> Result<Bytes> {
    let values = encode_args(&function_args(func), args)?;
    let encoded = func
        .abi_encode_input(&values)
        .map_err(|e| Error::invalid_param(&func.name, e.to_string()))?;
    Ok(encoded.into())
}

fn decode_output(func: &Function, data: &[u8]) -> Result<serde_json::Value> {
    if func.outputs.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    let decoded = func
        .abi_decode_output(data)
        .map_err(|e| Error::Metadata(format!("failed to decode {} output: {}", func.name, e)))?;

    let mut values: Vec<serde_json::Value> = decoded.iter().map(sol_value_to_json).collect();
    if values.len() == 1 {
        Ok(values.remove(0))
    } else {
        Ok(serde_json::Value::Array(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::dyn_abi::DynSolValue;

    use crate::testing::{counter_artifact, FakeChain, FakeConnector, FakeWallet, TX_HASH};

    fn gateway(connector: &FakeConnector, wallet: &FakeWallet) -> InvocationGateway {
        let timeouts = Timeouts::default();
        InvocationGateway::new(
            ConnectionPool::new(Arc::new(connector.clone()), timeouts.connect),
            Arc::new(wallet.clone()),
            Endpoint::new("local", "http://127.0.0.1:8545"),
            timeouts,
        )
    }

    fn encoded_uint(n: u64) -> Vec<u8> {
        DynSolValue::Uint(U256::from(n), 256).abi_encode()
    }

    #[tokio::test]
    async fn test_query_is_unsigned_and_decoded() {
        let chain = FakeChain::default().with_call_result(encoded_uint(7));
        let wallet = FakeWallet::with_accounts(1);
        let gateway = gateway(&FakeConnector::new(chain.clone()), &wallet);
        let artifact = counter_artifact();

        let value = gateway
            .query(Address::ZERO, artifact.metadata(), "count", &[])
            .await
            .unwrap();

        assert_eq!(value, serde_json::json!("7"));
        assert_eq!(chain.calls(), 1);
        assert_eq!(wallet.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_query_rejects_mutating_function() {
        let chain = FakeChain::default();
        let gateway = gateway(&FakeConnector::new(chain.clone()), &FakeWallet::empty());
        let artifact = counter_artifact();

        let err = gateway
            .query(
                Address::ZERO,
                artifact.metadata(),
                "setCount",
                &[Primitive::Integer(U256::from(1u64))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert_eq!(chain.calls(), 0);

        let err = gateway
            .query(Address::ZERO, artifact.metadata(), "reset", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FunctionNotFound(_)));
    }

    #[tokio::test]
    async fn test_query_unreachable_chain() {
        let gateway = gateway(&FakeConnector::unreachable(), &FakeWallet::empty());
        let artifact = counter_artifact();

        let err = gateway
            .query(Address::ZERO, artifact.metadata(), "count", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ChainConnectivity {
                stage: Stage::Connecting,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_query_reconnects_next_time() {
        let chain = FakeChain::default().rejecting("connection reset by peer");
        let connector = FakeConnector::new(chain);
        let gateway = gateway(&connector, &FakeWallet::empty());
        let artifact = counter_artifact();

        for _ in 0..2 {
            let err = gateway
                .query(Address::ZERO, artifact.metadata(), "count", &[])
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::ChainConnectivity {
                    stage: Stage::Query,
                    ..
                }
            ));
        }
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_query_garbage_output() {
        let chain = FakeChain::default().with_call_result(vec![0x01]);
        let gateway = gateway(&FakeConnector::new(chain), &FakeWallet::empty());
        let artifact = counter_artifact();

        let err = gateway
            .query(Address::ZERO, artifact.metadata(), "count", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Metadata(_)));
    }

    #[tokio::test]
    async fn test_execute_follows_pipeline() {
        let chain = FakeChain::finalizing();
        let gateway = gateway(&FakeConnector::new(chain.clone()), &FakeWallet::with_accounts(1));
        let artifact = counter_artifact();
        let target = Address::repeat_byte(0x11);

        let mut stages = Vec::new();
        let tx = gateway
            .execute_with_progress(
                target,
                artifact.metadata(),
                "setCount",
                &[Primitive::Text("9".into())],
                ExecuteOptions::default(),
                |o| stages.push(o.stage),
            )
            .await
            .unwrap();

        assert_eq!(tx, TX_HASH);
        assert_eq!(stages.last(), Some(&TxStage::Finalized));

        let Submission::Message(call) = &chain.submissions()[0] else {
            panic!("expected a message submission");
        };
        let func = artifact.metadata().function("setCount").unwrap();
        assert_eq!(call.to, target);
        assert_eq!(&call.data[..4], func.selector().as_slice());
        assert_eq!(call.weight.ref_time, DEFAULT_GAS_LIMIT);
    }

    #[tokio::test]
    async fn test_execute_rejects_read_only_and_unpaid_value() {
        let chain = FakeChain::finalizing();
        let gateway = gateway(&FakeConnector::new(chain.clone()), &FakeWallet::with_accounts(1));
        let artifact = counter_artifact();

        let err = gateway
            .execute(Address::ZERO, artifact.metadata(), "count", &[], ExecuteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));

        let options = ExecuteOptions {
            value: Some(U256::from(1u64)),
            ..Default::default()
        };
        let err = gateway
            .execute(
                Address::ZERO,
                artifact.metadata(),
                "setCount",
                &[Primitive::Integer(U256::from(1u64))],
                options,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_execute_revert_is_execution_failure() {
        let gateway = gateway(
            &FakeConnector::new(FakeChain::reverting("execution reverted")),
            &FakeWallet::with_accounts(1),
        );
        let artifact = counter_artifact();

        let err = gateway
            .execute(
                Address::ZERO,
                artifact.metadata(),
                "setCount",
                &[Primitive::Integer(U256::from(1u64))],
                ExecuteOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExecutionFailure { .. }));
    }

    #[tokio::test]
    async fn test_execute_without_wallet() {
        let chain = FakeChain::finalizing();
        let gateway = gateway(&FakeConnector::new(chain.clone()), &FakeWallet::empty());
        let artifact = counter_artifact();

        let err = gateway
            .execute(
                Address::ZERO,
                artifact.metadata(),
                "setCount",
                &[Primitive::Integer(U256::from(1u64))],
                ExecuteOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WalletUnavailable(_)));
        assert!(chain.submissions().is_empty());
    }
}
