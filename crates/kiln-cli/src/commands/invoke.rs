//! Call and send messages to recorded deployments

use alloy::primitives::Address;
use clap::Args;
use color_eyre::eyre::{eyre, Result, WrapErr};
use console::style;
use kiln_core::abi::function_args;
use kiln_core::{
    CallType, CoercionPolicy, ContractMetadata, DeploymentId, Error, ExecuteOptions, Primitive,
    DEFAULT_GAS_LIMIT,
};
use kiln_db::{Deployment, DeploymentFilter, InvocationUpdate, NewInvocation, Repositories};

use super::args::{coerce_args, parse_value, print_outcome};
use crate::services::Services;

/// Which deployment and message, shared by `call` and `send`
#[derive(Args)]
pub struct Target {
    /// Deployment record id, contract address, or contract name (latest on --network)
    pub target: String,

    /// Function name or full signature, e.g. `transfer(address,uint256)`
    pub method: String,

    /// Arguments, in declaration order
    pub args: Vec<String>,

    /// Network name from kiln.toml [rpc_endpoints]
    #[arg(long, short)]
    pub network: Option<String>,

    /// Argument by name, repeatable
    #[arg(long = "arg", value_name = "NAME=VALUE")]
    pub named: Vec<String>,

    /// Argument coercion policy (heuristic or typed)
    #[arg(long)]
    pub policy: Option<CoercionPolicy>,
}

/// Resolved target: the record, its metadata and coerced arguments
struct Prepared {
    deployment: Deployment,
    address: Address,
    metadata: ContractMetadata,
    signature: String,
    args: Vec<Primitive>,
}

impl Target {
    async fn resolve(&self, services: &Services) -> Result<Deployment> {
        let deployments = services.db.deployments();

        if let Ok(id) = self.target.parse::<i64>() {
            let deployment = deployments
                .get_by_id(DeploymentId(id))
                .await?
                .ok_or_else(|| Error::DeploymentNotFound(format!("#{}", id)))?;
            if let Some(network) = &self.network {
                if network != &deployment.network {
                    return Err(eyre!(
                        "Deployment #{} is on '{}', not '{}'",
                        id,
                        deployment.network,
                        network
                    ));
                }
            }
            return Ok(deployment);
        }

        if let Ok(address) = self.target.parse::<Address>() {
            let filter = DeploymentFilter {
                network: self.network.clone(),
                contract: None,
            };
            let mut matches: Vec<Deployment> = deployments
                .list(filter)
                .await?
                .into_iter()
                .filter(|d| d.address.parse::<Address>().ok() == Some(address))
                .collect();
            if matches.len() > 1 {
                return Err(eyre!(
                    "{} is recorded on several networks; pick one with --network",
                    self.target
                ));
            }
            let deployment = matches
                .pop()
                .ok_or_else(|| Error::DeploymentNotFound(self.target.clone()))?;
            return Ok(deployment);
        }

        let network = self
            .network
            .as_deref()
            .ok_or_else(|| eyre!("--network is required to look up '{}' by name", self.target))?;
        let deployment = deployments
            .get_latest(&self.target, network)
            .await?
            .ok_or_else(|| Error::DeploymentNotFound(format!("{} on {}", self.target, network)))?;
        Ok(deployment)
    }

    async fn prepare(&self, services: &Services) -> Result<Prepared> {
        let deployment = self.resolve(services).await?;
        let address = deployment
            .address
            .parse()
            .wrap_err_with(|| format!("Recorded address {} is invalid", deployment.address))?;
        let metadata = deployment.contract_metadata()?;

        let func = metadata.function(&self.method)?;
        let signature = func.signature();
        let policy = self.policy.unwrap_or(services.config.coercion.policy);
        let args = coerce_args(policy, &function_args(func), &self.named, &self.args)?;

        Ok(Prepared {
            deployment,
            address,
            metadata,
            signature,
            args,
        })
    }
}

fn new_invocation(
    prepared: &Prepared,
    call_type: CallType,
    wallet_id: Option<i64>,
) -> Result<NewInvocation> {
    let params: Vec<serde_json::Value> = prepared.args.iter().map(Primitive::to_json).collect();
    Ok(NewInvocation {
        deployment_id: prepared.deployment.id,
        wallet_id,
        function_name: prepared
            .signature
            .split('(')
            .next()
            .unwrap_or_default()
            .to_string(),
        function_signature: prepared.signature.clone(),
        input_params: serde_json::to_string(&params)?,
        call_type,
    })
}

// =============================================================================
// Call
// =============================================================================

/// Query a read-only function without signing
#[derive(Args)]
pub struct CallCommand {
    #[command(flatten)]
    pub target: Target,
}

impl CallCommand {
    pub async fn run(self) -> Result<()> {
        let services = Services::open().await?;
        let prepared = self.target.prepare(&services).await?;
        let gateway = services.gateway(&prepared.deployment.network)?;

        let entry = services
            .db
            .invocations()
            .create(&new_invocation(&prepared, CallType::Read, None)?)
            .await?;

        let result = gateway
            .query(
                prepared.address,
                &prepared.metadata,
                &prepared.signature,
                &prepared.args,
            )
            .await;

        match result {
            Ok(value) => {
                services
                    .db
                    .invocations()
                    .update(entry.id, &InvocationUpdate::returned(value.to_string()))
                    .await?;
                let rendered = match &value {
                    serde_json::Value::String(s) => s.clone(),
                    other => serde_json::to_string_pretty(other)?,
                };
                println!("{}", rendered);
                Ok(())
            }
            Err(err) => {
                services
                    .db
                    .invocations()
                    .update(entry.id, &InvocationUpdate::failed(None, err.to_string()))
                    .await?;
                Err(err.into())
            }
        }
    }
}

// =============================================================================
// Send
// =============================================================================

/// Send a state-changing message and wait for finality
#[derive(Args)]
pub struct SendCommand {
    #[command(flatten)]
    pub target: Target,

    #[arg(long, default_value_t = DEFAULT_GAS_LIMIT)]
    pub gas_limit: u64,

    /// Value for a payable function, e.g. `1000`, `10gwei`, `0.1ether`
    #[arg(long)]
    pub value: Option<String>,
}

impl SendCommand {
    pub async fn run(self) -> Result<()> {
        let services = Services::open().await?;
        let prepared = self.target.prepare(&services).await?;
        let gateway = services.gateway(&prepared.deployment.network)?;

        let options = ExecuteOptions {
            gas_limit: self.gas_limit,
            value: self.value.as_deref().map(parse_value).transpose()?,
        };

        // the keystore signs with its first account; record that wallet
        let wallet_id = match services.wallet().list_accounts().await?.first() {
            Some(account) => services
                .db
                .wallets()
                .get_by_name(&account.label)
                .await?
                .map(|w| w.id),
            None => None,
        };

        let entry = services
            .db
            .invocations()
            .create(&new_invocation(&prepared, CallType::Write, wallet_id)?)
            .await?;

        let result = gateway
            .execute_with_progress(
                prepared.address,
                &prepared.metadata,
                &prepared.signature,
                &prepared.args,
                options,
                print_outcome,
            )
            .await;

        let update = match &result {
            Ok(tx_hash) => InvocationUpdate::success(tx_hash.to_string(), None),
            Err(err @ Error::Timeout { tx_hash, .. }) => {
                InvocationUpdate::unknown(tx_hash.clone(), err.to_string())
            }
            Err(err @ Error::ExecutionFailure { tx_hash, .. }) => {
                InvocationUpdate::failed(Some(tx_hash.clone()), err.to_string())
            }
            Err(err) => InvocationUpdate::failed(None, err.to_string()),
        };
        services.db.invocations().update(entry.id, &update).await?;

        let tx_hash = result?;
        println!();
        println!(
            "{} {} finalized in {}",
            style("✓").green().bold(),
            style(&prepared.signature).cyan(),
            style(tx_hash).yellow()
        );
        Ok(())
    }
}
