//! Build, deploy and record a contract

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::Result;
use console::style;
use kiln_core::{CoercionPolicy, DeploymentRequest, Error, DEFAULT_GAS_LIMIT};
use kiln_db::{NewDeployment, Repositories};

use super::args::{coerce_args, parse_salt, parse_value, print_outcome};
use super::build::build_artifact;
use crate::services::Services;

/// Build a contract, deploy it and wait for finality
#[derive(Args)]
pub struct DeployCommand {
    /// Contract to deploy
    pub contract: String,

    /// Constructor arguments, in declaration order
    pub args: Vec<String>,

    /// Network name from kiln.toml [rpc_endpoints]
    #[arg(long, short)]
    pub network: String,

    /// Project directory
    #[arg(long, default_value = ".")]
    pub project: PathBuf,

    /// Constructor argument by name, repeatable
    #[arg(long = "arg", value_name = "NAME=VALUE")]
    pub named: Vec<String>,

    /// Constructor to use (defaults to the default constructor)
    #[arg(long)]
    pub constructor: Option<String>,

    #[arg(long, default_value_t = DEFAULT_GAS_LIMIT)]
    pub gas_limit: u64,

    /// Value for a payable constructor, e.g. `1000`, `10gwei`, `0.1ether`
    #[arg(long)]
    pub value: Option<String>,

    /// Hex salt for deterministic addresses
    #[arg(long)]
    pub salt: Option<String>,

    #[arg(long)]
    pub storage_deposit_limit: Option<u128>,

    /// Argument coercion policy (heuristic or typed)
    #[arg(long)]
    pub policy: Option<CoercionPolicy>,

    /// Wait for the build result instead of streaming compiler output
    #[arg(long)]
    pub no_stream: bool,
}

impl DeployCommand {
    pub async fn run(self) -> Result<()> {
        let services = Services::open().await?;
        let deployer = services.deployer(&self.network)?;
        let builder = services.builder()?;

        let artifact = build_artifact(
            &builder,
            &self.project,
            Some(self.contract.clone()),
            !self.no_stream,
        )
        .await?;
        println!(
            "{} Built {} ({})",
            style("✓").green(),
            style(artifact.name()).cyan(),
            artifact.code_hash()
        );

        let metadata = artifact.metadata();
        let constructor = match &self.constructor {
            Some(label) => metadata.constructor(label)?,
            None => metadata.default_constructor(),
        };
        let policy = self.policy.unwrap_or(services.config.coercion.policy);
        let args = coerce_args(policy, &constructor.args, &self.named, &self.args)?;

        let mut request =
            DeploymentRequest::new(&artifact, constructor.label.clone(), args, self.gas_limit);
        if let Some(value) = &self.value {
            request = request.with_value(parse_value(value)?);
        }
        if let Some(salt) = &self.salt {
            request = request.with_salt(parse_salt(salt)?);
        }
        if let Some(limit) = self.storage_deposit_limit {
            request = request.with_storage_deposit_limit(limit);
        }

        println!();
        let deployed = match deployer.deploy_with_progress(request, print_outcome).await {
            Ok(deployed) => deployed,
            Err(err) => {
                if let Error::Timeout {
                    tx_hash: Some(tx), ..
                } = &err
                {
                    println!(
                        "{} Not recorded. Check {} on {} before deploying again.",
                        style("!").yellow(),
                        style(tx).yellow(),
                        self.network
                    );
                }
                return Err(err.into());
            }
        };

        let record = NewDeployment::from_deployed(&deployed, metadata)?;
        let stored = services.db.deployments().create(&record).await?;

        println!();
        println!(
            "{} {} deployed at {}",
            style("✓").green().bold(),
            style(artifact.name()).cyan(),
            style(&stored.address).yellow()
        );
        println!("   Network:  {}", deployed.network);
        println!("   Block:    #{}", deployed.block_number);
        println!("   Tx:       {}", deployed.tx_hash);
        println!("   Deployer: {}", stored.deployer);
        println!("   Record:   #{}", stored.id);

        Ok(())
    }
}
