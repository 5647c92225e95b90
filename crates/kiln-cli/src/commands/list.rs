//! List recorded deployments

use clap::Args;
use color_eyre::eyre::Result;
use console::style;
use kiln_core::KilnDir;
use kiln_db::{Database, Deployment, DeploymentFilter, Repositories};

/// List recorded deployments
#[derive(Args)]
pub struct ListCommand {
    /// Filter by network
    #[arg(long, short)]
    pub network: Option<String>,

    /// Filter by contract name
    #[arg(long, short)]
    pub contract: Option<String>,
}

impl ListCommand {
    pub async fn run(self) -> Result<()> {
        let db = Database::open(&KilnDir::new()).await?;
        let filtered = self.network.is_some() || self.contract.is_some();
        let deployments = db
            .deployments()
            .list(DeploymentFilter {
                network: self.network,
                contract: self.contract,
            })
            .await?;

        if deployments.is_empty() {
            println!("No deployments found.");
            if filtered {
                println!(
                    "Try running without {} or {} to see all deployments.",
                    style("--network").yellow(),
                    style("--contract").yellow()
                );
            }
            return Ok(());
        }

        print_table(&deployments);
        println!();
        println!("Total: {} deployment(s)", deployments.len());

        Ok(())
    }
}

fn print_table(deployments: &[Deployment]) {
    println!(
        "{:<5} {:<15} {:<20} {:<44} {:<10} {:<20}",
        "Id", "Network", "Contract", "Address", "Block", "Deployed At"
    );
    println!("{}", "-".repeat(119));

    for d in deployments {
        println!(
            "{:<5} {:<15} {:<20} {:<44} {:<10} {:<20}",
            d.id,
            d.network,
            d.contract_name,
            d.address,
            d.block_number,
            short_timestamp(&d.deployed_at)
        );
    }
}

/// `2024-05-01T12:00:00.123+00:00` -> `2024-05-01 12:00:00`
fn short_timestamp(rfc3339: &str) -> String {
    rfc3339.get(..19).unwrap_or(rfc3339).replacen('T', " ", 1)
}
