//! Show invocation history

use clap::Args;
use color_eyre::eyre::Result;
use console::style;
use kiln_core::{DeploymentId, Error, KilnDir, TransactionStatus};
use kiln_db::{Database, InvocationFilter, Repositories};

/// Show calls and transactions sent to a deployment
#[derive(Args)]
pub struct HistoryCommand {
    /// Deployment record id (see `kiln list`)
    pub deployment: Option<i64>,

    /// Number of entries to show
    #[arg(long, short, default_value = "20")]
    pub limit: u32,
}

impl HistoryCommand {
    pub async fn run(self) -> Result<()> {
        let db = Database::open(&KilnDir::new()).await?;

        if let Some(id) = self.deployment {
            db.deployments()
                .get_by_id(DeploymentId(id))
                .await?
                .ok_or_else(|| Error::DeploymentNotFound(format!("#{}", id)))?;
        }

        let entries = db
            .invocations()
            .list(InvocationFilter {
                deployment_id: self.deployment.map(DeploymentId),
                limit: Some(self.limit),
            })
            .await?;

        if entries.is_empty() {
            println!("No invocations recorded.");
            return Ok(());
        }

        for entry in &entries {
            let status = match entry.status {
                Some(TransactionStatus::Success) => style("✓").green(),
                Some(TransactionStatus::Failed) => style("✗").red(),
                Some(TransactionStatus::Unknown) => style("?").yellow(),
                Some(TransactionStatus::Pending) | None => style("…").dim(),
            };
            println!(
                "{} #{:<4} {:<5} {} {}",
                status,
                entry.deployment_id,
                entry.call_type.as_str(),
                style(&entry.function_signature).cyan(),
                style(&entry.created_at).dim()
            );
            if let Some(result) = &entry.result {
                println!("         = {}", result);
            }
            if let Some(tx) = &entry.tx_hash {
                println!("         tx {}", tx);
            }
            if let Some(error) = &entry.error_message {
                println!("         {}", style(error).red());
            }
        }

        Ok(())
    }
}
