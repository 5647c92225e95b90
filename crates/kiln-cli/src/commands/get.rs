//! Print the address of the latest deployment

use clap::Args;
use color_eyre::eyre::{eyre, Result};
use kiln_core::KilnDir;
use kiln_db::{Database, Repositories};

/// Print the address of a contract's latest deployment
#[derive(Args)]
pub struct GetCommand {
    /// Contract name
    pub contract: String,

    /// Network name
    #[arg(long, short)]
    pub network: String,
}

impl GetCommand {
    pub async fn run(self) -> Result<()> {
        let db = Database::open(&KilnDir::new()).await?;

        match db.deployments().get_latest(&self.contract, &self.network).await? {
            Some(d) => {
                // bare address for scripting: $(kiln get Counter -n local)
                println!("{}", d.address);
                Ok(())
            }
            None => Err(eyre!(
                "No deployment found for contract '{}' on network '{}'",
                self.contract,
                self.network
            )),
        }
    }
}
