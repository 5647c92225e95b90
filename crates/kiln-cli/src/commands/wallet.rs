//! Manage signing wallets stored in the registry

use clap::{Args, Subcommand};
use color_eyre::eyre::{eyre, Result};
use console::style;
use dialoguer::{Confirm, Password};
use kiln_core::{parse_signing_key, seal_signer, KilnDir};
use kiln_db::{Database, NewWallet, Repositories, Wallet, WalletRepository};

#[derive(Args)]
pub struct WalletCommand {
    #[command(subcommand)]
    pub action: WalletAction,
}

#[derive(Subcommand)]
pub enum WalletAction {
    /// Add a wallet from a private key
    Add {
        /// Name to refer to the wallet by
        name: String,
    },
    /// List stored wallets
    List,
    /// Remove a stored wallet
    Remove {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl WalletCommand {
    pub async fn run(self) -> Result<()> {
        let db = Database::open(&KilnDir::new()).await?;
        match self.action {
            WalletAction::Add { name } => add(&db, &name).await,
            WalletAction::List => list(&db).await,
            WalletAction::Remove { name, force } => remove(&db, &name, force).await,
        }
    }
}

/// Validate, encrypt and store a key under `name`
async fn store_wallet(wallets: &dyn WalletRepository, name: &str, private_key: &str) -> Result<Wallet> {
    let signer = parse_signing_key(private_key)?;
    let wallet = wallets
        .create(&NewWallet {
            name: name.to_string(),
            address: signer.address().to_checksum(None),
            encrypted_key: seal_signer(&signer)?,
        })
        .await?;
    Ok(wallet)
}

async fn add(db: &Database, name: &str) -> Result<()> {
    println!(
        "{} Adding wallet '{}'",
        style("→").blue(),
        style(name).cyan()
    );
    println!();

    let private_key: String = Password::new()
        .with_prompt("Enter private key (with or without 0x prefix)")
        .interact()?;

    let wallet = store_wallet(db.wallets(), name, &private_key).await?;

    println!();
    println!(
        "{} Wallet '{}' added successfully",
        style("✓").green().bold(),
        style(name).cyan()
    );
    println!("   Address: {}", style(&wallet.address).yellow());

    Ok(())
}

async fn list(db: &Database) -> Result<()> {
    let wallets = db.wallets().list().await?;

    if wallets.is_empty() {
        println!("{} No wallets found", style("!").yellow());
        println!();
        println!(
            "   Add a wallet with: {}",
            style("kiln wallet add <name>").cyan()
        );
        return Ok(());
    }

    println!("{} {} wallet(s) found", style("*").green(), wallets.len());
    println!();

    for wallet in wallets {
        println!(
            "   {} {}",
            style(&wallet.name).cyan().bold(),
            style(&wallet.address).yellow()
        );
    }

    println!();

    Ok(())
}

async fn remove(db: &Database, name: &str, force: bool) -> Result<()> {
    let wallet = db
        .wallets()
        .get_by_name(name)
        .await?
        .ok_or_else(|| eyre!("Wallet '{}' not found", name))?;

    if !force {
        println!(
            "{} About to remove wallet '{}'",
            style("!").yellow(),
            style(name).cyan()
        );
        println!("   Address: {}", style(&wallet.address).yellow());
        println!();

        let confirmed = Confirm::new()
            .with_prompt("Are you sure you want to remove this wallet?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{} Cancelled", style("*").dim());
            return Ok(());
        }
    }

    db.wallets().delete(name).await?;

    println!();
    println!(
        "{} Wallet '{}' removed",
        style("✓").green().bold(),
        style(name).cyan()
    );

    Ok(())
}
