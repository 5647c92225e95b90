//! CLI commands for kiln

use clap::Subcommand;
use color_eyre::eyre::Result;

mod args;
pub mod build;
pub mod check_env;
pub mod deploy;
pub mod get;
pub mod history;
pub mod init;
pub mod invoke;
pub mod list;
pub mod serve;
pub mod wallet;

/// All available CLI commands
#[derive(Subcommand)]
pub enum Command {
    /// Create kiln.toml and the local registry
    Init(init::InitCommand),

    /// Compile a project through the build service
    Build(build::BuildCommand),

    /// Build and deploy a contract, recording it once finalized
    Deploy(deploy::DeployCommand),

    /// Query a read-only function on a deployed contract
    Call(invoke::CallCommand),

    /// Send a state-changing transaction to a deployed contract
    Send(invoke::SendCommand),

    /// List recorded deployments
    List(list::ListCommand),

    /// Get the address of a deployed contract
    Get(get::GetCommand),

    /// Show calls and transactions sent to deployments
    History(history::HistoryCommand),

    /// Run the local build service
    Serve(serve::ServeCommand),

    /// Manage wallets for signing transactions
    Wallet(wallet::WalletCommand),

    /// Check forge, the build service and configured networks
    CheckEnv(check_env::CheckEnvCommand),
}

impl Command {
    /// Execute the command
    pub async fn run(self) -> Result<()> {
        match self {
            Command::Init(cmd) => cmd.run().await,
            Command::Build(cmd) => cmd.run().await,
            Command::Deploy(cmd) => cmd.run().await,
            Command::Call(cmd) => cmd.run().await,
            Command::Send(cmd) => cmd.run().await,
            Command::List(cmd) => cmd.run().await,
            Command::Get(cmd) => cmd.run().await,
            Command::History(cmd) => cmd.run().await,
            Command::Serve(cmd) => cmd.run().await,
            Command::Wallet(cmd) => cmd.run().await,
            Command::CheckEnv(cmd) => cmd.run().await,
        }
    }
}
