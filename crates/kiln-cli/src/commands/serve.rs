//! Run the local build service

use std::sync::Arc;

use clap::Args;
use color_eyre::eyre::Result;
use console::style;

use crate::forge::{Compiler, Forge, ForgeCompiler};
use crate::server::ServerConfig;

/// Start a build service that compiles Foundry projects on this machine
#[derive(Args)]
pub struct ServeCommand {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "3000")]
    pub port: u16,

    /// forge executable to build with
    #[arg(long, default_value = "forge")]
    pub forge: String,
}

impl ServeCommand {
    pub async fn run(self) -> Result<()> {
        let compiler = ForgeCompiler::new(Forge::with_program(&self.forge));

        let toolchain = compiler.check().await;
        match (&toolchain.version, &toolchain.error) {
            (Some(version), _) => println!("{} {}", style("✓").green(), version),
            (None, error) => println!(
                "{} {} is not usable: {}",
                style("!").yellow(),
                self.forge,
                error.as_deref().unwrap_or("unknown error")
            ),
        }

        println!("{} Starting Kiln build service...", style("→").blue());
        println!();
        println!(
            "  {} API:    {}",
            style("◆").cyan(),
            style(format!("http://{}:{}/api", self.host, self.port))
                .underlined()
                .cyan()
        );
        println!(
            "  {} Stream: {}",
            style("◆").cyan(),
            style(format!(
                "ws://{}:{}/api/contracts/compile/stream",
                self.host, self.port
            ))
            .underlined()
            .cyan()
        );
        println!();
        println!("  Press {} to stop the server", style("Ctrl+C").yellow());
        println!();

        let config = ServerConfig {
            host: self.host,
            port: self.port,
        };
        crate::server::run_server(Arc::new(compiler), config).await
    }
}
