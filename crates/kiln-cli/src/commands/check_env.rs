//! Check the local toolchain, the build service and configured networks

use std::time::Duration;

use clap::Args;
use color_eyre::eyre::Result;
use console::style;
use kiln_core::ChainConnector;

use crate::chain::AlloyConnector;
use crate::config::KilnConfig;
use crate::forge::{Compiler, ForgeCompiler};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Check that everything kiln talks to is reachable
#[derive(Args)]
pub struct CheckEnvCommand;

impl CheckEnvCommand {
    pub async fn run(self) -> Result<()> {
        let config = KilnConfig::load()?;
        let mut problems = 0;

        let toolchain = ForgeCompiler::default().check().await;
        match toolchain.version {
            Some(version) => println!("{} forge: {}", style("✓").green(), version),
            None => println!(
                "{} forge: {} (only needed to run `kiln serve`)",
                style("!").yellow(),
                toolchain.error.unwrap_or_default()
            ),
        }

        let url = config.build_service_url()?;
        match probe_build_service(&url).await {
            Ok(()) => println!("{} build service: {}", style("✓").green(), url),
            Err(e) => {
                problems += 1;
                println!("{} build service: {} ({})", style("✗").red(), url, e);
            }
        }

        let connector = AlloyConnector::default();
        for name in config.network_names() {
            let endpoint = config.endpoint(name)?;
            let reachable =
                tokio::time::timeout(PROBE_TIMEOUT, connector.connect(&endpoint)).await;
            match reachable {
                Ok(Ok(_)) => println!("{} network {}: {}", style("✓").green(), name, endpoint.rpc_url),
                Ok(Err(e)) => {
                    problems += 1;
                    println!("{} network {}: {}", style("✗").red(), name, e);
                }
                Err(_) => {
                    problems += 1;
                    println!(
                        "{} network {}: no answer after {}s",
                        style("✗").red(),
                        name,
                        PROBE_TIMEOUT.as_secs()
                    );
                }
            }
        }
        if config.rpc_endpoints.is_empty() {
            println!(
                "{} no networks configured in {}",
                style("!").yellow(),
                style("[rpc_endpoints]").cyan()
            );
        }

        println!();
        if problems == 0 {
            println!("{} Environment looks good", style("✓").green().bold());
        } else {
            println!("{} {} problem(s) found", style("!").yellow().bold(), problems);
        }
        Ok(())
    }
}

async fn probe_build_service(base: &str) -> Result<()> {
    let url = format!("{}/api/health", base.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .get(&url)
        .timeout(PROBE_TIMEOUT)
        .send()
        .await?;
    response.error_for_status()?;
    Ok(())
}
