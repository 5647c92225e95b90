//! Compile a project through the build service

use std::path::{Path, PathBuf};

use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use console::style;
use kiln_core::{BuildOrchestrator, CompiledArtifact, Error, ProjectHandle};

use crate::services::Services;

/// Compile a project through the configured build service
#[derive(Args)]
pub struct BuildCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Contract to build (defaults to the first deployable one)
    #[arg(long, short)]
    pub contract: Option<String>,

    /// Wait for the result instead of streaming compiler output
    #[arg(long)]
    pub no_stream: bool,
}

impl BuildCommand {
    pub async fn run(self) -> Result<()> {
        let services = Services::open().await?;
        let builder = services.builder()?;

        let artifact = build_artifact(&builder, &self.path, self.contract.clone(), !self.no_stream).await?;

        println!();
        println!(
            "{} Built {}",
            style("✓").green().bold(),
            style(artifact.name()).cyan()
        );
        println!("   Code hash: {}", style(artifact.code_hash()).yellow());
        println!("   Size:      {} bytes", artifact.binary().len());
        for constructor in artifact.constructors() {
            let args: Vec<String> = constructor
                .args
                .iter()
                .map(|a| format!("{}: {}", a.label, a.type_descriptor))
                .collect();
            println!(
                "   {}({})",
                style(&constructor.label).cyan(),
                args.join(", ")
            );
        }

        Ok(())
    }
}

/// Build `path`, echoing compiler output as it arrives when `stream` is set
pub(crate) async fn build_artifact(
    builder: &BuildOrchestrator,
    path: &Path,
    contract: Option<String>,
    stream: bool,
) -> Result<CompiledArtifact> {
    let path = std::fs::canonicalize(path)
        .wrap_err_with(|| format!("Project directory {} not found", path.display()))?;
    let mut handle = ProjectHandle::new(path);
    if let Some(contract) = contract {
        handle = handle.with_contract(contract);
    }

    println!("{} Compiling {}...", style("→").blue(), handle);

    let result = if stream {
        builder
            .compile_streaming(&handle, |line| println!("  {}", style(line).dim()))
            .await
    } else {
        builder.compile(&handle).await
    };

    result.map_err(|err| {
        if let Error::BuildFailure { log, .. } = &err {
            if !stream && !log.is_empty() {
                eprintln!("{}", log.trim_end());
            }
        }
        err.into()
    })
}
