//! Foundry integration for the local build service
//!
//! - [`Forge`] runs the `forge` executable and streams its output
//! - [`ArtifactLoader`] reads compiled artifacts from `out/`
//! - [`ForgeCompiler`] combines the two behind the [`Compiler`] trait that the
//!   HTTP and WebSocket routes use

mod artifact;
mod toolchain;
mod types;

pub use artifact::{ArtifactLoader, FileSystemArtifactLoader};
pub use toolchain::Forge;

use async_trait::async_trait;
use kiln_core::{BuildErrorBody, BuildResult, CompileRequest};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Toolchain availability, as reported by `check-env`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainStatus {
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Compiles a project on behalf of a build-service request
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Build the project, sending each output line to `lines` as it appears.
    ///
    /// The full output is also returned with the result or the error.
    async fn compile(
        &self,
        request: &CompileRequest,
        lines: mpsc::UnboundedSender<String>,
    ) -> Result<BuildResult, BuildErrorBody>;

    async fn check(&self) -> ToolchainStatus;
}

#[derive(Debug, Clone, Default)]
pub struct ForgeCompiler {
    forge: Forge,
}

impl ForgeCompiler {
    pub fn new(forge: Forge) -> Self {
        Self { forge }
    }
}

fn failure(error: impl ToString, output: String) -> BuildErrorBody {
    BuildErrorBody {
        error: error.to_string(),
        output,
    }
}

#[async_trait]
impl Compiler for ForgeCompiler {
    async fn compile(
        &self,
        request: &CompileRequest,
        lines: mpsc::UnboundedSender<String>,
    ) -> Result<BuildResult, BuildErrorBody> {
        let project = &request.project_path;
        if !project.is_dir() {
            return Err(failure(
                format!("Project directory {} does not exist", project.display()),
                String::new(),
            ));
        }

        info!(project = %project.display(), "forge build");
        let mut process = self.forge.build(project).map_err(|e| failure(e, String::new()))?;

        let mut output = String::new();
        while let Some(line) = process.next_line().await {
            output.push_str(&line);
            output.push('\n');
            // the requester may have gone away; keep building for the log
            let _ = lines.send(line);
        }

        let status = process.wait().await.map_err(|e| failure(e, output.clone()))?;
        if !status.success() {
            debug!(%status, "forge build failed");
            return Err(failure(format!("forge build exited with {}", status), output));
        }

        let loader = FileSystemArtifactLoader::with_paths(project);
        match loader.select(request.contract.as_deref()) {
            Ok((name, artifact)) => {
                info!(contract = %name, "artifact loaded");
                Ok(artifact.into_build_result(&name, output))
            }
            Err(e) => Err(failure(e, output)),
        }
    }

    async fn check(&self) -> ToolchainStatus {
        match self.forge.version().await {
            Ok(version) => ToolchainStatus {
                installed: true,
                version: Some(version),
                error: None,
            },
            Err(e) => ToolchainStatus {
                installed: false,
                version: None,
                error: Some(e.to_string()),
            },
        }
    }
}
