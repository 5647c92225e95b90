//! Running the forge toolchain

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use color_eyre::eyre::{eyre, Result, WrapErr};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// The `forge` executable
#[derive(Debug, Clone)]
pub struct Forge {
    program: String,
}

impl Default for Forge {
    fn default() -> Self {
        Self {
            program: "forge".to_string(),
        }
    }
}

impl Forge {
    /// Use a different executable, e.g. a pinned foundry install
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// First line of `forge --version`
    pub async fn version(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .env("NO_COLOR", "1")
            .output()
            .await
            .wrap_err_with(|| format!("`{}` is not installed or not on PATH", self.program))?;

        if !output.status.success() {
            return Err(eyre!("`{} --version` exited with {}", self.program, output.status));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Start `forge build` in `project`, streaming stdout and stderr
    pub fn build(&self, project: &Path) -> Result<BuildProcess> {
        let mut child = Command::new(&self.program)
            .arg("build")
            .current_dir(project)
            .env("NO_COLOR", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .wrap_err_with(|| format!("Failed to start `{} build`", self.program))?;

        let (tx, lines) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx));
        }

        Ok(BuildProcess { child, lines })
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}

/// A running `forge build`. Dropping it kills the process.
pub struct BuildProcess {
    child: Child,
    lines: mpsc::UnboundedReceiver<String>,
}

impl BuildProcess {
    /// Next output line, or `None` once both pipes are closed
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    pub async fn wait(mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    // `sh build` runs the script named `build` in the project directory
    fn script_project(script: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("build"), script).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_build_streams_stdout_and_stderr() {
        let project = script_project("echo compiling\necho 'warning: unused' >&2\nexit 0\n");
        let mut process = Forge::with_program("sh").build(project.path()).unwrap();

        let mut lines = Vec::new();
        while let Some(line) = process.next_line().await {
            lines.push(line);
        }
        let status = process.wait().await.unwrap();

        assert!(status.success());
        lines.sort();
        assert_eq!(lines, vec!["compiling", "warning: unused"]);
    }

    #[tokio::test]
    async fn test_build_reports_failure_status() {
        let project = script_project("echo 'Error: compiler run failed'\nexit 1\n");
        let mut process = Forge::with_program("sh").build(project.path()).unwrap();

        let first = process.next_line().await;
        let status = process.wait().await.unwrap();

        assert_eq!(first.as_deref(), Some("Error: compiler run failed"));
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let forge = Forge::with_program("kiln-definitely-not-forge");
        assert!(forge.version().await.is_err());
        assert!(forge.build(Path::new(".")).is_err());
    }
}
