//! Artifact loading trait and filesystem implementation

use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Result, WrapErr};

use super::types::{ArtifactInfo, ContractArtifact};

// =============================================================================
// Trait Definition
// =============================================================================

/// Loads compiled contract artifacts from a project
pub trait ArtifactLoader: Send + Sync {
    /// Deployable artifacts compiled from the project's own sources, by name
    fn list(&self) -> Result<Vec<ArtifactInfo>>;

    fn load(&self, name: &str) -> Result<ContractArtifact>;

    /// The named artifact, or the first deployable one in name order
    fn select(&self, name: Option<&str>) -> Result<(String, ContractArtifact)> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self
                .list()?
                .into_iter()
                .next()
                .map(|info| info.name)
                .ok_or_else(|| eyre!("No deployable contract found in build output"))?,
        };
        let artifact = self.load(&name)?;
        if !artifact.bytecode.is_valid() {
            return Err(eyre!(
                "Artifact '{}' has no bytecode (may be an interface or abstract contract)",
                name
            ));
        }
        Ok((name, artifact))
    }
}

// =============================================================================
// Filesystem Implementation
// =============================================================================

/// Artifact loader that reads forge build output from disk
#[derive(Debug, Clone)]
pub struct FileSystemArtifactLoader {
    /// Directory containing compiled artifacts (typically "out")
    out_dir: PathBuf,
    /// Directory containing source files (typically "src")
    src_dir: PathBuf,
}

impl FileSystemArtifactLoader {
    /// Loader with paths relative to the given project root
    pub fn with_paths(project_root: &Path) -> Self {
        Self {
            out_dir: project_root.join("out"),
            src_dir: project_root.join("src"),
        }
    }

    /// Check if a source file exists in the src directory (including subdirectories)
    fn source_exists(&self, filename: &str) -> bool {
        source_exists_in_dir(&self.src_dir, filename)
    }

    fn read_artifact(path: &Path) -> Result<ContractArtifact> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .wrap_err_with(|| format!("Malformed artifact {}", path.display()))
    }
}

fn source_exists_in_dir(dir: &Path, filename: &str) -> bool {
    if dir.join(filename).exists() {
        return true;
    }

    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && source_exists_in_dir(&path, filename) {
                return true;
            }
        }
    }

    false
}

impl ArtifactLoader for FileSystemArtifactLoader {
    fn list(&self) -> Result<Vec<ArtifactInfo>> {
        if !self.out_dir.exists() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();

        for entry in std::fs::read_dir(&self.out_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }

            let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            // build-info, dependencies and test/script outputs
            if dir_name.starts_with('.') || dir_name == "build-info" || !self.source_exists(dir_name) {
                continue;
            }

            for json_entry in std::fs::read_dir(&path)? {
                let json_path = json_entry?.path();
                if json_path.extension().is_none_or(|e| e != "json") {
                    continue;
                }

                let Some(contract_name) = json_path.file_stem().and_then(|n| n.to_str()) else {
                    continue;
                };
                if contract_name.ends_with(".metadata") {
                    continue;
                }

                match Self::read_artifact(&json_path) {
                    Ok(artifact) if artifact.bytecode.is_valid() => artifacts.push(ArtifactInfo {
                        name: contract_name.to_string(),
                        source_file: dir_name.to_string(),
                    }),
                    Ok(_) => {}
                    Err(e) => tracing::debug!(path = %json_path.display(), error = %e, "skipping artifact"),
                }
            }
        }

        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(artifacts)
    }

    fn load(&self, contract_name: &str) -> Result<ContractArtifact> {
        let possible_paths = [
            self.out_dir
                .join(format!("{}.sol", contract_name))
                .join(format!("{}.json", contract_name)),
            self.out_dir
                .join(contract_name)
                .join(format!("{}.json", contract_name)),
        ];

        if let Some(path) = possible_paths.iter().find(|p| p.exists()) {
            return Self::read_artifact(path);
        }

        // contracts declared in a file with a different name
        for info in self.list()? {
            if info.name == contract_name {
                let path = self
                    .out_dir
                    .join(&info.source_file)
                    .join(format!("{}.json", contract_name));
                return Self::read_artifact(&path);
            }
        }

        Err(eyre!(
            "Could not find artifact for contract '{}'. Make sure `forge build` succeeded.",
            contract_name
        ))
    }
}
