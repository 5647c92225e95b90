//! Forge build artifact shapes

use kiln_core::BuildResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A contract artifact from forge build output (`out/<File>.sol/<Name>.json`)
#[derive(Debug, Deserialize)]
pub struct ContractArtifact {
    pub abi: Value,
    pub bytecode: BytecodeObject,
    /// Present when `devdoc` is in `extra_output`
    #[serde(default)]
    pub devdoc: Option<Value>,
    /// Solc metadata, which carries `output.devdoc`
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl ContractArtifact {
    pub fn devdoc(&self) -> Option<&Value> {
        self.devdoc
            .as_ref()
            .or_else(|| self.metadata.as_ref()?.get("output")?.get("devdoc"))
            .filter(|doc| doc.is_object())
    }

    /// Shape the artifact as a build-service result
    pub fn into_build_result(self, name: &str, output: String) -> BuildResult {
        let mut metadata = json!({ "name": name, "abi": self.abi });
        if let Some(devdoc) = self.devdoc().cloned() {
            metadata["devdoc"] = devdoc;
        }
        BuildResult {
            bytecode: self.bytecode.object,
            metadata,
            output,
        }
    }
}

/// Bytecode object within an artifact
#[derive(Debug, Deserialize)]
pub struct BytecodeObject {
    pub object: String,
}

impl BytecodeObject {
    /// Interfaces and abstract contracts have no creation code
    pub fn is_valid(&self) -> bool {
        !self.object.is_empty() && self.object != "0x"
    }
}

/// A deployable artifact found in `out/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub name: String,
    /// Source file the artifact was compiled from, e.g. `Counter.sol`
    pub source_file: String,
}
