//! Build-service wire format
//!
//! The same JSON shapes travel over `POST /api/contracts/compile` and over the
//! WebSocket stream at `/api/contracts/compile/stream`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::bytecode::Bytecode;
use crate::error::{Error, Result};
use crate::types::{CompiledArtifact, ProjectHandle};

/// Sent once, as the request body or as the first stream message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    pub project_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
}

impl CompileRequest {
    pub fn handle(&self) -> ProjectHandle {
        ProjectHandle {
            path: self.project_path.clone(),
            contract: self.contract.clone(),
        }
    }
}

impl From<&ProjectHandle> for CompileRequest {
    fn from(handle: &ProjectHandle) -> Self {
        Self {
            project_path: handle.path.clone(),
            contract: handle.contract.clone(),
        }
    }
}

/// Raw output of a successful build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    /// Creation bytecode, 0x-prefixed hex
    pub bytecode: String,
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub output: String,
}

impl BuildResult {
    /// Validate and wrap into an artifact. The code hash is computed here.
    pub fn into_artifact(self, build_log: String) -> Result<CompiledArtifact> {
        let binary = Bytecode::from_hex(&self.bytecode)
            .map_err(|e| Error::InvalidArtifact(format!("bytecode is not valid hex: {}", e)))?;
        CompiledArtifact::from_build(binary.as_bytes().to_vec(), &self.metadata, build_log)
    }
}

/// One message on the compile stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BuildMessage {
    Output {
        line: String,
    },
    Complete {
        result: BuildResult,
    },
    Error {
        error: String,
        #[serde(default)]
        output: String,
    },
}

impl BuildMessage {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildMessage::Output { .. })
    }
}

/// Body of a `422` compile response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildErrorBody {
    pub error: String,
    #[serde(default)]
    pub output: String,
}
