//! Build orchestration
//!
//! [`BuildOrchestrator`] drives an out-of-process build service, either as a
//! single request/response call or as a stream of output lines ending in
//! exactly one terminal event. At most one build runs per project handle.

mod protocol;

pub use protocol::{BuildErrorBody, BuildMessage, BuildResult, CompileRequest};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, Stage};
use crate::types::{CompiledArtifact, ProjectHandle};

// =============================================================================
// Build Service
// =============================================================================

/// Client for the build service.
///
/// Transport problems are reported as [`Error::BuildTransport`]; a toolchain
/// failure is an [`Error::BuildFailure`] carrying the build log.
#[async_trait]
pub trait BuildService: Send + Sync {
    async fn compile(&self, request: &CompileRequest) -> Result<BuildResult>;

    /// Open a stream and send `request` on it
    async fn open_channel(&self, request: &CompileRequest) -> Result<Box<dyn BuildChannel>>;
}

#[async_trait]
pub trait BuildChannel: Send {
    /// Next message, or `None` once the service closed the channel
    async fn recv(&mut self) -> Result<Option<BuildMessage>>;

    async fn close(&mut self);
}

// =============================================================================
// Events and State
// =============================================================================

#[derive(Debug)]
pub enum BuildOutputEvent {
    Line(String),
    Complete(CompiledArtifact),
    Error(Error),
}

impl BuildOutputEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildOutputEvent::Line(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Compiling,
}

/// Holds the per-project compile slot until dropped
struct CompileSlot {
    in_flight: Arc<DashSet<ProjectHandle>>,
    handle: ProjectHandle,
}

impl CompileSlot {
    fn acquire(in_flight: &Arc<DashSet<ProjectHandle>>, handle: &ProjectHandle) -> Result<Self> {
        if !in_flight.insert(handle.clone()) {
            return Err(Error::BuildInProgress(handle.to_string()));
        }
        Ok(Self {
            in_flight: in_flight.clone(),
            handle: handle.clone(),
        })
    }
}

impl Drop for CompileSlot {
    fn drop(&mut self) {
        self.in_flight.remove(&self.handle);
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

#[derive(Clone)]
pub struct BuildOrchestrator {
    service: Arc<dyn BuildService>,
    in_flight: Arc<DashSet<ProjectHandle>>,
    timeout: Duration,
}

impl BuildOrchestrator {
    pub fn new(service: Arc<dyn BuildService>, timeout: Duration) -> Self {
        Self {
            service,
            in_flight: Arc::new(DashSet::new()),
            timeout,
        }
    }

    pub fn state(&self, handle: &ProjectHandle) -> BuildState {
        if self.in_flight.contains(handle) {
            BuildState::Compiling
        } else {
            BuildState::Idle
        }
    }

    /// Single request/response build
    pub async fn compile(&self, handle: &ProjectHandle) -> Result<CompiledArtifact> {
        let _slot = CompileSlot::acquire(&self.in_flight, handle)?;
        info!(project = %handle, "compiling");

        let request = CompileRequest::from(handle);
        let result = tokio::time::timeout(self.timeout, self.service.compile(&request))
            .await
            .map_err(|_| build_timeout(self.timeout))??;

        let log = result.output.clone();
        let artifact = result.into_artifact(log)?;
        info!(project = %handle, code_hash = artifact.code_hash(), "build complete");
        Ok(artifact)
    }

    /// Open a streaming build. The returned stream owns the compile slot.
    pub async fn compile_stream(&self, handle: &ProjectHandle) -> Result<BuildStream> {
        let slot = CompileSlot::acquire(&self.in_flight, handle)?;
        let deadline = Instant::now() + self.timeout;
        info!(project = %handle, "compiling (streaming)");

        let request = CompileRequest::from(handle);
        let channel = tokio::time::timeout_at(deadline, self.service.open_channel(&request))
            .await
            .map_err(|_| build_timeout(self.timeout))??;

        Ok(BuildStream {
            channel: Some(channel),
            slot: Some(slot),
            log: String::new(),
            deadline,
            timeout: self.timeout,
            handle: handle.clone(),
        })
    }

    /// Streaming build that reports each output line to `on_line` before
    /// resolving to the artifact or the build error
    pub async fn compile_streaming<F>(&self, handle: &ProjectHandle, mut on_line: F) -> Result<CompiledArtifact>
    where
        F: FnMut(&str) + Send,
    {
        let mut stream = self.compile_stream(handle).await?;
        while let Some(event) = stream.next().await {
            match event {
                BuildOutputEvent::Line(line) => on_line(&line),
                BuildOutputEvent::Complete(artifact) => return Ok(artifact),
                BuildOutputEvent::Error(err) => return Err(err),
            }
        }
        Err(Error::BuildTransport("build stream ended without a result".into()))
    }
}

fn build_timeout(after: Duration) -> Error {
    Error::Timeout {
        stage: Stage::Build,
        after,
        tx_hash: None,
    }
}

// =============================================================================
// Stream
// =============================================================================

/// A running streaming build.
///
/// Yields any number of [`BuildOutputEvent::Line`] events followed by exactly
/// one terminal event, then `None`. The channel is closed before the terminal
/// event is returned. Dropping the stream releases the connection and the
/// compile slot.
pub struct BuildStream {
    channel: Option<Box<dyn BuildChannel>>,
    slot: Option<CompileSlot>,
    log: String,
    deadline: Instant,
    timeout: Duration,
    handle: ProjectHandle,
}

impl BuildStream {
    pub async fn next(&mut self) -> Option<BuildOutputEvent> {
        let channel = self.channel.as_mut()?;

        let received = tokio::time::timeout_at(self.deadline, channel.recv()).await;
        let event = match received {
            Err(_) => BuildOutputEvent::Error(build_timeout(self.timeout)),
            Ok(Err(err)) => BuildOutputEvent::Error(err),
            Ok(Ok(None)) => BuildOutputEvent::Error(Error::BuildTransport(
                "build service closed the stream before a result".into(),
            )),
            Ok(Ok(Some(BuildMessage::Output { line }))) => {
                debug!(project = %self.handle, "{}", line);
                self.log.push_str(&line);
                self.log.push('\n');
                return Some(BuildOutputEvent::Line(line));
            }
            Ok(Ok(Some(BuildMessage::Complete { result }))) => {
                let log = if self.log.is_empty() {
                    result.output.clone()
                } else {
                    std::mem::take(&mut self.log)
                };
                match result.into_artifact(log) {
                    Ok(artifact) => {
                        info!(project = %self.handle, code_hash = artifact.code_hash(), "build complete");
                        BuildOutputEvent::Complete(artifact)
                    }
                    Err(err) => BuildOutputEvent::Error(err),
                }
            }
            Ok(Ok(Some(BuildMessage::Error { error, output }))) => {
                let log = if output.is_empty() {
                    std::mem::take(&mut self.log)
                } else {
                    output
                };
                BuildOutputEvent::Error(Error::BuildFailure { message: error, log })
            }
        };

        if let BuildOutputEvent::Error(err) = &event {
            warn!(project = %self.handle, error = %err, "build failed");
        }
        self.finish().await;
        Some(event)
    }

    /// Stop the build and close the channel
    pub async fn cancel(mut self) {
        info!(project = %self.handle, "build cancelled");
        self.finish().await;
    }

    /// Output received so far
    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn is_finished(&self) -> bool {
        self.channel.is_none()
    }

    async fn finish(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }
        self.slot.take();
    }
}
