use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::errors::CollectionError;

use super::backend::{DecompilerTool, HeimdallTool};
use super::collector::ArtifactCollector;
use super::command::CommandBuilder;
use super::config::OrchestratorConfig;
use super::model::{
    DecompileStage, DecompiledArtifact, Failure, FailureKind, InvocationConfig, InvocationOutcome,
};

const SCRATCH_PREFIX: &str = "heimdall-decompile-";

/// Drives one decompilation end to end:
/// availability check, scratch directory, command, subprocess, collection.
///
/// Holds no per-call state. Each [`decompile`](Self::decompile) call gets its
/// own freshly created scratch directory, removed on every exit path
/// (including when the returned future is dropped mid-flight).
pub struct DecompilationOrchestrator<T: DecompilerTool = HeimdallTool> {
    tool: T,
    collector: ArtifactCollector,
    config: OrchestratorConfig,
}

impl DecompilationOrchestrator<HeimdallTool> {
    /// Real `heimdall` binary, configured from the environment.
    pub fn detect() -> Self {
        Self::from_config(OrchestratorConfig::from_env())
    }

    pub fn from_config(config: OrchestratorConfig) -> Self {
        let tool = HeimdallTool::new(config.program.clone());
        Self::with_tool(tool, config)
    }
}

impl<T: DecompilerTool> DecompilationOrchestrator<T> {
    pub fn with_tool(tool: T, config: OrchestratorConfig) -> Self {
        Self {
            tool,
            collector: ArtifactCollector,
            config,
        }
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn decompile(&self, request: &InvocationConfig) -> InvocationOutcome {
        let started = Instant::now();
        let mut stage = DecompileStage::Idle;

        let result = self.drive(request, &mut stage).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(artifact) => {
                info!(
                    contract = request.target(),
                    files = artifact.files().len(),
                    elapsed_ms,
                    "decompilation completed"
                );
                advance(&mut stage, DecompileStage::Completed, request);
                InvocationOutcome::Success(artifact)
            }
            Err(failure) => {
                warn!(
                    contract = request.target(),
                    failed_at = ?stage,
                    kind = %failure.kind,
                    timed_out = failure.timed_out,
                    elapsed_ms,
                    "decompilation failed"
                );
                advance(&mut stage, DecompileStage::Failed, request);
                InvocationOutcome::Failure(failure)
            }
        }
    }

    async fn drive(
        &self,
        request: &InvocationConfig,
        stage: &mut DecompileStage,
    ) -> Result<DecompiledArtifact, Failure> {
        advance(stage, DecompileStage::CheckingAvailability, request);
        let program = match self.tool.locate() {
            Ok(Some(path)) => path,
            Ok(None) => {
                return Err(Failure::new(
                    FailureKind::ToolNotInstalled,
                    format!(
                        "'{}' was not found on this system; install heimdall or point HEIMDALL_BIN at it",
                        self.tool.name()
                    ),
                ));
            }
            Err(e) => {
                return Err(Failure::new(
                    FailureKind::ExecutionFailed,
                    format!("availability probe failed: {}", e),
                ));
            }
        };

        advance(stage, DecompileStage::BuildingCommand, request);
        let scratch = self.scratch_dir().map_err(|e| {
            Failure::new(
                FailureKind::ExecutionFailed,
                format!("failed to create scratch directory: {}", e),
            )
        })?;
        // spawn exactly what the probe found
        let cmd = CommandBuilder::new(program.to_string_lossy()).build(request, scratch.path());
        debug!(command = %cmd, "built decompile command");

        advance(stage, DecompileStage::Running, request);
        let deadline = request
            .explicit_timeout_millis()
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.config.fallback_deadline());
        self.tool.run(&cmd, Some(deadline)).await.map_err(|e| {
            if e.is_timeout() {
                Failure::timed_out(e.diagnostic())
            } else {
                Failure::new(FailureKind::ExecutionFailed, e.diagnostic())
            }
        })?;

        advance(stage, DecompileStage::Collecting, request);
        let dir = scratch.path().to_path_buf();
        let collector = self.collector;
        let artifact = tokio::task::spawn_blocking(move || collector.collect(&dir))
            .await
            .map_err(|e| CollectionError::Aborted(e.to_string()))
            .and_then(|collected| collected)
            .map_err(|e| Failure::new(FailureKind::OutputParseFailed, e.to_string()))?;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "failed to remove scratch directory");
        }
        Ok(artifact)
    }

    fn scratch_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        match &self.config.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }
}

fn advance(stage: &mut DecompileStage, next: DecompileStage, request: &InvocationConfig) {
    debug_assert!(!stage.is_terminal(), "transition out of terminal stage {:?}", stage);
    debug!(contract = request.target(), from = ?*stage, to = ?next, "stage transition");
    *stage = next;
}
