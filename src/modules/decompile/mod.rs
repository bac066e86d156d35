pub mod backend;
pub mod batch;
pub mod collector;
pub mod command;
pub mod config;
pub mod model;
pub mod orchestrator;
pub mod runner;

#[cfg(all(test, unix))]
mod tests_process;

pub use backend::{DecompilerTool, HeimdallTool, ToolBinary};
pub use batch::{BatchItem, DecompileBatchReport};
pub use collector::ArtifactCollector;
pub use command::CommandBuilder;
pub use config::OrchestratorConfig;
pub use model::{
    ArtifactKind, CollectedFile, CommandLine, DecompileStage, DecompiledArtifact, Failure,
    FailureKind, InvocationConfig, InvocationOutcome, RunOutput,
};
pub use orchestrator::DecompilationOrchestrator;
pub use runner::ProcessRunner;
