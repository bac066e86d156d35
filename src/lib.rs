pub mod cli;
pub mod errors;
pub mod modules;

// Re-export common items at crate root for benches/tests
pub use errors::{CollectionError, ExecutionError, OrchestratorError};
pub use modules::decompile::{
    DecompilationOrchestrator, DecompiledArtifact, FailureKind, InvocationConfig,
    InvocationOutcome, OrchestratorConfig,
};
