pub mod decompile;

// module-level API
pub use decompile::{DecompilationOrchestrator, InvocationConfig, InvocationOutcome};
