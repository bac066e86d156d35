// src/errors.rs
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

use crate::modules::decompile::model::FailureKind;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum OrchestratorError {
    // === I/O and environment ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("execution environment error: {0}")]
    Environment(String),

    // === configuration ===
    #[error("invalid invocation config: {0}")]
    InvalidConfig(String),

    // === pipeline outcome ===
    #[error("decompilation failed ({kind}): {detail}")]
    Failed { kind: FailureKind, detail: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure of the external tool process itself.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wait failed for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tool '{program}' exited with status {status}")]
    NonZeroExit {
        program: String,
        status: ExitStatus,
        output: String,
    },

    #[error("tool '{program}' timed out after {after_ms}ms and was killed")]
    TimedOut {
        program: String,
        after_ms: u64,
        output: String,
    },
}

impl ExecutionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::TimedOut { .. })
    }

    /// Output captured from the child before it failed, if any.
    pub fn output(&self) -> &str {
        match self {
            ExecutionError::NonZeroExit { output, .. } | ExecutionError::TimedOut { output, .. } => {
                output
            }
            ExecutionError::Spawn { .. } | ExecutionError::Wait { .. } => "",
        }
    }

    /// Error message followed by whatever the tool printed.
    pub fn diagnostic(&self) -> String {
        let output = self.output().trim();
        if output.is_empty() {
            self.to_string()
        } else {
            format!("{}\n{}", self, output)
        }
    }
}

/// Failure while reading the tool's output directory.
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("failed to walk output directory '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read artifact '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse interface description '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("collection task aborted: {0}")]
    Aborted(String),
}
