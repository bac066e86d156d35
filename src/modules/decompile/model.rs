use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::OrchestratorError;

pub const DEFAULT_TIMEOUT_MILLIS: i64 = 10_000;

/// One decompilation request.
///
/// The target is fixed at construction and never empty. Every other field is
/// an independent switch set through the `with_*` / flag methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationConfig {
    target: String,
    rpc_url: Option<String>,
    use_default: bool,
    skip_resolving: bool,
    include_solidity: bool,
    include_yul: bool,
    timeout_millis: i64,
    abi_path: Option<PathBuf>,
    hardfork: Option<String>,
}

impl InvocationConfig {
    pub fn new(target: impl Into<String>) -> Result<Self, OrchestratorError> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(OrchestratorError::InvalidConfig(
                "target must not be empty".to_string(),
            ));
        }
        Ok(Self {
            target,
            rpc_url: None,
            use_default: false,
            skip_resolving: false,
            include_solidity: false,
            include_yul: false,
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            abi_path: None,
            hardfork: None,
        })
    }

    /// Empty strings leave the endpoint unset.
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = non_empty(url.into());
        self
    }

    pub fn use_default(mut self, yes: bool) -> Self {
        self.use_default = yes;
        self
    }

    pub fn skip_resolving(mut self, yes: bool) -> Self {
        self.skip_resolving = yes;
        self
    }

    pub fn include_solidity(mut self, yes: bool) -> Self {
        self.include_solidity = yes;
        self
    }

    pub fn include_yul(mut self, yes: bool) -> Self {
        self.include_yul = yes;
        self
    }

    /// Non-positive values mean "no explicit timeout".
    pub fn with_timeout_millis(mut self, millis: i64) -> Self {
        self.timeout_millis = millis;
        self
    }

    pub fn with_abi_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.abi_path = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    pub fn with_hardfork(mut self, name: impl Into<String>) -> Self {
        self.hardfork = non_empty(name.into());
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn rpc_url(&self) -> Option<&str> {
        self.rpc_url.as_deref()
    }

    pub fn uses_default(&self) -> bool {
        self.use_default
    }

    pub fn skips_resolving(&self) -> bool {
        self.skip_resolving
    }

    pub fn includes_solidity(&self) -> bool {
        self.include_solidity
    }

    pub fn includes_yul(&self) -> bool {
        self.include_yul
    }

    pub fn timeout_millis(&self) -> i64 {
        self.timeout_millis
    }

    /// The timeout as a positive millisecond count, if one was given.
    pub fn explicit_timeout_millis(&self) -> Option<u64> {
        u64::try_from(self.timeout_millis).ok().filter(|ms| *ms > 0)
    }

    pub fn abi_path(&self) -> Option<&Path> {
        self.abi_path.as_deref()
    }

    pub fn hardfork(&self) -> Option<&str> {
        self.hardfork.as_deref()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

/// A fully resolved command line for the external tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Value following `flag`, if the flag is present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Output captured from a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Slot a file in the output directory feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Solidity,
    Yul,
    Interface,
}

impl ArtifactKind {
    /// Suffix-based classification. Anything unrecognised is ignored.
    pub fn classify(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".sol") {
            Some(Self::Solidity)
        } else if name.ends_with(".yul") {
            Some(Self::Yul)
        } else if name.ends_with(".json") {
            Some(Self::Interface)
        } else {
            None
        }
    }

    pub fn is_source(self) -> bool {
        matches!(self, Self::Solidity | Self::Yul)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectedFile {
    pub relative_path: PathBuf,
    pub kind: ArtifactKind,
}

/// Result of one decompilation, read fully into memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecompiledArtifact {
    pub(crate) source: Option<String>,
    pub(crate) interface: Option<serde_json::Value>,
    pub(crate) files: Vec<CollectedFile>,
}

impl DecompiledArtifact {
    /// Reconstructed source or IR text from the last source file visited.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Interface description from the last `.json` file visited.
    pub fn interface(&self) -> Option<&serde_json::Value> {
        self.interface.as_ref()
    }

    /// Every classified file, in visit order.
    pub fn files(&self) -> &[CollectedFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.interface.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    ToolNotInstalled,
    ExecutionFailed,
    OutputParseFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ToolNotInstalled => "tool not installed",
            FailureKind::ExecutionFailed => "execution failed",
            FailureKind::OutputParseFailed => "output parse failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
    pub timed_out: bool,
}

impl Failure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            timed_out: false,
        }
    }

    pub fn timed_out(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ExecutionFailed,
            detail: detail.into(),
            timed_out: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "lowercase")]
pub enum InvocationOutcome {
    Success(DecompiledArtifact),
    Failure(Failure),
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            InvocationOutcome::Success(_) => None,
            InvocationOutcome::Failure(f) => Some(f.kind),
        }
    }

    pub fn into_result(self) -> Result<DecompiledArtifact, OrchestratorError> {
        match self {
            InvocationOutcome::Success(artifact) => Ok(artifact),
            InvocationOutcome::Failure(f) => Err(OrchestratorError::Failed {
                kind: f.kind,
                detail: f.detail,
            }),
        }
    }

    /// Collapses failures to `None`, logging the diagnostic.
    pub fn into_artifact(self) -> Option<DecompiledArtifact> {
        match self {
            InvocationOutcome::Success(artifact) => Some(artifact),
            InvocationOutcome::Failure(f) => {
                tracing::warn!(kind = %f.kind, detail = %f.detail, "decompilation failed");
                None
            }
        }
    }
}

/// Orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecompileStage {
    Idle,
    CheckingAvailability,
    BuildingCommand,
    Running,
    Collecting,
    Completed,
    Failed,
}

impl DecompileStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, DecompileStage::Completed | DecompileStage::Failed)
    }
}
