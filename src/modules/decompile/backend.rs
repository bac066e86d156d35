use serde::Serialize;
use std::env;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ExecutionError, OrchestratorError};

use super::command::DEFAULT_PROGRAM;
use super::model::{CommandLine, RunOutput};
use super::runner::ProcessRunner;

/// External decompiler as an injected capability.
// native async trait, no async_trait crate
pub trait DecompilerTool: Send + Sync {
    fn name(&self) -> &str;

    /// Resolved executable to spawn. `Ok(None)` when the tool is simply not
    /// installed, `Err` only when the lookup itself cannot be performed.
    fn locate(&self) -> Result<Option<PathBuf>, OrchestratorError>;

    fn check_available(&self) -> Result<bool, OrchestratorError> {
        Ok(self.locate()?.is_some())
    }

    fn run(
        &self,
        cmd: &CommandLine,
        deadline: Option<Duration>,
    ) -> impl Future<Output = Result<RunOutput, ExecutionError>> + Send;
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolBinary {
    pub name: String,
    pub available: bool,
    pub path: Option<PathBuf>,
}

/// The real `heimdall` executable, spawned as a subprocess.
#[derive(Debug, Clone)]
pub struct HeimdallTool {
    program: String,
}

impl Default for HeimdallTool {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl HeimdallTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Locates the executable. Names containing a path separator are checked
    /// directly, bare names are searched on `PATH`.
    pub fn probe(&self) -> Result<ToolBinary, OrchestratorError> {
        let path = if has_separator(&self.program) {
            let p = PathBuf::from(&self.program);
            is_executable(&p).then_some(p)
        } else {
            let search = env::var_os("PATH").ok_or_else(|| {
                OrchestratorError::Environment("PATH is not set".to_string())
            })?;
            find_in_path(&self.program, &search)
        };
        Ok(ToolBinary {
            name: self.program.clone(),
            available: path.is_some(),
            path,
        })
    }
}

impl DecompilerTool for HeimdallTool {
    fn name(&self) -> &str {
        &self.program
    }

    fn locate(&self) -> Result<Option<PathBuf>, OrchestratorError> {
        Ok(self.probe()?.path)
    }

    async fn run(
        &self,
        cmd: &CommandLine,
        deadline: Option<Duration>,
    ) -> Result<RunOutput, ExecutionError> {
        ProcessRunner::run(cmd, deadline).await
    }
}

fn has_separator(program: &str) -> bool {
    program.contains('/') || (cfg!(windows) && program.contains('\\'))
}

pub fn find_in_path(bin: &str, search: &std::ffi::OsStr) -> Option<PathBuf> {
    for dir in env::split_paths(search) {
        let candidate = dir.join(bin);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{}.exe", bin));
            if is_executable(&exe) {
                return Some(exe);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.is_file()
        && std::fs::metadata(path)
            .map(|md| md.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
