use std::path::PathBuf;
use std::time::Duration;

use super::command::DEFAULT_PROGRAM;

pub const ENV_PROGRAM: &str = "HEIMDALL_BIN";
pub const ENV_SCRATCH_DIR: &str = "HEIMDALL_SCRATCH_DIR";
pub const ENV_DEADLINE_MS: &str = "HEIMDALL_DEADLINE_MS";
pub const ENV_BATCH_CONCURRENCY: &str = "HEIMDALL_BATCH_CONCURRENCY";

const DEFAULT_FALLBACK_DEADLINE_MS: u64 = 10_000;
const DEFAULT_BATCH_CONCURRENCY: usize = 4;

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Executable name or path of the decompiler
    pub program: String,

    /// Parent of the per-call scratch directories (system temp dir if unset)
    pub scratch_root: Option<PathBuf>,

    /// Hard ceiling used when a request carries no positive timeout
    pub fallback_deadline_ms: u64,

    /// Max decompilations in flight during a batch
    pub batch_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            scratch_root: None,
            fallback_deadline_ms: DEFAULT_FALLBACK_DEADLINE_MS,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overlaid with `HEIMDALL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(program) = lookup(ENV_PROGRAM).filter(|v| !v.trim().is_empty()) {
            cfg.program = program.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_SCRATCH_DIR).filter(|v| !v.trim().is_empty()) {
            cfg.scratch_root = Some(PathBuf::from(dir.trim()));
        }
        if let Some(ms) = parse_positive::<u64>(lookup(ENV_DEADLINE_MS)) {
            cfg.fallback_deadline_ms = ms;
        }
        if let Some(n) = parse_positive::<usize>(lookup(ENV_BATCH_CONCURRENCY)) {
            cfg.batch_concurrency = n;
        }
        cfg
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    pub fn fallback_deadline(&self) -> Duration {
        Duration::from_millis(self.fallback_deadline_ms.max(1))
    }

    pub fn effective_batch_concurrency(&self) -> usize {
        self.batch_concurrency.max(1)
    }
}

fn parse_positive<T>(raw: Option<String>) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let v = raw?.trim().parse::<T>().ok()?;
    // zero is ignored
    (v > T::default()).then_some(v)
}
