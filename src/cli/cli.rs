use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::errors::OrchestratorError;
use crate::modules::decompile::{
    DecompilationOrchestrator, DecompileBatchReport, DecompiledArtifact, HeimdallTool,
    InvocationConfig, InvocationOutcome, OrchestratorConfig, ToolBinary,
};

// logging
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "heimdall-orchestrator",
    about = "Run `heimdall decompile` in an isolated scratch directory and collect the results",
    version
)]
pub struct Cli {
    /// global log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// heimdall executable name or path (overrides HEIMDALL_BIN)
    #[arg(long, global = true)]
    pub heimdall_bin: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether heimdall can be found
    Check {
        /// output format: raw/json
        #[arg(long, default_value = "raw")]
        output: String,
    },
    /// Decompile one target
    Decompile {
        /// contract address, bytecode file, or raw bytecode
        target: String,
        #[command(flatten)]
        flags: DecompileFlags,
        /// output format: raw/json
        #[arg(long, default_value = "raw")]
        output: String,
        /// write output to file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Decompile several targets concurrently
    Batch {
        /// targets to decompile (comma separated or repeated)
        #[arg(long, required = true)]
        targets: Vec<String>,
        #[command(flatten)]
        flags: DecompileFlags,
        /// max decompilations in flight
        #[arg(long)]
        concurrency: Option<usize>,
        /// output format: raw/json
        #[arg(long, default_value = "raw")]
        output: String,
        /// write output to file
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DecompileFlags {
    /// RPC endpoint used by heimdall to fetch on-chain bytecode
    #[arg(long, default_value = "")]
    pub rpc_url: String,
    /// always select the default value when heimdall prompts
    #[arg(long)]
    pub default: bool,
    /// skip resolving function selectors
    #[arg(long)]
    pub skip_resolving: bool,
    /// include reconstructed solidity source
    #[arg(long)]
    pub include_sol: bool,
    /// include yul intermediate representation
    #[arg(long)]
    pub include_yul: bool,
    /// timeout in milliseconds (<= 0 defers to heimdall's default)
    #[arg(long, default_value_t = 10_000, allow_negative_numbers = true)]
    pub timeout: i64,
    /// known ABI file used to resolve selectors
    #[arg(long)]
    pub abi: Option<PathBuf>,
    /// hardfork used for opcode recognition
    #[arg(long)]
    pub hardfork: Option<String>,
}

impl DecompileFlags {
    fn to_config(&self, target: &str) -> Result<InvocationConfig, OrchestratorError> {
        let mut cfg = InvocationConfig::new(target)?
            .with_rpc_url(self.rpc_url.clone())
            .use_default(self.default)
            .skip_resolving(self.skip_resolving)
            .include_solidity(self.include_sol)
            .include_yul(self.include_yul)
            .with_timeout_millis(self.timeout);
        if let Some(abi) = &self.abi {
            cfg = cfg.with_abi_path(abi.clone());
        }
        if let Some(fork) = &self.hardfork {
            cfg = cfg.with_hardfork(fork.clone());
        }
        Ok(cfg)
    }
}

fn is_json(fmt: &str) -> bool {
    fmt.eq_ignore_ascii_case("json")
}

fn format_binary(bin: &ToolBinary, fmt: &str) -> Result<String, OrchestratorError> {
    if is_json(fmt) {
        return Ok(serde_json::to_string(bin)?);
    }
    Ok(match &bin.path {
        Some(p) => format!("{} available at {}", bin.name, p.display()),
        None => format!("{} not found", bin.name),
    })
}

fn format_artifact(artifact: &DecompiledArtifact) -> Result<String, OrchestratorError> {
    let mut s = String::new();
    for f in artifact.files() {
        s.push_str(&format!("# {} ({:?})\n", f.relative_path.display(), f.kind));
    }
    if let Some(src) = artifact.source() {
        s.push_str("== source ==\n");
        s.push_str(src.trim_end());
        s.push('\n');
    }
    if let Some(abi) = artifact.interface() {
        s.push_str("== interface ==\n");
        s.push_str(&serde_json::to_string_pretty(abi)?);
        s.push('\n');
    }
    if artifact.is_empty() {
        s.push_str("(no artifacts produced)\n");
    }
    Ok(s)
}

fn format_outcome(outcome: &InvocationOutcome, fmt: &str) -> Result<String, OrchestratorError> {
    if is_json(fmt) {
        return Ok(serde_json::to_string(outcome)?);
    }
    match outcome {
        InvocationOutcome::Success(a) => format_artifact(a),
        InvocationOutcome::Failure(f) => Ok(format!("FAILED ({}): {}", f.kind, f.detail)),
    }
}

fn format_batch(report: &DecompileBatchReport, fmt: &str) -> Result<String, OrchestratorError> {
    if is_json(fmt) {
        return Ok(serde_json::to_string(report)?);
    }
    let mut lines = Vec::new();
    for item in &report.items {
        let status = match &item.outcome {
            InvocationOutcome::Success(a) => format!("ok files={}", a.files().len()),
            InvocationOutcome::Failure(f) => format!("failed ({}): {}", f.kind, first_line(&f.detail)),
        };
        lines.push(format!("{} {}", item.target, status));
    }
    lines.push(format!(
        "total={} succeeded={} failed={}",
        report.total, report.succeeded, report.failed
    ));
    Ok(lines.join("\n"))
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default()
}

async fn emit(s: &str, out: Option<PathBuf>) -> Result<(), OrchestratorError> {
    match out {
        Some(path) => {
            let mut file = File::create(path).await?;
            file.write_all(format!("{}\n", s).as_bytes()).await?;
        }
        None => println!("{}", s),
    }
    Ok(())
}

fn split_targets(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn run_from_args<I, T>(args: I) -> Result<(), OrchestratorError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // initialize tracing according to log_level (ok if already initialized in tests)
    let env_filter = EnvFilter::new(cli.log_level.clone());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
    info!("Starting heimdall-orchestrator, log_level={}", cli.log_level);

    let mut cfg = OrchestratorConfig::from_env();
    if let Some(bin) = cli.heimdall_bin {
        cfg.program = bin;
    }

    match cli.cmd {
        Commands::Check { output } => {
            let bin = HeimdallTool::new(cfg.program.clone()).probe()?;
            println!("{}", format_binary(&bin, &output)?);
            if !bin.available {
                return Err(OrchestratorError::Failed {
                    kind: crate::modules::decompile::FailureKind::ToolNotInstalled,
                    detail: format!("{} is not installed", bin.name),
                });
            }
        }
        Commands::Decompile {
            target,
            flags,
            output,
            out,
        } => {
            let request = flags.to_config(&target)?;
            let orch = DecompilationOrchestrator::from_config(cfg);
            let outcome = orch.decompile(&request).await;
            emit(&format_outcome(&outcome, &output)?, out).await?;
            outcome.into_result()?;
        }
        Commands::Batch {
            targets,
            flags,
            concurrency,
            output,
            out,
        } => {
            let requests = split_targets(&targets)
                .iter()
                .map(|t| flags.to_config(t))
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(c) = concurrency {
                cfg.batch_concurrency = c;
            }
            let orch = DecompilationOrchestrator::from_config(cfg);
            let report = orch.decompile_batch(&requests).await;
            emit(&format_batch(&report, &output)?, out).await?;
        }
    }

    Ok(())
}

/// Run using environment args
pub async fn run() -> Result<(), OrchestratorError> {
    run_from_args(std::env::args()).await
}
