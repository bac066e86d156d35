use std::path::Path;

use super::model::{CommandLine, InvocationConfig};

pub const DEFAULT_PROGRAM: &str = "heimdall";
pub const SUBCOMMAND: &str = "decompile";

pub const FLAG_OUTPUT: &str = "--output";
pub const FLAG_RPC_URL: &str = "--rpc-url";
pub const FLAG_DEFAULT: &str = "--default";
pub const FLAG_SKIP_RESOLVING: &str = "--skip-resolving";
pub const FLAG_INCLUDE_SOL: &str = "--include-sol";
pub const FLAG_INCLUDE_YUL: &str = "--include-yul";
pub const FLAG_TIMEOUT: &str = "--timeout";
pub const FLAG_ABI: &str = "--abi";
pub const FLAG_HARDFORK: &str = "--hardfork";

/// Maps an [`InvocationConfig`] onto `heimdall decompile` arguments. Pure.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl CommandBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn build(&self, config: &InvocationConfig, output_dir: &Path) -> CommandLine {
        let mut args = vec![
            SUBCOMMAND.to_string(),
            config.target().to_string(),
            FLAG_OUTPUT.to_string(),
            output_dir.display().to_string(),
        ];

        if let Some(url) = config.rpc_url() {
            args.push(FLAG_RPC_URL.to_string());
            args.push(url.to_string());
        }
        if config.uses_default() {
            args.push(FLAG_DEFAULT.to_string());
        }
        if config.skips_resolving() {
            args.push(FLAG_SKIP_RESOLVING.to_string());
        }
        if config.includes_solidity() {
            args.push(FLAG_INCLUDE_SOL.to_string());
        }
        if config.includes_yul() {
            args.push(FLAG_INCLUDE_YUL.to_string());
        }
        // non-positive: defer to the tool's own default
        if let Some(ms) = config.explicit_timeout_millis() {
            args.push(FLAG_TIMEOUT.to_string());
            args.push(ms.to_string());
        }
        if let Some(abi) = config.abi_path() {
            args.push(FLAG_ABI.to_string());
            args.push(abi.display().to_string());
        }
        if let Some(fork) = config.hardfork() {
            args.push(FLAG_HARDFORK.to_string());
            args.push(fork.to_string());
        }

        CommandLine {
            program: self.program.clone(),
            args,
        }
    }
}
