// End-to-end runs against a shell script standing in for the heimdall binary
#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use serde_json::json;

    use crate::modules::decompile::{
        DecompilationOrchestrator, DecompilerTool, FailureKind, HeimdallTool, InvocationConfig,
        InvocationOutcome, OrchestratorConfig,
    };

    /// Fake `heimdall decompile <target> --output <dir> ...`.
    fn install_fake_heimdall(bin_dir: &Path, pid_dir: &Path) -> PathBuf {
        let script = format!(
            r#"#!/bin/sh
[ "$1" = "decompile" ] || {{ echo "unknown subcommand $1" >&2; exit 2; }}
target="$2"
out="$4"
case "$target" in
  fail*)
    echo "Error: failed to fetch bytecode for $target" >&2
    exit 1
    ;;
  hang*)
    echo $$ > "{pid_dir}/$target.pid"
    exec sleep 30
    ;;
  bad*)
    printf '{{broken' > "$out/abi.json"
    exit 0
    ;;
esac
echo "decompiling $target"
printf 'pragma solidity;' > "$out/decompiled.sol"
printf '{{"type":"function"}}' > "$out/abi.json"
"#,
            pid_dir = pid_dir.display()
        );
        let path = bin_dir.join("heimdall");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    struct Fixture {
        _root: tempfile::TempDir,
        scratch: PathBuf,
        pids: PathBuf,
        orch: DecompilationOrchestrator<HeimdallTool>,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join("bin");
        let scratch = root.path().join("scratch");
        let pids = root.path().join("pids");
        for d in [&bin, &scratch, &pids] {
            std::fs::create_dir_all(d).unwrap();
        }
        let program = install_fake_heimdall(&bin, &pids);
        let cfg = OrchestratorConfig::default()
            .with_program(program.display().to_string())
            .with_scratch_root(&scratch);
        Fixture {
            _root: root,
            scratch,
            pids,
            orch: DecompilationOrchestrator::from_config(cfg),
        }
    }

    fn scratch_is_empty(p: &Path) -> bool {
        std::fs::read_dir(p).unwrap().next().is_none()
    }

    /// Waits for the pid recorded by a `hang*` run to disappear (zombies count
    /// as gone).
    #[cfg(target_os = "linux")]
    async fn recorded_process_exits(pid_file: &Path) -> bool {
        let pid = std::fs::read_to_string(pid_file).expect("fake tool recorded its pid");
        let stat = format!("/proc/{}/stat", pid.trim());
        for _ in 0..40 {
            let running = std::fs::read_to_string(&stat)
                .ok()
                .and_then(|s| {
                    s.rsplit(')')
                        .next()
                        .and_then(|rest| rest.split_whitespace().next())
                        .map(|state| state != "Z")
                })
                .unwrap_or(false);
            if !running {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        false
    }

    #[tokio::test]
    async fn real_process_success() {
        let fx = fixture();
        assert!(fx.orch.tool().check_available().unwrap());

        let req = InvocationConfig::new("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2")
            .unwrap()
            .include_solidity(true);
        let artifact = fx.orch.decompile(&req).await.into_result().unwrap();
        assert_eq!(artifact.source(), Some("pragma solidity;"));
        assert_eq!(artifact.interface(), Some(&json!({"type": "function"})));
        assert!(scratch_is_empty(&fx.scratch));
    }

    #[tokio::test]
    async fn real_process_nonzero_exit() {
        let fx = fixture();
        let outcome = fx
            .orch
            .decompile(&InvocationConfig::new("fail-me").unwrap())
            .await;
        match outcome {
            InvocationOutcome::Failure(f) => {
                assert_eq!(f.kind, FailureKind::ExecutionFailed);
                assert!(!f.timed_out);
                assert!(f.detail.contains("failed to fetch bytecode for fail-me"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(scratch_is_empty(&fx.scratch));
    }

    #[tokio::test]
    async fn real_process_malformed_output() {
        let fx = fixture();
        let outcome = fx
            .orch
            .decompile(&InvocationConfig::new("bad-output").unwrap())
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::OutputParseFailed));
        assert!(scratch_is_empty(&fx.scratch));
    }

    #[tokio::test]
    async fn real_process_timeout_kills_child() {
        let fx = fixture();
        let req = InvocationConfig::new("hang-forever")
            .unwrap()
            .with_timeout_millis(500);
        let outcome = fx.orch.decompile(&req).await;
        match &outcome {
            InvocationOutcome::Failure(f) => {
                assert_eq!(f.kind, FailureKind::ExecutionFailed);
                assert!(f.timed_out);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(scratch_is_empty(&fx.scratch));

        #[cfg(target_os = "linux")]
        assert!(
            recorded_process_exits(&fx.pids.join("hang-forever.pid")).await,
            "timed out tool is still running"
        );
    }

    #[tokio::test]
    async fn dropping_an_in_flight_call_kills_the_tool_and_cleans_up() {
        let fx = fixture();
        let req = InvocationConfig::new("hang-abandoned").unwrap();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(500), fx.orch.decompile(&req)).await;
        assert!(abandoned.is_err(), "call should still have been running");

        assert!(scratch_is_empty(&fx.scratch));
        #[cfg(target_os = "linux")]
        assert!(
            recorded_process_exits(&fx.pids.join("hang-abandoned.pid")).await,
            "abandoned tool is still running"
        );
    }

    #[tokio::test]
    async fn missing_binary_is_tool_not_installed() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("scratch");
        let cfg = OrchestratorConfig::default()
            .with_program(root.path().join("no-heimdall-here").display().to_string())
            .with_scratch_root(&scratch);
        let orch = DecompilationOrchestrator::from_config(cfg);
        let outcome = orch.decompile(&InvocationConfig::new("0xabc").unwrap()).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::ToolNotInstalled));
        assert!(!scratch.exists());
    }
}
