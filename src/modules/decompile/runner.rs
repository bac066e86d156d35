use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::ExecutionError;

use super::model::{CommandLine, RunOutput};

/// How long output pipes may stay open after the tool itself has exited.
const PIPE_GRACE: Duration = Duration::from_millis(250);

/// Runs a command line to completion, capturing stdout and stderr.
///
/// On unix the child leads its own process group. Anything it forks is killed
/// together with it on timeout, when the future is dropped, or when leftovers
/// keep the output pipes open after the tool exited. The outcome is decided by
/// the tool's own exit status, never by its background helpers.
pub struct ProcessRunner;

impl ProcessRunner {
    pub async fn run(
        cmd: &CommandLine,
        deadline: Option<Duration>,
    ) -> Result<RunOutput, ExecutionError> {
        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| ExecutionError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;
        let mut group = ProcessGroup::new(child.id());
        debug!(program = %cmd.program, pid = ?child.id(), "spawned external tool");

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let started = Instant::now();

        let waited = {
            let pipes = async {
                tokio::join!(
                    drain(stdout_pipe.as_mut(), &mut stdout),
                    drain(stderr_pipe.as_mut(), &mut stderr),
                );
            };
            tokio::pin!(pipes);

            let exited = async {
                let mut pipes_closed = false;
                loop {
                    tokio::select! {
                        status = child.wait() => break (status, pipes_closed),
                        _ = &mut pipes, if !pipes_closed => pipes_closed = true,
                    }
                }
            };
            let waited = match deadline {
                Some(limit) => tokio::time::timeout(limit, exited).await.ok(),
                None => Some(exited.await),
            };

            match waited {
                Some((Ok(status), pipes_closed)) => {
                    let closed = pipes_closed
                        || tokio::time::timeout(PIPE_GRACE, &mut pipes).await.is_ok();
                    if closed {
                        group.disarm();
                    } else {
                        debug!(
                            program = %cmd.program,
                            "output still held open after exit, killing leftovers"
                        );
                    }
                    Some(Ok(status))
                }
                Some((Err(e), _)) => Some(Err(e)),
                None => None,
            }
        };
        // no-op when disarmed
        group.kill();

        let elapsed_ms = started.elapsed().as_millis();

        match waited {
            None => {
                if let Err(e) = child.kill().await {
                    warn!(program = %cmd.program, error = %e, "failed to kill timed out tool");
                }
                let after_ms = deadline
                    .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                    .unwrap_or_default();
                warn!(program = %cmd.program, after_ms, "external tool timed out, killed");
                Err(ExecutionError::TimedOut {
                    program: cmd.program.clone(),
                    after_ms,
                    output: lossy(&stdout, &stderr).combined(),
                })
            }
            Some(Err(source)) => {
                if let Err(e) = child.kill().await {
                    warn!(
                        program = %cmd.program,
                        error = %e,
                        "failed to kill tool after wait error"
                    );
                }
                Err(ExecutionError::Wait {
                    program: cmd.program.clone(),
                    source,
                })
            }
            Some(Ok(status)) => {
                debug!(program = %cmd.program, %status, elapsed_ms, "external tool exited");
                let output = lossy(&stdout, &stderr);
                if status.success() {
                    Ok(output)
                } else {
                    Err(ExecutionError::NonZeroExit {
                        program: cmd.program.clone(),
                        status,
                        output: output.combined(),
                    })
                }
            }
        }
    }
}

fn lossy(stdout: &[u8], stderr: &[u8]) -> RunOutput {
    RunOutput {
        stdout: String::from_utf8_lossy(stdout).into_owned(),
        stderr: String::from_utf8_lossy(stderr).into_owned(),
    }
}

/// Reads until EOF. Chunked so that bytes read before a cancellation are kept.
async fn drain<R>(pipe: Option<&mut R>, buf: &mut Vec<u8>)
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!(error = %e, "stopped reading child output");
                break;
            }
        }
    }
}

/// Process group led by the spawned tool. Sends SIGKILL to the whole group on
/// drop unless disarmed.
struct ProcessGroup {
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    fn disarm(&mut self) {
        self.leader = None;
    }

    fn kill(&mut self) {
        if let Some(pid) = self.leader.take() {
            kill_group(pid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(leader: u32) {
    let Ok(pgid) = libc::pid_t::try_from(leader) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers; a negative pid addresses the group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let e = std::io::Error::last_os_error();
        // ESRCH: the group is already gone
        if e.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid, error = %e, "failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_leader: u32) {}
