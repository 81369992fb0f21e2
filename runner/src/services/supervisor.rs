//! Pseudo-terminal process supervisor
//!
//! Spawns one test process attached to a pseudo-terminal, streams its
//! combined output to an [`OutputObserver`], enforces the watchdog and reaps
//! the child however it ended.

use std::io::{self, Write};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::{Pid, setsid};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::sleep;

use crate::error::{RunnerError, RunnerResult};
use crate::services::pty::{Pty, PtyReader, acquire_controlling_terminal};
use crate::services::watchdog::Watchdog;
use crate::traits::{
    CapturedOutput, ExitDisposition, Invocation, LineControl, OutputObserver, ProcessSupervisor, TimeoutAction,
};
use shared::{ProcessId, process_debug, process_warn};

const DEFAULT_SPAWN_RETRIES: u32 = 3;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Forwards raw child output to a human watching the run
#[derive(Clone)]
pub struct LineEcho {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LineEcho {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Discards everything
    pub fn silent() -> Self {
        Self::new(Box::new(io::sink()))
    }

    pub fn forward(&self, line: &str) {
        // A closed stdout must not take the run down with it
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{line}");
            let _ = sink.flush();
        }
    }
}

/// Real supervisor implementation
pub struct PtySupervisor {
    spawn_retries: u32,
}

impl PtySupervisor {
    pub fn new() -> Self {
        Self {
            spawn_retries: DEFAULT_SPAWN_RETRIES,
        }
    }

    /// Configure ETXTBSY retries (fluent API)
    pub fn with_spawn_retries(mut self, retries: u32) -> Self {
        self.spawn_retries = retries;
        self
    }

    fn command(invocation: &Invocation<'_>) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .env_clear()
            .envs(&invocation.environment.vars)
            .kill_on_drop(true);
        if let Some(dir) = &invocation.environment.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    async fn spawn(&self, cmd: &mut Command, program: &str) -> RunnerResult<Child> {
        let mut attempt = 0;
        loop {
            match cmd.spawn() {
                Ok(child) => return Ok(child),
                // The binary may still be open for writing by a build step
                Err(err) if err.raw_os_error() == Some(Errno::ETXTBSY as i32) && attempt < self.spawn_retries => {
                    attempt += 1;
                    process_debug!(ProcessId::current(), "{} busy, retrying spawn ({})", program, attempt);
                    sleep(SPAWN_RETRY_DELAY).await;
                }
                Err(source) => {
                    return Err(RunnerError::SpawnFailed {
                        program: program.to_string(),
                        source,
                    });
                }
            }
        }
    }

    /// Wait for the child, treating "no status available" as neutral
    async fn reap(child: &mut Child, pid: u32) -> ExitDisposition {
        match child.wait().await {
            Ok(status) => ExitDisposition::from(status),
            Err(err) if err.raw_os_error() == Some(Errno::ECHILD as i32) => {
                process_debug!(ProcessId::Child(pid), "No exit status available (ECHILD)");
                ExitDisposition::Unavailable
            }
            Err(err) => {
                process_warn!(ProcessId::Child(pid), "Failed to reap child: {}", err);
                ExitDisposition::Unavailable
            }
        }
    }
}

impl Default for PtySupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessSupervisor for PtySupervisor {
    async fn supervise(
        &self,
        invocation: &Invocation<'_>,
        observer: &mut dyn OutputObserver,
    ) -> RunnerResult<ExitDisposition> {
        let program = invocation.program_name();
        let pty = Pty::open()?;

        let mut cmd = Self::command(invocation);
        cmd.stdin(Stdio::from(pty.slave.try_clone()?))
            .stdout(Stdio::from(pty.slave.try_clone()?))
            .stderr(Stdio::from(pty.slave));
        // Own process group, so a forced kill also takes down anything it forked
        unsafe {
            cmd.pre_exec(|| {
                setsid().map_err(io::Error::from)?;
                // Output still streams without a controlling terminal
                let _ = acquire_controlling_terminal(0);
                Ok(())
            });
        }

        let mut child = self.spawn(&mut cmd, &program).await?;
        // The parent must not hold a slave descriptor or the stream never ends
        drop(cmd);

        let pid = child.id().unwrap_or(0);
        process_debug!(ProcessId::Child(pid), "Spawned {} {:?}", program, invocation.args);

        let mut reader = BufReader::new(PtyReader::new(pty.master)?);
        let mut watchdog = Watchdog::new(invocation.timeout);
        watchdog.arm();

        let mut buf = Vec::new();
        loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => {
                    match read {
                        Ok(0) => break,
                        Ok(_) => {
                            let line = decode_line(&buf);
                            buf.clear();
                            if observer.on_line(&line) == LineControl::CaseFinished {
                                watchdog.arm();
                            }
                        }
                        Err(err) => {
                            process_warn!(ProcessId::Child(pid), "Output stream error: {}", err);
                            break;
                        }
                    }
                }
                _ = watchdog.expired() => {
                    match observer.on_timeout() {
                        TimeoutAction::Abandon => {
                            process_warn!(
                                ProcessId::Child(pid),
                                "⏰ {} timed out after {:?}, killing",
                                program,
                                invocation.timeout
                            );
                            kill_group(pid);
                            Self::reap(&mut child, pid).await;
                            return Ok(ExitDisposition::TimedOut);
                        }
                        TimeoutAction::KillAndContinue { pid: Some(target) } => {
                            process_warn!(
                                ProcessId::Child(pid),
                                "⏰ Timed out after {:?}, killing {}",
                                invocation.timeout,
                                target
                            );
                            kill_process(target);
                            watchdog.arm();
                        }
                        TimeoutAction::KillAndContinue { pid: None } => {
                            // Anything it forked may still hold the terminal open
                            process_warn!(
                                ProcessId::Child(pid),
                                "⏰ Timed out after {:?}, killing {}",
                                invocation.timeout,
                                program
                            );
                            kill_group(pid);
                            watchdog.arm();
                        }
                    }
                }
            }
        }

        // Stream closed; the child may still be tearing down
        let disposition = tokio::select! {
            disposition = Self::reap(&mut child, pid) => disposition,
            _ = watchdog.expired() => {
                let _ = observer.on_timeout();
                process_warn!(ProcessId::Child(pid), "⏰ {} did not exit after closing its output", program);
                kill_group(pid);
                Self::reap(&mut child, pid).await;
                ExitDisposition::TimedOut
            }
        };

        process_debug!(ProcessId::Child(pid), "{} finished: {:?}", program, disposition);
        Ok(disposition)
    }

    async fn capture(&self, invocation: &Invocation<'_>) -> RunnerResult<CapturedOutput> {
        let program = invocation.program_name();
        let mut cmd = Self::command(invocation);
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::inherit());

        let child = self.spawn(&mut cmd, &program).await?;
        let output = child.wait_with_output().await?;

        Ok(CapturedOutput {
            disposition: ExitDisposition::from(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// Strip the line terminator; the terminal driver turns `\n` into `\r\n`
fn decode_line(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).trim_end_matches(['\n', '\r']).to_string()
}

/// SIGKILL a single process, ignoring ones that already died
pub fn kill_process(pid: i32) {
    if pid <= 0 {
        return;
    }
    match kill(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => {
            process_warn!(ProcessId::current(), "Failed to kill {}: {}", pid, err);
        }
    }
}

/// SIGKILL a whole process group led by `pgid`
fn kill_group(pgid: u32) {
    let Ok(pgid) = i32::try_from(pgid) else {
        return;
    };
    if pgid <= 0 {
        return;
    }
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => {
            process_warn!(ProcessId::current(), "Failed to kill group {}: {}", pgid, err);
            kill_process(pgid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line_strips_terminal_endings() {
        assert_eq!(decode_line(b"/a/one: OK\r\n"), "/a/one: OK");
        assert_eq!(decode_line(b"partial"), "partial");
        assert_eq!(decode_line(b"\r\n"), "");
    }

    #[test]
    fn test_decode_line_is_lossy() {
        assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{fffd} byte");
    }

    #[test]
    fn test_kill_ignores_non_positive_pids() {
        // Must never turn into kill(0) / kill(-1)
        kill_process(0);
        kill_process(-1);
        kill_group(0);
    }

    #[test]
    fn test_supervisor_configuration() {
        let supervisor = PtySupervisor::new().with_spawn_retries(0);
        assert_eq!(supervisor.spawn_retries, 0);
        assert_eq!(PtySupervisor::default().spawn_retries, DEFAULT_SPAWN_RETRIES);
    }
}
