//! Trait definitions with mockall annotations for testing
//!
//! These are the seams between the run loop and everything that touches the
//! operating system: spawning processes, classifying binaries, discovering
//! them on disk and preparing the environment they run in.

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use shared::Framework;

use crate::error::RunnerResult;

/// Environment every spawned test process runs in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestEnvironment {
    /// Complete variable set handed to children (not merged with ours)
    pub vars: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    /// Binary suffixes the setup step decided must not run
    pub disabled: Vec<String>,
}

/// One process launch
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub environment: &'a TestEnvironment,
    /// Zero disables the watchdog
    pub timeout: Duration,
}

impl<'a> Invocation<'a> {
    pub fn new(program: impl Into<PathBuf>, environment: &'a TestEnvironment) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            environment,
            timeout: Duration::ZERO,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// How a supervised process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDisposition {
    Exited(i32),
    /// Terminated by the given signal number
    Signaled(i32),
    /// Killed by the supervisor after the watchdog fired
    TimedOut,
    /// The OS had no status to give (e.g. SIGCHLD ignored)
    Unavailable,
}

impl ExitDisposition {
    /// Normalized status: exit code, or the negated signal number
    pub fn code(&self) -> i32 {
        match self {
            ExitDisposition::Exited(code) => *code,
            ExitDisposition::Signaled(signal) => -signal,
            ExitDisposition::TimedOut => -(nix::sys::signal::Signal::SIGKILL as i32),
            ExitDisposition::Unavailable => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code() == 0 && !matches!(self, ExitDisposition::TimedOut)
    }
}

impl From<ExitStatus> for ExitDisposition {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitDisposition::Exited(code),
            (None, Some(signal)) => ExitDisposition::Signaled(signal),
            (None, None) => ExitDisposition::Unavailable,
        }
    }
}

/// Result of running a process to completion with stdout captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub disposition: ExitDisposition,
    pub stdout: String,
}

/// What the supervisor should do after a line was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineControl {
    Continue,
    /// A case reached its terminal state; restart the watchdog
    CaseFinished,
}

/// What the supervisor should do when the watchdog fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Kill the supervised process group and stop reading
    Abandon,
    /// Kill `pid` (the supervised process group when `None`) and keep
    /// reading whatever is still buffered
    KillAndContinue { pid: Option<i32> },
}

/// Receives the child's output, line by line, in emission order
pub trait OutputObserver: Send {
    fn on_line(&mut self, line: &str) -> LineControl;

    fn on_timeout(&mut self) -> TimeoutAction {
        TimeoutAction::Abandon
    }
}

/// Process supervision abstraction
///
/// One implementation drives exactly one foreground child at a time.
#[async_trait::async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Run attached to a pseudo-terminal with the watchdog armed, streaming
    /// output to `observer` until the child is reaped or abandoned
    async fn supervise(
        &self,
        invocation: &Invocation<'_>,
        observer: &mut dyn OutputObserver,
    ) -> RunnerResult<ExitDisposition>;

    /// Run to completion without a terminal or watchdog, capturing stdout
    async fn capture(&self, invocation: &Invocation<'_>) -> RunnerResult<CapturedOutput>;
}

/// Decides which protocol a test binary speaks
#[mockall::automock]
pub trait BinaryClassifier: Send + Sync {
    /// `None` for binaries this runner does not know how to drive
    fn classify(&self, path: &Path) -> Option<Framework>;
}

/// Resolves the list of test binaries for a run
#[mockall::automock]
#[async_trait::async_trait]
pub trait BinaryDiscovery: Send + Sync {
    async fn discover(&self) -> RunnerResult<Vec<PathBuf>>;

    /// Human-readable description of where binaries were looked for
    fn location(&self) -> String;
}

/// Prepares the environment test binaries run in
#[mockall::automock]
pub trait EnvironmentProvider: Send + Sync {
    fn setup(&self) -> RunnerResult<TestEnvironment>;
}
