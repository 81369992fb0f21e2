//! Single-process line protocol (GLib test harness)
//!
//! The launcher runs every case of a binary in one process and reports on a
//! single stream:
//!
//! ```text
//! TEST: /build/WebKitGTK/TestLoaderClient... (pid=4242)
//! /webkit/WebKitWebView/loading: OK
//! /webkit/WebKitWebView/title:
//! FAIL
//! ```
//!
//! `(pid=N)` names the process actually running cases; that one is killed
//! when the watchdog fires. A case that fails right after a kill is reported
//! as a timeout.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::RunnerConfig;
use crate::core::skip::SkipRegistry;
use crate::error::RunnerResult;
use crate::services::supervisor::LineEcho;
use crate::traits::{
    ExitDisposition, Invocation, LineControl, OutputObserver, ProcessSupervisor, TestEnvironment, TimeoutAction,
};
use shared::{CaseId, CaseResult, Outcome, ProcessId, TestBinary, process_debug, process_warn};

static CHILD_PID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(pid=(?P<child_pid>[0-9]+)\)").expect("child pid pattern is valid"));

/// Incremental parser state for one launcher invocation
pub struct GLibParser {
    child_pid: Option<i32>,
    did_timeout: bool,
    /// Set by every watchdog firing until a case absorbs it
    unabsorbed_timeout: bool,
    current_case: Option<String>,
    results: Vec<CaseResult>,
    echo: LineEcho,
}

impl GLibParser {
    pub fn new(echo: LineEcho) -> Self {
        Self {
            child_pid: None,
            did_timeout: false,
            unabsorbed_timeout: false,
            current_case: None,
            results: Vec::new(),
            echo,
        }
    }

    pub fn child_pid(&self) -> Option<i32> {
        self.child_pid
    }

    pub fn current_case(&self) -> Option<&str> {
        self.current_case.as_deref()
    }

    pub fn did_timeout(&self) -> bool {
        self.did_timeout
    }

    pub fn results(&self) -> &[CaseResult] {
        &self.results
    }

    pub fn parse_line(&mut self, line: &str) -> LineControl {
        let control = self.inspect(line);
        self.echo.forward(line);
        control
    }

    fn inspect(&mut self, line: &str) -> LineControl {
        if let Some(captures) = CHILD_PID.captures(line) {
            self.child_pid = captures["child_pid"].parse().ok();
            return LineControl::Continue;
        }

        let normalized: String = line.trim().chars().filter(|c| *c != ' ').collect();
        if normalized.is_empty() {
            return LineControl::Continue;
        }

        if normalized.starts_with('/') {
            let (case, token) = normalized.split_once(':').unwrap_or((normalized.as_str(), ""));
            match terminal_token(token) {
                Some(outcome) => self.finalize(Some(case.to_string()), outcome),
                None => {
                    self.current_case = Some(case.to_string());
                    LineControl::Continue
                }
            }
        } else if let Some(outcome) = terminal_token(&normalized) {
            let case = self.current_case.take();
            self.finalize(case, outcome)
        } else {
            LineControl::Continue
        }
    }

    fn finalize(&mut self, case: Option<String>, outcome: Outcome) -> LineControl {
        let outcome = match outcome {
            Outcome::Fail if self.did_timeout => Outcome::Timeout,
            other => other,
        };
        match case {
            Some(case) => {
                self.results.push(CaseResult::new(CaseId::Named(case), outcome));
                self.unabsorbed_timeout = false;
            }
            None => {
                process_warn!(ProcessId::current(), "{} result with no case in progress", outcome);
            }
        }
        self.did_timeout = false;
        self.current_case = None;
        LineControl::CaseFinished
    }

    /// Kill the process running cases and keep reading
    pub fn handle_timeout(&mut self) -> TimeoutAction {
        let pid = self.child_pid.take();
        self.did_timeout = true;
        self.unabsorbed_timeout = true;
        TimeoutAction::KillAndContinue { pid }
    }

    /// Close out the stream once the launcher has been reaped
    ///
    /// A case that started but never reported is a timeout if the watchdog
    /// fired, a crash otherwise. A watchdog kill no case absorbed becomes a
    /// whole-binary timeout, even when an earlier kill was attributed, and a launcher killed by a signal we did not
    /// send with nothing else wrong becomes a whole-binary crash.
    pub fn finish(mut self, disposition: ExitDisposition) -> Vec<CaseResult> {
        if let Some(case) = self.current_case.take() {
            let outcome = if self.did_timeout { Outcome::Timeout } else { Outcome::Crash };
            self.results.push(CaseResult::new(CaseId::Named(case), outcome));
            self.did_timeout = false;
            self.unabsorbed_timeout = false;
        }

        let timed_out = self.unabsorbed_timeout
            || (disposition == ExitDisposition::TimedOut
                && !self.results.iter().any(|result| result.outcome == Outcome::Timeout));
        if timed_out {
            self.results.push(CaseResult::new(CaseId::WholeBinary, Outcome::Timeout));
        } else if matches!(disposition, ExitDisposition::Signaled(_))
            && self.results.iter().all(|result| result.outcome.is_ok())
        {
            self.results.push(CaseResult::new(CaseId::WholeBinary, Outcome::Crash));
        }

        self.results
    }
}

impl OutputObserver for GLibParser {
    fn on_line(&mut self, line: &str) -> LineControl {
        self.parse_line(line)
    }

    fn on_timeout(&mut self) -> TimeoutAction {
        self.handle_timeout()
    }
}

/// Only OK and FAIL ever end a case in this protocol
fn terminal_token(token: &str) -> Option<Outcome> {
    token
        .parse::<Outcome>()
        .ok()
        .filter(|outcome| matches!(outcome, Outcome::Ok | Outcome::Fail))
}

/// Drives one GLib test binary through its launcher
pub struct GLibRunner<'a> {
    config: &'a RunnerConfig,
    skips: &'a SkipRegistry,
    supervisor: &'a dyn ProcessSupervisor,
    echo: LineEcho,
}

impl<'a> GLibRunner<'a> {
    pub fn new(
        config: &'a RunnerConfig,
        skips: &'a SkipRegistry,
        supervisor: &'a dyn ProcessSupervisor,
        echo: LineEcho,
    ) -> Self {
        Self {
            config,
            skips,
            supervisor,
            echo,
        }
    }

    /// `<launcher> -k [--verbose] (-s <case>)* <binary>`
    pub fn command_args(&self, binary: &TestBinary) -> Vec<String> {
        let mut args = vec!["-k".to_string()];
        if self.config.verbose {
            args.push("--verbose".to_string());
        }
        for case in self.skips.cases_to_skip(binary) {
            args.push("-s".to_string());
            args.push(case);
        }
        args.push(binary.path.display().to_string());
        args
    }

    pub fn timeout_for(&self, binary: &TestBinary) -> Duration {
        if self.skips.is_slow_binary(binary) {
            self.config.slow_timeout()
        } else {
            self.config.timeout
        }
    }

    pub async fn run(&self, binary: &TestBinary, environment: &TestEnvironment) -> RunnerResult<Vec<CaseResult>> {
        let invocation = Invocation::new(&self.config.glib_launcher, environment)
            .with_args(self.command_args(binary))
            .with_timeout(self.timeout_for(binary));

        let mut parser = GLibParser::new(self.echo.clone());
        let disposition = self.supervisor.supervise(&invocation, &mut parser).await?;
        process_debug!(ProcessId::current(), "{} launcher exited: {:?}", binary, disposition);

        // The launcher was told to skip these; drop anything it reported anyway
        let results = parser
            .finish(disposition)
            .into_iter()
            .filter(|result| match result.case.name() {
                Some(name) => !self.skips.is_case_skipped(binary, name),
                None => true,
            })
            .collect();
        Ok(results)
    }
}
