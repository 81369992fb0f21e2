//! List-then-filter protocol (Google Test)
//!
//! The binary is asked for its cases once, then spawned again per case with
//! a filter selecting exactly that case. The exit status of each run is the
//! case outcome.

use std::time::Duration;

use nix::sys::signal::Signal;

use crate::config::RunnerConfig;
use crate::core::skip::SkipRegistry;
use crate::error::{RunnerError, RunnerResult};
use crate::services::supervisor::LineEcho;
use crate::traits::{ExitDisposition, Invocation, LineControl, OutputObserver, ProcessSupervisor, TestEnvironment};
use shared::{CaseId, CaseResult, Outcome, ProcessId, TestBinary, process_debug, process_error};

/// Parse `--gtest_list_tests` output into fully qualified case names
///
/// ```text
/// WTF_Vector.
///   Basic
///   Iterator  # GetParam() = 4
/// ```
///
/// yields `WTF_Vector.Basic` and `WTF_Vector.Iterator`.
pub fn parse_test_list(listing: &str) -> Vec<String> {
    let mut tests = Vec::new();
    let mut group: Option<String> = None;

    for line in listing.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match line.strip_prefix("  ") {
            Some(member) => {
                let member = strip_comment(member);
                match &group {
                    Some(group) if !member.is_empty() => tests.push(format!("{group}{member}")),
                    _ => {}
                }
            }
            None => group = Some(strip_comment(line).to_string()),
        }
    }
    tests
}

fn strip_comment(text: &str) -> &str {
    text.split_once('#').map_or(text, |(name, _)| name).trim()
}

/// Map how a single-case process ended to the case outcome
pub fn outcome_for(disposition: ExitDisposition) -> Outcome {
    match disposition {
        ExitDisposition::TimedOut => Outcome::Timeout,
        ExitDisposition::Signaled(signal) if signal == Signal::SIGSEGV as i32 => Outcome::Crash,
        ExitDisposition::Exited(0) | ExitDisposition::Unavailable => Outcome::Ok,
        ExitDisposition::Exited(_) | ExitDisposition::Signaled(_) => Outcome::Fail,
    }
}

/// Echoes a single-case run; a timeout abandons the process
struct CaseEcho {
    echo: LineEcho,
}

impl OutputObserver for CaseEcho {
    fn on_line(&mut self, line: &str) -> LineControl {
        self.echo.forward(line);
        LineControl::Continue
    }
}

/// Drives one Google Test binary, one process per case
pub struct GTestRunner<'a> {
    config: &'a RunnerConfig,
    skips: &'a SkipRegistry,
    supervisor: &'a dyn ProcessSupervisor,
    echo: LineEcho,
}

impl<'a> GTestRunner<'a> {
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

    /// Cases the binary reports, minus the ones registered as skipped
    pub async fn enumerate(&self, binary: &TestBinary, environment: &TestEnvironment) -> RunnerResult<Vec<String>> {
        let invocation = Invocation::new(&binary.path, environment).with_args([self.config.gtest_list_flag.clone()]);
        let output = self.supervisor.capture(&invocation).await?;

        if !output.disposition.is_success() {
            return Err(RunnerError::EnumerationFailed {
                binary: binary.to_string(),
                status: Some(output.disposition.code()),
            });
        }

        Ok(parse_test_list(&output.stdout)
            .into_iter()
            .filter(|case| !self.skips.is_case_skipped(binary, case))
            .collect())
    }

    pub fn timeout_for(&self, case: &str) -> Duration {
        if self.skips.is_slow_case(case) {
            self.config.slow_timeout()
        } else {
            self.config.timeout
        }
    }

    pub async fn run_case(
        &self,
        binary: &TestBinary,
        environment: &TestEnvironment,
        case: &str,
    ) -> RunnerResult<Outcome> {
        let invocation = Invocation::new(&binary.path, environment)
            .with_args([format!("{}={case}", self.config.gtest_filter_flag)])
            .with_timeout(self.timeout_for(case));

        let mut observer = CaseEcho {
            echo: self.echo.clone(),
        };
        let disposition = self.supervisor.supervise(&invocation, &mut observer).await?;
        let outcome = outcome_for(disposition);
        if outcome == Outcome::Crash {
            self.echo.forward(&format!("**CRASH** {case}"));
        }
        process_debug!(ProcessId::current(), "{} [{}]: {:?} -> {}", binary, case, disposition, outcome);
        Ok(outcome)
    }

    /// Run every enumerated case in listing order
    ///
    /// A case whose process cannot be started counts as failed; the
    /// remaining cases still run.
    pub async fn run(&self, binary: &TestBinary, environment: &TestEnvironment) -> RunnerResult<Vec<CaseResult>> {
        let cases = self.enumerate(binary, environment).await?;

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let outcome = match self.run_case(binary, environment, &case).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    process_error!(ProcessId::current(), "{} [{}]: {}", binary, case, err);
                    Outcome::Fail
                }
            };
            results.push(CaseResult::new(CaseId::Named(case), outcome));
        }
        Ok(results)
    }
}
