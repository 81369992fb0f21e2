//! Run loop
//!
//! Discovers binaries, prepares the environment, classifies and filters the
//! binaries, then drives each one through the runner for its framework and
//! feeds the outcomes to the aggregator. Binaries run one at a time.

use std::path::PathBuf;

use shared::{
    CaseId, CaseResult, Framework, Outcome, ProcessId, TestBinary, logging, process_debug, process_info, process_warn,
};

use crate::{
    config::RunnerConfig,
    core::{GLibRunner, GTestRunner, ResultAggregator, SkipRegistry},
    error::{RunnerError, RunnerResult},
    services::LineEcho,
    traits::{BinaryClassifier, BinaryDiscovery, EnvironmentProvider, ProcessSupervisor, TestEnvironment},
};

/// Highest exit code a run reports; 255 is reserved for fatal errors
pub const MAX_EXIT_CODE: u8 = 254;
pub const FATAL_EXIT_CODE: u8 = 255;

/// Outcome of a completed run
#[derive(Debug)]
pub struct RunSummary {
    aggregator: ResultAggregator,
    report: String,
    binaries_run: usize,
}

impl RunSummary {
    pub fn report(&self) -> &str {
        &self.report
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    pub fn binaries_run(&self) -> usize {
        self.binaries_run
    }

    /// Failures plus timeouts, exact
    pub fn exit_status(&self) -> usize {
        self.aggregator.exit_status()
    }

    /// [`Self::exit_status`] clamped into a process exit code
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.exit_status())
            .unwrap_or(MAX_EXIT_CODE)
            .min(MAX_EXIT_CODE)
    }
}

/// Test run driver with injected services
pub struct TestRunner<D, C, E, S>
where
    D: BinaryDiscovery,
    C: BinaryClassifier,
    E: EnvironmentProvider,
    S: ProcessSupervisor,
{
    config: RunnerConfig,
    skips: SkipRegistry,

    /// Injected services
    discovery: D,
    classifier: C,
    environment: E,
    supervisor: S,

    echo: LineEcho,
}

impl<D, C, E, S> TestRunner<D, C, E, S>
where
    D: BinaryDiscovery,
    C: BinaryClassifier,
    E: EnvironmentProvider,
    S: ProcessSupervisor,
{
    pub fn new(
        config: RunnerConfig,
        skips: SkipRegistry,
        discovery: D,
        classifier: C,
        environment: E,
        supervisor: S,
    ) -> Self {
        Self {
            config,
            skips,
            discovery,
            classifier,
            environment,
            supervisor,
            echo: LineEcho::stdout(),
        }
    }

    /// Configure where child output is echoed (fluent API)
    pub fn with_echo(mut self, echo: LineEcho) -> Self {
        self.echo = echo;
        self
    }

    /// Run every binary and aggregate the results
    ///
    /// Only whole-run configuration errors are returned; anything that goes
    /// wrong with a single binary is logged and the run continues.
    pub async fn run(&self) -> RunnerResult<RunSummary> {
        let paths = self.discovery.discover().await?;
        if paths.is_empty() {
            return Err(RunnerError::NoTestsFound {
                location: self.discovery.location(),
            });
        }

        let environment = self.environment.setup()?;
        for entry in self.skips.entries() {
            process_debug!(ProcessId::current(), "Expected to skip {}", entry);
        }

        let binaries = self.resolve(paths, &environment);
        process_info!(ProcessId::current(), "Running {} test programs", binaries.len());

        let mut aggregator = ResultAggregator::new();
        for binary in &binaries {
            logging::log_progress(ProcessId::current(), "Running", &binary.to_string());
            match self.run_binary(binary, &environment).await {
                Ok(results) => aggregator.record_all(binary, results),
                Err(err @ RunnerError::EnumerationFailed { .. }) => {
                    // Contributes no outcomes, but the operator has to know
                    logging::log_error(ProcessId::current(), &binary.to_string(), &err);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    logging::log_error(ProcessId::current(), &binary.to_string(), &err);
                    aggregator.record(binary, CaseResult::new(CaseId::WholeBinary, Outcome::Fail));
                }
            }
        }

        let report = aggregator.render(self.config.base_dir.as_deref());
        Ok(RunSummary {
            aggregator,
            report,
            binaries_run: binaries.len(),
        })
    }

    /// Classify and filter discovered paths, keeping discovery order
    fn resolve(&self, paths: Vec<PathBuf>, environment: &TestEnvironment) -> Vec<TestBinary> {
        paths
            .into_iter()
            .filter_map(|path| {
                let Some(framework) = self.classifier.classify(&path) else {
                    process_warn!(
                        ProcessId::current(),
                        "Unknown test framework for {}, not running it",
                        path.display()
                    );
                    return None;
                };
                let binary = TestBinary::new(path, framework);

                if environment.disabled.iter().any(|suffix| binary.matches_suffix(suffix)) {
                    process_info!(ProcessId::current(), "{} is disabled in this environment", binary);
                    return None;
                }
                if !self.skips.should_run(&binary) {
                    process_debug!(ProcessId::current(), "Skipping {}", binary);
                    return None;
                }
                Some(binary)
            })
            .collect()
    }

    async fn run_binary(&self, binary: &TestBinary, environment: &TestEnvironment) -> RunnerResult<Vec<CaseResult>> {
        match binary.framework {
            Framework::GLib => {
                GLibRunner::new(&self.config, &self.skips, &self.supervisor, self.echo.clone())
                    .run(binary, environment)
                    .await
            }
            Framework::GTest => {
                GTestRunner::new(&self.config, &self.skips, &self.supervisor, self.echo.clone())
                    .run(binary, environment)
                    .await
            }
        }
    }
}
