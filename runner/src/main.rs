//! Main entry point for the api-test-runner binary
//!
//! Wires the real service implementations into a [`TestRunner`], prints the
//! report and turns the result into the process exit code.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use runner::{
    RunSummary, RunnerConfig, RunnerResult, SkippedAction, TestRunner,
    runner::FATAL_EXIT_CODE,
    services::{
        DirectoryClassifier, FsDiscovery, LineEcho, ProcessEnvironment, PtySupervisor,
        classifier::{DEFAULT_GLIB_DIRS, DEFAULT_GTEST_DIRS},
        environment::parse_assignment,
    },
};
use shared::{BuildType, ProcessId, logging, process_debug};

/// Runs WebKit API test programs under a pseudo-terminal with a watchdog
#[derive(Parser, Debug)]
#[command(name = "api-test-runner")]
#[command(about = "Runs API test programs and reports unexpected failures, crashes and timeouts")]
pub struct Args {
    /// Test programs or directories to run (default: every test directory under --base-dir)
    pub tests: Vec<PathBuf>,

    /// Directory containing the per-project test directories
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,

    /// Test directory scanned under --base-dir when no tests are given (repeatable)
    #[arg(long = "test-dir")]
    pub test_dirs: Vec<String>,

    /// Seconds before a test is considered hung (0 disables the watchdog)
    #[arg(short, long, default_value = "10")]
    pub timeout: u64,

    /// Timeout multiplier for tests on the slow list
    #[arg(long, default_value = "5")]
    pub slow_multiplier: u32,

    /// Expectations are for a Debug build
    #[arg(short, long, conflicts_with = "release")]
    pub debug: bool,

    /// Expectations are for a Release build (default)
    #[arg(short, long)]
    pub release: bool,

    /// Ask the single-process launcher for verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// What to do with registered skips (skip, ignore, only; only behaves like ignore)
    #[arg(long, default_value = "skip")]
    pub skipped: SkippedAction,

    /// JSON file listing skipped and slow tests
    #[arg(long)]
    pub expectations: Option<PathBuf>,

    /// Directory name holding single-process tests (repeatable)
    #[arg(long = "glib-dir")]
    pub glib_dirs: Vec<String>,

    /// Directory name holding list-then-filter tests (repeatable)
    #[arg(long = "gtest-dir")]
    pub gtest_dirs: Vec<String>,

    /// Launcher for single-process tests
    #[arg(long, default_value = runner::config::DEFAULT_GLIB_LAUNCHER)]
    pub glib_launcher: PathBuf,

    /// Flag asking a list-then-filter binary for its cases
    #[arg(long, default_value = runner::config::DEFAULT_GTEST_LIST_FLAG)]
    pub gtest_list_flag: String,

    /// Flag selecting a single case of a list-then-filter binary
    #[arg(long, default_value = runner::config::DEFAULT_GTEST_FILTER_FLAG)]
    pub gtest_filter_flag: String,

    /// dotenv file layered over the inherited environment
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Extra KEY=VALUE for the test environment (repeatable)
    #[arg(long = "env", value_parser = parse_assignment)]
    pub env: Vec<(String, String)>,

    /// Directory the tests start in
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Binary path suffix that must not run in this environment (repeatable)
    #[arg(long = "disable")]
    pub disabled: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    fn build_type(&self) -> BuildType {
        if self.debug && !self.release {
            BuildType::Debug
        } else {
            BuildType::Release
        }
    }

    fn config(&self) -> RunnerConfig {
        RunnerConfig {
            timeout: Duration::from_secs(self.timeout),
            slow_multiplier: self.slow_multiplier,
            build_type: self.build_type(),
            verbose: self.verbose,
            skipped_action: self.skipped,
            glib_launcher: self.glib_launcher.clone(),
            gtest_list_flag: self.gtest_list_flag.clone(),
            gtest_filter_flag: self.gtest_filter_flag.clone(),
            base_dir: Some(self.base_dir.clone()),
            expectations: self.expectations.clone(),
        }
    }

    fn classifier(&self) -> DirectoryClassifier {
        let or_defaults = |dirs: &[String], defaults: &[&str]| -> Vec<String> {
            if dirs.is_empty() {
                defaults.iter().map(|dir| dir.to_string()).collect()
            } else {
                dirs.to_vec()
            }
        };
        DirectoryClassifier::new(
            or_defaults(&self.glib_dirs, DEFAULT_GLIB_DIRS),
            or_defaults(&self.gtest_dirs, DEFAULT_GTEST_DIRS),
        )
    }

    fn discovery(&self) -> FsDiscovery {
        let test_dirs = if self.test_dirs.is_empty() {
            DEFAULT_GLIB_DIRS
                .iter()
                .chain(DEFAULT_GTEST_DIRS)
                .map(|dir| dir.to_string())
                .collect()
        } else {
            self.test_dirs.clone()
        };
        FsDiscovery::new(&self.base_dir)
            .with_test_dirs(test_dirs)
            .with_explicit(self.tests.clone())
    }

    fn environment(&self) -> ProcessEnvironment {
        ProcessEnvironment::new()
            .with_env_file(self.env_file.clone())
            .with_overrides(self.env.clone())
            .with_working_dir(self.working_dir.clone())
            .with_disabled(self.disabled.clone())
    }
}

async fn run(args: &Args) -> RunnerResult<RunSummary> {
    let config = args.config();
    config.validate()?;
    let skips = config.load_skip_registry()?;
    process_debug!(ProcessId::current(), "Configuration: {:?}", config);

    let runner = TestRunner::new(
        config,
        skips,
        args.discovery(),
        args.classifier(),
        args.environment(),
        PtySupervisor::new(),
    )
    .with_echo(LineEcho::stdout());

    runner.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    ProcessId::init_harness();
    logging::init_tracing_with_level(Some(&args.log_level));
    logging::log_startup(ProcessId::current(), "api test runner");

    match run(&args).await {
        Ok(summary) => {
            print!("{}", summary.report());
            if summary.exit_status() == 0 {
                logging::log_success(ProcessId::current(), "No unexpected failures");
            }
            ExitCode::from(summary.exit_code())
        }
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runner::EnvironmentProvider;

    #[test]
    fn test_disabled_binaries_reach_environment() {
        let args = Args::try_parse_from([
            "api-test-runner",
            "--disable",
            "WebKitGTK/TestWebExtensions",
            "--disable",
            "WTF/TestWTF",
        ])
        .unwrap();

        let environment = args.environment().setup().unwrap();

        assert_eq!(
            environment.disabled,
            vec!["WebKitGTK/TestWebExtensions".to_string(), "WTF/TestWTF".to_string()]
        );
    }

    #[test]
    fn test_defaults_and_skipped_action() {
        let args = Args::try_parse_from(["api-test-runner", "--skipped", "only", "-t", "0"]).unwrap();
        let config = args.config();

        assert_eq!(config.skipped_action, SkippedAction::Only);
        assert_eq!(config.timeout, Duration::ZERO);
        assert_eq!(config.build_type, BuildType::Release);
        assert!(args.disabled.is_empty());
    }
}
