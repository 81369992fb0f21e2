//! Resolved run configuration
//!
//! Built once at startup and shared read-only by every runner.

use std::path::PathBuf;
use std::time::Duration;

use shared::BuildType;

use crate::core::skip::{Expectations, SkipRegistry, SkippedAction};
use crate::error::{RunnerError, RunnerResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SLOW_MULTIPLIER: u32 = 5;
pub const DEFAULT_GLIB_LAUNCHER: &str = "gtester";
pub const DEFAULT_GTEST_LIST_FLAG: &str = "--gtest_list_tests";
pub const DEFAULT_GTEST_FILTER_FLAG: &str = "--gtest_filter";

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Per-case watchdog; zero disables it
    pub timeout: Duration,
    /// Applied to the timeout of slow binaries and cases
    pub slow_multiplier: u32,
    pub build_type: BuildType,
    /// Ask the single-process launcher for verbose output
    pub verbose: bool,
    pub skipped_action: SkippedAction,
    pub glib_launcher: PathBuf,
    pub gtest_list_flag: String,
    pub gtest_filter_flag: String,
    /// Report paths are shown relative to this
    pub base_dir: Option<PathBuf>,
    /// JSON file with the skip and slow lists
    pub expectations: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            slow_multiplier: DEFAULT_SLOW_MULTIPLIER,
            build_type: BuildType::default(),
            verbose: false,
            skipped_action: SkippedAction::default(),
            glib_launcher: PathBuf::from(DEFAULT_GLIB_LAUNCHER),
            gtest_list_flag: DEFAULT_GTEST_LIST_FLAG.to_string(),
            gtest_filter_flag: DEFAULT_GTEST_FILTER_FLAG.to_string(),
            base_dir: None,
            expectations: None,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> RunnerResult<()> {
        if self.slow_multiplier == 0 {
            return Err(RunnerError::config("slow multiplier must be at least 1"));
        }
        if self.glib_launcher.as_os_str().is_empty() {
            return Err(RunnerError::config("launcher must not be empty"));
        }
        if self.gtest_list_flag.is_empty() || self.gtest_filter_flag.is_empty() {
            return Err(RunnerError::config("list and filter flags must not be empty"));
        }
        Ok(())
    }

    /// Timeout for binaries and cases on the slow list, saturating at `Duration::MAX`
    pub fn slow_timeout(&self) -> Duration {
        self.timeout
            .checked_mul(self.slow_multiplier)
            .unwrap_or(Duration::MAX)
    }

    /// Skip registry for this build type; empty when no expectations file is set
    pub fn load_skip_registry(&self) -> RunnerResult<SkipRegistry> {
        let expectations = match &self.expectations {
            Some(path) => Expectations::load(path).map_err(|e| {
                RunnerError::config(format!("expectations file {}: {e}", path.display()))
            })?,
            None => Expectations::default(),
        };
        Ok(SkipRegistry::new(expectations, self.build_type, self.skipped_action))
    }
}
