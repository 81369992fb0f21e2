//! Test execution engine for WebKit API test programs
//!
//! Runs test binaries speaking one of two protocols under a pseudo-terminal
//! with a per-case watchdog, classifies every case as OK, FAIL, CRASH or
//! TIMEOUT and aggregates the non-OK ones into a grouped report.

pub mod config;
pub mod core;
pub mod error;
pub mod runner;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::RunnerConfig;
pub use core::{Expectations, ResultAggregator, SkipEntry, SkipRegistry, SkippedAction};
pub use error::{RunnerError, RunnerResult};
pub use runner::{RunSummary, TestRunner};
pub use traits::{BinaryClassifier, BinaryDiscovery, EnvironmentProvider, ProcessSupervisor};
