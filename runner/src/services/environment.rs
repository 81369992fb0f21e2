//! Environment setup for the binaries under test

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{RunnerError, RunnerResult};
use crate::traits::{EnvironmentProvider, TestEnvironment};
use shared::{ProcessId, process_debug};

/// Real environment provider
///
/// Starts from the harness' own environment, layers an optional dotenv file
/// on top, then explicit `KEY=VALUE` overrides.
#[derive(Debug, Clone, Default)]
pub struct ProcessEnvironment {
    inherit: bool,
    env_file: Option<PathBuf>,
    overrides: Vec<(String, String)>,
    working_dir: Option<PathBuf>,
    disabled: Vec<String>,
}

impl ProcessEnvironment {
    pub fn new() -> Self {
        Self {
            inherit: true,
            ..Self::default()
        }
    }

    /// Start from an empty environment instead of the harness' own (fluent API)
    pub fn without_inherited(mut self) -> Self {
        self.inherit = false;
        self
    }

    /// Configure a dotenv file (fluent API)
    pub fn with_env_file(mut self, env_file: Option<PathBuf>) -> Self {
        self.env_file = env_file;
        self
    }

    /// Configure explicit variable overrides (fluent API)
    pub fn with_overrides(mut self, overrides: Vec<(String, String)>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Configure the working directory children start in (fluent API)
    pub fn with_working_dir(mut self, working_dir: Option<PathBuf>) -> Self {
        self.working_dir = working_dir;
        self
    }

    /// Configure binaries that must not run in this environment (fluent API)
    pub fn with_disabled(mut self, disabled: Vec<String>) -> Self {
        self.disabled = disabled;
        self
    }
}

impl EnvironmentProvider for ProcessEnvironment {
    fn setup(&self) -> RunnerResult<TestEnvironment> {
        let mut vars: HashMap<String, String> = if self.inherit {
            std::env::vars().collect()
        } else {
            HashMap::new()
        };

        if let Some(env_file) = &self.env_file {
            let entries = dotenv::from_path_iter(env_file)
                .map_err(|e| RunnerError::environment(format!("{}: {e}", env_file.display())))?;
            for entry in entries {
                let (key, value) =
                    entry.map_err(|e| RunnerError::environment(format!("{}: {e}", env_file.display())))?;
                vars.insert(key, value);
            }
        }

        for (key, value) in &self.overrides {
            vars.insert(key.clone(), value.clone());
        }

        if let Some(dir) = &self.working_dir {
            if !dir.is_dir() {
                return Err(RunnerError::environment(format!(
                    "working directory {} does not exist",
                    dir.display()
                )));
            }
        }

        process_debug!(ProcessId::current(), "Prepared environment with {} variables", vars.len());
        Ok(TestEnvironment {
            vars,
            working_dir: self.working_dir.clone(),
            disabled: self.disabled.clone(),
        })
    }
}

/// Parse a `KEY=VALUE` assignment
pub fn parse_assignment(assignment: &str) -> RunnerResult<(String, String)> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(RunnerError::config(format!("invalid environment assignment '{assignment}'"))),
    }
}
