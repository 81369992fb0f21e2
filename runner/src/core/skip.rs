//! Skip registry and slow list
//!
//! Built once from the expectations file for the current build type and
//! consulted read-only before any process is spawned.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{RunnerError, RunnerResult};
use shared::{BuildType, TestBinary};

/// Where known bug numbers are tracked
pub const BUG_TRACKER_URL: &str = "https://bugs.webkit.org/show_bug.cgi?id=";

/// How entries in the registry are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkippedAction {
    /// Exclude registered binaries and cases
    #[default]
    Skip,
    /// Run everything, as if the registry were empty
    Ignore,
    /// Accepted for compatibility; applied like [`SkippedAction::Ignore`]
    Only,
}

impl SkippedAction {
    fn honours_registry(self) -> bool {
        self == SkippedAction::Skip
    }
}

impl FromStr for SkippedAction {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(SkippedAction::Skip),
            "ignore" => Ok(SkippedAction::Ignore),
            "only" => Ok(SkippedAction::Only),
            other => Err(RunnerError::config(format!("unknown skipped action '{other}'"))),
        }
    }
}

/// One known-bad binary or case
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkipEntry {
    /// Suffix of the binary path, e.g. `WebKitGTK/TestWebExtensions`
    pub test: String,
    /// Case to exclude; absent means the whole binary
    #[serde(default)]
    pub case: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub bug: Option<u32>,
    /// Only applies to this build type when set
    #[serde(default)]
    pub build_type: Option<BuildType>,
}

impl SkipEntry {
    pub fn entire_suite(test: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            case: None,
            reason: reason.into(),
            bug: None,
            build_type: None,
        }
    }

    pub fn case(test: impl Into<String>, case: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            case: Some(case.into()),
            ..Self::entire_suite(test, reason)
        }
    }

    pub fn with_bug(mut self, bug: u32) -> Self {
        self.bug = Some(bug);
        self
    }

    pub fn with_build_type(mut self, build_type: BuildType) -> Self {
        self.build_type = Some(build_type);
        self
    }

    pub fn skips_entire_suite(&self) -> bool {
        self.case.is_none()
    }

    pub fn applies_to_build(&self, build_type: BuildType) -> bool {
        self.build_type.is_none_or(|only| only == build_type)
    }
}

impl fmt::Display for SkipEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.test)?;
        if let Some(case) = &self.case {
            write!(f, " [{case}]")?;
        }
        write!(f, ": {}", self.reason)?;
        if let Some(bug) = self.bug {
            write!(f, " ({BUG_TRACKER_URL}{bug})")?;
        }
        Ok(())
    }
}

/// On-disk expectations file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Expectations {
    #[serde(default)]
    pub skipped: Vec<SkipEntry>,
    /// `dir/Binary` for whole binaries, case names for single cases
    #[serde(default)]
    pub slow: Vec<String>,
}

impl Expectations {
    pub fn from_json(json: &str) -> RunnerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> RunnerResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkipRegistry {
    entries: Vec<SkipEntry>,
    slow: Vec<String>,
    action: SkippedAction,
}

impl SkipRegistry {
    /// Keep only the entries that apply to `build_type`
    pub fn new(expectations: Expectations, build_type: BuildType, action: SkippedAction) -> Self {
        Self {
            entries: expectations
                .skipped
                .into_iter()
                .filter(|entry| entry.applies_to_build(build_type))
                .collect(),
            slow: expectations.slow,
            action,
        }
    }

    pub fn entries(&self) -> &[SkipEntry] {
        &self.entries
    }

    /// Should the binary be spawned at all
    pub fn should_run(&self, binary: &TestBinary) -> bool {
        if !self.action.honours_registry() {
            return true;
        }
        !self
            .entries
            .iter()
            .any(|entry| entry.skips_entire_suite() && binary.matches_suffix(&entry.test))
    }

    /// Case names registered for exclusion inside `binary`
    pub fn cases_to_skip(&self, binary: &TestBinary) -> Vec<String> {
        if !self.action.honours_registry() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|entry| binary.matches_suffix(&entry.test))
            .filter_map(|entry| entry.case.clone())
            .collect()
    }

    pub fn is_case_skipped(&self, binary: &TestBinary, case: &str) -> bool {
        self.action.honours_registry()
            && self
                .entries
                .iter()
                .any(|entry| entry.case.as_deref() == Some(case) && binary.matches_suffix(&entry.test))
    }

    pub fn is_slow_binary(&self, binary: &TestBinary) -> bool {
        let short_name = binary.short_name();
        self.slow.iter().any(|slow| *slow == short_name)
    }

    pub fn is_slow_case(&self, case: &str) -> bool {
        self.slow.iter().any(|slow| slow == case)
    }
}
