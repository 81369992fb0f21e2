//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::errors::SharedError;

/// Global process ID singleton - set once at startup
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Identifies who a log line is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessId {
    /// The harness process itself (singleton)
    Harness,
    /// A supervised child process, by OS pid
    Child(u32),
}

impl ProcessId {
    /// Initialize the global process ID for the harness
    pub fn init_harness() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::Harness)
    }

    /// Get the global process ID, defaulting to the harness
    pub fn current() -> &'static ProcessId {
        Self::init_harness()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Harness => write!(f, "harness"),
            ProcessId::Child(pid) => write!(f, "child_{pid}"),
        }
    }
}

/// Test-framework protocol a binary speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// One process runs many cases and reports them on a single stream
    GLib,
    /// Cases are listed on request and run one per process via a filter
    GTest,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::GLib => write!(f, "glib"),
            Framework::GTest => write!(f, "gtest"),
        }
    }
}

/// An executable test program, classified once at startup
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestBinary {
    pub path: PathBuf,
    pub framework: Framework,
}

impl TestBinary {
    pub fn new(path: impl Into<PathBuf>, framework: Framework) -> Self {
        Self {
            path: path.into(),
            framework,
        }
    }

    /// Whether the binary path ends with `suffix` (string-wise, not per component)
    pub fn matches_suffix(&self, suffix: &str) -> bool {
        self.path.to_string_lossy().ends_with(suffix)
    }

    /// `parent-dir/file-name`, the key used by the slow list
    pub fn short_name(&self) -> String {
        let file = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.path.parent().and_then(Path::file_name) {
            Some(dir) => format!("{}/{}", dir.to_string_lossy(), file),
            None => file,
        }
    }

    /// Path for display, relative to `base` when the binary lives under it
    pub fn display_relative_to(&self, base: Option<&Path>) -> String {
        match base.and_then(|base| self.path.strip_prefix(base).ok()) {
            Some(relative) => format!("/{}", relative.display()),
            None => self.path.display().to_string(),
        }
    }
}

impl fmt::Display for TestBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Terminal classification of one case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Ok,
    Fail,
    Crash,
    Timeout,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ok => write!(f, "OK"),
            Outcome::Fail => write!(f, "FAIL"),
            Outcome::Crash => write!(f, "CRASH"),
            Outcome::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

impl FromStr for Outcome {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(Outcome::Ok),
            "FAIL" => Ok(Outcome::Fail),
            "CRASH" => Ok(Outcome::Crash),
            "TIMEOUT" => Ok(Outcome::Timeout),
            other => Err(SharedError::UnknownOutcome {
                token: other.to_string(),
            }),
        }
    }
}

/// Which case an outcome belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CaseId {
    Named(String),
    /// No per-case breakdown is available
    WholeBinary,
}

impl CaseId {
    pub fn named(name: impl Into<String>) -> Self {
        CaseId::Named(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            CaseId::Named(name) => Some(name),
            CaseId::WholeBinary => None,
        }
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseId::Named(name) => write!(f, "{name}"),
            CaseId::WholeBinary => write!(f, "(entire binary)"),
        }
    }
}

/// One finalized outcome for one case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseResult {
    pub case: CaseId,
    pub outcome: Outcome,
}

impl CaseResult {
    pub fn new(case: CaseId, outcome: Outcome) -> Self {
        Self { case, outcome }
    }
}

/// Build configuration the binaries were produced with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BuildType {
    Debug,
    #[default]
    Release,
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildType::Debug => write!(f, "Debug"),
            BuildType::Release => write!(f, "Release"),
        }
    }
}

impl FromStr for BuildType {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(BuildType::Debug),
            "release" => Ok(BuildType::Release),
            _ => Err(SharedError::InvalidConfig {
                field: "build_type".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_uses_parent_directory() {
        let binary = TestBinary::new("/build/TestWebKitAPI/WebKit2Gtk/TestLoaderClient", Framework::GLib);
        assert_eq!(binary.short_name(), "WebKit2Gtk/TestLoaderClient");
    }

    #[test]
    fn test_suffix_matching_is_string_based() {
        let binary = TestBinary::new("/build/WTF/TestWTF", Framework::GTest);
        assert!(binary.matches_suffix("WTF/TestWTF"));
        assert!(binary.matches_suffix("TestWTF"));
        assert!(!binary.matches_suffix("TestWebCore"));
    }

    #[test]
    fn test_display_relative_to_base() {
        let binary = TestBinary::new("/build/TestWebKitAPI/WTF/TestWTF", Framework::GTest);
        assert_eq!(
            binary.display_relative_to(Some(Path::new("/build/TestWebKitAPI"))),
            "/WTF/TestWTF"
        );
        assert_eq!(
            binary.display_relative_to(Some(Path::new("/elsewhere"))),
            "/build/TestWebKitAPI/WTF/TestWTF"
        );
        assert_eq!(binary.display_relative_to(None), "/build/TestWebKitAPI/WTF/TestWTF");
    }

    #[test]
    fn test_outcome_tokens() {
        assert_eq!("OK".parse::<Outcome>().unwrap(), Outcome::Ok);
        assert_eq!("FAIL".parse::<Outcome>().unwrap(), Outcome::Fail);
        assert!("PASS".parse::<Outcome>().is_err());
        assert_eq!(Outcome::Timeout.to_string(), "TIMEOUT");
    }

    #[test]
    fn test_build_type_parsing() {
        assert_eq!("Debug".parse::<BuildType>().unwrap(), BuildType::Debug);
        assert_eq!("release".parse::<BuildType>().unwrap(), BuildType::Release);
        assert!("profile".parse::<BuildType>().is_err());
    }

    #[test]
    fn test_build_type_deserializes_from_json() {
        let build: BuildType = serde_json::from_str("\"Debug\"").unwrap();
        assert_eq!(build, BuildType::Debug);
    }

    #[test]
    fn test_whole_binary_case_display() {
        assert_eq!(CaseId::WholeBinary.to_string(), "(entire binary)");
        assert_eq!(CaseId::named("/a/one").name(), Some("/a/one"));
        assert_eq!(CaseId::WholeBinary.name(), None);
    }
}
