//! Test helpers and builder patterns for runner tests

use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use runner::services::{DirectoryClassifier, FsDiscovery, LineEcho, ProcessEnvironment, PtySupervisor};
use runner::{Expectations, RunnerConfig, SkipRegistry, SkippedAction, TestRunner};
use shared::BuildType;
use tempfile::TempDir;

use super::fixtures::TestFixtures;

pub type RealRunner = TestRunner<FsDiscovery, DirectoryClassifier, ProcessEnvironment, PtySupervisor>;

/// Temporary build tree holding fake test programs
pub struct TestTree {
    dir: TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp build tree"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an executable script at `relative`, creating parent dirs
    pub fn add_program(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create program dir");
        }
        fs::write(&path, body).expect("write program");
        fs::set_permissions(&path, Permissions::from_mode(0o755)).expect("make program executable");
        path
    }

    /// Config rooted at this tree with a short watchdog and the fake launcher
    pub fn config(&self) -> RunnerConfig {
        let launcher = self.add_program("bin/gtester", TestFixtures::LAUNCHER);
        RunnerConfig {
            timeout: Duration::from_millis(TestFixtures::SHORT_TIMEOUT_MS),
            glib_launcher: launcher,
            base_dir: Some(self.path().to_path_buf()),
            ..RunnerConfig::default()
        }
    }

    /// Runner over the default test directories of this tree
    pub fn runner(&self, config: RunnerConfig, skips: SkipRegistry, echo: LineEcho) -> RealRunner {
        let discovery = FsDiscovery::new(self.path()).with_test_dirs(vec!["WTF".into(), "WebKitGTK".into()]);
        TestRunner::new(
            config,
            skips,
            discovery,
            DirectoryClassifier::default(),
            ProcessEnvironment::new(),
            PtySupervisor::new(),
        )
        .with_echo(echo)
    }
}

/// Skip registry parsed from an expectations JSON document
pub fn registry(json: &str) -> SkipRegistry {
    let expectations = Expectations::from_json(json).expect("valid expectations");
    SkipRegistry::new(expectations, BuildType::Release, SkippedAction::Skip)
}

/// Echo sink that can be inspected after the run
#[derive(Clone, Default)]
pub struct CapturedEcho(Arc<Mutex<Vec<u8>>>);

impl CapturedEcho {
    pub fn echo() -> (LineEcho, CapturedEcho) {
        let captured = CapturedEcho::default();
        (LineEcho::new(Box::new(captured.clone())), captured)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedEcho {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
