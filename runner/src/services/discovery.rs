//! Test binary discovery on the file system

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::RunnerResult;
use crate::traits::BinaryDiscovery;
use shared::{ProcessId, process_debug};

/// Real discovery implementation
///
/// Explicit paths win: files are taken as given, directories are scanned.
/// Without explicit paths, each configured test directory under the base
/// directory is scanned.
#[derive(Debug, Clone)]
pub struct FsDiscovery {
    base_dir: PathBuf,
    test_dirs: Vec<String>,
    explicit: Vec<PathBuf>,
}

impl FsDiscovery {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            test_dirs: Vec::new(),
            explicit: Vec::new(),
        }
    }

    /// Configure directories scanned under the base directory (fluent API)
    pub fn with_test_dirs(mut self, test_dirs: Vec<String>) -> Self {
        self.test_dirs = test_dirs;
        self
    }

    /// Configure explicit test paths (fluent API)
    pub fn with_explicit(mut self, explicit: Vec<PathBuf>) -> Self {
        self.explicit = explicit;
        self
    }

    /// Executable files named `test*` directly inside `dir`, sorted
    async fn tests_in_dir(dir: &Path) -> RunnerResult<Vec<PathBuf>> {
        if !fs::metadata(dir).await.map(|meta| meta.is_dir()).unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut tests = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_string_lossy().to_lowercase().starts_with("test") {
                continue;
            }
            let path = entry.path();
            // Follow symlinks, like a shell would when executing it
            let Ok(meta) = fs::metadata(&path).await else {
                continue;
            };
            if meta.is_file() && meta.permissions().mode() & 0o111 != 0 {
                tests.push(path);
            }
        }
        tests.sort();
        Ok(tests)
    }
}

#[async_trait]
impl BinaryDiscovery for FsDiscovery {
    async fn discover(&self) -> RunnerResult<Vec<PathBuf>> {
        let mut tests = Vec::new();
        for path in &self.explicit {
            if fs::metadata(path).await.map(|meta| meta.is_dir()).unwrap_or(false) {
                tests.extend(Self::tests_in_dir(path).await?);
            } else {
                tests.push(path.clone());
            }
        }
        if !tests.is_empty() {
            return Ok(tests);
        }

        for test_dir in &self.test_dirs {
            let dir = self.base_dir.join(test_dir);
            let found = Self::tests_in_dir(&dir).await?;
            process_debug!(ProcessId::current(), "Found {} test programs in {}", found.len(), dir.display());
            tests.extend(found);
        }
        Ok(tests)
    }

    fn location(&self) -> String {
        self.base_dir.display().to_string()
    }
}
