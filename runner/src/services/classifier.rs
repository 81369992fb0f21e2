//! Framework classification by containing directory
//!
//! Test programs are grouped on disk by the project they test, and each
//! project uses one framework. The directory name decides.

use std::path::Path;

use shared::Framework;

use crate::traits::BinaryClassifier;

/// Directory names holding programs that run many cases per process
pub const DEFAULT_GLIB_DIRS: &[&str] = &["WebKitGTK", "WebKit2Gtk", "JavaScriptCoreGLib"];

/// Directory names holding programs that list and filter their cases
pub const DEFAULT_GTEST_DIRS: &[&str] = &["WebKit", "JavaScriptCore", "WTF", "WebCore"];

/// Real classifier implementation
#[derive(Debug, Clone)]
pub struct DirectoryClassifier {
    glib_dirs: Vec<String>,
    gtest_dirs: Vec<String>,
}

impl DirectoryClassifier {
    pub fn new(glib_dirs: Vec<String>, gtest_dirs: Vec<String>) -> Self {
        Self { glib_dirs, gtest_dirs }
    }
}

impl Default for DirectoryClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_GLIB_DIRS.iter().map(|dir| dir.to_string()).collect(),
            DEFAULT_GTEST_DIRS.iter().map(|dir| dir.to_string()).collect(),
        )
    }
}

impl BinaryClassifier for DirectoryClassifier {
    fn classify(&self, path: &Path) -> Option<Framework> {
        let dir = path.parent()?.file_name()?.to_str()?;
        if self.glib_dirs.iter().any(|glib| glib == dir) {
            Some(Framework::GLib)
        } else if self.gtest_dirs.iter().any(|gtest| gtest == dir) {
            Some(Framework::GTest)
        } else {
            None
        }
    }
}
