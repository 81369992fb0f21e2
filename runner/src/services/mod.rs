//! Service implementations
//!
//! Real implementations of the traits in [`crate::traits`]; these are the
//! only modules that touch processes, terminals and the file system.

pub mod classifier;
pub mod discovery;
pub mod environment;
pub mod pty;
pub mod supervisor;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod tests;

// Re-export all service implementations
pub use classifier::DirectoryClassifier;
pub use discovery::FsDiscovery;
pub use environment::ProcessEnvironment;
pub use supervisor::{LineEcho, PtySupervisor};
pub use watchdog::Watchdog;
