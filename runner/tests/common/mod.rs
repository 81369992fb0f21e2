//! Common test utilities and infrastructure
//!
//! Fake test programs are shell scripts written into a temporary build
//! tree, so every test drives real processes through a pseudo-terminal.

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
pub use helpers::{CapturedEcho, TestTree};
