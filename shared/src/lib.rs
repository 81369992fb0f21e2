//! Shared types for the API test runner
//!
//! Contains the domain types that flow between discovery, the framework
//! runners and the result aggregator, plus logging setup.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
