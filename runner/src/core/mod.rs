//! Protocol and bookkeeping logic
//!
//! Everything here talks to processes only through the traits in
//! [`crate::traits`], so it can be driven by fakes in tests.

pub mod aggregator;
pub mod glib;
pub mod gtest;
pub mod skip;

pub use aggregator::ResultAggregator;
pub use glib::{GLibParser, GLibRunner};
pub use gtest::{GTestRunner, parse_test_list};
pub use skip::{Expectations, SkipEntry, SkipRegistry, SkippedAction};
