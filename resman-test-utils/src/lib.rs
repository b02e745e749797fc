//! Test utilities for the resman mutation engine
//!
//! This crate provides a scripted remote, a recording notification sink and
//! builders for seeded cache stores.

pub mod builders;
pub mod mocks;

// Re-export commonly used types
pub use builders::{StoreBuilder, limit, task};
pub use mocks::{MockRemote, MockResponse, RecordingNotifier};
