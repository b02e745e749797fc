//! Resman command line library
//!
//! Configuration, scenario replay and report rendering used by the `resman`
//! binary, exposed so integration tests can drive them directly.

pub mod config;
pub mod output;
pub mod scenario;
pub mod terminal;
