//! Shared test utilities for whatif integration tests.
//!
//! - `TestHarness` wires a service and runner over a temp database and asset dir
//! - `RejectingProvider` stands in for a provider that refuses every request

pub mod harness;

pub use harness::{RejectingProvider, TestHarness};
