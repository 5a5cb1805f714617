//! Common test utilities and infrastructure
//!
//! Shared fakes, fixtures and helpers used across the rotator test suites.

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::{FakeFactory, FakeWorker, TestFixtures};
pub use helpers::{RotatorBuilder, TestHelpers};
