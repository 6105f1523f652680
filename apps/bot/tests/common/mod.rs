//! Common test utilities for bot integration tests
//!
//! This module provides shared test infrastructure for integration tests,
//! including the recording transport, fake content sources and a harness.

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
