//! Integration test utilities for the KOOK client
//!
//! An in-memory gateway the tests script frame by frame, a REST transport
//! with canned responses, and builders for service payloads.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
