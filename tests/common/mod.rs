//! Shared test utilities for loglens integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Helpers that drive timers are deterministic under
//! `tokio::time::pause()`; the fake backend needs real time.

#![allow(dead_code, unused_imports)]

pub mod assertions;
pub mod builders;
pub mod fake_backend;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
