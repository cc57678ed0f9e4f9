//! Test utilities.
//!
//! This module provides:
//! - Test data factories that build valid fixtures and store them
//! - An in-memory store implementing every repository trait
//! - A payment provider stub and webhook signing helpers
//! - `TestAppStateBuilder` for HTTP route tests

mod app_state_builder;
mod factories;
mod in_memory_store;
mod payment_mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use in_memory_store::*;
pub use payment_mocks::*;
