//! Shared test utilities for parking-deploy
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique resource names for live tests

pub mod aws;

// Re-export commonly used items
pub use aws::{get_test_region, live_tests_enabled, test_function_name};
