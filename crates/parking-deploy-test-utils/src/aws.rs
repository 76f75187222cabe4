//! AWS test utilities
//!
//! Region detection and unique function names for live AWS tests.

use chrono::Utc;

/// Region used when neither AWS_REGION nor AWS_DEFAULT_REGION is set
pub const FALLBACK_REGION: &str = "eu-west-1";

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to eu-west-1
///
/// # Example
///
/// ```
/// use parking_deploy_test_utils::aws::get_test_region;
///
/// let region = get_test_region();
/// assert!(!region.is_empty());
/// ```
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .ok()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| FALLBACK_REGION.to_string())
}

/// Generate a unique function name for test deployments.
///
/// Format: `parking-test-{timestamp_ms}-{counter}`. Function names are
/// limited to 64 characters, which this stays well under.
///
/// # Example
///
/// ```
/// use parking_deploy_test_utils::aws::test_function_name;
///
/// let name = test_function_name();
/// assert!(name.starts_with("parking-test-"));
/// ```
pub fn test_function_name() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("parking-test-{ts}-{counter}")
}

/// Live tests touch shared account resources (`lambda-role` and the schedule
/// rule), so they also require PARKING_DEPLOY_LIVE_TESTS=1 on top of `--ignored`.
pub fn live_tests_enabled() -> bool {
    std::env::var("PARKING_DEPLOY_LIVE_TESTS").is_ok_and(|v| v == "1")
}
