//! Deployed resource kinds and teardown ordering
//!
//! Resources reference each other, so they are removed in dependency order:
//! the schedule (and its targets) before the function it invokes, the
//! invocation permission before its function, and the role last.

use std::fmt;

/// Kinds of AWS resources managed by parking-deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// EventBridge rule together with its targets
    ScheduleRule,
    /// Resource policy statement on the function
    InvocationPermission,
    /// Lambda function
    Function,
    /// IAM role assumed by the function
    ExecutionRole,
}

/// Top-level resources visited by deprovisioning, in teardown order.
///
/// The invocation permission is removed as part of the function teardown.
pub const TEARDOWN_ORDER: [ResourceKind; 3] = [
    ResourceKind::ScheduleRule,
    ResourceKind::Function,
    ResourceKind::ExecutionRole,
];

impl ResourceKind {
    /// Get cleanup priority (lower number = cleanup first)
    pub fn cleanup_priority(self) -> u8 {
        match self {
            ResourceKind::ScheduleRule => 0,
            ResourceKind::InvocationPermission => 1,
            ResourceKind::Function => 2,
            ResourceKind::ExecutionRole => 3,
        }
    }

    /// Human-readable name used in logs and reports
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::ScheduleRule => "schedule rule",
            ResourceKind::InvocationPermission => "invocation permission",
            ResourceKind::Function => "function",
            ResourceKind::ExecutionRole => "execution role",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed state of a remote resource.
///
/// Nothing is persisted locally; every state is the answer to a live
/// existence query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Absent,
    Present,
}

impl ResourceState {
    pub fn from_exists(exists: bool) -> Self {
        if exists {
            ResourceState::Present
        } else {
            ResourceState::Absent
        }
    }

    pub fn is_present(self) -> bool {
        self == ResourceState::Present
    }
}
