//! Workflow outcome reports printed by the CLI

use parking_deploy_common::ResourceKind;
use std::fmt;

/// Whether provisioning created the execution role or found it in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleOutcome {
    Created,
    Reused,
}

/// Result of a successful provisioning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub role: RoleOutcome,
    pub role_arn: String,
    pub function_arn: String,
    pub rule_arn: String,
}

impl fmt::Display for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            RoleOutcome::Created => "created",
            RoleOutcome::Reused => "reused",
        };
        writeln!(f, "Execution role ({role}): {}", self.role_arn)?;
        writeln!(f, "Function:              {}", self.function_arn)?;
        write!(f, "Schedule rule:         {}", self.rule_arn)
    }
}

/// Result of a code and/or configuration update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateReport {
    pub code_updated: bool,
    pub environment_updated: bool,
}

/// Result of cleaning up a single resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupResult {
    /// Resource was successfully deleted
    Deleted,
    /// Resource was already deleted (not found)
    AlreadyDeleted,
    /// Cleanup failed with error
    Failed,
    /// Resource was skipped
    Skipped,
}

impl CleanupResult {
    pub fn as_str(self) -> &'static str {
        match self {
            CleanupResult::Deleted => "deleted",
            CleanupResult::AlreadyDeleted => "not found",
            CleanupResult::Failed => "FAILED",
            CleanupResult::Skipped => "skipped",
        }
    }
}

/// Report of a deprovisioning run, one entry per resource in teardown order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprovisionReport {
    pub entries: Vec<(ResourceKind, CleanupResult)>,
}

impl DeprovisionReport {
    pub fn record(&mut self, kind: ResourceKind, result: CleanupResult) {
        self.entries.push((kind, result));
    }

    pub fn result_for(&self, kind: ResourceKind) -> Option<CleanupResult> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, r)| *r)
    }

    fn count(&self, result: CleanupResult) -> usize {
        self.entries.iter().filter(|(_, r)| *r == result).count()
    }

    pub fn deleted(&self) -> usize {
        self.count(CleanupResult::Deleted)
    }

    pub fn already_deleted(&self) -> usize {
        self.count(CleanupResult::AlreadyDeleted)
    }

    pub fn failed(&self) -> usize {
        self.count(CleanupResult::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

impl fmt::Display for DeprovisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, result) in &self.entries {
            writeln!(f, "  {:<16} {}", kind.as_str(), result.as_str())?;
        }
        write!(
            f,
            "Deleted: {}, not found: {}, failed: {}",
            self.deleted(),
            self.already_deleted(),
            self.failed()
        )
    }
}
