//! Teardown of every deployed resource
//!
//! Resources are visited in [`TEARDOWN_ORDER`]. A failure on one resource is
//! recorded and the run moves on to the next, so a single run removes as
//! much as it can.

use super::{CleanupResult, DeprovisionReport, Orchestrator};
use crate::aws::{AwsError, EventsOperations, IamOperations, LambdaOperations, ignore_not_found};
use parking_deploy_common::defaults::{
    BASIC_EXECUTION_POLICY_ARN, EXECUTION_ROLE_NAME, INVOKE_STATEMENT_ID, SCHEDULE_RULE_NAME,
};
use parking_deploy_common::{ResourceKind, ResourceState, TEARDOWN_ORDER};
use tracing::{debug, info, warn};

/// Swallow the errors a teardown sub-step is allowed to hit
fn best_effort(kind: ResourceKind, step: &str, result: Result<(), AwsError>) -> Result<(), AwsError> {
    match result {
        Err(e) if e.is_ignorable_in_teardown() => {
            debug!(resource = %kind, step = %step, error = %e, "Ignoring teardown error");
            Ok(())
        }
        other => other,
    }
}

/// Map the final delete call; a concurrent removal counts as already deleted
fn finish(kind: ResourceKind, result: Result<(), AwsError>) -> Result<CleanupResult, AwsError> {
    match result {
        Ok(()) => {
            info!(resource = %kind, "Deleted");
            Ok(CleanupResult::Deleted)
        }
        Err(e) if e.is_not_found() => {
            debug!(resource = %kind, "Already deleted");
            Ok(CleanupResult::AlreadyDeleted)
        }
        Err(e) => Err(e),
    }
}

fn not_found(kind: ResourceKind, name: &str) -> CleanupResult {
    info!(resource = %kind, name = %name, "Not found, skipping");
    CleanupResult::AlreadyDeleted
}

impl<I, L, E> Orchestrator<I, L, E>
where
    I: IamOperations,
    L: LambdaOperations,
    E: EventsOperations,
{
    /// Remove the schedule, the function and the role.
    ///
    /// Always completes; per-resource failures are in the report.
    pub async fn deprovision(&self) -> DeprovisionReport {
        info!(
            function_name = %self.function_name(),
            region = %self.config.target.region,
            "Deprovisioning booking function"
        );

        let mut report = DeprovisionReport::default();
        for kind in TEARDOWN_ORDER {
            if self.cancel.is_cancelled() {
                warn!(resource = %kind, "Cancelled, skipping");
                report.record(kind, CleanupResult::Skipped);
                continue;
            }

            let result = match self.teardown(kind).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(resource = %kind, error = %e, "Teardown failed, continuing");
                    CleanupResult::Failed
                }
            };
            report.record(kind, result);
        }

        info!(
            deleted = report.deleted(),
            not_found = report.already_deleted(),
            failed = report.failed(),
            "Deprovisioning complete"
        );
        report
    }

    /// Tear down a single resource kind
    pub async fn teardown(&self, kind: ResourceKind) -> Result<CleanupResult, AwsError> {
        match kind {
            ResourceKind::ScheduleRule => self.teardown_schedule().await,
            ResourceKind::InvocationPermission => self.teardown_permission().await,
            ResourceKind::Function => self.teardown_function().await,
            ResourceKind::ExecutionRole => self.teardown_role().await,
        }
    }

    async fn teardown_schedule(&self) -> Result<CleanupResult, AwsError> {
        let kind = ResourceKind::ScheduleRule;
        let state = ResourceState::from_exists(self.events.rule_exists(SCHEDULE_RULE_NAME).await?);
        if !state.is_present() {
            return Ok(not_found(kind, SCHEDULE_RULE_NAME));
        }

        // Targets have to go first: EventBridge refuses to delete a rule that has any
        let ids = ignore_not_found(self.events.list_target_ids(SCHEDULE_RULE_NAME).await)?
            .unwrap_or_default();
        info!(rule_name = %SCHEDULE_RULE_NAME, targets = ids.len(), "Removing schedule targets");
        best_effort(
            kind,
            "remove_targets",
            self.events.remove_targets(SCHEDULE_RULE_NAME, &ids).await,
        )?;

        finish(kind, self.events.delete_rule(SCHEDULE_RULE_NAME).await)
    }

    async fn teardown_permission(&self) -> Result<CleanupResult, AwsError> {
        let kind = ResourceKind::InvocationPermission;
        let function_name = self.function_name();
        let state = ResourceState::from_exists(self.lambda.function_exists(function_name).await?);
        if !state.is_present() {
            return Ok(not_found(kind, INVOKE_STATEMENT_ID));
        }

        finish(
            kind,
            self.lambda
                .remove_permission(function_name, INVOKE_STATEMENT_ID)
                .await,
        )
    }

    async fn teardown_function(&self) -> Result<CleanupResult, AwsError> {
        let kind = ResourceKind::Function;
        let function_name = self.function_name();
        let state = ResourceState::from_exists(self.lambda.function_exists(function_name).await?);
        if !state.is_present() {
            return Ok(not_found(kind, function_name));
        }

        best_effort(
            kind,
            "remove_permission",
            self.lambda
                .remove_permission(function_name, INVOKE_STATEMENT_ID)
                .await,
        )?;

        finish(kind, self.lambda.delete_function(function_name).await)
    }

    async fn teardown_role(&self) -> Result<CleanupResult, AwsError> {
        let kind = ResourceKind::ExecutionRole;
        let state =
            ResourceState::from_exists(self.iam.get_role_arn(EXECUTION_ROLE_NAME).await?.is_some());
        if !state.is_present() {
            return Ok(not_found(kind, EXECUTION_ROLE_NAME));
        }

        // IAM refuses to delete a role with attached policies
        best_effort(
            kind,
            "detach_role_policy",
            self.iam
                .detach_role_policy(EXECUTION_ROLE_NAME, BASIC_EXECUTION_POLICY_ARN)
                .await,
        )?;

        finish(kind, self.iam.delete_role(EXECUTION_ROLE_NAME).await)
    }
}
