//! EventBridge schedule rule and target management

use crate::aws::context::AwsContext;
use crate::aws::error::{AwsError, classify_aws_error, classify_sdk_error, ignore_not_found};
use aws_sdk_eventbridge::Client;
use aws_sdk_eventbridge::types::{RuleState, Target};
use parking_deploy_common::{RuleDefinition, TargetDefinition};
use std::future::Future;
use tracing::{debug, info};

/// EventBridge client for the booking schedule
pub struct EventsClient {
    client: Client,
}

impl EventsClient {
    /// Create an EventBridge client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.events_client(),
        }
    }

    pub async fn rule_exists(&self, rule_name: &str) -> Result<bool, AwsError> {
        let result = self
            .client
            .describe_rule()
            .name(rule_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e));

        Ok(ignore_not_found(result)?.is_some())
    }

    /// Create or update a scheduled rule, returning its ARN
    pub async fn put_rule(&self, rule: &RuleDefinition) -> Result<String, AwsError> {
        info!(
            rule_name = %rule.name,
            schedule = %rule.schedule_expression,
            "Putting schedule rule"
        );

        let output = self
            .client
            .put_rule()
            .name(&rule.name)
            .schedule_expression(&rule.schedule_expression)
            .state(RuleState::from(rule.state.as_str()))
            .set_description(rule.description.clone())
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        output
            .rule_arn()
            .map(str::to_string)
            .ok_or_else(|| AwsError::other("PutRule returned no rule ARN"))
    }

    /// Create or replace a target on a rule
    pub async fn put_target(&self, rule_name: &str, target: &TargetDefinition) -> Result<(), AwsError> {
        let sdk_target = Target::builder()
            .id(&target.id)
            .arn(&target.arn)
            .build()
            .map_err(|e| AwsError::other(format!("Failed to build target: {e}")))?;

        let output = self
            .client
            .put_targets()
            .rule(rule_name)
            .targets(sdk_target)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        // PutTargets reports per-target failures in a successful response
        if let Some(entry) = output.failed_entries().first() {
            return Err(classify_aws_error(entry.error_code(), entry.error_message()));
        }

        debug!(rule_name = %rule_name, target_id = %target.id, "Schedule target set");
        Ok(())
    }

    pub async fn list_target_ids(&self, rule_name: &str) -> Result<Vec<String>, AwsError> {
        let mut ids = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_targets_by_rule()
                .rule(rule_name)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;

            ids.extend(output.targets().iter().map(|t| t.id().to_string()));

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(ids)
    }

    pub async fn remove_targets(&self, rule_name: &str, ids: &[String]) -> Result<(), AwsError> {
        if ids.is_empty() {
            return Ok(());
        }

        let output = self
            .client
            .remove_targets()
            .rule(rule_name)
            .set_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        if let Some(entry) = output.failed_entries().first() {
            return Err(classify_aws_error(entry.error_code(), entry.error_message()));
        }

        debug!(rule_name = %rule_name, count = ids.len(), "Schedule targets removed");
        Ok(())
    }

    /// Delete a rule. EventBridge refuses while targets remain.
    pub async fn delete_rule(&self, rule_name: &str) -> Result<(), AwsError> {
        self.client
            .delete_rule()
            .name(rule_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        info!(rule_name = %rule_name, "Schedule rule deleted");
        Ok(())
    }
}

/// Trait for EventBridge operations.
pub trait EventsOperations: Send + Sync {
    fn rule_exists(&self, rule_name: &str) -> impl Future<Output = Result<bool, AwsError>> + Send;

    /// Create or update a scheduled rule, returning its ARN
    fn put_rule(&self, rule: &RuleDefinition) -> impl Future<Output = Result<String, AwsError>> + Send;

    /// Create or replace a target on a rule
    fn put_target(
        &self,
        rule_name: &str,
        target: &TargetDefinition,
    ) -> impl Future<Output = Result<(), AwsError>> + Send;

    fn list_target_ids(&self, rule_name: &str) -> impl Future<Output = Result<Vec<String>, AwsError>> + Send;

    fn remove_targets(
        &self,
        rule_name: &str,
        ids: &[String],
    ) -> impl Future<Output = Result<(), AwsError>> + Send;

    fn delete_rule(&self, rule_name: &str) -> impl Future<Output = Result<(), AwsError>> + Send;
}

impl EventsOperations for EventsClient {
    async fn rule_exists(&self, rule_name: &str) -> Result<bool, AwsError> {
        EventsClient::rule_exists(self, rule_name).await
    }

    async fn put_rule(&self, rule: &RuleDefinition) -> Result<String, AwsError> {
        EventsClient::put_rule(self, rule).await
    }

    async fn put_target(&self, rule_name: &str, target: &TargetDefinition) -> Result<(), AwsError> {
        EventsClient::put_target(self, rule_name, target).await
    }

    async fn list_target_ids(&self, rule_name: &str) -> Result<Vec<String>, AwsError> {
        EventsClient::list_target_ids(self, rule_name).await
    }

    async fn remove_targets(&self, rule_name: &str, ids: &[String]) -> Result<(), AwsError> {
        EventsClient::remove_targets(self, rule_name, ids).await
    }

    async fn delete_rule(&self, rule_name: &str) -> Result<(), AwsError> {
        EventsClient::delete_rule(self, rule_name).await
    }
}
