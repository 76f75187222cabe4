//! Provisioning: execution role, function, invocation permission and schedule

use super::{Orchestrator, ProvisionReport, RoleOutcome};
use crate::aws::{EventsOperations, IamOperations, LambdaOperations};
use crate::wait::wait_for_resource;
use anyhow::{Context, Result, bail};
use parking_deploy_common::defaults::{BASIC_EXECUTION_POLICY_ARN, EXECUTION_ROLE_NAME};
use parking_deploy_common::{
    FunctionDefinition, InvokePermission, PolicyDocument, RuleDefinition, TargetDefinition,
};
use tracing::info;

impl<I, L, E> Orchestrator<I, L, E>
where
    I: IamOperations,
    L: LambdaOperations,
    E: EventsOperations,
{
    /// Create everything from scratch.
    ///
    /// The role is reused when present. The function is create-only: if it
    /// already exists provisioning stops there and the schedule is left
    /// untouched. Nothing is rolled back on failure.
    pub async fn provision(&self) -> Result<ProvisionReport> {
        let zip = self.read_artifact().await?;

        info!(
            function_name = %self.function_name(),
            region = %self.config.target.region,
            account_id = %self.config.target.account_id,
            "Provisioning booking function"
        );

        let (role_arn, role) = self.ensure_execution_role().await?;
        let function_arn = self.create_function(&role_arn, zip).await?;
        let rule_arn = self.wire_schedule().await?;

        info!(function_name = %self.function_name(), "Provisioning complete");

        Ok(ProvisionReport {
            role,
            role_arn,
            function_arn,
            rule_arn,
        })
    }

    /// Reuse the execution role if it exists, otherwise create it, attach
    /// the basic execution policy and wait until it is usable.
    pub async fn ensure_execution_role(&self) -> Result<(String, RoleOutcome)> {
        if let Some(arn) = self
            .iam
            .get_role_arn(EXECUTION_ROLE_NAME)
            .await
            .context("Failed to look up execution role")?
        {
            info!(role_name = %EXECUTION_ROLE_NAME, arn = %arn, "Execution role exists, reusing it");
            return Ok((arn, RoleOutcome::Reused));
        }

        let arn = self
            .iam
            .create_role(EXECUTION_ROLE_NAME, &PolicyDocument::lambda_trust_policy())
            .await
            .context("Failed to create execution role")?;

        self.iam
            .attach_role_policy(EXECUTION_ROLE_NAME, BASIC_EXECUTION_POLICY_ARN)
            .await
            .context("Failed to attach basic execution policy")?;

        info!(role_name = %EXECUTION_ROLE_NAME, "Waiting for execution role to propagate");

        let iam = &self.iam;
        wait_for_resource(
            self.config.role_wait.clone(),
            Some(&self.cancel),
            move || execution_role_ready(iam),
            "IAM execution role",
        )
        .await
        .context("Waiting for execution role to become usable")?;

        info!(role_name = %EXECUTION_ROLE_NAME, arn = %arn, "Execution role created");
        Ok((arn, RoleOutcome::Created))
    }

    /// Create the function. Lambda may still refuse to assume a new role
    /// after IAM reports it, so that refusal is retried.
    async fn create_function(&self, role_arn: &str, zip: Vec<u8>) -> Result<String> {
        let definition = FunctionDefinition::parking_booking(
            self.function_name(),
            role_arn,
            self.config.environment.clone(),
        );

        let lambda = &self.lambda;
        let definition = &definition;
        let zip = &zip;
        let arn = self
            .with_retry("create_function", move || async move {
                lambda.create_function(definition, zip.clone()).await
            })
            .await
            .with_context(|| {
                format!(
                    "Failed to create function {} (use `deploy` to update an existing function)",
                    definition.name
                )
            })?;

        info!(function_name = %definition.name, arn = %arn, "Function created");
        Ok(arn)
    }

    /// Let the schedule invoke an already deployed function.
    pub async fn create_schedule(&self) -> Result<String> {
        let exists = self
            .lambda
            .function_exists(self.function_name())
            .await
            .context("Failed to look up function")?;
        if !exists {
            bail!(
                "Function {} does not exist; run `create-env` first",
                self.function_name()
            );
        }

        self.wire_schedule().await
    }

    /// Add the invocation permission, then upsert the rule and its target.
    async fn wire_schedule(&self) -> Result<String> {
        let function_name = self.function_name();
        let rule = RuleDefinition::parking_schedule(&self.config.schedule_expression);
        let permission = InvokePermission::from_schedule(self.config.target.rule_arn());

        match self.lambda.add_permission(function_name, &permission).await {
            Ok(()) => info!(
                function_name = %function_name,
                statement_id = %permission.statement_id,
                "Invocation permission added"
            ),
            Err(e) if e.is_already_exists() => info!(
                function_name = %function_name,
                statement_id = %permission.statement_id,
                "Invocation permission already present, skipping"
            ),
            Err(e) => return Err(e).context("Failed to add invocation permission"),
        }

        let rule_arn = self
            .events
            .put_rule(&rule)
            .await
            .context("Failed to put schedule rule")?;
        info!(rule_name = %rule.name, arn = %rule_arn, "Schedule rule in place");

        let target = TargetDefinition::for_function(self.config.target.function_arn());
        self.events
            .put_target(&rule.name, &target)
            .await
            .context("Failed to put schedule target")?;
        info!(rule_name = %rule.name, target_id = %target.id, "Schedule target in place");

        Ok(rule_arn)
    }
}

/// The role is usable once IAM returns it with the policy attached
async fn execution_role_ready<I: IamOperations>(iam: &I) -> Result<bool> {
    if iam.get_role_arn(EXECUTION_ROLE_NAME).await?.is_none() {
        return Ok(false);
    }
    Ok(iam
        .is_policy_attached(EXECUTION_ROLE_NAME, BASIC_EXECUTION_POLICY_ARN)
        .await?)
}
