//! Code and configuration updates of an existing function

use super::{Orchestrator, UpdateReport};
use crate::aws::{EventsOperations, IamOperations, LambdaOperations};
use crate::wait::wait_for_resource;
use anyhow::{Context, Result};
use parking_deploy_common::{ConfigError, FunctionEnvironment};
use tracing::info;

impl<I, L, E> Orchestrator<I, L, E>
where
    I: IamOperations,
    L: LambdaOperations,
    E: EventsOperations,
{
    /// Replace the function code, then (unless `code_only`) its environment.
    ///
    /// The two calls are separate and not atomic: if the configuration update
    /// fails the new code stays deployed.
    pub async fn update(&self, code_only: bool) -> Result<UpdateReport> {
        let zip = self.read_artifact().await?;
        let function_name = self.function_name();

        let lambda = &self.lambda;
        let zip = &zip;
        self.with_retry("update_function_code", move || async move {
            lambda.update_function_code(function_name, zip.clone()).await
        })
        .await
        .with_context(|| format!("Failed to update code of function {function_name}"))?;
        info!(function_name = %function_name, "Function code updated");

        let mut report = UpdateReport {
            code_updated: true,
            environment_updated: false,
        };
        if code_only {
            return Ok(report);
        }

        match &self.config.environment {
            Some(env) => {
                self.apply_environment(env).await?;
                report.environment_updated = true;
            }
            None => info!(
                function_name = %function_name,
                "No environment configured, leaving configuration unchanged"
            ),
        }

        Ok(report)
    }

    /// Replace the function's environment with the configured one
    pub async fn update_environment(&self) -> Result<()> {
        let env = self
            .config
            .environment
            .as_ref()
            .ok_or(ConfigError::EnvironmentNotConfigured)?;
        self.apply_environment(env).await
    }

    async fn apply_environment(&self, env: &FunctionEnvironment) -> Result<()> {
        let function_name = self.function_name();
        self.wait_for_update_complete().await?;

        let lambda = &self.lambda;
        self.with_retry("update_function_environment", move || async move {
            lambda.update_function_environment(function_name, env).await
        })
        .await
        .with_context(|| format!("Failed to update environment of function {function_name}"))?;

        info!(
            function_name = %function_name,
            variables = env.len(),
            "Function environment updated"
        );
        Ok(())
    }

    /// Lambda rejects a configuration change while a code update is in flight
    async fn wait_for_update_complete(&self) -> Result<()> {
        let lambda = &self.lambda;
        let function_name = self.function_name();
        wait_for_resource(
            self.config.update_wait.clone(),
            Some(&self.cancel),
            move || async move {
                lambda
                    .is_update_complete(function_name)
                    .await
                    .map_err(anyhow::Error::from)
            },
            "function update",
        )
        .await
        .with_context(|| format!("Waiting for pending update of {function_name} to finish"))
    }
}
