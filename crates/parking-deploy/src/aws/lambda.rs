//! Lambda function management: code, configuration and resource policy

use crate::aws::context::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error, ignore_not_found};
use aws_sdk_lambda::Client;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode, LastUpdateStatus, Runtime, State};
use parking_deploy_common::{FunctionDefinition, FunctionEnvironment, InvokePermission};
use std::future::Future;
use tracing::{debug, info};

/// Lambda client for the booking function
pub struct LambdaClient {
    client: Client,
}

fn to_sdk_environment(env: &FunctionEnvironment) -> Environment {
    Environment::builder()
        .set_variables(Some(env.to_hash_map()))
        .build()
}

impl LambdaClient {
    /// Create a Lambda client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.lambda_client(),
        }
    }

    pub async fn function_exists(&self, function_name: &str) -> Result<bool, AwsError> {
        let result = self
            .client
            .get_function()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e));

        Ok(ignore_not_found(result)?.is_some())
    }

    /// Create the function from a zip archive, returning its ARN
    pub async fn create_function(
        &self,
        definition: &FunctionDefinition,
        zip: Vec<u8>,
    ) -> Result<String, AwsError> {
        info!(
            function_name = %definition.name,
            runtime = %definition.runtime,
            bytes = zip.len(),
            "Creating Lambda function"
        );

        let output = self
            .client
            .create_function()
            .function_name(&definition.name)
            .runtime(Runtime::from(definition.runtime.as_str()))
            .role(&definition.role_arn)
            .handler(&definition.handler)
            .timeout(definition.timeout_secs)
            .memory_size(definition.memory_mb)
            .code(FunctionCode::builder().zip_file(Blob::new(zip)).build())
            .set_environment(definition.environment.as_ref().map(to_sdk_environment))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let arn = output
            .function_arn()
            .map(str::to_string)
            .ok_or_else(|| AwsError::other("CreateFunction returned no function ARN"))?;

        debug!(function_name = %definition.name, arn = %arn, "Lambda function created");
        Ok(arn)
    }

    pub async fn update_function_code(&self, function_name: &str, zip: Vec<u8>) -> Result<(), AwsError> {
        info!(function_name = %function_name, bytes = zip.len(), "Updating function code");

        self.client
            .update_function_code()
            .function_name(function_name)
            .zip_file(Blob::new(zip))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        Ok(())
    }

    /// Replace the function's environment variables
    pub async fn update_function_environment(
        &self,
        function_name: &str,
        env: &FunctionEnvironment,
    ) -> Result<(), AwsError> {
        info!(
            function_name = %function_name,
            variables = env.len(),
            "Updating function environment"
        );

        self.client
            .update_function_configuration()
            .function_name(function_name)
            .environment(to_sdk_environment(env))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        Ok(())
    }

    /// Check whether the last create or update has settled.
    ///
    /// A failed update is reported as an error instead of `false` so waiting
    /// callers stop immediately.
    pub async fn is_update_complete(&self, function_name: &str) -> Result<bool, AwsError> {
        let config = self
            .client
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        if matches!(config.state(), Some(State::Pending)) {
            return Ok(false);
        }

        match config.last_update_status() {
            Some(LastUpdateStatus::InProgress) => Ok(false),
            Some(LastUpdateStatus::Failed) => Err(AwsError::other(format!(
                "Last update of {function_name} failed: {}",
                config.last_update_status_reason().unwrap_or("no reason given")
            ))),
            _ => Ok(true),
        }
    }

    /// Add a resource policy statement allowing a service to invoke the function
    pub async fn add_permission(
        &self,
        function_name: &str,
        permission: &InvokePermission,
    ) -> Result<(), AwsError> {
        self.client
            .add_permission()
            .function_name(function_name)
            .statement_id(&permission.statement_id)
            .action(&permission.action)
            .principal(&permission.principal)
            .source_arn(&permission.source_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        debug!(
            function_name = %function_name,
            statement_id = %permission.statement_id,
            "Invocation permission added"
        );
        Ok(())
    }

    pub async fn remove_permission(&self, function_name: &str, statement_id: &str) -> Result<(), AwsError> {
        self.client
            .remove_permission()
            .function_name(function_name)
            .statement_id(statement_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        debug!(function_name = %function_name, statement_id = %statement_id, "Invocation permission removed");
        Ok(())
    }

    pub async fn delete_function(&self, function_name: &str) -> Result<(), AwsError> {
        self.client
            .delete_function()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        info!(function_name = %function_name, "Lambda function deleted");
        Ok(())
    }
}

/// Trait for Lambda operations.
pub trait LambdaOperations: Send + Sync {
    fn function_exists(&self, function_name: &str) -> impl Future<Output = Result<bool, AwsError>> + Send;

    /// Create the function from a zip archive, returning its ARN.
    /// Fails with `AlreadyExists` if the function exists.
    fn create_function(
        &self,
        definition: &FunctionDefinition,
        zip: Vec<u8>,
    ) -> impl Future<Output = Result<String, AwsError>> + Send;

    fn update_function_code(
        &self,
        function_name: &str,
        zip: Vec<u8>,
    ) -> impl Future<Output = Result<(), AwsError>> + Send;

    fn update_function_environment(
        &self,
        function_name: &str,
        env: &FunctionEnvironment,
    ) -> impl Future<Output = Result<(), AwsError>> + Send;

    /// `Ok(true)` once no update is in progress
    fn is_update_complete(&self, function_name: &str) -> impl Future<Output = Result<bool, AwsError>> + Send;

    fn add_permission(
        &self,
        function_name: &str,
        permission: &InvokePermission,
    ) -> impl Future<Output = Result<(), AwsError>> + Send;

    fn remove_permission(
        &self,
        function_name: &str,
        statement_id: &str,
    ) -> impl Future<Output = Result<(), AwsError>> + Send;

    fn delete_function(&self, function_name: &str) -> impl Future<Output = Result<(), AwsError>> + Send;
}

impl LambdaOperations for LambdaClient {
    async fn function_exists(&self, function_name: &str) -> Result<bool, AwsError> {
        LambdaClient::function_exists(self, function_name).await
    }

    async fn create_function(
        &self,
        definition: &FunctionDefinition,
        zip: Vec<u8>,
    ) -> Result<String, AwsError> {
        LambdaClient::create_function(self, definition, zip).await
    }

    async fn update_function_code(&self, function_name: &str, zip: Vec<u8>) -> Result<(), AwsError> {
        LambdaClient::update_function_code(self, function_name, zip).await
    }

    async fn update_function_environment(
        &self,
        function_name: &str,
        env: &FunctionEnvironment,
    ) -> Result<(), AwsError> {
        LambdaClient::update_function_environment(self, function_name, env).await
    }

    async fn is_update_complete(&self, function_name: &str) -> Result<bool, AwsError> {
        LambdaClient::is_update_complete(self, function_name).await
    }

    async fn add_permission(
        &self,
        function_name: &str,
        permission: &InvokePermission,
    ) -> Result<(), AwsError> {
        LambdaClient::add_permission(self, function_name, permission).await
    }

    async fn remove_permission(&self, function_name: &str, statement_id: &str) -> Result<(), AwsError> {
        LambdaClient::remove_permission(self, function_name, statement_id).await
    }

    async fn delete_function(&self, function_name: &str) -> Result<(), AwsError> {
        LambdaClient::delete_function(self, function_name).await
    }
}
