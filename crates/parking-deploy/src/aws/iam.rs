//! IAM execution role management for the booking function

use crate::aws::context::AwsContext;
use crate::aws::error::{AwsError, classify_sdk_error, ignore_not_found};
use aws_sdk_iam::Client;
use parking_deploy_common::PolicyDocument;
use std::future::Future;
use tracing::{debug, info};

/// IAM client for managing the execution role
pub struct IamClient {
    client: Client,
}

impl IamClient {
    /// Create an IAM client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }

    /// Look up a role, returning its ARN or `None` if it does not exist
    pub async fn get_role_arn(&self, role_name: &str) -> Result<Option<String>, AwsError> {
        let result = self
            .client
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e));

        Ok(ignore_not_found(result)?
            .and_then(|out| out.role().map(|role| role.arn().to_string())))
    }

    /// Create a role with the given trust policy, returning its ARN
    pub async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &PolicyDocument,
    ) -> Result<String, AwsError> {
        let document = trust_policy
            .to_json()
            .map_err(|e| AwsError::other(format!("Failed to serialize trust policy: {e}")))?;

        info!(role_name = %role_name, "Creating IAM role");

        let output = self
            .client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(document)
            .description("Execution role for the parking booking function")
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let arn = output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| AwsError::other("CreateRole returned no role"))?;

        debug!(role_name = %role_name, arn = %arn, "IAM role created");
        Ok(arn)
    }

    pub async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), AwsError> {
        self.client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        debug!(role_name = %role_name, policy_arn = %policy_arn, "Managed policy attached");
        Ok(())
    }

    /// Check whether a managed policy is attached to the role
    pub async fn is_policy_attached(&self, role_name: &str, policy_arn: &str) -> Result<bool, AwsError> {
        let output = self
            .client
            .list_attached_role_policies()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        Ok(output
            .attached_policies()
            .iter()
            .any(|p| p.policy_arn() == Some(policy_arn)))
    }

    pub async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), AwsError> {
        self.client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        debug!(role_name = %role_name, policy_arn = %policy_arn, "Managed policy detached");
        Ok(())
    }

    /// Delete a role. IAM refuses while policies are still attached.
    pub async fn delete_role(&self, role_name: &str) -> Result<(), AwsError> {
        self.client
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        info!(role_name = %role_name, "IAM role deleted");
        Ok(())
    }
}

/// Trait for IAM operations.
pub trait IamOperations: Send + Sync {
    /// Look up a role, returning its ARN or `None` if it does not exist
    fn get_role_arn(
        &self,
        role_name: &str,
    ) -> impl Future<Output = Result<Option<String>, AwsError>> + Send;

    /// Create a role with the given trust policy, returning its ARN
    fn create_role(
        &self,
        role_name: &str,
        trust_policy: &PolicyDocument,
    ) -> impl Future<Output = Result<String, AwsError>> + Send;

    fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> impl Future<Output = Result<(), AwsError>> + Send;

    fn is_policy_attached(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> impl Future<Output = Result<bool, AwsError>> + Send;

    fn detach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> impl Future<Output = Result<(), AwsError>> + Send;

    fn delete_role(&self, role_name: &str) -> impl Future<Output = Result<(), AwsError>> + Send;
}

impl IamOperations for IamClient {
    async fn get_role_arn(&self, role_name: &str) -> Result<Option<String>, AwsError> {
        IamClient::get_role_arn(self, role_name).await
    }

    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &PolicyDocument,
    ) -> Result<String, AwsError> {
        IamClient::create_role(self, role_name, trust_policy).await
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), AwsError> {
        IamClient::attach_role_policy(self, role_name, policy_arn).await
    }

    async fn is_policy_attached(&self, role_name: &str, policy_arn: &str) -> Result<bool, AwsError> {
        IamClient::is_policy_attached(self, role_name, policy_arn).await
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), AwsError> {
        IamClient::detach_role_policy(self, role_name, policy_arn).await
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), AwsError> {
        IamClient::delete_role(self, role_name).await
    }
}
