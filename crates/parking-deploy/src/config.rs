//! Configuration types for deployment workflows
//!
//! Everything a workflow needs is resolved once in `main` into a
//! [`DeployConfig`] and passed down by reference.

use crate::aws::AccountId;
use crate::wait::{RetryPolicy, WaitConfig};
use parking_deploy_common::defaults::{
    BUILD_DIR, DEFAULT_ARTIFACT_PATH, DEFAULT_SCHEDULE_EXPRESSION, HANDLER_FILE,
    REQUIREMENTS_FILE, SCHEDULE_RULE_NAME, STAGING_DIR,
};
use parking_deploy_common::documents::{function_arn, rule_arn};
use parking_deploy_common::{ConfigError, FunctionEnvironment, require_value};
use std::path::{Path, PathBuf};

/// Validate the function name and region, returning their trimmed values.
///
/// Run before any provider client is created.
pub fn validate_name_and_region(
    function_name: &str,
    region: &str,
) -> Result<(String, String), ConfigError> {
    let function_name = require_value("FUNCTION_NAME", function_name)?;
    let region = require_value("AWS_REGION", region)?;
    Ok((function_name.to_string(), region.to_string()))
}

/// Where the function lives: the identity every ARN is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub function_name: String,
    pub region: String,
    pub account_id: AccountId,
}

impl DeployTarget {
    pub fn new(function_name: &str, region: &str, account_id: AccountId) -> Result<Self, ConfigError> {
        let (function_name, region) = validate_name_and_region(function_name, region)?;
        Ok(Self {
            function_name,
            region,
            account_id,
        })
    }

    pub fn function_arn(&self) -> String {
        function_arn(&self.region, &self.account_id, &self.function_name)
    }

    /// ARN of the schedule rule in this account and region
    pub fn rule_arn(&self) -> String {
        rule_arn(&self.region, &self.account_id, SCHEDULE_RULE_NAME)
    }
}

/// Configuration for provisioning, update and teardown
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub target: DeployTarget,
    /// Zip archive uploaded as the function code
    pub artifact: PathBuf,
    /// Environment forwarded to the function, reserved keys removed
    pub environment: Option<FunctionEnvironment>,
    /// Cron or rate expression of the schedule rule
    pub schedule_expression: String,
    /// Bounded poll after creating the execution role
    pub role_wait: WaitConfig,
    /// Bounded poll for a code update to settle before a configuration update
    pub update_wait: WaitConfig,
    /// Backoff for calls rejected with a transient error
    pub retry: RetryPolicy,
}

impl DeployConfig {
    pub fn new(target: DeployTarget) -> Self {
        Self {
            target,
            artifact: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            environment: None,
            schedule_expression: DEFAULT_SCHEDULE_EXPRESSION.to_string(),
            role_wait: WaitConfig::role_propagation(),
            update_wait: WaitConfig::function_update(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_artifact(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.artifact = artifact.into();
        self
    }

    pub fn with_environment(mut self, environment: Option<FunctionEnvironment>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_schedule_expression(mut self, expression: impl Into<String>) -> Self {
        self.schedule_expression = expression.into();
        self
    }

    pub fn with_role_wait(mut self, wait: WaitConfig) -> Self {
        self.role_wait = wait;
        self
    }

    pub fn with_update_wait(mut self, wait: WaitConfig) -> Self {
        self.update_wait = wait;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn function_name(&self) -> &str {
        &self.target.function_name
    }
}

/// Local project layout used by the build and task commands
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub project_dir: PathBuf,
    pub artifact: PathBuf,
}

impl ProjectLayout {
    /// A relative artifact path is taken relative to the project directory
    pub fn new(project_dir: impl Into<PathBuf>, artifact: impl AsRef<Path>) -> Self {
        let project_dir = project_dir.into();
        let artifact = if artifact.as_ref().is_absolute() {
            artifact.as_ref().to_path_buf()
        } else {
            project_dir.join(artifact)
        };
        Self {
            project_dir,
            artifact,
        }
    }

    pub fn handler_path(&self) -> PathBuf {
        self.project_dir.join(HANDLER_FILE)
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.project_dir.join(REQUIREMENTS_FILE)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.project_dir.join(BUILD_DIR)
    }

    /// Dependencies are installed here before being zipped
    pub fn staging_dir(&self) -> PathBuf {
        self.project_dir.join(STAGING_DIR)
    }
}
