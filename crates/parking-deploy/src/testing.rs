//! In-memory stand-in for IAM, Lambda and EventBridge
//!
//! `FakeCloud` implements all three operations traits over shared state and
//! records every call, so tests can assert on both the resulting resources
//! and the exact calls made. Clones share the same state.

use crate::aws::{AccountId, AwsError, EventsOperations, IamOperations, LambdaOperations};
use crate::config::{DeployConfig, DeployTarget};
use crate::orchestrator::Orchestrator;
use crate::wait::{RetryPolicy, WaitConfig};
use parking_deploy_common::defaults::BASIC_EXECUTION_POLICY_ARN;
use parking_deploy_common::documents::{function_arn, role_arn, rule_arn};
use parking_deploy_common::{
    FunctionDefinition, FunctionEnvironment, InvokePermission, PolicyDocument, RuleDefinition,
    TargetDefinition,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_ACCOUNT: &str = "123456789012";
pub const TEST_REGION: &str = "eu-west-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRole {
    pub arn: String,
    pub trust_policy: PolicyDocument,
    pub policies: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeFunction {
    pub definition: FunctionDefinition,
    pub code: Vec<u8>,
    pub permissions: BTreeMap<String, InvokePermission>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRule {
    pub definition: RuleDefinition,
    pub targets: BTreeMap<String, TargetDefinition>,
}

/// Everything that exists in the fake account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudState {
    pub roles: BTreeMap<String, FakeRole>,
    pub functions: BTreeMap<String, FakeFunction>,
    pub rules: BTreeMap<String, FakeRule>,
}

#[derive(Default)]
struct Inner {
    state: CloudState,
    calls: Vec<String>,
    failures: HashMap<String, VecDeque<AwsError>>,
    pending_update_checks: u32,
}

#[derive(Clone, Default)]
pub struct FakeCloud {
    inner: Arc<Mutex<Inner>>,
}

fn not_found(what: &str, name: &str) -> AwsError {
    AwsError::NotFound {
        message: format!("{what} not found: {name}"),
    }
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Record a call and return the next injected failure for it, if any
    fn enter(&self, op: &str) -> Result<MutexGuard<'_, Inner>, AwsError> {
        let mut inner = self.lock();
        inner.calls.push(op.to_string());
        if let Some(err) = inner.failures.get_mut(op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(inner)
    }

    /// Make the next call to `op` (e.g. `"lambda:create_function"`) fail
    pub fn fail_next(&self, op: &str, err: AwsError) {
        self.lock()
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(err);
    }

    /// Report the next `n` update status checks as still in progress
    pub fn set_pending_update_checks(&self, n: u32) {
        self.lock().pending_update_checks = n;
    }

    /// Create a role with the basic execution policy attached
    pub fn seed_role(&self, role_name: &str) {
        self.lock().state.roles.insert(
            role_name.to_string(),
            FakeRole {
                arn: role_arn(TEST_ACCOUNT, role_name),
                trust_policy: PolicyDocument::lambda_trust_policy(),
                policies: BTreeSet::from([BASIC_EXECUTION_POLICY_ARN.to_string()]),
            },
        );
    }

    pub fn snapshot(&self) -> CloudState {
        self.lock().state.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

impl IamOperations for FakeCloud {
    async fn get_role_arn(&self, role_name: &str) -> Result<Option<String>, AwsError> {
        let inner = self.enter("iam:get_role_arn")?;
        Ok(inner.state.roles.get(role_name).map(|r| r.arn.clone()))
    }

    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &PolicyDocument,
    ) -> Result<String, AwsError> {
        let mut inner = self.enter("iam:create_role")?;
        if inner.state.roles.contains_key(role_name) {
            return Err(AwsError::AlreadyExists {
                message: format!("Role with name {role_name} already exists."),
            });
        }
        let arn = role_arn(TEST_ACCOUNT, role_name);
        inner.state.roles.insert(
            role_name.to_string(),
            FakeRole {
                arn: arn.clone(),
                trust_policy: trust_policy.clone(),
                policies: BTreeSet::new(),
            },
        );
        Ok(arn)
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), AwsError> {
        let mut inner = self.enter("iam:attach_role_policy")?;
        let role = inner
            .state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| not_found("role", role_name))?;
        role.policies.insert(policy_arn.to_string());
        Ok(())
    }

    async fn is_policy_attached(&self, role_name: &str, policy_arn: &str) -> Result<bool, AwsError> {
        let inner = self.enter("iam:is_policy_attached")?;
        let role = inner
            .state
            .roles
            .get(role_name)
            .ok_or_else(|| not_found("role", role_name))?;
        Ok(role.policies.contains(policy_arn))
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), AwsError> {
        let mut inner = self.enter("iam:detach_role_policy")?;
        let role = inner
            .state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| not_found("role", role_name))?;
        if !role.policies.remove(policy_arn) {
            return Err(not_found("attached policy", policy_arn));
        }
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), AwsError> {
        let mut inner = self.enter("iam:delete_role")?;
        let role = inner
            .state
            .roles
            .get(role_name)
            .ok_or_else(|| not_found("role", role_name))?;
        if !role.policies.is_empty() {
            return Err(AwsError::Sdk {
                code: Some("DeleteConflict".to_string()),
                message: "Cannot delete entity, must detach all policies first.".to_string(),
            });
        }
        inner.state.roles.remove(role_name);
        Ok(())
    }
}

impl LambdaOperations for FakeCloud {
    async fn function_exists(&self, function_name: &str) -> Result<bool, AwsError> {
        let inner = self.enter("lambda:function_exists")?;
        Ok(inner.state.functions.contains_key(function_name))
    }

    async fn create_function(
        &self,
        definition: &FunctionDefinition,
        zip: Vec<u8>,
    ) -> Result<String, AwsError> {
        let mut inner = self.enter("lambda:create_function")?;
        if inner.state.functions.contains_key(&definition.name) {
            return Err(AwsError::AlreadyExists {
                message: format!("Function already exist: {}", definition.name),
            });
        }
        if !inner.state.roles.values().any(|r| r.arn == definition.role_arn) {
            return Err(AwsError::RolePropagationDelay);
        }
        inner.state.functions.insert(
            definition.name.clone(),
            FakeFunction {
                definition: definition.clone(),
                code: zip,
                permissions: BTreeMap::new(),
            },
        );
        Ok(function_arn(TEST_REGION, TEST_ACCOUNT, &definition.name))
    }

    async fn update_function_code(&self, function_name: &str, zip: Vec<u8>) -> Result<(), AwsError> {
        let mut inner = self.enter("lambda:update_function_code")?;
        let function = inner
            .state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| not_found("function", function_name))?;
        function.code = zip;
        Ok(())
    }

    async fn update_function_environment(
        &self,
        function_name: &str,
        env: &FunctionEnvironment,
    ) -> Result<(), AwsError> {
        let mut inner = self.enter("lambda:update_function_environment")?;
        let function = inner
            .state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| not_found("function", function_name))?;
        function.definition.environment = Some(env.clone());
        Ok(())
    }

    async fn is_update_complete(&self, function_name: &str) -> Result<bool, AwsError> {
        let mut inner = self.enter("lambda:is_update_complete")?;
        if !inner.state.functions.contains_key(function_name) {
            return Err(not_found("function", function_name));
        }
        if inner.pending_update_checks > 0 {
            inner.pending_update_checks -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn add_permission(
        &self,
        function_name: &str,
        permission: &InvokePermission,
    ) -> Result<(), AwsError> {
        let mut inner = self.enter("lambda:add_permission")?;
        let function = inner
            .state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| not_found("function", function_name))?;
        if function.permissions.contains_key(&permission.statement_id) {
            return Err(AwsError::AlreadyExists {
                message: format!(
                    "The statement id ({}) provided already exists.",
                    permission.statement_id
                ),
            });
        }
        function
            .permissions
            .insert(permission.statement_id.clone(), permission.clone());
        Ok(())
    }

    async fn remove_permission(&self, function_name: &str, statement_id: &str) -> Result<(), AwsError> {
        let mut inner = self.enter("lambda:remove_permission")?;
        let function = inner
            .state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| not_found("function", function_name))?;
        function
            .permissions
            .remove(statement_id)
            .map(|_| ())
            .ok_or_else(|| not_found("statement", statement_id))
    }

    async fn delete_function(&self, function_name: &str) -> Result<(), AwsError> {
        let mut inner = self.enter("lambda:delete_function")?;
        inner
            .state
            .functions
            .remove(function_name)
            .map(|_| ())
            .ok_or_else(|| not_found("function", function_name))
    }
}

impl EventsOperations for FakeCloud {
    async fn rule_exists(&self, rule_name: &str) -> Result<bool, AwsError> {
        let inner = self.enter("events:rule_exists")?;
        Ok(inner.state.rules.contains_key(rule_name))
    }

    async fn put_rule(&self, rule: &RuleDefinition) -> Result<String, AwsError> {
        let mut inner = self.enter("events:put_rule")?;
        inner
            .state
            .rules
            .entry(rule.name.clone())
            .and_modify(|existing| existing.definition = rule.clone())
            .or_insert_with(|| FakeRule {
                definition: rule.clone(),
                targets: BTreeMap::new(),
            });
        Ok(rule_arn(TEST_REGION, TEST_ACCOUNT, &rule.name))
    }

    async fn put_target(&self, rule_name: &str, target: &TargetDefinition) -> Result<(), AwsError> {
        let mut inner = self.enter("events:put_target")?;
        let rule = inner
            .state
            .rules
            .get_mut(rule_name)
            .ok_or_else(|| not_found("rule", rule_name))?;
        rule.targets.insert(target.id.clone(), target.clone());
        Ok(())
    }

    async fn list_target_ids(&self, rule_name: &str) -> Result<Vec<String>, AwsError> {
        let inner = self.enter("events:list_target_ids")?;
        let rule = inner
            .state
            .rules
            .get(rule_name)
            .ok_or_else(|| not_found("rule", rule_name))?;
        Ok(rule.targets.keys().cloned().collect())
    }

    async fn remove_targets(&self, rule_name: &str, ids: &[String]) -> Result<(), AwsError> {
        let mut inner = self.enter("events:remove_targets")?;
        let rule = inner
            .state
            .rules
            .get_mut(rule_name)
            .ok_or_else(|| not_found("rule", rule_name))?;
        for id in ids {
            rule.targets.remove(id);
        }
        Ok(())
    }

    async fn delete_rule(&self, rule_name: &str) -> Result<(), AwsError> {
        let mut inner = self.enter("events:delete_rule")?;
        let rule = inner
            .state
            .rules
            .get(rule_name)
            .ok_or_else(|| not_found("rule", rule_name))?;
        if !rule.targets.is_empty() {
            return Err(AwsError::Sdk {
                code: Some("ValidationException".to_string()),
                message: "Rule can't be deleted since it has targets.".to_string(),
            });
        }
        inner.state.rules.remove(rule_name);
        Ok(())
    }
}

const DEFAULT_ARTIFACT: &[u8] = b"PK\x05\x06fake zip";

/// Deployment settings for tests: a temporary artifact and fast waits
pub struct TestDeployment {
    dir: TempDir,
    config: DeployConfig,
}

impl TestDeployment {
    pub fn new() -> Self {
        Self::without_artifact().with_artifact_bytes(DEFAULT_ARTIFACT)
    }

    /// Settings pointing at an artifact that does not exist
    pub fn without_artifact() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let account = AccountId::parse(TEST_ACCOUNT).unwrap();
        let target = DeployTarget::new("parking-booking", TEST_REGION, account).unwrap();
        let fast = WaitConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            timeout: Duration::from_secs(5),
            jitter: false,
        };
        let config = DeployConfig::new(target)
            .with_artifact(dir.path().join("lambda.zip"))
            .with_role_wait(fast.clone())
            .with_update_wait(fast)
            .with_retry(RetryPolicy {
                min_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                max_times: 3,
            });
        Self { dir, config }
    }

    pub fn with_artifact_bytes(self, bytes: &[u8]) -> Self {
        std::fs::write(self.artifact_path(), bytes).unwrap();
        self
    }

    pub fn with_environment(mut self, env: FunctionEnvironment) -> Self {
        self.config = self.config.with_environment(Some(env));
        self
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.dir.path().join("lambda.zip")
    }

    pub fn artifact_bytes(&self) -> Vec<u8> {
        std::fs::read(self.artifact_path()).unwrap()
    }

    pub fn orchestrator(&self, cloud: &FakeCloud) -> Orchestrator<FakeCloud, FakeCloud, FakeCloud> {
        Orchestrator::new(cloud.clone(), cloud.clone(), cloud.clone(), self.config.clone())
    }
}
