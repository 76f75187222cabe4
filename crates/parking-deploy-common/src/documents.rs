//! Typed request documents
//!
//! The trust policy, schedule rule, schedule target and function definition
//! are built as values and serialized (or mapped onto SDK builders) by the
//! AWS layer, so no JSON is assembled by string substitution.

use crate::defaults::{
    EVENTS_SERVICE_PRINCIPAL, FUNCTION_HANDLER, FUNCTION_MEMORY_MB, FUNCTION_RUNTIME,
    FUNCTION_TIMEOUT_SECS, INVOKE_ACTION, INVOKE_STATEMENT_ID, LAMBDA_SERVICE_PRINCIPAL,
    SCHEDULE_RULE_NAME, SCHEDULE_TARGET_ID,
};
use crate::env_file::FunctionEnvironment;
use serde::{Deserialize, Serialize};

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// IAM policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    pub principal: Principal,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    pub service: String,
}

impl PolicyDocument {
    /// Trust policy allowing Lambda to assume the execution role
    pub fn lambda_trust_policy() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![PolicyStatement {
                effect: Effect::Allow,
                principal: Principal {
                    service: LAMBDA_SERVICE_PRINCIPAL.to_string(),
                },
                action: "sts:AssumeRole".to_string(),
            }],
        }
    }

    /// Serialize into the JSON shape IAM expects
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// EventBridge rule state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleState {
    Enabled,
}

impl RuleState {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleState::Enabled => "ENABLED",
        }
    }
}

/// Schedule rule definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleDefinition {
    pub name: String,
    pub schedule_expression: String,
    pub state: RuleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RuleDefinition {
    /// The booking schedule, enabled, with the given cron/rate expression
    pub fn parking_schedule(schedule_expression: &str) -> Self {
        Self {
            name: SCHEDULE_RULE_NAME.to_string(),
            schedule_expression: schedule_expression.to_string(),
            state: RuleState::Enabled,
            description: Some("Triggers the parking booking function".to_string()),
        }
    }

    /// ARN the rule will have once created; known before creation because
    /// the invocation permission references it.
    pub fn arn(&self, region: &str, account_id: &str) -> String {
        rule_arn(region, account_id, &self.name)
    }
}

/// Schedule target definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetDefinition {
    pub id: String,
    pub arn: String,
}

impl TargetDefinition {
    pub fn for_function(function_arn: impl Into<String>) -> Self {
        Self {
            id: SCHEDULE_TARGET_ID.to_string(),
            arn: function_arn.into(),
        }
    }
}

/// Resource policy statement granting a service permission to invoke the function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokePermission {
    pub statement_id: String,
    pub action: String,
    pub principal: String,
    pub source_arn: String,
}

impl InvokePermission {
    /// Permission for the schedule rule with the given ARN
    pub fn from_schedule(rule_arn: impl Into<String>) -> Self {
        Self {
            statement_id: INVOKE_STATEMENT_ID.to_string(),
            action: INVOKE_ACTION.to_string(),
            principal: EVENTS_SERVICE_PRINCIPAL.to_string(),
            source_arn: rule_arn.into(),
        }
    }
}

/// Everything needed to create the function apart from the code itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name: String,
    pub role_arn: String,
    pub runtime: String,
    pub handler: String,
    pub timeout_secs: i32,
    pub memory_mb: i32,
    pub environment: Option<FunctionEnvironment>,
}

impl FunctionDefinition {
    /// The booking handler with its fixed runtime settings
    pub fn parking_booking(
        name: impl Into<String>,
        role_arn: impl Into<String>,
        environment: Option<FunctionEnvironment>,
    ) -> Self {
        Self {
            name: name.into(),
            role_arn: role_arn.into(),
            runtime: FUNCTION_RUNTIME.to_string(),
            handler: FUNCTION_HANDLER.to_string(),
            timeout_secs: FUNCTION_TIMEOUT_SECS,
            memory_mb: FUNCTION_MEMORY_MB,
            environment,
        }
    }
}

pub fn function_arn(region: &str, account_id: &str, function_name: &str) -> String {
    format!("arn:aws:lambda:{region}:{account_id}:function:{function_name}")
}

pub fn rule_arn(region: &str, account_id: &str, rule_name: &str) -> String {
    format!("arn:aws:events:{region}:{account_id}:rule/{rule_name}")
}

pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}
