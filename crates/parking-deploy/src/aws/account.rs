//! AWS account validation and identity

use crate::aws::error::{AwsError, classify_sdk_error};
use aws_sdk_sts::error::DisplayErrorContext;
use parking_deploy_common::require_value;
use tracing::info;

/// Strongly-typed AWS account ID
///
/// Resource ARNs are derived from it, so it is validated once right after
/// the identity lookup and never re-read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    /// Validate a raw account id, rejecting empty values and `-`
    pub fn parse(raw: &str) -> Result<Self, AwsError> {
        require_value("AWS account id", raw)
            .map(|id| AccountId(id.to_string()))
            .map_err(|e| AwsError::Authentication {
                message: e.to_string(),
            })
    }
}

/// Fetch the current AWS account ID from credentials via STS GetCallerIdentity
///
/// This needs no permissions, so any failure here means the credentials
/// themselves are unusable and is reported as an authentication error.
pub async fn get_current_account_id(sts: &aws_sdk_sts::Client) -> Result<AccountId, AwsError> {
    let identity = sts
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| match classify_sdk_error(&e) {
            auth @ AwsError::Authentication { .. } => auth,
            _ => AwsError::Authentication {
                message: DisplayErrorContext(&e).to_string(),
            },
        })?;

    let account = AccountId::parse(identity.account().unwrap_or_default())?;
    info!(account_id = %account, "AWS account validated");

    Ok(account)
}
