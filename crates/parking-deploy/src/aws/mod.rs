//! AWS client modules
//!
//! This module provides wrappers around AWS SDK clients for:
//! - IAM: Execution role and managed policy attachment
//! - Lambda: Function code, configuration and invocation permission
//! - EventBridge: Schedule rule and its target
//! - STS: Account ID lookup

pub mod account;
pub mod context;
pub mod error;
pub mod events;
pub mod iam;
pub mod lambda;

// Core clients
pub use account::{AccountId, get_current_account_id};
pub use context::AwsContext;
pub use events::{EventsClient, EventsOperations};
pub use iam::{IamClient, IamOperations};
pub use lambda::{LambdaClient, LambdaOperations};

// Error handling
pub use error::{AwsError, classify_anyhow_error, classify_aws_error, ignore_not_found};
