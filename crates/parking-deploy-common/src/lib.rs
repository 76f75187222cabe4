//! parking-deploy-common - Shared types and utilities
//!
//! Provider-free building blocks for the deployment tooling, kept free of
//! AWS SDK dependencies.
//!
//! ## Modules
//!
//! - [`defaults`]: Fixed resource names and default settings
//! - [`documents`]: Typed trust policy, rule, target and function definitions
//! - [`env_file`]: Environment file parsing with reserved-key filtering
//! - [`error`]: Configuration validation errors
//! - [`resource_kind`]: Resource kinds and teardown ordering

pub mod defaults;
pub mod documents;
pub mod env_file;
pub mod error;
pub mod resource_kind;

// Re-export commonly used types
pub use documents::{
    FunctionDefinition, InvokePermission, PolicyDocument, RuleDefinition, TargetDefinition,
};
pub use env_file::FunctionEnvironment;
pub use error::{ConfigError, require_value};
pub use resource_kind::{ResourceKind, ResourceState, TEARDOWN_ORDER};
