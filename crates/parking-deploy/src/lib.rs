//! parking-deploy - Deployment tooling for the parking booking function
//!
//! Provisions, updates and tears down the Lambda function, its IAM
//! execution role, its invocation permission and the EventBridge schedule
//! that triggers it. Also packages the function artifact and runs local
//! developer tasks.

pub mod aws;
pub mod command;
pub mod config;
pub mod orchestrator;
pub mod package;
pub mod tasks;
pub mod wait;

#[cfg(test)]
mod testing;
