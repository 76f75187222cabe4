//! Resource lifecycle orchestration
//!
//! Provisioning, update and teardown of the booking function and the
//! resources around it. Every workflow runs one provider call at a time and
//! decides what to do from live existence checks, so each can be re-run
//! after an interruption.

pub mod deprovision;
pub mod provision;
pub mod report;
pub mod update;

pub use report::{CleanupResult, DeprovisionReport, ProvisionReport, RoleOutcome, UpdateReport};

use crate::aws::{
    AwsContext, AwsError, EventsClient, EventsOperations, IamClient, IamOperations, LambdaClient,
    LambdaOperations,
};
use crate::config::DeployConfig;
use anyhow::{Context, Result};
use backon::Retryable;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Drives the deployment workflows against one set of provider operations
pub struct Orchestrator<I, L, E> {
    iam: I,
    lambda: L,
    events: E,
    config: DeployConfig,
    cancel: CancellationToken,
}

/// Orchestrator backed by the real AWS clients
pub type AwsOrchestrator = Orchestrator<IamClient, LambdaClient, EventsClient>;

impl AwsOrchestrator {
    pub fn from_context(ctx: &AwsContext, config: DeployConfig) -> Self {
        Orchestrator::new(
            IamClient::from_context(ctx),
            LambdaClient::from_context(ctx),
            EventsClient::from_context(ctx),
            config,
        )
    }
}

impl<I, L, E> Orchestrator<I, L, E>
where
    I: IamOperations,
    L: LambdaOperations,
    E: EventsOperations,
{
    pub fn new(iam: I, lambda: L, events: E, config: DeployConfig) -> Self {
        Self {
            iam,
            lambda,
            events,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe this token during waits and between teardown steps
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    fn function_name(&self) -> &str {
        self.config.function_name()
    }

    /// Read the zip artifact into memory
    async fn read_artifact(&self) -> Result<Vec<u8>> {
        let path = &self.config.artifact;
        tokio::fs::read(path).await.with_context(|| {
            format!(
                "Failed to read artifact {} (run `parking-deploy build` first)",
                path.display()
            )
        })
    }

    /// Run a provider call, retrying with backoff while it fails transiently
    async fn with_retry<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, AwsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AwsError>>,
    {
        call.retry(self.config.retry.backoff())
            .when(AwsError::is_transient)
            .notify(|e, delay| {
                warn!(
                    operation = %operation,
                    delay = ?delay,
                    error = %e,
                    "Transient AWS error, retrying..."
                );
            })
            .await
    }
}
