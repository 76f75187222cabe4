//! AWS error classification and handling
//!
//! Provides typed errors for AWS SDK operations using the error code from
//! `ProvideErrorMetadata` instead of string matching on Debug output.

use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata};
use thiserror::Error;

/// AWS error categories for provisioning and teardown logic
#[derive(Debug, Clone, Error)]
pub enum AwsError {
    /// The caller's identity was rejected (fatal, checked before any resource call)
    #[error("AWS authentication failed: {message}")]
    Authentication { message: String },

    /// Resource was not found (expected in ensure checks and teardown)
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// A create-only call hit an existing resource
    #[error("Resource already exists: {message}")]
    AlreadyExists { message: String },

    /// Lambda cannot assume a freshly created role yet (eventual consistency, retryable)
    #[error("Execution role cannot be assumed by Lambda yet (eventual consistency)")]
    RolePropagationDelay,

    /// The function has an update in progress (retryable)
    #[error("Function update in progress: {message}")]
    UpdateInProgress { message: String },

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded")]
    Throttled,

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is an "already exists" error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists { .. })
    }

    /// Check if this is a transient provider error worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AwsError::RolePropagationDelay | AwsError::UpdateInProgress { .. } | AwsError::Throttled
        )
    }

    /// Errors a best-effort teardown sub-step may swallow
    pub fn is_ignorable_in_teardown(&self) -> bool {
        self.is_not_found() || self.is_transient()
    }

    /// Build a generic SDK error from a message
    pub fn other(message: impl Into<String>) -> Self {
        AwsError::Sdk {
            code: None,
            message: message.into(),
        }
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            AwsError::Authentication { .. } => Some(
                "Check AWS credentials (AWS_PROFILE, AWS_ACCESS_KEY_ID or `aws sso login`)."
                    .to_string(),
            ),
            AwsError::Sdk { code: Some(c), .. } => suggestion_for_code(c),
            _ => None,
        }
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &["NoSuchEntity", "ResourceNotFoundException"];

/// Known AWS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &["EntityAlreadyExists", "ResourceAlreadyExistsException"];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
];

/// Known AWS error codes for rejected credentials
const AUTHENTICATION_CODES: &[&str] = &[
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "SignatureDoesNotMatch",
];

/// Lambda reports both "function already exists" and "update in progress"
/// as `ResourceConflictException`; only the message tells them apart.
const RESOURCE_CONFLICT_CODE: &str = "ResourceConflictException";

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists { message },
        Some(RESOURCE_CONFLICT_CODE) if message.contains("already exist") => {
            AwsError::AlreadyExists { message }
        }
        Some(RESOURCE_CONFLICT_CODE) => AwsError::UpdateInProgress { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if AUTHENTICATION_CODES.contains(&c) => AwsError::Authentication { message },
        Some("InvalidParameterValueException") if message.contains("cannot be assumed") => {
            AwsError::RolePropagationDelay
        }
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify any SDK error (`SdkError<OperationError>`) from any service.
///
/// Errors without service metadata (dispatch failures, timeouts) keep their
/// full display chain as the message.
pub fn classify_sdk_error<E>(error: &E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(error).to_string());
    classify_aws_error(error.code(), Some(&message))
}

/// Recover the `AwsError` from an anyhow chain.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<AwsError>())
        .cloned()
        .unwrap_or_else(|| AwsError::other(error.to_string()))
}

/// Turn a "not found" error into `Ok(None)`.
pub fn ignore_not_found<T>(result: Result<T, AwsError>) -> Result<Option<T>, AwsError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Error code to user-friendly suggestion mapping
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        "AccessDenied",
        "The caller lacks IAM permissions for this operation.",
    ),
    (
        "AccessDeniedException",
        "The caller lacks IAM permissions for this operation.",
    ),
    (
        "DeleteConflict",
        "The role still has policies attached; detach them and rerun cleanup.",
    ),
    (
        "InvalidParameterValueException",
        "Check the artifact zip and handler settings.",
    ),
    (
        "CodeStorageExceededException",
        "Delete old function versions to free code storage.",
    ),
];

/// Get a user-friendly suggestion for a known error code.
fn suggestion_for_code(code: &str) -> Option<String> {
    SUGGESTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| (*s).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error(Some(code), Some("some message"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
            assert!(err.is_ignorable_in_teardown());
        }
    }

    #[test]
    fn already_exists_codes() {
        for code in ALREADY_EXISTS_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(
                err.is_already_exists(),
                "Expected AlreadyExists for code: {code}"
            );
        }
    }

    #[test]
    fn resource_conflict_split_by_message() {
        let err = classify_aws_error(
            Some("ResourceConflictException"),
            Some("Function already exist: parking-booking"),
        );
        assert!(err.is_already_exists());
        assert!(!err.is_transient());

        let err = classify_aws_error(
            Some("ResourceConflictException"),
            Some("The statement id (EventBridgeInvoke) provided already exists."),
        );
        assert!(err.is_already_exists());

        let err = classify_aws_error(
            Some("ResourceConflictException"),
            Some("The operation cannot be performed at this time. An update is in progress"),
        );
        assert!(matches!(err, AwsError::UpdateInProgress { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(err.is_transient(), "Expected transient for code: {code}");
            assert!(matches!(err, AwsError::Throttled));
        }
    }

    #[test]
    fn authentication_codes() {
        for code in AUTHENTICATION_CODES {
            let err = classify_aws_error(Some(code), Some("token expired"));
            assert!(matches!(err, AwsError::Authentication { .. }));
            assert!(!err.is_ignorable_in_teardown());
            assert!(err.suggestion().is_some());
        }
    }

    #[test]
    fn role_propagation_delay() {
        let err = classify_aws_error(
            Some("InvalidParameterValueException"),
            Some("The role defined for the function cannot be assumed by Lambda."),
        );
        assert!(matches!(err, AwsError::RolePropagationDelay));
        assert!(err.is_transient());

        let err = classify_aws_error(
            Some("InvalidParameterValueException"),
            Some("Unzipped size must be smaller than 262144000 bytes"),
        );
        assert!(matches!(err, AwsError::Sdk { .. }));
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error(Some("AccessDenied"), Some("details"));
        assert!(matches!(err, AwsError::Sdk { .. }));
        assert!(!err.is_ignorable_in_teardown());
        assert!(err.suggestion().is_some());

        let err2 = classify_aws_error(None, Some("something failed"));
        assert!(matches!(err2, AwsError::Sdk { code: None, .. }));
        assert!(err2.suggestion().is_none());
    }

    #[test]
    fn classify_through_anyhow_context() {
        let result: Result<(), AwsError> = Err(AwsError::NotFound {
            message: "no such rule".to_string(),
        });
        let err = result.context("Failed to describe rule").unwrap_err();
        assert!(classify_anyhow_error(&err).is_not_found());

        let plain = anyhow::anyhow!("not an AWS error");
        assert!(matches!(
            classify_anyhow_error(&plain),
            AwsError::Sdk { code: None, .. }
        ));
    }

    #[test]
    fn ignore_not_found_maps_to_none() {
        let missing: Result<u8, AwsError> = Err(AwsError::NotFound {
            message: "gone".to_string(),
        });
        assert_eq!(ignore_not_found(missing).unwrap(), None);
        assert_eq!(ignore_not_found(Ok::<u8, AwsError>(7)).unwrap(), Some(7));
        assert!(ignore_not_found::<u8>(Err(AwsError::Throttled)).is_err());
    }
}
