//! Fixed names and default values for the deployed resources
//!
//! The resource names are part of the deployment contract: provisioning and
//! teardown both look resources up by these names, so changing one orphans
//! whatever was created under the old name.

/// Default Lambda function name
pub const DEFAULT_FUNCTION_NAME: &str = "parking-booking";

/// Default AWS region
pub const DEFAULT_REGION: &str = "eu-west-1";

/// IAM role assumed by the function
pub const EXECUTION_ROLE_NAME: &str = "lambda-role";

/// Managed policy attached to the execution role (CloudWatch Logs access)
pub const BASIC_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Service principal allowed to assume the execution role
pub const LAMBDA_SERVICE_PRINCIPAL: &str = "lambda.amazonaws.com";

/// EventBridge rule that triggers the function
pub const SCHEDULE_RULE_NAME: &str = "parking-lambda-schedule";

/// Default schedule: midnight UTC on weekdays
pub const DEFAULT_SCHEDULE_EXPRESSION: &str = "cron(0 0 ? * MON-FRI *)";

/// Target id of the function within the schedule rule
pub const SCHEDULE_TARGET_ID: &str = "parking-lambda-target";

/// Statement id of the permission letting the schedule invoke the function
pub const INVOKE_STATEMENT_ID: &str = "EventBridgeInvoke";

/// Principal named in the invocation permission
pub const EVENTS_SERVICE_PRINCIPAL: &str = "events.amazonaws.com";

/// Action granted by the invocation permission
pub const INVOKE_ACTION: &str = "lambda:InvokeFunction";

/// Lambda runtime of the booking handler
pub const FUNCTION_RUNTIME: &str = "python3.12";

/// Handler entry point (`<module>.<function>`)
pub const FUNCTION_HANDLER: &str = "parking.lambda_handler";

/// Handler source file, relative to the project directory
pub const HANDLER_FILE: &str = "parking.py";

/// Python dependency manifest, relative to the project directory
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Function timeout in seconds. The handler keeps retrying bookings until
/// the remaining invocation time runs out.
pub const FUNCTION_TIMEOUT_SECS: i32 = 300;

/// Function memory in MB
pub const FUNCTION_MEMORY_MB: i32 = 128;

/// Default environment file, relative to the working directory
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Directory holding build outputs, relative to the project directory
pub const BUILD_DIR: &str = "build";

/// Dependencies are installed here before being zipped, relative to the project directory
pub const STAGING_DIR: &str = "build/package";

/// Default artifact location
pub const DEFAULT_ARTIFACT_PATH: &str = "build/lambda.zip";

/// Image used to install dependencies in an environment matching the runtime
pub const BUILD_IMAGE: &str = "public.ecr.aws/sam/build-python3.12";
