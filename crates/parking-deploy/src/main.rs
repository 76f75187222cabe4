//! parking-deploy: build, deploy and schedule the parking booking Lambda
//!
//! Every command that talks to AWS validates its inputs and the caller's
//! identity first, then runs one workflow against live resource state.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_deploy::aws::{AwsContext, classify_anyhow_error, get_current_account_id};
use parking_deploy::command::CommandConfig;
use parking_deploy::config::{DeployConfig, DeployTarget, ProjectLayout, validate_name_and_region};
use parking_deploy::orchestrator::AwsOrchestrator;
use parking_deploy::{package, tasks};
use parking_deploy_common::FunctionEnvironment;
use parking_deploy_common::defaults::{
    DEFAULT_ARTIFACT_PATH, DEFAULT_ENV_FILE, DEFAULT_FUNCTION_NAME, DEFAULT_REGION,
    DEFAULT_SCHEDULE_EXPRESSION,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "parking-deploy")]
#[command(about = "Build, deploy and schedule the parking booking Lambda")]
#[command(version)]
struct Args {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by every command
#[derive(clap::Args, Debug)]
struct GlobalArgs {
    /// Lambda function name
    #[arg(long, global = true, env = "FUNCTION_NAME", default_value = DEFAULT_FUNCTION_NAME)]
    function_name: String,

    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long, global = true)]
    aws_profile: Option<String>,

    /// Environment file forwarded to the function
    #[arg(long, global = true, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Function zip artifact, relative to the project directory
    #[arg(long, global = true, default_value = DEFAULT_ARTIFACT_PATH)]
    artifact: PathBuf,

    /// Directory holding the handler source and requirements.txt
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Schedule expression of the trigger rule
    #[arg(long, global = true, default_value = DEFAULT_SCHEDULE_EXPRESSION)]
    schedule: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install the handler's dependencies locally
    Install,
    /// Remove build outputs and bytecode caches
    Clean,
    /// Run the handler locally with the environment file exported
    Run,
    /// Build the function zip artifact in the Lambda build image
    Build,
    /// Create the role, function, permission and schedule from scratch
    CreateEnv,
    /// Push the environment file to the deployed function
    UpdateEnv,
    /// Build, then update the deployed function's code and environment
    Deploy,
    /// Wire the schedule to an already deployed function
    CreateSchedule,
    /// Remove the local build image
    CleanImages,
    /// Tear down the schedule, the function and the role
    Cleanup,
}

/// Exit status after Ctrl-C (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// The running command was abandoned after Ctrl-C
#[derive(Debug, thiserror::Error)]
#[error("Interrupted")]
struct Interrupted;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if e.is::<Interrupted>() {
            eprintln!("Interrupted, exiting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    // Print main error message
    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    // Print error chain (causes)
    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if let Some(suggestion) = classify_anyhow_error(e).suggestion() {
        let _ = writeln!(stderr, "  \x1b[36mHint:\x1b[0m {suggestion}");
    }

    // Only print backtrace hint if not already showing
    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

/// SDK targets capped at warn unless RUST_LOG names them
const QUIET_TARGETS: [&str; 3] = ["aws_config", "aws_sdk", "aws_smithy"];

/// Filter directives: RUST_LOG when set (default `info`), plus the SDK caps
fn filter_directives(rust_log: Option<&str>) -> String {
    let mut directives = rust_log
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("info")
        .to_string();
    // Reduce noise from AWS SDK (show only warnings and errors)
    for target in QUIET_TARGETS {
        if !directives.contains(target) {
            directives.push_str(&format!(",{target}=warn"));
        }
    }
    directives
}

fn init_tracing() -> Result<()> {
    let rust_log = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).ok();
    let filter = tracing_subscriber::EnvFilter::try_new(filter_directives(rust_log.as_deref()))
        .context("Invalid RUST_LOG filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Cancel the returned token on the first Ctrl-C, exit on the second
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupted, cancelling (press Ctrl-C again to exit immediately)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted again, exiting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
    cancel
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;
    let cancel = cancel_on_interrupt();

    // Teardown watches the token itself and reports what it skipped
    if matches!(args.command, Command::Cleanup) {
        return execute(args, cancel).await;
    }

    // Dropping the command future kills any child process it spawned
    tokio::select! {
        result = execute(args, cancel.clone()) => result,
        () = cancel.cancelled() => Err(Interrupted.into()),
    }
}

async fn execute(args: Args, cancel: CancellationToken) -> Result<()> {
    let global = &args.global;
    let layout = ProjectLayout::new(&global.project_dir, &global.artifact);

    match args.command {
        Command::Install => tasks::install(&layout, &CommandConfig::for_build()).await?,

        Command::Clean => {
            for path in package::clean(&layout)? {
                println!("Removed {}", path.display());
            }
        }

        Command::Run => {
            let env = FunctionEnvironment::load(&global.env_file)?;
            tasks::run_handler(&layout, env.as_ref()).await?;
        }

        Command::Build => {
            let artifact = package::build_artifact(&layout, &CommandConfig::for_build()).await?;
            println!("Built {}", artifact.display());
        }

        Command::CleanImages => package::clean_images(&CommandConfig::for_housekeeping()).await,

        Command::CreateEnv => {
            let env = FunctionEnvironment::load(&global.env_file)?;
            let orchestrator = connect(global, &layout, env, cancel).await?;
            let report = orchestrator.provision().await?;
            println!("{report}");
        }

        Command::UpdateEnv => {
            let env = FunctionEnvironment::load_required(&global.env_file)?;
            let orchestrator = connect(global, &layout, Some(env), cancel).await?;
            orchestrator.update_environment().await?;
            println!("Environment of {} updated", orchestrator.config().function_name());
        }

        Command::Deploy => {
            // Validate before spending minutes on the build
            validate_name_and_region(&global.function_name, &global.region)?;
            package::build_artifact(&layout, &CommandConfig::for_build()).await?;

            let env = FunctionEnvironment::load(&global.env_file)?;
            let orchestrator = connect(global, &layout, env, cancel).await?;
            let report = orchestrator.update(false).await?;
            println!(
                "Function {} updated (code: {}, environment: {})",
                orchestrator.config().function_name(),
                report.code_updated,
                report.environment_updated
            );
        }

        Command::CreateSchedule => {
            let orchestrator = connect(global, &layout, None, cancel).await?;
            let rule_arn = orchestrator.create_schedule().await?;
            println!("Schedule rule: {rule_arn}");
        }

        Command::Cleanup => {
            let orchestrator = connect(global, &layout, None, cancel).await?;
            let report = orchestrator.deprovision().await;
            println!("{report}");
            if report.has_failures() {
                warn!(failed = report.failed(), "Some resources could not be removed; rerun cleanup");
            }
        }
    }

    Ok(())
}

/// Validate inputs and credentials, then build the orchestrator.
///
/// No resource call happens before both checks pass.
async fn connect(
    global: &GlobalArgs,
    layout: &ProjectLayout,
    environment: Option<FunctionEnvironment>,
    cancel: CancellationToken,
) -> Result<AwsOrchestrator> {
    let (function_name, region) = validate_name_and_region(&global.function_name, &global.region)?;

    if let Some(profile) = &global.aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }
    let aws = AwsContext::new(&region, global.aws_profile.as_deref()).await;
    let account_id = get_current_account_id(&aws.sts_client())
        .await
        .context("AWS identity check failed")?;

    let target = DeployTarget::new(&function_name, &region, account_id)?;
    let config = DeployConfig::new(target)
        .with_artifact(layout.artifact.clone())
        .with_environment(environment)
        .with_schedule_expression(global.schedule.clone());

    Ok(AwsOrchestrator::from_context(&aws, config).with_cancel(cancel))
}
