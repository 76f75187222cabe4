//! Local developer tasks: dependency install and a local handler run

use crate::command::{CommandConfig, CommandSpec, run_command};
use crate::config::ProjectLayout;
use anyhow::{Context, Result, bail};
use parking_deploy_common::FunctionEnvironment;
use parking_deploy_common::defaults::{FUNCTION_TIMEOUT_SECS, HANDLER_FILE, REQUIREMENTS_FILE};
use tracing::info;

const PYTHON: &str = "python3";

/// Install the handler's dependencies into the local Python environment
pub async fn install(layout: &ProjectLayout, config: &CommandConfig) -> Result<()> {
    if !layout.requirements_path().is_file() {
        bail!(
            "Dependency manifest {} not found",
            layout.requirements_path().display()
        );
    }

    let spec = install_command(layout);
    run_command(&spec, config)
        .await
        .context("Dependency install failed")?;
    info!("Dependencies installed");
    Ok(())
}

fn install_command(layout: &ProjectLayout) -> CommandSpec {
    CommandSpec::new(PYTHON)
        .args(["-m", "pip", "install", "-r", REQUIREMENTS_FILE])
        .current_dir(&layout.project_dir)
}

/// Run the handler locally with the environment file's variables exported
pub async fn run_handler(layout: &ProjectLayout, env: Option<&FunctionEnvironment>) -> Result<()> {
    if !layout.handler_path().is_file() {
        bail!("Handler source {} not found", layout.handler_path().display());
    }

    let spec = run_command_spec(layout, env);
    // The deployed function gets the same limit
    let config = CommandConfig::with_timeout_secs(FUNCTION_TIMEOUT_SECS as u64 + 30);
    run_command(&spec, &config)
        .await
        .context("Local handler run failed")?;
    Ok(())
}

fn run_command_spec(layout: &ProjectLayout, env: Option<&FunctionEnvironment>) -> CommandSpec {
    let spec = CommandSpec::new(PYTHON)
        .arg(HANDLER_FILE)
        .current_dir(&layout.project_dir);
    match env {
        Some(env) => spec.envs(env.vars().iter().map(|(k, v)| (k.clone(), v.clone()))),
        None => spec,
    }
}
