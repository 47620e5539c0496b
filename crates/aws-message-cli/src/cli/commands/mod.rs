mod decode;
mod gather;
mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use aws_message::{DecodeError, GatherConfig, GatherError};

use super::args::{Command, ConfigArgs};
use crate::exit_codes;

pub async fn dispatch(cli: super::args::Cli) -> Result<i32> {
    match cli.cmd {
        Command::Verify(args) => Ok(verify::cmd_verify(args).await),
        Command::Decode(args) => Ok(decode::cmd_decode(args).await),
        Command::Gather(args) => Ok(gather::cmd_gather(args).await),
    }
}

/// File (if any), then environment, then command-line flags.
pub(crate) fn load_config(args: &ConfigArgs) -> Result<GatherConfig> {
    let base = match &args.config {
        Some(path) => GatherConfig::from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => GatherConfig::default(),
    };

    let mut config = base
        .with_env_overrides(|name| std::env::var(name).ok())
        .context("invalid AWS_MESSAGE_* environment")?;

    if let Some(bundle) = &args.trust_bundle {
        config = config.with_trust_bundle_path(bundle);
    }
    Ok(config)
}

pub(crate) fn read_envelope(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read envelope: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse envelope JSON: {}", path.display()))
}

/// Map an error chain to an exit code.
pub(crate) fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<DecodeError>() {
        return e.exit_code();
    }
    if let Some(e) = err.downcast_ref::<GatherError>() {
        return e.exit_code();
    }
    if err.downcast_ref::<aws_message::ConfigError>().is_some() {
        return exit_codes::CONFIG_ERROR;
    }
    exit_codes::FAILED
}
