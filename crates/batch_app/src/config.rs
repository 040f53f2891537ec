//! Loading the identifier list and downloader settings.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use batch_core::parse_identifiers;
use batch_engine::ToolConfig;

use crate::cli::Cli;

pub(crate) fn load_identifiers(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read list file {}", path.display()))?;
    Ok(parse_identifiers(&raw))
}

/// Settings from `--config` (or defaults), with command-line overrides applied.
pub(crate) fn build_tool_config(args: &Cli) -> Result<ToolConfig> {
    let mut config = match args.config.as_deref() {
        Some(path) => load_tool_config(path)?,
        None => ToolConfig::default(),
    };

    if let Some(tool) = &args.tool {
        config.program = tool.clone();
    }
    if !args.tool_args.is_empty() {
        config.program_args = args.tool_args.clone();
    }
    if let Some(format) = &args.format {
        config.format = format.clone();
    }
    if let Some(bitrate) = &args.bitrate {
        config.bitrate = bitrate.clone();
    }
    if let Some(template) = &args.output_template {
        config.output_template = template.clone();
    }
    if let Some(policy) = args.stop_policy {
        config.stop_policy = policy.into();
    }
    Ok(config)
}

fn load_tool_config(path: &Path) -> Result<ToolConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    ron::from_str(&content).with_context(|| format!("failed to parse config {}", path.display()))
}
