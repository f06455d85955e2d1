//! Generate command implementation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use qstudio_graph::NodeId;
use qstudio_oracle::HttpCodegenOracle;
use qstudio_sync::{ParameterUpdate, SessionHandle};
use serde_json::Value;

use super::common::{emit, load_session};
use crate::config::Config;

/// Execute the generate command.
pub async fn execute(
    config: &Config,
    input: &Path,
    node: &str,
    param: &str,
    value: &str,
    output: Option<&Path>,
) -> Result<()> {
    let value = parse_value(value);
    eprintln!(
        "{} Setting {}.{} = {}",
        style("→").cyan().bold(),
        style(node).green(),
        param,
        style(&value).yellow()
    );

    let session = load_session(input)?;
    let oracle = HttpCodegenOracle::new(&config.oracles.codegen_endpoint())
        .context("Failed to create code-generation client")?;
    eprintln!("  Oracle: {}", style(oracle.url()).dim());

    let handle = SessionHandle::spawn(
        session,
        Arc::new(oracle),
        config.oracles.codegen_timeout(),
    );

    let update = handle
        .request_parameter_change(NodeId::from(node), param, value)
        .await
        .with_context(|| format!("Failed to update '{param}' on node '{node}'"))?;

    match update {
        ParameterUpdate::Applied(change) if !change.changed => {
            eprintln!("{} Value unchanged", style("✓").green().bold());
        }
        ParameterUpdate::Applied(_) => {
            eprintln!("{} Parameter stored", style("✓").green().bold());
        }
        ParameterUpdate::Regenerated { pending } => {
            eprintln!("{} Code regenerated", style("✓").green().bold());
            if pending {
                eprintln!(
                    "{} New code has no section in the source yet",
                    style("!").yellow().bold()
                );
            }
        }
        ParameterUpdate::Duplicate | ParameterUpdate::Stale => {
            eprintln!("{} Update dropped: {:?}", style("!").yellow().bold(), update);
        }
    }

    let source = handle.source().await?;
    emit(&source, output)
}

/// Parse a CLI value as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
