//! Compose command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use qstudio_graph::{GraphSnapshot, ProgramGraph, compose};
use qstudio_sync::Prelude;

use super::common::{emit, read_text};
use crate::config::Config;

/// Execute the compose command.
pub fn execute(
    config: &Config,
    input: &Path,
    with_prelude: bool,
    local: bool,
    output: Option<&Path>,
) -> Result<()> {
    let graph = load_graph(input)?;
    eprintln!(
        "{} Composing {} nodes, {} edges",
        style("→").cyan().bold(),
        graph.len(),
        graph.edges().len()
    );

    let mut text = compose(&graph);
    if with_prelude {
        let credentials = if local {
            None
        } else {
            config.backend.credentials()
        };
        text = Prelude::for_credentials(credentials.as_ref()).apply(&text);
    }

    emit(&text, output)
}

/// Load a graph snapshot from JSON or YAML.
pub fn load_graph(path: &Path) -> Result<ProgramGraph> {
    let content = read_text(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let snapshot: GraphSnapshot = match ext.as_str() {
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse graph JSON: {}", path.display()))?,
        _ => serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse graph YAML: {}", path.display()))?,
    };

    ProgramGraph::from_snapshot(snapshot)
        .with_context(|| format!("Invalid graph: {}", path.display()))
}
