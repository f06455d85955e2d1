//! Edit command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use qstudio_graph::NodeId;
use qstudio_sync::Prelude;

use super::common::{emit, load_session, read_text, report_skipped};

/// Which fragment of the node to replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditSlot {
    /// The section's primary body.
    Primary,
    /// The section's `INPUT PYTHON` region.
    Input,
}

/// Execute the edit command.
pub fn execute(
    input: &Path,
    node: &str,
    code: Option<&str>,
    code_file: Option<&Path>,
    slot: EditSlot,
    local: bool,
    output: Option<&Path>,
) -> Result<()> {
    let code = match (code, code_file) {
        (Some(code), None) => code.to_string(),
        (None, Some(path)) => read_text(path)?,
        (Some(_), Some(_)) => anyhow::bail!("Pass either --code or --code-file, not both"),
        (None, None) => anyhow::bail!("Missing replacement code: pass --code or --code-file"),
    };

    let mut session = load_session(input)?;
    let node_id = NodeId::from(node);
    if session.graph().node(&node_id).is_none() {
        let known: Vec<String> = session.graph().nodes().map(|n| n.id.to_string()).collect();
        anyhow::bail!("Unknown node '{node}'. Nodes: {}", known.join(", "));
    }

    let updated = match slot {
        EditSlot::Primary => session.set_primary_fragment(&node_id, code),
        EditSlot::Input => session.set_raw_input(&node_id, code),
    };
    updated.with_context(|| format!("Failed to update node '{node}'"))?;

    if local {
        session.set_prelude(Some(Prelude::LocalSimulator));
    }

    eprintln!(
        "{} Updated {} ({:?})",
        style("→").cyan().bold(),
        style(node).green(),
        slot
    );
    report_skipped(session.skipped());
    emit(session.source(), output)
}
