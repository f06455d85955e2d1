//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use qstudio_graph::{NodeKind, Template};
use qstudio_sync::{EditorSession, SkippedSubstitution};

/// Read a text file.
pub fn read_text(path: &Path) -> Result<String> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Load a template from a YAML manifest or a marked-up source file.
///
/// Source files get a template derived from their sections, named after
/// the file stem.
pub fn load_template(path: &Path) -> Result<Template> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "yaml" | "yml" => Template::from_manifest_file(path)
            .with_context(|| format!("Failed to load manifest: {}", path.display())),
        _ => {
            let source = read_text(path)?;
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "program".to_string());
            Ok(Template::from_source(id, source))
        }
    }
}

/// A session with `path` loaded.
pub fn load_session(path: &Path) -> Result<EditorSession> {
    let template = load_template(path)?;
    let mut session = EditorSession::new();
    session
        .load_template(&template)
        .with_context(|| format!("Failed to instantiate template '{}'", template.id))?;
    Ok(session)
}

/// Parse a node kind name.
pub fn parse_kind(name: &str) -> Result<NodeKind> {
    NodeKind::parse(name).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown node kind: '{name}'. Available: circuit, transpile, execute, post_process"
        )
    })
}

/// Write `text` to `output`, or print it to stdout.
pub fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("Failed to write file: {}", path.display()))?;
            eprintln!("{} Wrote {}", style("✓").green().bold(), style(path.display()).green());
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Report substitutions the last rebuild skipped.
pub fn report_skipped(skipped: &[SkippedSubstitution]) {
    for skip in skipped {
        eprintln!(
            "{} {} ({:?}): {:?}, left unchanged",
            style("!").yellow().bold(),
            skip.node_id,
            skip.slot,
            skip.reason
        );
    }
}
