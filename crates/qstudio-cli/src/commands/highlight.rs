//! Highlight command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;
use qstudio_source::highlight::{HighlightQuery, resolve};

use super::common::{parse_kind, read_text};

/// Execute the highlight command.
pub fn execute(
    input: &Path,
    label: &str,
    kind: Option<&str>,
    category: Option<&str>,
    json: bool,
) -> Result<()> {
    let source = read_text(input)?;

    let mut query = HighlightQuery::label(label);
    if let Some(kind) = kind {
        query = query.with_role(parse_kind(kind)?.role());
    }
    if let Some(category) = category {
        query = query.with_category(category);
    }

    let Some(highlight) = resolve(&query, &source) else {
        anyhow::bail!("No section matches '{label}' in {}", input.display());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&highlight)?);
        return Ok(());
    }

    println!(
        "{} {} → lines {}-{}",
        style("✓").green().bold(),
        style(label).green(),
        highlight.start_line + 1,
        highlight.end_line + 1
    );
    if let Some(step) = highlight.step {
        println!("  Step:  {}", style(step).yellow());
    }
    for line in source
        .lines()
        .skip(highlight.start_line)
        .take(highlight.end_line - highlight.start_line + 1)
    {
        println!("  {}", style(line).dim());
    }

    Ok(())
}
