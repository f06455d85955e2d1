//! Sections command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;
use qstudio_source::{SectionKind, highlight::line_range, parse};
use serde::Serialize;

use super::common::read_text;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SectionRow<'a> {
    index: usize,
    name: &'a str,
    kind: SectionKind,
    step: Option<u32>,
    role: String,
    start_line: usize,
    end_line: usize,
    has_input: bool,
}

/// Execute the sections command.
pub fn execute(input: &Path, format: &str) -> Result<()> {
    let source = read_text(input)?;
    let parsed = parse(&source);

    let rows: Vec<SectionRow<'_>> = parsed
        .sections
        .iter()
        .enumerate()
        .map(|(index, section)| {
            let (start_line, end_line) = line_range(&source, &section.span);
            SectionRow {
                index,
                name: &section.name,
                kind: section.kind,
                step: section.step,
                role: section.role.to_string(),
                start_line,
                end_line,
                has_input: section.has_input(),
            }
        })
        .collect();

    match format {
        "json" => {
            let doc = serde_json::json!({
                "sections": rows,
                "warnings": parsed.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        "table" => {
            if rows.is_empty() {
                println!("{} No section markers found", style("!").yellow().bold());
            } else {
                println!(
                    "{:<4} {:<6} {:<5} {:<16} {:<10} {}",
                    style("#").bold(),
                    style("KIND").bold(),
                    style("STEP").bold(),
                    style("ROLE").bold(),
                    style("LINES").bold(),
                    style("NAME").bold()
                );
                for row in &rows {
                    let kind = match row.kind {
                        SectionKind::Step => "step",
                        SectionKind::Node => "node",
                        SectionKind::Document => "doc",
                    };
                    let step = row.step.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
                    let lines = format!("{}-{}", row.start_line + 1, row.end_line + 1);
                    let input_mark = if row.has_input { " [input]" } else { "" };
                    println!(
                        "{:<4} {:<6} {:<5} {:<16} {:<10} {}{}",
                        row.index,
                        kind,
                        step,
                        row.role,
                        lines,
                        style(row.name).green(),
                        style(input_mark).dim()
                    );
                }
            }
            for warning in &parsed.warnings {
                eprintln!("{} {}", style("warning:").yellow().bold(), warning);
            }
        }
        other => anyhow::bail!("Unknown format: '{other}'. Available: table, json"),
    }

    Ok(())
}
