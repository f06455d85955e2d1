//! Run command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use qstudio_oracle::{ExecutionOracle, HttpExecutionOracle};

use super::common::load_session;
use crate::config::Config;

/// Execute the run command.
pub async fn execute(config: &Config, input: &Path, local: bool, json: bool) -> Result<()> {
    let mut session = load_session(input)?;
    let credentials = if local {
        None
    } else {
        config.backend.credentials()
    };

    let oracle = HttpExecutionOracle::new(&config.oracles.execution_endpoint())
        .context("Failed to create execution client")?;

    eprintln!(
        "{} Running {} on {}",
        style("→").cyan().bold(),
        style(input.display()).green(),
        style(if credentials.is_some() {
            "IBM Quantum runtime"
        } else {
            "local simulator"
        })
        .yellow()
    );
    eprintln!("  Service: {}", style(oracle.url()).dim());

    let request = session.begin_execution(credentials.as_ref());
    let response = oracle
        .execute(&request)
        .await
        .context("Program execution failed")?;
    let report = session.complete_execution(&response)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    eprintln!("{} Execution complete", style("✓").green().bold());
    println!("{}", report.output.trim_end());

    match (&report.result, &report.routed_to) {
        (Some(result), Some(node)) => {
            eprintln!();
            eprintln!("Result ({:?}) → {}", result.kind, style(node).green());
            eprintln!("  {}", serde_json::to_string(&result.content)?);
        }
        (Some(result), None) => {
            eprintln!();
            eprintln!(
                "{} Result ({:?}) has no post-process node to receive it",
                style("!").yellow().bold(),
                result.kind
            );
        }
        _ => {}
    }

    Ok(())
}
