//! qstudio command-line interface.
//!
//! Works on Qiskit programs laid out in `## STEP` / `###[Node]` sections:
//! lists and highlights sections, applies node edits through the
//! reconciler, regenerates code through the code-generation service and
//! runs programs on the execution service.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

mod commands;
mod config;
mod logging;

use commands::edit::EditSlot;
use commands::{compose, edit, generate, highlight, run, sections, version};
use config::Config;
use logging::{TracingConfig, init_tracing};

/// qstudio - keep a program graph and its Qiskit source in sync
#[derive(Parser)]
#[command(name = "qstudio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (YAML)
    #[arg(short, long, env = "QSTUDIO_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sections of a program
    Sections {
        /// Program source
        input: PathBuf,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show the lines a node owns
    Highlight {
        /// Program source
        input: PathBuf,

        /// Node label
        #[arg(short, long)]
        label: String,

        /// Node kind (circuit, transpile, execute, post_process)
        #[arg(short, long)]
        kind: Option<String>,

        /// Node category, tried when the label finds nothing
        #[arg(long)]
        category: Option<String>,

        /// Print the highlight as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace a node's code and print the reconciled program
    Edit {
        /// Program source or template manifest
        input: PathBuf,

        /// Node ID
        #[arg(short, long)]
        node: String,

        /// Replacement code
        #[arg(long, conflicts_with = "code_file")]
        code: Option<String>,

        /// File holding the replacement code
        #[arg(long)]
        code_file: Option<PathBuf>,

        /// Replace the node's INPUT PYTHON region instead of its body
        #[arg(long)]
        input_region: bool,

        /// Insert the local simulator config step
        #[arg(long)]
        local: bool,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Change a node parameter and regenerate its code
    Generate {
        /// Program source or template manifest
        input: PathBuf,

        /// Node ID
        #[arg(short, long)]
        node: String,

        /// Parameter name
        #[arg(short, long)]
        param: String,

        /// New value (JSON, or a plain string)
        #[arg(long)]
        value: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compose a program from a graph snapshot
    Compose {
        /// Graph snapshot (YAML or JSON)
        input: PathBuf,

        /// Add the backend config step
        #[arg(long)]
        prelude: bool,

        /// Use the local simulator config even when credentials are set
        #[arg(long)]
        local: bool,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a program on the execution service
    Run {
        /// Program source or template manifest
        input: PathBuf,

        /// Run on the local simulator even when credentials are set
        #[arg(long)]
        local: bool,

        /// Print the execution report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    init_tracing(&TracingConfig::resolve(&config.logging, cli.verbose));
    tracing::debug!(?config, "Configuration loaded");

    let result = match cli.command {
        Commands::Sections { input, format } => sections::execute(&input, &format),

        Commands::Highlight {
            input,
            label,
            kind,
            category,
            json,
        } => highlight::execute(&input, &label, kind.as_deref(), category.as_deref(), json),

        Commands::Edit {
            input,
            node,
            code,
            code_file,
            input_region,
            local,
            output,
        } => {
            let slot = if input_region {
                EditSlot::Input
            } else {
                EditSlot::Primary
            };
            edit::execute(
                &input,
                &node,
                code.as_deref(),
                code_file.as_deref(),
                slot,
                local,
                output.as_deref(),
            )
        }

        Commands::Generate {
            input,
            node,
            param,
            value,
            output,
        } => generate::execute(&config, &input, &node, &param, &value, output.as_deref()).await,

        Commands::Compose {
            input,
            prelude,
            local,
            output,
        } => compose::execute(&config, &input, prelude, local, output.as_deref()),

        Commands::Run { input, local, json } => run::execute(&config, &input, local, json).await,

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
