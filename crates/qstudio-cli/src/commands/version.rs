//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - graph and source synchronization for quantum programs",
        style("qstudio").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qstudio-source  Section markers, parsing and highlighting");
    println!("  qstudio-graph   Program graph, templates and composition");
    println!("  qstudio-oracle  Code-generation and execution clients");
    println!("  qstudio-sync    Graph/source reconciliation sessions");
    println!("  qstudio-cli     Command-line interface");
}
