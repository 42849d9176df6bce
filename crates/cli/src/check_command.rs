use std::path::Path;

use {
    anyhow::Result,
    tandem_config::{Severity, discover_and_load, validate},
};

use crate::bridge_config::bridge_config;

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Validate the config file and print the relay topology without connecting.
///
/// Returns `false` when the config has errors.
pub fn check(path: Option<&Path>) -> Result<bool> {
    let (path, config) = discover_and_load(path)?;
    eprintln!("Checking {}\n", path.display());

    let result = validate(&config);
    for d in &result.diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }
    if !result.diagnostics.is_empty() {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors > 0 {
        eprintln!("{errors} error(s), {warnings} warning(s)");
        return Ok(false);
    }

    let bridge = bridge_config(&config)?;
    println!(
        "irc {} as {}{}",
        bridge.irc.host,
        bridge.irc.nick,
        if bridge.irc.tls { " (tls)" } else { "" }
    );
    for edge in bridge.topology.edges() {
        println!("  {edge}");
    }

    if warnings == 0 {
        eprintln!("\nNo issues found.");
    } else {
        eprintln!("\n{warnings} warning(s)");
    }
    Ok(true)
}
