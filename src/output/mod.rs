mod styling;

use anyhow::Result;
use console::Term;
use log::info;
use serde::Serialize;
use std::path::Path;

use crate::bamboo::StopOutcome;
use styling::{bright_green, bright_red, dim, magenta_bold};

/// Prints the `bamboo-mcp` banner to stderr.
///
/// Skipped when stderr is not a terminal, e.g. when launched by an agent client.
pub fn print_banner() {
    if !Term::stderr().is_term() {
        return;
    }

    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🎋 bamboo-mcp"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Bamboo CI tools for agents")
    );
}

/// One-line summary of a stop request, on stderr.
pub fn print_stop_summary(outcome: &StopOutcome) {
    if outcome.success {
        eprintln!("{} {}", bright_green("✔"), outcome.message);
    } else {
        eprintln!("{} {}", bright_red("✘"), outcome.message);
    }

    if let Some(cancellation) = &outcome.cancellation {
        for job in &cancellation.failed_jobs {
            eprintln!("  {} {}", bright_red("failed:"), dim(job));
        }
    }
}

pub fn render_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// Write JSON to `path`, or stdout when no path is given.
pub fn emit_json<T: Serialize>(value: &T, pretty: bool, path: Option<&Path>) -> Result<()> {
    let json = render_json(value, pretty)?;

    if let Some(path) = path {
        std::fs::write(path, json)?;
        info!("Output written to: {}", path.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
