use colored::Colorize;
use decl_core::{format_summary, format_text};

use crate::context::Context;
use crate::engine::{ItemFailure, Outcome};

/// Render config objects for terminal output.
pub fn render_text(outcome: &Outcome) -> String {
    let raw = format_text(&outcome.result);
    let mut out = Vec::new();

    for line in raw.lines() {
        let colored = if line.starts_with('#') {
            line.yellow().to_string()
        } else if !line.starts_with(' ') && line.ends_with('{') {
            line.green().to_string()
        } else {
            line.to_string()
        };
        out.push(colored);
    }

    out.join("\n")
}

/// Render summary counts for terminal output.
pub fn render_summary(outcome: &Outcome) -> String {
    let mut out = format_summary(&outcome.result);
    out.push_str(&format!(
        "\nfailures={} skipped={}",
        outcome.failures.len(),
        outcome.skipped.len()
    ));
    out.cyan().to_string()
}

/// Render per-item failures and skipped classes.
pub fn render_problems(outcome: &Outcome) -> String {
    let mut out = Vec::new();
    for ItemFailure { path, class, error } in &outcome.failures {
        out.push(format!("FAIL class={class} path={path} reason={error}").red().to_string());
    }
    for path in &outcome.skipped {
        out.push(format!("SKIP path={path} reason=unsupported class").magenta().to_string());
    }
    out.join("\n")
}

/// Render which features the target version supports.
pub fn render_features(ctx: &Context<'_>) -> String {
    let mut out = vec![format!("target_version={}", ctx.target())];
    for (feature, gate) in ctx.features().gates() {
        let bounds = match &gate.max {
            Some(max) => format!("{}..{}", gate.min, max),
            None => format!("{}..", gate.min),
        };
        let line = format!("- {} {bounds}", feature.name());
        if ctx.supports(feature) {
            out.push(format!("{} supported", line).green().to_string());
        } else {
            out.push(format!("{} unsupported", line).red().to_string());
        }
    }
    out.join("\n")
}
