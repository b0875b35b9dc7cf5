use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::{ConfigObject, TranslationResult};

/// Format a translation result as command-language-like text.
///
/// Each config object becomes a `<command> <path> { ... }` block; nested
/// property maps are rendered as nested braces, and empty maps (set members)
/// collapse to their key.
pub fn format_text(result: &TranslationResult) -> String {
    let mut lines = Vec::new();
    for config in &result.configs {
        render_config(config, &mut lines);
    }
    for update in &result.path_updates {
        lines.push(format!("# path {} -> {}", update.old_string, update.new_string));
    }
    lines.join("\n")
}

/// Format counts of emitted config objects by command.
pub fn format_summary(result: &TranslationResult) -> String {
    let mut by_command: BTreeMap<&str, usize> = BTreeMap::new();
    for config in &result.configs {
        *by_command.entry(config.command.as_str()).or_default() += 1;
    }
    let mut out = format!(
        "configs={} commands={} path_updates={}",
        result.configs.len(),
        by_command.len(),
        result.path_updates.len()
    );
    for (command, count) in by_command {
        out.push_str(&format!("\n  {command}={count}"));
    }
    out
}

fn render_config(config: &ConfigObject, lines: &mut Vec<String>) {
    lines.push(format!("{} {} {{", config.command, config.path));
    for (key, value) in &config.properties {
        render_value(key, value, 1, lines);
    }
    if !config.ignore.is_empty() {
        lines.push(format!("    # ignore {}", config.ignore.join(" ")));
    }
    lines.push("}".to_string());
}

fn render_value(key: &str, value: &Value, depth: usize, lines: &mut Vec<String>) {
    let indent = "    ".repeat(depth);
    match value {
        Value::Object(map) if map.is_empty() => lines.push(format!("{indent}{key}")),
        Value::Object(map) => {
            lines.push(format!("{indent}{key} {{"));
            for (child_key, child) in map {
                render_value(child_key, child, depth + 1, lines);
            }
            lines.push(format!("{indent}}}"));
        }
        Value::Array(items) => {
            let rendered = items.iter().map(scalar).collect::<Vec<_>>().join(" ");
            lines.push(format!("{indent}{key} {{ {rendered} }}"));
        }
        other => lines.push(format!("{indent}{key} {}", scalar(other))),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "none".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{format_summary, format_text};
    use crate::config::{ConfigObject, TranslationResult};

    fn sample() -> TranslationResult {
        let mut pool = ConfigObject::new("/t/a/pool", "ltm pool");
        pool.set("load-balancing-mode", "round-robin");
        pool.set("members", json!({ "/t/192.0.2.4:80": { "ratio": 1 } }));
        let node = ConfigObject::new("/t/192.0.2.4", "ltm node");
        TranslationResult {
            configs: vec![node, pool],
            ..TranslationResult::default()
        }
    }

    #[test]
    fn renders_nested_blocks() {
        let text = format_text(&sample());
        assert!(text.contains("ltm pool /t/a/pool {"));
        assert!(text.contains("    load-balancing-mode round-robin"));
        assert!(text.contains("        /t/192.0.2.4:80 {"));
        assert!(text.contains("            ratio 1"));
    }

    #[test]
    fn summary_counts_by_command() {
        let summary = format_summary(&sample());
        assert!(summary.starts_with("configs=2 commands=2 path_updates=0"));
        assert!(summary.contains("ltm node=1"));
    }
}
