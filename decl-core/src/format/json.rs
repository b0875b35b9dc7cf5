use crate::config::TranslationResult;

/// Format a translation result as pretty JSON.
pub fn format_json(result: &TranslationResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
}
