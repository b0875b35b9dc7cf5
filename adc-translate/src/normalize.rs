//! Property normalization shared by every translator.
//!
//! Boolean spellings are fixed per property on the appliance side
//! (`enabled`/`disabled`, `yes`/`no`, `true`/`false`), so each translator
//! picks the helper matching the property it emits rather than relying on a
//! global default.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Value written for an `indefinite` numeric setting.
pub const INDEFINITE_MAX: u64 = 4_294_967_295;
const INDEFINITE: &str = "indefinite";

pub fn enabled_disabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn true_false(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}

/// `indefinite` becomes [`INDEFINITE_MAX`]; other values pass through.
pub fn indefinite_as_max(value: &Value) -> Value {
    match value {
        Value::String(s) if s == INDEFINITE => Value::from(INDEFINITE_MAX),
        other => other.clone(),
    }
}

/// Keeps `indefinite` as the literal keyword; numbers pass through.
pub fn indefinite_as_literal(value: &Value) -> Value {
    match value {
        Value::String(s) if s == INDEFINITE => Value::from(INDEFINITE),
        Value::Number(n) if n.as_u64() == Some(INDEFINITE_MAX) => Value::from(INDEFINITE),
        other => other.clone(),
    }
}

/// Wrap `raw` in double quotes, backslash-escaping `{ } $ [ ] " ; \`.
pub fn quote_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        if matches!(ch, '{' | '}' | '$' | '[' | ']' | '"' | ';' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Quoted text, or the bare keyword `none` when absent or empty.
pub fn quote_or_none(raw: Option<&str>) -> String {
    match raw {
        Some(text) if !text.is_empty() => quote_string(text),
        _ => "none".to_string(),
    }
}

/// `remark` → `description` for any declared object.
pub fn description(item: &Value) -> Value {
    Value::String(quote_or_none(item.get("remark").and_then(Value::as_str)))
}

/// Set semantics: `{ "a": {}, "b": {} }`.
pub fn to_set<I, S>(values: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Object(
        values
            .into_iter()
            .map(|v| (v.into(), Value::Object(Map::new())))
            .collect(),
    )
}

/// Set, or the bare keyword `none` when empty.
pub fn to_set_or_none<I, S>(values: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    match to_set(values) {
        Value::Object(map) if map.is_empty() => Value::from("none"),
        set => set,
    }
}

/// Ordered semantics: each value carries its position under `field`.
pub fn to_ordered_map<I, S>(values: I, field: &str) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut map = Map::new();
    for (idx, value) in values.into_iter().enumerate() {
        let mut entry = Map::new();
        entry.insert(field.to_string(), Value::from(idx));
        map.insert(value.into(), Value::Object(entry));
    }
    Value::Object(map)
}

/// Split `addr%rd` into the bare address and its route domain.
pub fn split_route_domain(addr: &str) -> (&str, Option<u32>) {
    match addr.rsplit_once('%') {
        Some((bare, rd)) => match rd.parse::<u32>() {
            Ok(rd) => (bare, Some(rd)),
            Err(_) => (addr, None),
        },
        None => (addr, None),
    }
}

/// Apply a route domain: an explicit `%0` is dropped, an explicit `%N` is
/// kept, and a bare address gains `%rd` when `rd` is not zero.
pub fn with_route_domain(addr: &str, rd: u32) -> String {
    match split_route_domain(addr) {
        (bare, Some(0)) => bare.to_string(),
        (_, Some(_)) => addr.to_string(),
        (bare, None) if rd == 0 => bare.to_string(),
        (bare, None) => format!("{bare}%{rd}"),
    }
}

/// One deprecated-name rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AliasRule {
    pub class: String,
    /// Dotted property path inside the object; empty means the object root.
    #[serde(default)]
    pub scope: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
struct AliasFile {
    #[serde(default)]
    alias: Vec<AliasRule>,
}

/// Errors returned when loading an alias file.
#[derive(Debug, Error)]
pub enum AliasLoadError {
    #[error("failed to read alias file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse alias file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Deprecated property names mapped to their current spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    rules: Vec<AliasRule>,
}

impl AliasTable {
    /// Built-in table shipped with the crate.
    pub fn embedded() -> Self {
        let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/aliases.toml"));
        match parse_aliases(raw, "embedded aliases".to_string()) {
            Ok(table) if !table.rules.is_empty() => table,
            _ => Self::fallback(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, AliasLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| AliasLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_aliases(&raw, path.display().to_string())
    }

    pub fn rules(&self) -> &[AliasRule] {
        &self.rules
    }

    /// Rename deprecated properties of one declared object. The input is
    /// borrowed unchanged when nothing applies. When both spellings are
    /// present the current one wins.
    pub fn apply<'v>(&self, class: &str, item: &'v Value) -> Cow<'v, Value> {
        let applicable: Vec<&AliasRule> = self
            .rules
            .iter()
            .filter(|rule| rule.class == class && scope_has(item, &rule.scope, &rule.from))
            .collect();
        if applicable.is_empty() {
            return Cow::Borrowed(item);
        }

        let mut owned = item.clone();
        for rule in applicable {
            let Some(target) = scope_mut(&mut owned, &rule.scope) else {
                continue;
            };
            if let Some(old) = target.remove(&rule.from) {
                target.entry(rule.to.clone()).or_insert(old);
            }
        }
        Cow::Owned(owned)
    }

    fn fallback() -> Self {
        let rule = |class: &str, scope: &str, from: &str, to: &str| AliasRule {
            class: class.to_string(),
            scope: scope.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        };
        Self {
            rules: vec![
                rule("DOS_Profile", "", "whitelist", "allowlist"),
                rule("TCP_Profile", "", "synCookieWhitelist", "synCookieAllowlist"),
            ],
        }
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::embedded()
    }
}

fn parse_aliases(raw: &str, path: String) -> Result<AliasTable, AliasLoadError> {
    let parsed: AliasFile =
        toml::from_str(raw).map_err(|source| AliasLoadError::Parse { path, source })?;
    Ok(AliasTable {
        rules: parsed.alias,
    })
}

fn scope_segments(scope: &str) -> impl Iterator<Item = &str> {
    scope.split('.').filter(|s| !s.is_empty())
}

fn scope_has(item: &Value, scope: &str, key: &str) -> bool {
    let mut current = item;
    for segment in scope_segments(scope) {
        match current.get(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    current.get(key).is_some()
}

fn scope_mut<'v>(item: &'v mut Value, scope: &str) -> Option<&'v mut Map<String, Value>> {
    let mut current = item;
    for segment in scope_segments(scope) {
        current = current.get_mut(segment)?;
    }
    current.as_object_mut()
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use serde_json::json;

    use super::{
        enabled_disabled, indefinite_as_literal, indefinite_as_max, quote_or_none, quote_string,
        split_route_domain, to_ordered_map, to_set, to_set_or_none, true_false, with_route_domain,
        yes_no, AliasTable, INDEFINITE_MAX,
    };

    #[test]
    fn boolean_spellings_cover_both_values() {
        for flag in [true, false] {
            let expected = if flag {
                ("enabled", "yes", "true")
            } else {
                ("disabled", "no", "false")
            };
            assert_eq!(
                (enabled_disabled(flag), yes_no(flag), true_false(flag)),
                expected
            );
        }
    }

    #[test]
    fn quotes_and_escapes_special_characters() {
        assert_eq!(quote_string("A description"), "\"A description\"");
        assert_eq!(quote_string("${x}"), r#""\$\{x\}""#);
        assert_eq!(quote_string(r#"a;"b"\[c]"#), r#""a\;\"b\"\\\[c\]""#);
        assert_eq!(quote_or_none(None), "none");
        assert_eq!(quote_or_none(Some("")), "none");
    }

    #[test]
    fn indefinite_has_two_renderings() {
        assert_eq!(indefinite_as_max(&json!("indefinite")), json!(INDEFINITE_MAX));
        assert_eq!(indefinite_as_max(&json!(30)), json!(30));
        assert_eq!(indefinite_as_literal(&json!("indefinite")), json!("indefinite"));
        assert_eq!(indefinite_as_literal(&json!(INDEFINITE_MAX)), json!("indefinite"));
        assert_eq!(indefinite_as_literal(&json!(10)), json!(10));
    }

    #[test]
    fn route_domain_suffix_is_idempotent() {
        assert_eq!(with_route_domain("192.0.2.4", 100), "192.0.2.4%100");
        assert_eq!(with_route_domain("192.0.2.4%100", 100), "192.0.2.4%100");
        assert_eq!(with_route_domain("192.0.2.4%0", 100), "192.0.2.4");
        assert_eq!(with_route_domain("192.0.2.4%2", 100), "192.0.2.4%2");
        assert_eq!(with_route_domain("2001:db8::1", 0), "2001:db8::1");
        assert_eq!(split_route_domain("10.0.0.1%7"), ("10.0.0.1", Some(7)));
    }

    #[test]
    fn sets_and_ordered_maps() {
        assert_eq!(to_set(["b", "a"]), json!({ "a": {}, "b": {} }));
        assert_eq!(to_set_or_none(Vec::<String>::new()), json!("none"));
        assert_eq!(
            to_ordered_map(["/t/a/r2", "/t/a/r1"], "order"),
            json!({ "/t/a/r2": { "order": 0 }, "/t/a/r1": { "order": 1 } })
        );
    }

    #[test]
    fn aliases_rename_nested_properties_without_mutating_input() {
        let table = AliasTable::embedded();
        let dos = json!({
            "class": "DOS_Profile",
            "whitelist": { "use": "addr" },
            "application": { "botDefense": { "urlWhitelist": ["a"] } }
        });
        let renamed = table.apply("DOS_Profile", &dos);
        assert!(matches!(renamed, Cow::Owned(_)));
        assert_eq!(renamed["allowlist"], json!({ "use": "addr" }));
        assert_eq!(
            renamed["application"]["botDefense"]["urlAllowlist"],
            json!(["a"])
        );
        assert!(dos.get("allowlist").is_none());

        let untouched = json!({ "class": "DOS_Profile", "allowlist": {} });
        assert!(matches!(
            table.apply("DOS_Profile", &untouched),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn current_spelling_wins_over_deprecated_one() {
        let table = AliasTable::embedded();
        let tcp = json!({ "synCookieWhitelist": false, "synCookieAllowlist": true });
        let renamed = table.apply("TCP_Profile", &tcp);
        assert_eq!(renamed["synCookieAllowlist"], json!(true));
        assert!(renamed.get("synCookieWhitelist").is_none());
    }
}
