//! Whole-batch passes run after every item has been translated.

use std::collections::BTreeMap;

use decl_core::{ConfigObject, PathUpdate, TranslationResult};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::naming::object;
use crate::translators::{ProfileLink, RoleOverride, Translation};

const VIRTUAL_COMMAND: &str = "ltm virtual";

/// Merge implied profiles, drop duplicates and apply path updates.
pub fn finalize(translation: Translation) -> TranslationResult {
    let Translation {
        mut configs,
        path_updates,
        profile_links,
        role_overrides,
    } = translation;

    merge_profile_links(&mut configs, &profile_links, &role_overrides);
    let configs = collapse_duplicates(configs);
    let path_updates = dedup_updates(path_updates);
    let configs = apply_path_updates(configs, &path_updates);

    TranslationResult {
        configs,
        update_path: !path_updates.is_empty(),
        path_updates,
    }
}

/// Attach linked profiles to every virtual carrying their parent, unless the
/// virtual declared its own profile for that role.
pub fn merge_profile_links(
    configs: &mut [ConfigObject],
    links: &[ProfileLink],
    overrides: &[RoleOverride],
) {
    if links.is_empty() {
        return;
    }
    for config in configs.iter_mut().filter(|c| c.command == VIRTUAL_COMMAND) {
        let path = config.path.clone();
        let Some(Value::Object(profiles)) = config.properties.get_mut("profiles") else {
            continue;
        };
        for link in links {
            if !profiles.contains_key(&link.parent) {
                continue;
            }
            let overridden = overrides
                .iter()
                .any(|o| o.virtual_path == path && o.role == link.role);
            if overridden {
                debug!(virtual_path = %path, profile = %link.profile, "explicit profile wins over linked one");
                continue;
            }
            profiles
                .entry(link.profile.clone())
                .or_insert_with(|| object([("context", Value::from("all"))]));
        }
    }
}

/// Keep one object per path. Identical repeats are dropped silently; a
/// repeat with different content keeps the first and logs.
pub fn collapse_duplicates(configs: Vec<ConfigObject>) -> Vec<ConfigObject> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut out: Vec<ConfigObject> = Vec::with_capacity(configs.len());
    for config in configs {
        match seen.get(&config.path) {
            Some(&idx) => {
                if out[idx] != config {
                    warn!(
                        path = %config.path,
                        kept = %out[idx].command,
                        dropped = %config.command,
                        "conflicting objects for one path, keeping the first"
                    );
                }
            }
            None => {
                seen.insert(config.path.clone(), out.len());
                out.push(config);
            }
        }
    }
    out
}

fn dedup_updates(updates: Vec<PathUpdate>) -> Vec<PathUpdate> {
    let mut out: Vec<PathUpdate> = Vec::with_capacity(updates.len());
    for update in updates {
        if update.old_string != update.new_string && !out.contains(&update) {
            out.push(update);
        }
    }
    out
}

fn is_path_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/' | '%' | '~')
}

/// Replace whole-token occurrences of `old` in `text`.
///
/// An occurrence counts only when the characters around it cannot be part of
/// a longer path, so `/t/a/cert` never rewrites `/t/a/cert-bundle.crt`.
pub fn replace_token(text: &str, old: &str, new: &str) -> Option<String> {
    if old.is_empty() || !text.contains(old) {
        return None;
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut changed = false;
    let mut prev: Option<char> = None;
    while let Some(pos) = rest.find(old) {
        let before = rest[..pos].chars().next_back().or(prev);
        let after = rest[pos + old.len()..].chars().next();
        let bounded = !before.is_some_and(is_path_char) && !after.is_some_and(is_path_char);
        out.push_str(&rest[..pos]);
        if bounded {
            out.push_str(new);
            changed = true;
        } else {
            out.push_str(old);
        }
        prev = old.chars().next_back();
        rest = &rest[pos + old.len()..];
    }
    out.push_str(rest);
    changed.then_some(out)
}

fn rewrite_str(text: &str, updates: &[PathUpdate]) -> Option<String> {
    let mut current: Option<String> = None;
    for update in updates {
        let base = current.as_deref().unwrap_or(text);
        if let Some(next) = replace_token(base, &update.old_string, &update.new_string) {
            current = Some(next);
        }
    }
    current
}

fn rewrite_value(value: &mut Value, updates: &[PathUpdate]) {
    match value {
        Value::String(s) => {
            if let Some(next) = rewrite_str(s, updates) {
                *s = next;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| rewrite_value(v, updates)),
        Value::Object(map) => rewrite_map(map, updates),
        _ => {}
    }
}

fn rewrite_map(map: &mut Map<String, Value>, updates: &[PathUpdate]) {
    let entries = std::mem::take(map);
    for (key, mut value) in entries {
        rewrite_value(&mut value, updates);
        let key = rewrite_str(&key, updates).unwrap_or(key);
        map.insert(key, value);
    }
}

/// Apply path updates to paths, property keys and string values.
pub fn apply_path_updates(mut configs: Vec<ConfigObject>, updates: &[PathUpdate]) -> Vec<ConfigObject> {
    if updates.is_empty() {
        return configs;
    }
    for config in &mut configs {
        if let Some(path) = rewrite_str(&config.path, updates) {
            config.path = path;
        }
        rewrite_map(&mut config.properties, updates);
    }
    configs
}

#[cfg(test)]
mod tests {
    use decl_core::{ConfigObject, PathUpdate};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tracing_test::traced_test;

    use super::{apply_path_updates, collapse_duplicates, finalize, merge_profile_links, replace_token};
    use crate::translators::{ProfileLink, ProfileRole, RoleOverride, Translation};

    fn virtual_with(path: &str, profiles: serde_json::Value) -> ConfigObject {
        let mut virt = ConfigObject::new(path, "ltm virtual");
        virt.set("profiles", profiles);
        virt
    }

    #[test]
    fn token_replacement_respects_boundaries() {
        assert_eq!(
            replace_token("/t/a/cert.crt", "/t/a/cert.crt", "/Common/default.crt").as_deref(),
            Some("/Common/default.crt")
        );
        assert_eq!(replace_token("/t/a/cert-bundle.crt", "/t/a/cert", "/x"), None);
        assert_eq!(replace_token("/x/t/a/ca", "/t/a/ca", "/Common/ca"), None);
        assert_eq!(
            replace_token("min 1 of { /t/a/m /t/a/m2 }", "/t/a/m", "/Common/m").as_deref(),
            Some("min 1 of { /Common/m /t/a/m2 }")
        );
        assert_eq!(
            replace_token("/t/a/n:80", "/t/a/n", "/Common/n").as_deref(),
            Some("/Common/n:80")
        );
    }

    #[test]
    fn links_merge_unless_overridden() {
        let mut configs = vec![
            virtual_with("/t/a/one", json!({ "/t/a/http": { "context": "all" } })),
            virtual_with("/t/a/two", json!({ "/t/a/http": { "context": "all" } })),
            virtual_with("/t/a/three", json!({ "/Common/http": { "context": "all" } })),
        ];
        let links = vec![ProfileLink {
            parent: "/t/a/http".to_string(),
            profile: "/t/a/http-websocket".to_string(),
            role: ProfileRole::Websocket,
        }];
        let overrides = vec![RoleOverride {
            virtual_path: "/t/a/two".to_string(),
            role: ProfileRole::Websocket,
        }];
        merge_profile_links(&mut configs, &links, &overrides);
        assert!(configs[0].properties["profiles"].get("/t/a/http-websocket").is_some());
        assert!(configs[1].properties["profiles"].get("/t/a/http-websocket").is_none());
        assert!(configs[2].properties["profiles"].get("/t/a/http-websocket").is_none());
    }

    #[test]
    #[traced_test]
    fn duplicates_collapse_and_conflicts_warn() {
        let mut a = ConfigObject::new("/t/192.0.2.1", "ltm virtual-address");
        a.set("address", "192.0.2.1");
        let same = a.clone();
        let mut other = a.clone();
        other.set("arp", "disabled");
        let out = collapse_duplicates(vec![a.clone(), same, other]);
        assert_eq!(out, vec![a]);
        assert!(logs_contain("conflicting objects for one path"));
    }

    #[test]
    fn updates_rewrite_paths_keys_and_values() {
        let mut profile = ConfigObject::new("/t/a/tls", "ltm profile client-ssl");
        profile.set(
            "cert-key-chain",
            json!({ "set0": { "cert": "/t/a/cert.crt", "chain": "/t/a/cert-bundle.crt" } }),
        );
        profile.set("ca-file", "/t/a/ca");
        let updates = vec![
            PathUpdate {
                old_string: "/t/a/cert.crt".to_string(),
                new_string: "/Common/default.crt".to_string(),
            },
            PathUpdate {
                old_string: "/t/a/ca".to_string(),
                new_string: "/Common/ca-bundle.crt".to_string(),
            },
        ];
        let out = apply_path_updates(vec![profile], &updates);
        let props = &out[0].properties;
        assert_eq!(props["cert-key-chain"]["set0"]["cert"], json!("/Common/default.crt"));
        assert_eq!(props["cert-key-chain"]["set0"]["chain"], json!("/t/a/cert-bundle.crt"));
        assert_eq!(props["ca-file"], json!("/Common/ca-bundle.crt"));
    }

    #[test]
    fn finalize_sets_update_flag_only_when_needed() {
        let mut translation = Translation::single(ConfigObject::new("/t/", "auth partition"));
        let plain = finalize(translation.clone());
        assert!(!plain.update_path);
        assert!(plain.path_updates.is_empty());

        translation.update_path("/t/a/ca", "/Common/ca-bundle.crt");
        translation.update_path("/t/a/ca", "/Common/ca-bundle.crt");
        let updated = finalize(translation);
        assert!(updated.update_path);
        assert_eq!(updated.path_updates.len(), 1);
    }
}
