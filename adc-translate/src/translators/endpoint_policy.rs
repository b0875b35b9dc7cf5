//! Endpoint policies rendered into policy-language strings.
//!
//! Every condition and action becomes one line such as
//! `http-uri request path not starts-with values { /a "/b c" } case-insensitive`
//! or `forward request select pool /t/a/web`.

use std::collections::BTreeSet;

use decl_core::{ConfigObject, DeclValue};
use serde_json::{Map, Value};

use super::{described, Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::normalize::{quote_or_none, quote_string, to_set_or_none};
use crate::registry::ObjectKind;

const STRATEGIES: [&str; 3] = ["first-match", "best-match", "all-match"];

// Selector keys accepted per condition type, in lookup order.
const URI_SELECTORS: &[&str] = &[
    "host",
    "path",
    "extension",
    "query-string",
    "port",
    "scheme",
    "pathSegment",
    "queryParameter",
    "all",
];
const ALL_SELECTOR: &[&str] = &["all"];
const HOST_SELECTORS: &[&str] = &["all", "host", "port"];
const STATUS_SELECTORS: &[&str] = &["all", "code", "text"];
const SSL_SELECTORS: &[&str] = &["serverName", "npn", "alpn"];
const TCP_SELECTORS: &[&str] = &["address", "port"];
const GEOIP_SELECTORS: &[&str] = &[
    "continent",
    "countryCode",
    "countryName",
    "isp",
    "org",
    "regionCode",
    "regionName",
];

/// Brace list; elements containing whitespace are quoted.
pub(crate) fn value_list(values: &[Value]) -> String {
    let rendered: Vec<String> = values
        .iter()
        .map(|value| match value {
            Value::String(s) if s.chars().any(char::is_whitespace) => quote_string(s),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    format!("{{ {} }}", rendered.join(" "))
}

/// Split `does-not-x` operands into the negation and the base operand.
fn operand(raw: &str) -> (bool, &str) {
    match raw {
        "does-not-equal" => (true, "equals"),
        "does-not-start-with" => (true, "starts-with"),
        "does-not-end-with" => (true, "ends-with"),
        "does-not-contain" => (true, "contains"),
        "does-not-exist" => (true, "exists"),
        "does-not-match" => (true, "match"),
        other => (false, other),
    }
}

/// `[not] <operand> values { ... } | datagroup <path>`.
fn match_clause(env: &Env<'_>, scope: &ItemScope<'_>, spec: &Value, case_aware: bool) -> Result<String> {
    let raw = spec.str_prop("operand").unwrap_or("equals");
    let (negated, op) = operand(raw);
    let mut parts = Vec::new();
    if negated {
        parts.push("not".to_string());
    }
    parts.push(op.to_string());
    if let Some(group) = spec.prop("datagroup") {
        let path = env
            .resolver
            .resolve_kind(scope, group, &[ObjectKind::DataGroup])?;
        parts.push(format!("datagroup {path}"));
    } else if op != "exists" {
        parts.push(format!("values {}", value_list(spec.array_prop("values"))));
    }
    if case_aware && op != "exists" {
        let case = if spec.bool_prop("caseSensitive").unwrap_or(false) {
            "case-sensitive"
        } else {
            "case-insensitive"
        };
        parts.push(case.to_string());
    }
    Ok(parts.join(" "))
}

/// Which profiles a policy needs and which features it controls.
#[derive(Debug, Default)]
struct Needs {
    requires: BTreeSet<&'static str>,
    controls: BTreeSet<&'static str>,
}

fn condition_string(
    env: &Env<'_>,
    scope: &ItemScope<'_>,
    condition: &Value,
    needs: &mut Needs,
) -> Result<String> {
    let kind = condition.str_prop("type").unwrap_or("httpUri");
    let event = condition.str_prop("event").unwrap_or("request");
    let invalid = |message: String| TranslateError::invalid(scope.path(), message);

    let (keyword, profile, selectors) = match kind {
        "httpUri" => ("http-uri", "http", URI_SELECTORS),
        "httpHeader" => ("http-header", "http", ALL_SELECTOR),
        "httpCookie" => ("http-cookie", "http", ALL_SELECTOR),
        "httpMethod" => ("http-method", "http", ALL_SELECTOR),
        "httpHost" => ("http-host", "http", HOST_SELECTORS),
        "httpStatus" => ("http-status", "http", STATUS_SELECTORS),
        "sslExtension" => ("ssl-extension", "client-ssl", SSL_SELECTORS),
        "tcp" => ("tcp", "tcp", TCP_SELECTORS),
        "geoip" => ("geoip", "tcp", GEOIP_SELECTORS),
        other => return Err(invalid(format!("unknown condition type {other}"))),
    };
    needs.requires.insert(profile);

    let mut parts = vec![keyword.to_string(), event.to_string()];
    if matches!(kind, "httpHeader" | "httpCookie") {
        let Some(name) = condition.str_prop("name") else {
            return Err(invalid(format!("{kind} conditions need a name")));
        };
        parts.push(format!("name {name}"));
    }

    let Some((selector, spec)) = selectors
        .iter()
        .find_map(|key| condition.prop(key).map(|spec| (*key, spec)))
    else {
        return Err(invalid(format!("{kind} condition has no selector")));
    };
    match selector {
        "all" => {}
        "pathSegment" => parts.push(format!(
            "path-segment index {}",
            spec.u64_prop("index").unwrap_or(1)
        )),
        "queryParameter" => {
            let Some(name) = spec.str_prop("name") else {
                return Err(invalid("queryParameter selectors need a name".to_string()));
            };
            parts.push(format!("query-parameter name {name}"));
        }
        "serverName" => parts.push("server-name".to_string()),
        "countryCode" => parts.push("country-code".to_string()),
        "countryName" => parts.push("country-name".to_string()),
        "regionCode" => parts.push("region-code".to_string()),
        "regionName" => parts.push("region-name".to_string()),
        other => parts.push(other.to_string()),
    }
    let case_aware = !matches!(selector, "port" | "code" | "address");
    parts.push(match_clause(env, scope, spec, case_aware)?);
    Ok(parts.join(" "))
}

fn enable_disable(action: &Value) -> &'static str {
    if action.bool_prop("enabled").unwrap_or(true) {
        "enable"
    } else {
        "disable"
    }
}

fn action_string(
    env: &Env<'_>,
    scope: &ItemScope<'_>,
    action: &Value,
    needs: &mut Needs,
) -> Result<String> {
    let kind = action.str_prop("type").unwrap_or("forward");
    let event = action.str_prop("event").unwrap_or("request");
    let invalid = |message: String| TranslateError::invalid(scope.path(), message);

    let text = match kind {
        "forward" => {
            needs.controls.insert("forwarding");
            let select = action.prop("select");
            if let Some(pool) = select.and_then(|sel| sel.prop("pool")) {
                let path = env.resolver.resolve_kind(scope, pool, &[ObjectKind::Pool])?;
                format!("forward {event} select pool {path}")
            } else if let Some(service) = select.and_then(|sel| sel.prop("service")) {
                let path = env.resolver.resolve_path(scope, service)?;
                format!("forward {event} select virtual {path}")
            } else if let Some(node) = select.and_then(|sel| sel.str_prop("node")) {
                format!("forward {event} select node {node}")
            } else {
                format!("forward {event} reset")
            }
        }
        "httpRedirect" => {
            needs.requires.insert("http");
            let location = action.str_prop("location").ok_or_else(|| {
                invalid("httpRedirect actions need a location".to_string())
            })?;
            format!("http-reply {event} redirect location {}", quote_string(location))
        }
        "drop" => {
            needs.controls.insert("forwarding");
            format!("shutdown {event} connection")
        }
        "httpHeader" => {
            needs.requires.insert("http");
            header_like("http-header", event, action, scope)?
        }
        "httpCookie" => {
            needs.requires.insert("http");
            header_like("http-cookie", event, action, scope)?
        }
        "httpUri" => {
            needs.requires.insert("http");
            let Some(replace) = action.prop("replace") else {
                return Err(invalid("httpUri actions need replace".to_string()));
            };
            let mut parts = vec![format!("http-uri {event} replace")];
            for (key, keyword) in [("path", "path"), ("queryString", "query-string"), ("value", "value")] {
                if let Some(text) = replace.str_prop(key) {
                    parts.push(format!("{keyword} {}", quote_string(text)));
                }
            }
            parts.join(" ")
        }
        "waf" => {
            needs.requires.insert("http");
            needs.controls.insert("asm");
            match action.prop("policy") {
                Some(policy) => {
                    let path = env.resolver.resolve_path(scope, policy)?;
                    format!("asm {event} enable policy {path}")
                }
                None => format!("asm {event} disable"),
            }
        }
        "log" => {
            let message = action.walk(&["write", "message"]).and_then(Value::as_str);
            format!("log {event} write message {}", quote_or_none(message))
        }
        "tcl" => {
            let Some(name) = action.walk(&["setVariable", "name"]).and_then(Value::as_str) else {
                return Err(invalid("tcl actions need setVariable.name".to_string()));
            };
            let expression = action
                .walk(&["setVariable", "expression"])
                .and_then(Value::as_str)
                .unwrap_or_default();
            format!("tcl {event} set-variable name {name} expression {}", quote_string(expression))
        }
        "clientSsl" => {
            needs.requires.insert("client-ssl");
            needs.controls.insert("server-ssl");
            format!("server-ssl {event} {}", enable_disable(action))
        }
        "http" => {
            needs.requires.insert("http");
            format!("http {event} {}", enable_disable(action))
        }
        "botDefense" => {
            needs.requires.insert("http");
            needs.controls.insert("bot-defense");
            match action.prop("profile") {
                Some(profile) => {
                    let path = env.resolver.resolve_path(scope, profile)?;
                    format!("bot-defense {event} enable from-profile {path}")
                }
                None => format!("bot-defense {event} disable"),
            }
        }
        other => return Err(invalid(format!("unknown action type {other}"))),
    };
    Ok(text)
}

/// `insert`/`remove`/`replace` for headers and cookies.
fn header_like(keyword: &str, event: &str, action: &Value, scope: &ItemScope<'_>) -> Result<String> {
    for verb in ["insert", "replace", "remove"] {
        if let Some(spec) = action.prop(verb) {
            let Some(name) = spec.str_prop("name") else {
                return Err(TranslateError::invalid(
                    scope.path(),
                    format!("{keyword} {verb} needs a name"),
                ));
            };
            let mut text = format!("{keyword} {event} {verb} name {name}");
            if let Some(value) = spec.str_prop("value") {
                text.push_str(&format!(" value {}", quote_string(value)));
            }
            return Ok(text);
        }
    }
    Err(TranslateError::invalid(
        scope.path(),
        format!("{keyword} actions need insert, replace or remove"),
    ))
}

fn indexed_strings(lines: Vec<String>) -> Value {
    let map: Map<String, Value> = lines
        .into_iter()
        .enumerate()
        .map(|(idx, line)| {
            let mut entry = Map::new();
            entry.insert("policyString".to_string(), Value::from(line));
            (idx.to_string(), Value::Object(entry))
        })
        .collect();
    Value::Object(map)
}

fn strategy(env: &Env<'_>, scope: &ItemScope<'_>) -> Result<String> {
    match scope.item.prop("strategy") {
        None => Ok("/Common/first-match".to_string()),
        Some(Value::String(name)) if STRATEGIES.contains(&name.as_str()) => Ok(format!("/Common/{name}")),
        Some(other) => env.resolver.resolve_path(scope, other),
    }
}

/// Policy enforcing a WAF policy for every request of a service.
pub(crate) fn waf_policy(path: String, waf: &str) -> ConfigObject {
    let mut rule = Map::new();
    rule.insert("ordinal".to_string(), Value::from(0));
    rule.insert("description".to_string(), Value::from("none"));
    rule.insert("conditions".to_string(), Value::Object(Map::new()));
    rule.insert(
        "actions".to_string(),
        indexed_strings(vec![format!("asm request enable policy {waf}")]),
    );
    let mut rules = Map::new();
    rules.insert("default".to_string(), Value::Object(rule));

    let mut policy = ConfigObject::new(path, "ltm policy");
    policy.set("strategy", "/Common/first-match");
    policy.set("requires", to_set_or_none(["http"]));
    policy.set("controls", to_set_or_none(["asm"]));
    policy.set("rules", Value::Object(rules));
    policy
}

pub struct EndpointPolicyTranslator;

impl Translator for EndpointPolicyTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::EndpointPolicy
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let mut needs = Needs::default();
        let mut rules = Map::new();
        for (ordinal, rule) in scope.item.array_prop("rules").iter().enumerate() {
            let Some(name) = rule.str_prop("name") else {
                return Err(TranslateError::invalid(scope.path(), "every rule needs a name"));
            };
            let conditions = rule
                .array_prop("conditions")
                .iter()
                .map(|c| condition_string(env, scope, c, &mut needs))
                .collect::<Result<Vec<_>>>()?;
            let actions = rule
                .array_prop("actions")
                .iter()
                .map(|a| action_string(env, scope, a, &mut needs))
                .collect::<Result<Vec<_>>>()?;

            let mut entry = Map::new();
            entry.insert("ordinal".to_string(), Value::from(ordinal));
            entry.insert(
                "description".to_string(),
                Value::from(quote_or_none(rule.str_prop("remark"))),
            );
            entry.insert("conditions".to_string(), indexed_strings(conditions));
            entry.insert("actions".to_string(), indexed_strings(actions));
            if rules.insert(name.to_string(), Value::Object(entry)).is_some() {
                return Err(TranslateError::invalid(
                    scope.path(),
                    format!("duplicate rule name {name}"),
                ));
            }
        }

        let mut policy = described(scope, "ltm policy");
        policy.set("strategy", strategy(env, scope)?);
        policy.set("requires", to_set_or_none(needs.requires));
        policy.set("controls", to_set_or_none(needs.controls));
        policy.set("rules", Value::Object(rules));
        Ok(Translation::single(policy))
    }
}
