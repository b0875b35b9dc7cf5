//! Idle timeout policies and the service policies that attach them.

use decl_core::{ConfigObject, DeclValue};
use serde_json::{Map, Value};

use super::{described, Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::naming::{hashed_id, object};
use crate::normalize::{indefinite_as_literal, to_set};
use crate::registry::ObjectKind;
use crate::version::Feature;

const SERVICE_POLICY_PREFIX: &str = "f5_sp_";

/// `net service-policy` wrapping a timer policy. The name is derived from
/// the timer policy path so every service using it shares one object.
pub(crate) fn service_policy(scope: &ItemScope<'_>, timer_policy: &str) -> ConfigObject {
    let name = hashed_id(
        SERVICE_POLICY_PREFIX,
        &object([("timerPolicy", Value::from(timer_policy))]),
    );
    let mut policy = ConfigObject::new(scope.sibling(&name), "net service-policy");
    policy.set("timer-policy", timer_policy);
    policy
}

fn protocol(raw: &str) -> Option<&'static str> {
    match raw {
        "tcp" => Some("tcp"),
        "udp" => Some("udp"),
        "all-other" => Some("all-other"),
        _ => None,
    }
}

fn timeout(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) if s == "unspecified" => Value::from("unspecified"),
        Some(Value::String(s)) if s == "immediate" => Value::from("immediate"),
        Some(other) => indefinite_as_literal(other),
        None => Value::from("unspecified"),
    }
}

pub struct IdleTimeoutPolicyTranslator;

impl Translator for IdleTimeoutPolicyTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::IdleTimeoutPolicy
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        env.ctx.require(Feature::IdleTimeoutPolicy, &scope.path())?;

        let mut rules = Map::new();
        for rule in scope.item.array_prop("rules") {
            let Some(name) = rule.str_prop("name") else {
                return Err(TranslateError::invalid(scope.path(), "every rule needs a name"));
            };
            let raw = rule.str_prop("protocol").unwrap_or("tcp");
            let Some(ip_protocol) = protocol(raw) else {
                return Err(TranslateError::invalid(
                    scope.path(),
                    format!("unknown protocol {raw}"),
                ));
            };
            let ports: Vec<String> = rule
                .array_prop("destinationPorts")
                .iter()
                .map(|port| match port {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            let ports = if ports.is_empty() || ip_protocol == "all-other" {
                Value::from("none")
            } else {
                to_set(ports)
            };

            let mut timers = Map::new();
            timers.insert(
                "flow-idle-timeout".to_string(),
                object([("value", timeout(rule.prop("idleTimeout")))]),
            );
            rules.insert(
                name.to_string(),
                object([
                    ("ip-protocol", Value::from(ip_protocol)),
                    ("destination-ports", ports),
                    ("timers", Value::Object(timers)),
                ]),
            );
        }

        let mut policy = described(scope, "net timer-policy");
        policy.set("rules", Value::Object(rules));
        Ok(Translation::single(policy))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::service_policy;
    use crate::error::TranslateError;
    use crate::translators::testing::{context, declaration, run};
    use crate::translators::ItemScope;

    fn timer_decl() -> decl_core::Declaration {
        declaration(json!({
            "idle": {
                "class": "Idle_Timeout_Policy",
                "rules": [
                    { "name": "web", "protocol": "tcp", "destinationPorts": [80, 443], "idleTimeout": 300 },
                    { "name": "rest", "protocol": "all-other", "idleTimeout": "indefinite" }
                ]
            }
        }))
    }

    #[test]
    fn rules_map_to_timers() {
        let out = run(&context("14.1"), &timer_decl(), "idle").expect("policy");
        let rules = &out.configs[0].properties["rules"];
        assert_eq!(out.configs[0].command, "net timer-policy");
        assert_eq!(rules["web"]["destination-ports"], json!({ "80": {}, "443": {} }));
        assert_eq!(rules["web"]["timers"]["flow-idle-timeout"]["value"], json!(300));
        assert_eq!(rules["rest"]["destination-ports"], json!("none"));
        assert_eq!(rules["rest"]["timers"]["flow-idle-timeout"]["value"], json!("indefinite"));
    }

    #[test]
    fn old_targets_are_rejected() {
        let err = run(&context("13.1"), &timer_decl(), "idle").expect_err("gated");
        assert!(matches!(err, TranslateError::UnsupportedVersion { .. }));
    }

    #[test]
    fn service_policy_name_is_stable_per_timer_policy() {
        let tenant = json!({ "class": "Tenant" });
        let item = json!({});
        let scope = ItemScope {
            tenant: "t",
            app: Some("a"),
            name: "svc",
            item: &item,
            tenant_value: &tenant,
        };
        let first = service_policy(&scope, "/t/a/idle");
        let second = service_policy(&scope.with_item(Some("a"), "other", &item), "/t/a/idle");
        let third = service_policy(&scope, "/t/a/idle2");
        assert_eq!(first.path, second.path);
        assert_ne!(first.path, third.path);
        assert!(first.path.starts_with("/t/a/f5_sp_"));
        assert_eq!(first.properties["timer-policy"], json!("/t/a/idle"));
    }
}
