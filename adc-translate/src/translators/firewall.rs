//! Network firewall lists, rule lists and policies.

use decl_core::DeclValue;
use serde_json::{Map, Value};

use super::{described, Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::normalize::{quote_or_none, to_set_or_none, yes_no};
use crate::registry::ObjectKind;

const ACTIONS: [&str; 4] = ["accept", "accept-decisively", "drop", "reject"];

fn scalar_strings(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
        .collect()
}

fn pointer_set(
    env: &Env<'_>,
    scope: &ItemScope<'_>,
    values: &[Value],
    kind: ObjectKind,
) -> Result<Value> {
    let paths = values
        .iter()
        .map(|value| env.resolver.resolve_kind(scope, value, &[kind]))
        .collect::<Result<Vec<_>>>()?;
    Ok(to_set_or_none(paths))
}

/// `source` / `destination` block of one rule.
fn endpoint(env: &Env<'_>, scope: &ItemScope<'_>, spec: Option<&Value>, with_vlans: bool) -> Result<Value> {
    let mut block = Map::new();
    let Some(spec) = spec else {
        return Ok(Value::Object(block));
    };
    let addresses = spec.array_prop("addressLists");
    if !addresses.is_empty() {
        block.insert(
            "address-lists".to_string(),
            pointer_set(env, scope, addresses, ObjectKind::FirewallAddressList)?,
        );
    }
    let ports = spec.array_prop("portLists");
    if !ports.is_empty() {
        block.insert(
            "port-lists".to_string(),
            pointer_set(env, scope, ports, ObjectKind::FirewallPortList)?,
        );
    }
    let vlans = spec.array_prop("vlans");
    if with_vlans && !vlans.is_empty() {
        let paths = vlans
            .iter()
            .map(|v| env.resolver.resolve_path(scope, v))
            .collect::<Result<Vec<_>>>()?;
        block.insert("vlans".to_string(), to_set_or_none(paths));
    }
    Ok(Value::Object(block))
}

/// One inline rule, with its position as `order`.
fn rule(env: &Env<'_>, scope: &ItemScope<'_>, rule: &Value, order: usize) -> Result<Value> {
    let action = rule.str_prop("action").unwrap_or("accept");
    if !ACTIONS.contains(&action) {
        return Err(TranslateError::invalid(
            scope.path(),
            format!("unknown firewall action {action}"),
        ));
    }
    let mut entry = Map::new();
    entry.insert("order".to_string(), Value::from(order));
    entry.insert("action".to_string(), Value::from(action));
    entry.insert(
        "ip-protocol".to_string(),
        Value::from(rule.str_prop("protocol").unwrap_or("any")),
    );
    entry.insert(
        "log".to_string(),
        Value::from(yes_no(rule.bool_prop("loggingEnabled").unwrap_or(false))),
    );
    entry.insert(
        "description".to_string(),
        Value::from(quote_or_none(rule.str_prop("remark"))),
    );
    entry.insert("source".to_string(), endpoint(env, scope, rule.prop("source"), true)?);
    entry.insert(
        "destination".to_string(),
        endpoint(env, scope, rule.prop("destination"), false)?,
    );
    let irule = match rule.prop("iRule") {
        Some(pointer) => env.resolver.resolve_kind(scope, pointer, &[ObjectKind::IRule])?,
        None => "none".to_string(),
    };
    entry.insert("irule".to_string(), Value::from(irule));
    if let Some(rate) = rule.u64_prop("iRuleSampleRate") {
        entry.insert("irule-sample-rate".to_string(), Value::from(rate));
    }
    Ok(Value::Object(entry))
}

fn rule_name<'v>(scope: &ItemScope<'_>, rule: &'v Value) -> Result<&'v str> {
    rule.str_prop("name")
        .ok_or_else(|| TranslateError::invalid(scope.path(), "every rule needs a name"))
}

pub struct FirewallAddressListTranslator;

impl Translator for FirewallAddressListTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::FirewallAddressList
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let mut list = described(scope, "security firewall address-list");
        list.set("addresses", to_set_or_none(scalar_strings(item.array_prop("addresses"))));
        list.set("fqdns", to_set_or_none(scalar_strings(item.array_prop("fqdns"))));
        list.set("geo", to_set_or_none(scalar_strings(item.array_prop("geo"))));
        list.set(
            "address-lists",
            pointer_set(env, scope, item.array_prop("addressLists"), ObjectKind::FirewallAddressList)?,
        );
        Ok(Translation::single(list))
    }
}

pub struct FirewallPortListTranslator;

impl Translator for FirewallPortListTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::FirewallPortList
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let mut list = described(scope, "security firewall port-list");
        list.set("ports", to_set_or_none(scalar_strings(item.array_prop("ports"))));
        list.set(
            "port-lists",
            pointer_set(env, scope, item.array_prop("portLists"), ObjectKind::FirewallPortList)?,
        );
        Ok(Translation::single(list))
    }
}

pub struct FirewallRuleListTranslator;

impl Translator for FirewallRuleListTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::FirewallRuleList
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let mut rules = Map::new();
        for (order, entry) in scope.item.array_prop("rules").iter().enumerate() {
            let name = rule_name(scope, entry)?;
            rules.insert(name.to_string(), rule(env, scope, entry, order)?);
        }
        let mut list = described(scope, "security firewall rule-list");
        list.set("rules", Value::Object(rules));
        Ok(Translation::single(list))
    }
}

pub struct FirewallPolicyTranslator;

impl Translator for FirewallPolicyTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::FirewallPolicy
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let mut rules = Map::new();
        for (order, entry) in scope.item.array_prop("rules").iter().enumerate() {
            let name = rule_name(scope, entry)?;
            let value = match entry.prop("ruleList") {
                Some(pointer) => {
                    let path = env
                        .resolver
                        .resolve_kind(scope, pointer, &[ObjectKind::FirewallRuleList])?;
                    let mut map = Map::new();
                    map.insert("order".to_string(), Value::from(order));
                    map.insert("rule-list".to_string(), Value::from(path));
                    Value::Object(map)
                }
                None => rule(env, scope, entry, order)?,
            };
            rules.insert(name.to_string(), value);
        }
        let mut policy = described(scope, "security firewall policy");
        policy.set("rules", Value::Object(rules));
        Ok(Translation::single(policy))
    }
}
