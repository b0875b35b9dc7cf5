use decl_core::{ConfigObject, DeclValue};
use serde_json::{Map, Value};
use tracing::warn;

use super::discovery::{member_provider, member_task, uses_discovery_object};
use super::{described, Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::naming::partition_path;
use crate::normalize::{enabled_disabled, quote_or_none, with_route_domain};
use crate::registry::ObjectKind;
use crate::resolver::{classify, Reference};

const COMMON: &str = "Common";

/// `adminState` → (`state`, `session`).
fn admin_state(state: &str) -> Option<(&'static str, &'static str)> {
    match state {
        "enable" => Some(("up", "enabled")),
        "disable" => Some(("up", "disabled")),
        "offline" => Some(("down", "disabled")),
        _ => None,
    }
}

/// Render a monitor list the way pools and members expect it:
/// `a and b`, or `min N of { a b }` when a minimum is declared.
pub(crate) fn monitor_expression(paths: &[String], minimum: Option<u64>) -> Option<String> {
    if paths.is_empty() {
        return None;
    }
    Some(match minimum {
        Some(min) => format!("min {min} of {{ {} }}", paths.join(" ")),
        None => paths.join(" and "),
    })
}

/// Resolve a `monitors` array. Bare keywords name built-in monitors.
pub(crate) fn monitor_paths(env: &Env<'_>, scope: &ItemScope<'_>, monitors: &[Value]) -> Result<Vec<String>> {
    monitors
        .iter()
        .map(|monitor| match classify(monitor) {
            Reference::Use(keyword) if monitor.is_string() && !keyword.starts_with('/') => {
                Ok(format!("/{COMMON}/{keyword}"))
            }
            _ => env
                .resolver
                .resolve_kind(scope, monitor, &[ObjectKind::Monitor]),
        })
        .collect()
}

pub struct PoolTranslator;

impl Translator for PoolTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Pool
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let mut nodes: Vec<ConfigObject> = Vec::new();
        let mut tasks = Vec::new();
        let mut members = Map::new();
        let mut dynamic = false;

        for member in item.array_prop("members") {
            if member.bool_prop("enable") == Some(false) {
                continue;
            }
            let route_domain = member
                .u64_prop("routeDomain")
                .and_then(|rd| u32::try_from(rd).ok())
                .unwrap_or_else(|| scope.route_domain());

            if let Some(provider) = member_provider(member) {
                tasks.push(member_task(scope, provider, member, route_domain));
                dynamic = true;
                continue;
            }
            if uses_discovery_object(member) {
                // Validate the pointer; the discovery object emits the task.
                if let Some(pointer) = member.prop("addressDiscovery") {
                    env.resolver
                        .resolve_kind(scope, pointer, &[ObjectKind::AddressDiscovery])?;
                }
                dynamic = true;
                continue;
            }

            let partition = if member.bool_prop("shareNodes").unwrap_or(false) {
                COMMON
            } else {
                scope.tenant
            };
            let port = member.u64_prop("servicePort").unwrap_or(0);
            let mode = member.str_prop("addressDiscovery").unwrap_or("static");
            let props = member_properties(env, scope, member)?;

            match mode {
                "static" => {
                    let mut entries: Vec<(String, String)> = member
                        .array_prop("serverAddresses")
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|addr| {
                            let addr = with_route_domain(addr, route_domain);
                            (addr.clone(), addr)
                        })
                        .collect();
                    for server in member.array_prop("servers") {
                        let (Some(name), Some(addr)) = (server.str_prop("name"), server.str_prop("address")) else {
                            return Err(TranslateError::invalid(
                                scope.path(),
                                "servers entries need a name and an address",
                            ));
                        };
                        entries.push((name.to_string(), with_route_domain(addr, route_domain)));
                    }

                    for (node_name, address) in entries {
                        let node_path = format!("{}{node_name}", partition_path(partition));
                        if !nodes.iter().any(|n| n.path == node_path) {
                            let mut node = ConfigObject::new(node_path.clone(), "ltm node");
                            node.set("address", address.clone());
                            node.set("description", quote_or_none(member.str_prop("remark")));
                            nodes.push(node);
                        }
                        let sep = if address.contains(':') { '.' } else { ':' };
                        members.insert(format!("{node_path}{sep}{port}"), Value::Object(props.clone()));
                    }
                }
                "fqdn" => {
                    let Some(hostname) = member.str_prop("hostname") else {
                        return Err(TranslateError::invalid(
                            scope.path(),
                            "fqdn members need a hostname",
                        ));
                    };
                    let node_path = format!("{}{hostname}", partition_path(partition));
                    let autopopulate = enabled_disabled(member.bool_prop("autoPopulate").unwrap_or(false));
                    if !nodes.iter().any(|n| n.path == node_path) {
                        let mut node = ConfigObject::new(node_path.clone(), "ltm node");
                        node.set(
                            "fqdn",
                            serde_json::json!({
                                "tmName": hostname,
                                "autopopulate": autopopulate,
                                "interval": member
                                    .prop("queryInterval")
                                    .filter(|v| v.as_u64() != Some(0))
                                    .cloned()
                                    .unwrap_or_else(|| Value::from("ttl")),
                                "address-family": member
                                    .str_prop("addressFamily")
                                    .unwrap_or("IPv4")
                                    .to_ascii_lowercase(),
                                "down-interval": member.u64_prop("downInterval").unwrap_or(5),
                            }),
                        );
                        node.set("description", quote_or_none(member.str_prop("remark")));
                        nodes.push(node);
                    }
                    let mut props = props;
                    props.insert(
                        "fqdn".to_string(),
                        serde_json::json!({ "autopopulate": autopopulate }),
                    );
                    members.insert(format!("{node_path}:{port}"), Value::Object(props));
                }
                other => {
                    return Err(TranslateError::invalid(
                        scope.path(),
                        format!("unsupported addressDiscovery {other}"),
                    ));
                }
            }
        }

        let mut pool = described(scope, "ltm pool");
        pool.set(
            "load-balancing-mode",
            item.str_prop("loadBalancingMode").unwrap_or("round-robin"),
        );
        pool.set(
            "min-active-members",
            item.u64_prop("minimumMembersActive").unwrap_or(1),
        );
        pool.set("reselect-tries", item.u64_prop("reselectTries").unwrap_or(0));
        pool.set(
            "service-down-action",
            item.str_prop("serviceDownAction").unwrap_or("none"),
        );
        pool.set("slow-ramp-time", item.u64_prop("slowRampTime").unwrap_or(10));
        let monitors = monitor_paths(env, scope, item.array_prop("monitors"))?;
        pool.set(
            "monitor",
            monitor_expression(&monitors, item.u64_prop("minimumMonitors"))
                .unwrap_or_else(|| "none".to_string()),
        );
        pool.set("members", Value::Object(members));
        if dynamic {
            pool = pool.ignoring("members");
        }

        let mut out = Translation::default();
        out.configs.extend(nodes);
        out.configs.extend(tasks);
        out.push(pool);
        Ok(out)
    }
}

fn member_properties(env: &Env<'_>, scope: &ItemScope<'_>, member: &Value) -> Result<Map<String, Value>> {
    let state = member.str_prop("adminState").unwrap_or("enable");
    let (state_value, session) = admin_state(state).unwrap_or_else(|| {
        warn!(pool = %scope.path(), admin_state = state, "unknown adminState, treating member as enabled");
        ("up", "enabled")
    });

    let monitors = monitor_paths(env, scope, member.array_prop("monitors"))?;
    let monitor = monitor_expression(&monitors, member.u64_prop("minimumMonitors"))
        .unwrap_or_else(|| "default".to_string());
    let rate_limit = match member.i64_prop("rateLimit") {
        Some(limit) if limit > 0 => Value::from(limit),
        _ => Value::from("disabled"),
    };

    let mut props = Map::new();
    props.insert(
        "connection-limit".to_string(),
        Value::from(member.u64_prop("connectionLimit").unwrap_or(0)),
    );
    props.insert(
        "dynamic-ratio".to_string(),
        Value::from(member.u64_prop("dynamicRatio").unwrap_or(1)),
    );
    props.insert("monitor".to_string(), Value::from(monitor));
    props.insert(
        "priority-group".to_string(),
        Value::from(member.u64_prop("priorityGroup").unwrap_or(0)),
    );
    props.insert("rate-limit".to_string(), rate_limit);
    props.insert(
        "ratio".to_string(),
        Value::from(member.u64_prop("ratio").unwrap_or(1)),
    );
    props.insert("state".to_string(), Value::from(state_value));
    props.insert("session".to_string(), Value::from(session));
    props.insert(
        "description".to_string(),
        Value::from(quote_or_none(member.str_prop("remark"))),
    );
    Ok(props)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tracing_test::traced_test;

    use super::monitor_expression;
    use crate::translators::testing::{context, declaration, find, paths, run};

    #[test]
    fn static_member_gets_route_domain_node() {
        let decl = decl_core::Declaration::from_value(json!({
            "class": "ADC",
            "tenantId": {
                "class": "Tenant",
                "defaultRouteDomain": 100,
                "application": {
                    "class": "Application",
                    "pool": {
                        "class": "Pool",
                        "members": [{
                            "servicePort": 80,
                            "serverAddresses": ["192.0.2.4"]
                        }]
                    }
                }
            }
        }))
        .expect("declaration");
        let ctx = context("15.1");
        let out = crate::translators::testing::run_in(&ctx, &decl, "tenantId", Some("application"), "pool")
            .expect("pool");

        assert_eq!(
            paths(&out),
            vec![
                ("ltm node", "/tenantId/192.0.2.4%100"),
                ("ltm pool", "/tenantId/application/pool"),
            ]
        );
        let node = find(&out, "/tenantId/192.0.2.4%100");
        assert_eq!(node.properties["address"], json!("192.0.2.4%100"));
        let pool = find(&out, "/tenantId/application/pool");
        let member = &pool.properties["members"]["/tenantId/192.0.2.4%100:80"];
        assert_eq!(member["state"], json!("up"));
        assert_eq!(member["session"], json!("enabled"));
        assert_eq!(member["rate-limit"], json!("disabled"));
        assert_eq!(pool.properties["monitor"], json!("none"));
        assert!(pool.ignore.is_empty());
    }

    #[test]
    fn shared_nodes_ipv6_and_named_servers() {
        let decl = declaration(json!({
            "pool": {
                "class": "Pool",
                "monitors": ["http", { "bigip": "/Common/tcp_half_open" }],
                "members": [
                    { "servicePort": 443, "shareNodes": true, "serverAddresses": ["2001:db8::5"] },
                    { "servicePort": 80, "servers": [{ "name": "web1", "address": "192.0.2.7%0" }] },
                    { "servicePort": 81, "enable": false, "serverAddresses": ["192.0.2.99"] }
                ]
            }
        }));
        let ctx = context("15.1");
        let out = run(&ctx, &decl, "pool").expect("pool");
        assert_eq!(out.configs.len(), 3);
        assert_eq!(find(&out, "/t/web1").properties["address"], json!("192.0.2.7"));
        let pool = find(&out, "/t/a/pool");
        let members = pool.properties["members"].as_object().expect("members");
        assert!(members.contains_key("/Common/2001:db8::5.443"));
        assert!(members.contains_key("/t/web1:80"));
        assert_eq!(members.len(), 2);
        assert_eq!(
            pool.properties["monitor"],
            json!("/Common/http and /Common/tcp_half_open")
        );
    }

    #[test]
    fn dynamic_members_become_tasks_and_ignore_members() {
        let decl = declaration(json!({
            "pool": {
                "class": "Pool",
                "members": [
                    { "servicePort": 80, "addressDiscovery": "consul", "uri": "http://consul:8500/v1/catalog/nodes" },
                    { "servicePort": 80, "addressDiscovery": "fqdn", "hostname": "www.example.com", "autoPopulate": true }
                ]
            }
        }));
        let ctx = context("15.1");
        let out = run(&ctx, &decl, "pool").expect("pool");
        let commands: Vec<&str> = out.configs.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(
            commands,
            vec!["ltm node", "mgmt shared service-discovery task", "ltm pool"]
        );
        let node = find(&out, "/t/www.example.com");
        assert_eq!(node.properties["fqdn"]["autopopulate"], json!("enabled"));
        let pool = find(&out, "/t/a/pool");
        assert_eq!(pool.ignore, vec!["members".to_string()]);
        assert_eq!(
            pool.properties["members"]["/t/www.example.com:80"]["fqdn"]["autopopulate"],
            json!("enabled")
        );
    }

    #[test]
    fn admin_states_map_to_state_and_session() {
        let decl = declaration(json!({
            "pool": {
                "class": "Pool",
                "members": [
                    { "servicePort": 1, "serverAddresses": ["192.0.2.1"], "adminState": "disable" },
                    { "servicePort": 2, "serverAddresses": ["192.0.2.2"], "adminState": "offline" }
                ]
            }
        }));
        let ctx = context("15.1");
        let out = run(&ctx, &decl, "pool").expect("pool");
        let members = &find(&out, "/t/a/pool").properties["members"];
        assert_eq!(members["/t/192.0.2.1:1"]["session"], json!("disabled"));
        assert_eq!(members["/t/192.0.2.1:1"]["state"], json!("up"));
        assert_eq!(members["/t/192.0.2.2:2"]["state"], json!("down"));
        assert_eq!(members["/t/192.0.2.2:2"]["session"], json!("disabled"));
    }

    #[test]
    #[traced_test]
    fn unknown_admin_state_warns_and_enables() {
        let decl = declaration(json!({
            "pool": {
                "class": "Pool",
                "members": [{ "servicePort": 1, "serverAddresses": ["192.0.2.1"], "adminState": "drain" }]
            }
        }));
        let ctx = context("15.1");
        let out = run(&ctx, &decl, "pool").expect("pool");
        let member = &find(&out, "/t/a/pool").properties["members"]["/t/192.0.2.1:1"];
        assert_eq!(member["session"], json!("enabled"));
        assert!(logs_contain("unknown adminState"));
    }

    #[test]
    fn minimum_monitors_use_min_of_form() {
        let paths = vec!["/Common/http".to_string(), "/t/a/mon".to_string()];
        assert_eq!(
            monitor_expression(&paths, Some(1)).as_deref(),
            Some("min 1 of { /Common/http /t/a/mon }")
        );
        assert_eq!(monitor_expression(&[], None), None);
    }
}
