//! `Service_*` classes: virtual servers and everything generated for them.
//!
//! Each entry of `virtualAddresses` gets its own virtual, named `svc` for
//! the first entry and `svc-1-`, `svc-2-`, ... after that. Objects a
//! virtual points at are emitted before it.

mod address;
mod profiles;

use decl_core::{ConfigObject, DeclValue};
use serde_json::{Map, Value};
use tracing::warn;

use self::address::{endpoints, Destination, Endpoint};
use self::profiles::{attached, listed, Side, WEBSECURITY};
use super::addresses::{snat_member, virtual_address_object};
use super::endpoint_policy::waf_policy;
use super::idle_timeout::service_policy;
use super::{Env, ItemScope, RoleOverride, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::naming::{indexed, item_path, object, with_role};
use crate::normalize::{description, enabled_disabled, to_ordered_map, to_set, to_set_or_none};
use crate::registry::ObjectKind;
use crate::resolver::{classify, Reference};
use crate::version::Feature;

const COMMON: &str = "Common";
const HTTPS_REDIRECT_RULE: &str = "/Common/_sys_https_redirect";
const REDIRECT_SUFFIX: &str = "-Redirect-";
const SELF_SNAT_SUFFIX: &str = "-self";
const TMC_SUFFIX: &str = "-tmc";
const WAF_SUFFIX: &str = "-waf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Http,
    Https,
    Tcp,
    Udp,
    Sctp,
    L4,
    Generic,
    Forwarding,
}

impl ServiceKind {
    fn object_kind(self) -> ObjectKind {
        match self {
            ServiceKind::Http => ObjectKind::ServiceHttp,
            ServiceKind::Https => ObjectKind::ServiceHttps,
            ServiceKind::Tcp => ObjectKind::ServiceTcp,
            ServiceKind::Udp => ObjectKind::ServiceUdp,
            ServiceKind::Sctp => ObjectKind::ServiceSctp,
            ServiceKind::L4 => ObjectKind::ServiceL4,
            ServiceKind::Generic => ObjectKind::ServiceGeneric,
            ServiceKind::Forwarding => ObjectKind::ServiceForwarding,
        }
    }

    fn is_http(self) -> bool {
        matches!(self, ServiceKind::Http | ServiceKind::Https)
    }

    fn default_protocol(self) -> &'static str {
        match self {
            ServiceKind::Udp => "udp",
            ServiceKind::Sctp => "sctp",
            ServiceKind::Generic | ServiceKind::Forwarding => "any",
            _ => "tcp",
        }
    }

    fn protocol_profile(self) -> Option<&'static str> {
        match self {
            ServiceKind::Http | ServiceKind::Https | ServiceKind::Tcp => {
                Some("/Common/f5-tcp-progressive")
            }
            ServiceKind::Udp => Some("/Common/udp"),
            ServiceKind::Sctp => Some("/Common/sctp"),
            ServiceKind::L4 | ServiceKind::Generic | ServiceKind::Forwarding => {
                Some("/Common/fastL4")
            }
        }
    }

    fn default_persistence(self) -> &'static [&'static str] {
        match self {
            ServiceKind::Http | ServiceKind::Https => &["cookie"],
            ServiceKind::Tcp | ServiceKind::Udp | ServiceKind::L4 | ServiceKind::Sctp => {
                &["source-address"]
            }
            ServiceKind::Generic | ServiceKind::Forwarding => &[],
        }
    }
}

pub struct ServiceTranslator {
    kind: ServiceKind,
}

impl ServiceTranslator {
    pub const fn new(kind: ServiceKind) -> Self {
        Self { kind }
    }
}

/// Built-in persistence profile for a keyword.
fn persistence_builtin(keyword: &str) -> Option<&'static str> {
    Some(match keyword {
        "cookie" => "/Common/cookie",
        "source-address" => "/Common/source_addr",
        "destination-address" => "/Common/dest_addr",
        "msrdp" => "/Common/msrdp",
        "sip-info" => "/Common/sip_info",
        "ssl-session-id" | "tls-session-id" => "/Common/ssl",
        "universal" => "/Common/universal",
        "hash" => "/Common/hash",
        _ => return None,
    })
}

fn persistence_path(env: &Env<'_>, scope: &ItemScope<'_>, value: &Value) -> Result<String> {
    if let Some(path) = value.as_str().and_then(persistence_builtin) {
        return Ok(path.to_string());
    }
    env.resolver.resolve_kind(scope, value, &[ObjectKind::Persist])
}

/// `persist`: first method is the default.
fn persist(env: &Env<'_>, scope: &ItemScope<'_>, kind: ServiceKind) -> Result<Value> {
    let paths = match scope.item.prop("persistenceMethods") {
        Some(Value::Array(methods)) => methods
            .iter()
            .map(|m| persistence_path(env, scope, m))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(TranslateError::invalid(
                scope.path(),
                "persistenceMethods must be an array",
            ))
        }
        None => kind
            .default_persistence()
            .iter()
            .filter_map(|keyword| persistence_builtin(keyword))
            .map(str::to_string)
            .collect(),
    };
    if paths.is_empty() {
        return Ok(Value::from("none"));
    }
    let map: Map<String, Value> = paths
        .into_iter()
        .enumerate()
        .map(|(idx, path)| {
            let default = if idx == 0 { "yes" } else { "no" };
            (path, object([("default", Value::from(default))]))
        })
        .collect();
    Ok(Value::Object(map))
}

fn fallback_persistence(env: &Env<'_>, scope: &ItemScope<'_>) -> Result<String> {
    match scope.item.prop("fallbackPersistenceMethod") {
        Some(value) => persistence_path(env, scope, value),
        None => Ok("none".to_string()),
    }
}

/// `source-address-translation` plus the `-self` snatpool when asked for.
fn snat(
    env: &Env<'_>,
    scope: &ItemScope<'_>,
    kind: ServiceKind,
    virtual_name: &str,
    endpoint: &Endpoint,
) -> Result<(Value, Option<ConfigObject>)> {
    let default = if kind == ServiceKind::Forwarding { "none" } else { "auto" };
    let translation = |kind: &str, pool: &str| object([("type", Value::from(kind)), ("pool", Value::from(pool))]);
    match scope.item.prop("snat") {
        None => Ok((snat_keyword(scope, default, translation)?, None)),
        Some(Value::String(keyword)) if matches!(keyword.as_str(), "auto" | "none") => {
            Ok((snat_keyword(scope, keyword, translation)?, None))
        }
        Some(Value::String(keyword)) if keyword == "self" => {
            let dest = &endpoint.destination;
            let address = match dest.address(scope.route_domain()) {
                Some(address) if dest.is_host() => address,
                _ => {
                    return Err(TranslateError::invalid(
                        scope.path(),
                        "snat self needs a host virtual address",
                    ))
                }
            };
            let member = snat_member(scope, &address)?;
            let path = scope.sibling(&with_role(virtual_name, SELF_SNAT_SUFFIX));
            let mut pool = ConfigObject::new(path.clone(), "ltm snatpool");
            pool.set("members", to_set([member]));
            Ok((translation("snat", &path), Some(pool)))
        }
        Some(value) => {
            let path = env
                .resolver
                .resolve_kind(scope, value, &[ObjectKind::SnatPool])?;
            Ok((translation("snat", &path), None))
        }
    }
}

fn snat_keyword(
    scope: &ItemScope<'_>,
    keyword: &str,
    translation: impl Fn(&str, &str) -> Value,
) -> Result<Value> {
    match keyword {
        "auto" => Ok(translation("automap", "none")),
        "none" => Ok(translation("none", "none")),
        other => Err(TranslateError::invalid(
            scope.path(),
            format!("unknown snat mode {other}"),
        )),
    }
}

/// `virtualPort` as a number, or the port list it points at.
enum Port {
    Number(u64),
    List(String),
}

fn port(env: &Env<'_>, scope: &ItemScope<'_>, kind: ServiceKind) -> Result<Port> {
    match scope.item.prop("virtualPort") {
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|p| *p <= 65535)
            .map(Port::Number)
            .ok_or_else(|| TranslateError::invalid(scope.path(), format!("invalid virtualPort {n}"))),
        Some(value @ (Value::Object(_) | Value::String(_))) => env
            .resolver
            .resolve_kind(scope, value, &[ObjectKind::FirewallPortList])
            .map(Port::List),
        Some(other) => Err(TranslateError::invalid(
            scope.path(),
            format!("invalid virtualPort {other}"),
        )),
        None => Ok(Port::Number(match kind {
            ServiceKind::Http => 80,
            ServiceKind::Https => 443,
            _ => 0,
        })),
    }
}

/// `<virtual-address path>:port`, `.` before the port for IPv6.
fn destination_string(address_path: &str, ipv6: bool, port: u64) -> String {
    let sep = if ipv6 { '.' } else { ':' };
    format!("{address_path}{sep}{port}")
}

fn default_source(ipv6: bool, route_domain: u32) -> String {
    let zero = if ipv6 { "::" } else { "0.0.0.0" };
    if route_domain == 0 {
        format!("{zero}/0")
    } else {
        format!("{zero}%{route_domain}/0")
    }
}

/// `ltm traffic-matching-criteria` for a virtual on an address or port list.
fn traffic_matching_criteria(
    scope: &ItemScope<'_>,
    path: String,
    endpoint: &Endpoint,
    port: &Port,
    protocol: &str,
) -> ConfigObject {
    let rd = scope.route_domain();
    let mut tmc = ConfigObject::new(path, "ltm traffic-matching-criteria");
    match &endpoint.destination {
        Destination::AddressList(list) => {
            tmc.set("destination-address-inline", "any");
            tmc.set("destination-address-list", list.as_str());
        }
        other => {
            tmc.set(
                "destination-address-inline",
                other.address(rd).unwrap_or_else(|| "any".to_string()),
            );
            tmc.set("destination-address-list", "none");
        }
    }
    match port {
        Port::Number(n) => {
            tmc.set("destination-port-inline", n.to_string());
            tmc.set("destination-port-list", "none");
        }
        Port::List(list) => {
            tmc.set("destination-port-inline", "0");
            tmc.set("destination-port-list", list.as_str());
        }
    }
    let source = endpoint
        .source
        .clone()
        .unwrap_or_else(|| default_source(endpoint.destination.is_ipv6(), rd));
    tmc.set("source-address-inline", source);
    tmc.set("source-address-list", "none");
    tmc.set("protocol", protocol);
    tmc.set(
        "route-domain",
        if rd == 0 { "any".to_string() } else { rd.to_string() },
    );
    tmc
}

fn vlans(scope: &ItemScope<'_>, env: &Env<'_>, virt: &mut ConfigObject) -> Result<()> {
    let allow = scope.item.array_prop("allowVlans");
    let reject = scope.item.array_prop("rejectVlans");
    let (list, flag) = if !allow.is_empty() {
        (allow, "vlans-enabled")
    } else {
        (reject, "vlans-disabled")
    };
    let paths = list
        .iter()
        .map(|v| env.resolver.resolve_path(scope, v))
        .collect::<Result<Vec<_>>>()?;
    virt.set("vlans", to_set_or_none(paths));
    virt.set(flag, true);
    Ok(())
}

fn pointer_or_none(
    env: &Env<'_>,
    scope: &ItemScope<'_>,
    key: &str,
    kinds: &[ObjectKind],
) -> Result<String> {
    match scope.item.prop(key) {
        Some(value) => env.resolver.resolve_kind(scope, value, kinds),
        None => Ok("none".to_string()),
    }
}

/// Properties identical for every virtual of one service.
struct Common {
    pool: String,
    persist: Value,
    fallback: String,
    rules: Value,
    policies: Vec<String>,
    service_policy: Option<String>,
    security_logs: Value,
    fw_enforced: String,
    fw_staged: String,
}

fn common(env: &Env<'_>, scope: &ItemScope<'_>, kind: ServiceKind) -> Result<Common> {
    let item = scope.item;
    let rules = item
        .array_prop("iRules")
        .iter()
        .map(|rule| env.resolver.resolve_kind(scope, rule, &[ObjectKind::IRule]))
        .collect::<Result<Vec<_>>>()?;
    let policies = listed(item, "policyEndpoint")
        .into_iter()
        .map(|p| env.resolver.resolve_kind(scope, p, &[ObjectKind::EndpointPolicy]))
        .collect::<Result<Vec<_>>>()?;
    let security_logs = item
        .array_prop("securityLogProfiles")
        .iter()
        .map(|p| env.resolver.resolve_kind(scope, p, &[ObjectKind::SecurityLogProfile]))
        .collect::<Result<Vec<_>>>()?;
    let service_policy = match item.prop("policyIdleTimeout") {
        Some(value) => Some(
            env.resolver
                .resolve_kind(scope, value, &[ObjectKind::IdleTimeoutPolicy])?,
        ),
        None => None,
    };
    Ok(Common {
        pool: if kind == ServiceKind::Forwarding {
            "none".to_string()
        } else {
            pointer_or_none(env, scope, "pool", &[ObjectKind::Pool])?
        },
        persist: persist(env, scope, kind)?,
        fallback: fallback_persistence(env, scope)?,
        rules: if rules.is_empty() {
            Value::from("none")
        } else {
            to_ordered_map(rules, "order")
        },
        policies,
        service_policy,
        security_logs: to_set_or_none(security_logs),
        fw_enforced: pointer_or_none(env, scope, "policyFirewallEnforced", &[ObjectKind::FirewallPolicy])?,
        fw_staged: pointer_or_none(env, scope, "policyFirewallStaged", &[ObjectKind::FirewallPolicy])?,
    })
}

fn last_hop(item: &Value) -> &'static str {
    match item.str_prop("lastHop") {
        Some("auto") => "enabled",
        Some("disable") => "disabled",
        _ => "default",
    }
}

impl ServiceTranslator {
    #[allow(clippy::too_many_arguments)]
    fn virtual_server(
        &self,
        env: &Env<'_>,
        scope: &ItemScope<'_>,
        path: String,
        endpoint: &Endpoint,
        port: &Port,
        tmc: Option<&str>,
        snat: Value,
        shared: &Common,
        profiles: Value,
    ) -> Result<ConfigObject> {
        let item = scope.item;
        let kind = self.kind;
        let rd = scope.route_domain();
        let protocol = item.str_prop("layer4").unwrap_or(kind.default_protocol());
        let active = item.bool_prop("enable").unwrap_or(true) && scope.tenant_enabled();

        let mut virt = ConfigObject::new(path, "ltm virtual");
        virt.set("description", description(item));
        match (tmc, port) {
            (Some(tmc), _) => {
                virt.set("traffic-matching-criteria", tmc);
            }
            (None, Port::Number(number)) => {
                let dest = &endpoint.destination;
                let partition = if item.bool_prop("shareAddresses").unwrap_or(false) {
                    COMMON
                } else {
                    scope.tenant
                };
                let address_path = dest
                    .object_path(partition, rd)
                    .unwrap_or_else(|| format!("/{partition}/any"));
                virt.set(
                    "destination",
                    destination_string(&address_path, dest.is_ipv6(), *number),
                );
                virt.set(
                    "source",
                    endpoint
                        .source
                        .clone()
                        .unwrap_or_else(|| default_source(dest.is_ipv6(), rd)),
                );
                virt.set("mask", dest.mask().unwrap_or_else(|| "any".to_string()));
            }
            (None, Port::List(_)) => {
                return Err(TranslateError::invalid(
                    scope.path(),
                    "port lists need traffic-matching criteria",
                ));
            }
        }
        virt.set("ip-protocol", protocol);
        virt.set("pool", shared.pool.as_str());
        virt.set("profiles", profiles);
        virt.set("persist", shared.persist.clone());
        virt.set("fallback-persistence", shared.fallback.as_str());
        virt.set("rules", shared.rules.clone());
        virt.set("source-address-translation", snat);
        let translate = kind != ServiceKind::Forwarding;
        virt.set(
            "translate-address",
            enabled_disabled(item.bool_prop("translateServerAddress").unwrap_or(translate)),
        );
        virt.set(
            "translate-port",
            enabled_disabled(item.bool_prop("translateServerPort").unwrap_or(translate)),
        );
        virt.set(if active { "enabled" } else { "disabled" }, true);
        virt.set(
            "mirror",
            enabled_disabled(item.str_prop("mirroring") == Some("L4")),
        );
        virt.set("auto-lasthop", last_hop(item));
        virt.set("connection-limit", item.u64_prop("maxConnections").unwrap_or(0));
        vlans(scope, env, &mut virt)?;
        virt.set("security-log-profiles", shared.security_logs.clone());
        virt.set("fw-enforced-policy", shared.fw_enforced.as_str());
        virt.set("fw-staged-policy", shared.fw_staged.as_str());
        virt.set(
            "service-policy",
            shared.service_policy.as_deref().unwrap_or("none"),
        );
        if kind == ServiceKind::Forwarding {
            match item.str_prop("forwardingType").unwrap_or("ip") {
                "ip" => virt.set("ip-forward", true),
                "l2" => virt.set("l2-forward", true),
                other => {
                    return Err(TranslateError::invalid(
                        scope.path(),
                        format!("unknown forwardingType {other}"),
                    ))
                }
            }
        }
        Ok(virt)
    }

    /// Port-80 virtual answering with the built-in HTTPS redirect.
    fn redirect(
        &self,
        scope: &ItemScope<'_>,
        index: usize,
        endpoint: &Endpoint,
        partition: &str,
    ) -> Option<ConfigObject> {
        let dest = &endpoint.destination;
        let address_path = dest.object_path(partition, scope.route_domain())?;
        let name = indexed(&with_role(scope.name, REDIRECT_SUFFIX), index);
        let mut virt = ConfigObject::new(scope.sibling(&name), "ltm virtual");
        virt.set("description", description(scope.item));
        virt.set(
            "destination",
            destination_string(&address_path, dest.is_ipv6(), 80),
        );
        virt.set(
            "source",
            endpoint
                .source
                .clone()
                .unwrap_or_else(|| default_source(dest.is_ipv6(), scope.route_domain())),
        );
        virt.set("mask", dest.mask().unwrap_or_else(|| "any".to_string()));
        virt.set("ip-protocol", "tcp");
        let mut profiles = profiles::ProfileSet::default();
        profiles.add("/Common/f5-tcp-progressive", Side::All);
        profiles.add("/Common/http", Side::All);
        virt.set("profiles", profiles.into_value());
        virt.set("rules", to_ordered_map([HTTPS_REDIRECT_RULE], "order"));
        virt.set(
            "source-address-translation",
            object([("type", Value::from("automap")), ("pool", Value::from("none"))]),
        );
        virt.set("translate-address", "enabled");
        virt.set("translate-port", "enabled");
        let active = scope.item.bool_prop("enable").unwrap_or(true) && scope.tenant_enabled();
        virt.set(if active { "enabled" } else { "disabled" }, true);
        Some(virt)
    }
}

/// WAF policy object and its path, when the service has one and ASM is
/// provisioned.
fn waf(env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Option<ConfigObject>> {
    let Some(value) = scope.item.prop("policyWAF") else {
        return Ok(None);
    };
    if !env.ctx.is_provisioned(&["asm"]) {
        warn!(
            service = %scope.path(),
            "asm is not provisioned, ignoring policyWAF"
        );
        return Ok(None);
    }
    let waf_path = match classify(value) {
        Reference::Inline(_) => {
            return Err(TranslateError::invalid(scope.path(), "policyWAF must be a reference"))
        }
        _ => env.resolver.resolve_path(scope, value)?,
    };
    let path = scope.sibling(&with_role(scope.name, WAF_SUFFIX));
    Ok(Some(waf_policy(path, &waf_path)))
}

impl Translator for ServiceTranslator {
    fn kind(&self) -> ObjectKind {
        self.kind.object_kind()
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let kind = self.kind;
        let endpoints = endpoints(env, scope)?;
        let port = port(env, scope, kind)?;
        let protocol = item.str_prop("layer4").unwrap_or(kind.default_protocol());
        let rd = scope.route_domain();
        let share = item.bool_prop("shareAddresses").unwrap_or(false);
        let redirect80 = kind == ServiceKind::Https && item.bool_prop("redirect80").unwrap_or(true);

        let mut shared = common(env, scope, kind)?;
        let mut attached = attached(env, scope, kind)?;
        let mut out = Translation::default();

        if let Some(policy) = waf(env, scope)? {
            shared.policies.push(policy.path.clone());
            if !attached.profiles.contains(WEBSECURITY) {
                attached.profiles.add(WEBSECURITY, Side::All);
            }
            out.push(policy);
        }
        if let Some(timer) = &shared.service_policy {
            env.ctx.require(Feature::IdleTimeoutPolicy, &scope.path())?;
            let policy = service_policy(scope, timer);
            shared.service_policy = Some(policy.path.clone());
            out.push(policy);
        }
        let policies = to_set_or_none(shared.policies.iter().cloned());
        let profiles = attached.profiles.into_value();

        for (index, endpoint) in endpoints.iter().enumerate() {
            let virtual_name = indexed(scope.name, index);
            let virtual_path = scope.sibling(&virtual_name);

            let partition = if share { COMMON } else { scope.tenant };
            if let Destination::Literal(parsed) = &endpoint.destination {
                let va_path = item_path(partition, None, &parsed.with_rd(rd));
                out.push(virtual_address_object(va_path, parsed, rd, scope.tenant_enabled()));
            }

            let needs_tmc = matches!(endpoint.destination, Destination::AddressList(_))
                || matches!(port, Port::List(_));
            let tmc_path = if needs_tmc {
                env.ctx.require(Feature::TrafficMatchingCriteria, &scope.path())?;
                let path = scope.sibling(&with_role(&virtual_name, TMC_SUFFIX));
                out.push(traffic_matching_criteria(scope, path.clone(), endpoint, &port, protocol));
                Some(path)
            } else {
                None
            };

            let (snat, snat_pool) = snat(env, scope, kind, &virtual_name, endpoint)?;
            if let Some(pool) = snat_pool {
                out.push(pool);
            }

            let mut virt = self.virtual_server(
                env,
                scope,
                virtual_path.clone(),
                endpoint,
                &port,
                tmc_path.as_deref(),
                snat,
                &shared,
                profiles.clone(),
            )?;
            virt.set("policies", policies.clone());
            out.push(virt);
            for role in &attached.roles {
                out.role_overrides.push(RoleOverride {
                    virtual_path: virtual_path.clone(),
                    role: *role,
                });
            }

            if redirect80 && tmc_path.is_none() {
                if let Some(redirect) = self.redirect(scope, index, endpoint, partition) {
                    out.push(redirect);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tracing_test::traced_test;

    use crate::context::StaticInventory;
    use crate::error::TranslateError;
    use crate::translators::testing::{context, context_with, declaration, find, paths, run};
    use crate::translators::ProfileRole;

    #[test]
    fn http_service_defaults() {
        let decl = declaration(json!({
            "web_pool": { "class": "Pool", "members": [] },
            "svc": {
                "class": "Service_HTTP",
                "remark": "A description",
                "virtualAddresses": ["192.0.2.10"],
                "pool": "web_pool"
            }
        }));
        let out = run(&context("15.1"), &decl, "svc").expect("service");
        assert_eq!(
            paths(&out),
            vec![("ltm virtual-address", "/t/192.0.2.10"), ("ltm virtual", "/t/a/svc")]
        );
        let props = &find(&out, "/t/a/svc").properties;
        assert_eq!(props["destination"], json!("/t/192.0.2.10:80"));
        assert_eq!(props["source"], json!("0.0.0.0/0"));
        assert_eq!(props["mask"], json!("255.255.255.255"));
        assert_eq!(props["ip-protocol"], json!("tcp"));
        assert_eq!(props["pool"], json!("/t/a/web_pool"));
        assert_eq!(props["description"], json!("\"A description\""));
        assert_eq!(
            props["profiles"],
            json!({
                "/Common/f5-tcp-progressive": { "context": "all" },
                "/Common/http": { "context": "all" }
            })
        );
        assert_eq!(props["persist"], json!({ "/Common/cookie": { "default": "yes" } }));
        assert_eq!(
            props["source-address-translation"],
            json!({ "type": "automap", "pool": "none" })
        );
        assert_eq!(props["enabled"], json!(true));
        assert_eq!(props["policies"], json!("none"));
    }

    #[test]
    fn https_expands_addresses_and_adds_redirects() {
        let decl = declaration(json!({
            "cert": { "class": "Certificate", "certificate": "-----BEGIN CERTIFICATE-----", "privateKey": "-----BEGIN KEY-----" },
            "tls": { "class": "TLS_Server", "certificates": [{ "certificate": "cert" }] },
            "svc": {
                "class": "Service_HTTPS",
                "virtualAddresses": ["192.0.2.10", "2001:db8::10"],
                "serverTLS": "tls"
            }
        }));
        let out = run(&context("15.1"), &decl, "svc").expect("service");
        assert_eq!(
            paths(&out),
            vec![
                ("ltm virtual-address", "/t/192.0.2.10"),
                ("ltm virtual", "/t/a/svc"),
                ("ltm virtual", "/t/a/svc-Redirect-"),
                ("ltm virtual-address", "/t/2001:db8::10"),
                ("ltm virtual", "/t/a/svc-1-"),
                ("ltm virtual", "/t/a/svc-Redirect--1-"),
            ]
        );
        let second = &find(&out, "/t/a/svc-1-").properties;
        assert_eq!(second["destination"], json!("/t/2001:db8::10.443"));
        assert_eq!(second["source"], json!("::/0"));
        assert_eq!(second["profiles"]["/t/a/tls"], json!({ "context": "clientside" }));
        let redirect = &find(&out, "/t/a/svc-Redirect-").properties;
        assert_eq!(redirect["destination"], json!("/t/192.0.2.10:80"));
        assert_eq!(
            redirect["rules"],
            json!({ "/Common/_sys_https_redirect": { "order": 0 } })
        );
    }

    #[test]
    fn snat_self_over_two_addresses() {
        let decl = declaration(json!({
            "svc": {
                "class": "Service_TCP",
                "virtualPort": 8080,
                "virtualAddresses": ["192.0.2.10", "192.0.2.11"],
                "snat": "self"
            }
        }));
        let out = run(&context("15.1"), &decl, "svc").expect("service");
        let first = find(&out, "/t/a/svc-self");
        let second = find(&out, "/t/a/svc-1--self");
        assert_eq!(first.command, "ltm snatpool");
        assert_eq!(first.properties["members"], json!({ "192.0.2.10": {} }));
        assert_eq!(second.properties["members"], json!({ "192.0.2.11": {} }));
        assert_eq!(
            find(&out, "/t/a/svc-1-").properties["source-address-translation"],
            json!({ "type": "snat", "pool": "/t/a/svc-1--self" })
        );
        let order: Vec<&str> = out.configs.iter().map(|c| c.path.as_str()).collect();
        let pool_pos = order.iter().position(|p| *p == "/t/a/svc-self").expect("pool");
        let virt_pos = order.iter().position(|p| *p == "/t/a/svc").expect("virtual");
        assert!(pool_pos < virt_pos);
    }

    #[test]
    fn snat_self_rejects_networks() {
        let decl = declaration(json!({
            "svc": {
                "class": "Service_TCP",
                "virtualPort": 8080,
                "virtualAddresses": ["10.0.0.0/8"],
                "snat": "self"
            }
        }));
        let err = run(&context("15.1"), &decl, "svc").expect_err("network");
        assert!(matches!(err, TranslateError::InvalidDeclaration { .. }));

        let decl = declaration(json!({
            "svc": {
                "class": "Service_TCP",
                "virtualPort": 8080,
                "virtualAddresses": ["0.0.0.0"],
                "snat": "self"
            }
        }));
        let err = run(&context("15.1"), &decl, "svc").expect_err("wildcard");
        assert!(matches!(err, TranslateError::InvalidDeclaration { .. }));
    }

    #[test]
    fn snat_self_rejects_declared_networks() {
        let decl = declaration(json!({
            "va": { "class": "Service_Address", "virtualAddress": "192.0.2.0/24" },
            "svc": {
                "class": "Service_TCP",
                "virtualPort": 8080,
                "virtualAddresses": [{ "use": "va" }],
                "snat": "self"
            }
        }));
        let err = run(&context("15.1"), &decl, "svc").expect_err("declared network");
        assert!(matches!(err, TranslateError::InvalidDeclaration { .. }));
    }

    #[test]
    fn destinations_name_referenced_virtual_addresses() {
        let decl = declaration(json!({
            "va": { "class": "Service_Address", "virtualAddress": "192.0.2.40" },
            "va6": { "class": "Service_Address", "virtualAddress": "2001:db8::40" },
            "svc": {
                "class": "Service_HTTPS",
                "virtualAddresses": [{ "use": "va" }, { "use": "va6" }, { "bigip": "/Common/known" }],
                "redirect80": true
            }
        }));
        let mut inv = StaticInventory::default();
        inv.virtual_addresses.push(crate::context::VirtualAddressRecord {
            full_path: "/Common/known".to_string(),
            partition: "Common".to_string(),
            address: "192.0.2.50".to_string(),
            metadata: json!({}),
        });
        let out = run(&context_with("15.1", &inv), &decl, "svc").expect("service");
        assert!(out.configs.iter().all(|c| c.command != "ltm virtual-address"));
        let destination = |path: &str| find(&out, path).properties["destination"].clone();
        assert_eq!(destination("/t/a/svc"), json!("/t/a/va:443"));
        assert_eq!(destination("/t/a/svc-Redirect-"), json!("/t/a/va:80"));
        assert_eq!(destination("/t/a/svc-1-"), json!("/t/a/va6.443"));
        assert_eq!(destination("/t/a/svc-Redirect--1-"), json!("/t/a/va6.80"));
        assert_eq!(destination("/t/a/svc-2-"), json!("/Common/known:443"));
        assert_eq!(destination("/t/a/svc-Redirect--2-"), json!("/Common/known:80"));
        assert_eq!(find(&out, "/t/a/svc-2-").properties["mask"], json!("255.255.255.255"));
    }

    #[test]
    fn route_domain_and_shared_addresses() {
        let decl = decl_core::Declaration::from_value(json!({
            "class": "ADC",
            "schemaVersion": "3.0.0",
            "t": {
                "class": "Tenant",
                "defaultRouteDomain": 100,
                "a": {
                    "class": "Application",
                    "svc": {
                        "class": "Service_UDP",
                        "virtualPort": 53,
                        "virtualAddresses": ["192.0.2.53"],
                        "shareAddresses": true
                    }
                }
            }
        }))
        .expect("declaration");
        let out = run(&context("15.1"), &decl, "svc").expect("service");
        let va = find(&out, "/Common/192.0.2.53%100");
        assert_eq!(va.properties["address"], json!("192.0.2.53%100"));
        let virt = &find(&out, "/t/a/svc").properties;
        assert_eq!(virt["destination"], json!("/Common/192.0.2.53%100:53"));
        assert_eq!(virt["source"], json!("0.0.0.0%100/0"));
        assert_eq!(virt["ip-protocol"], json!("udp"));
        assert_eq!(virt["persist"], json!({ "/Common/source_addr": { "default": "yes" } }));
    }

    #[test]
    fn address_lists_need_traffic_matching_criteria() {
        let decl = declaration(json!({
            "addrs": { "class": "Firewall_Address_List", "addresses": ["192.0.2.0/24"] },
            "svc": {
                "class": "Service_TCP",
                "virtualPort": 443,
                "virtualAddresses": [{ "use": "addrs" }]
            }
        }));
        let out = run(&context("14.1"), &decl, "svc").expect("service");
        let tmc = find(&out, "/t/a/svc-tmc");
        assert_eq!(tmc.command, "ltm traffic-matching-criteria");
        assert_eq!(tmc.properties["destination-address-list"], json!("/t/a/addrs"));
        assert_eq!(tmc.properties["destination-port-inline"], json!("443"));
        let virt = &find(&out, "/t/a/svc").properties;
        assert_eq!(virt["traffic-matching-criteria"], json!("/t/a/svc-tmc"));
        assert!(virt.get("destination").is_none());

        let err = run(&context("14.0"), &decl, "svc").expect_err("gated");
        assert!(matches!(err, TranslateError::UnsupportedVersion { .. }));
    }

    #[test]
    fn relative_bigip_client_tls_fails() {
        let decl = declaration(json!({
            "svc": {
                "class": "Service_HTTPS",
                "virtualAddresses": ["192.0.2.10"],
                "clientTLS": { "bigip": "serverssl" }
            }
        }));
        let err = run(&context("15.1"), &decl, "svc").expect_err("relative");
        assert!(matches!(err, TranslateError::InvalidReference { .. }));
    }

    #[test]
    #[traced_test]
    fn waf_without_asm_is_left_out_with_a_warning() {
        let decl = declaration(json!({
            "svc": {
                "class": "Service_HTTP",
                "virtualAddresses": ["192.0.2.10"],
                "policyWAF": { "bigip": "/Common/waf" }
            }
        }));
        let out = run(&context("15.1"), &decl, "svc").expect("service");
        assert!(out.configs.iter().all(|c| c.command != "ltm policy"));
        assert!(logs_contain("asm is not provisioned"));

        let ctx = context("15.1").with_modules(["asm"]);
        let out = run(&ctx, &decl, "svc").expect("service");
        let policy = find(&out, "/t/a/svc-waf");
        assert_eq!(policy.command, "ltm policy");
        let virt = &find(&out, "/t/a/svc").properties;
        assert_eq!(virt["policies"], json!({ "/t/a/svc-waf": {} }));
        assert_eq!(virt["profiles"]["/Common/websecurity"], json!({ "context": "all" }));
    }

    #[test]
    fn access_profile_extras_follow_inventory_type() {
        let decl = declaration(json!({
            "svc": {
                "class": "Service_HTTP",
                "virtualAddresses": ["192.0.2.10"],
                "profileAccess": { "bigip": "/Common/access" }
            }
        }));
        let mut inv = StaticInventory::default();
        inv.access_profiles.insert("/Common/access".to_string(), "all".to_string());
        let ctx = context_with("15.1", &inv).with_modules(["apm"]);
        let out = run(&ctx, &decl, "svc").expect("service");
        let profiles = &find(&out, "/t/a/svc").properties["profiles"];
        assert!(profiles.get("/Common/rba").is_some());
        assert!(profiles.get("/Common/websso").is_some());

        inv.access_profiles.insert("/Common/access".to_string(), "ssl-orchestrator".to_string());
        let ctx = context_with("15.1", &inv).with_modules(["apm"]);
        let out = run(&ctx, &decl, "svc").expect("service");
        let profiles = &find(&out, "/t/a/svc").properties["profiles"];
        assert!(profiles.get("/Common/rba").is_none());
    }

    #[test]
    fn disabled_tenant_disables_virtuals() {
        let decl = decl_core::Declaration::from_value(json!({
            "class": "ADC",
            "schemaVersion": "3.0.0",
            "t": {
                "class": "Tenant",
                "enable": false,
                "a": {
                    "class": "Application",
                    "svc": { "class": "Service_L4", "virtualPort": 0, "virtualAddresses": ["0.0.0.0"] }
                }
            }
        }))
        .expect("declaration");
        let out = run(&context("15.1"), &decl, "svc").expect("service");
        let virt = &find(&out, "/t/a/svc").properties;
        assert_eq!(virt["disabled"], json!(true));
        assert!(virt.get("enabled").is_none());
        assert_eq!(virt["destination"], json!("/t/any:0"));
        assert_eq!(virt["mask"], json!("any"));
        assert_eq!(find(&out, "/t/any").properties["enabled"], json!("no"));
    }

    #[test]
    fn explicit_websocket_profile_overrides_the_role() {
        let decl = declaration(json!({
            "svc": {
                "class": "Service_HTTP",
                "virtualAddresses": ["192.0.2.10"],
                "profileWebSocket": { "bigip": "/Common/websocket" }
            }
        }));
        let out = run(&context("15.1"), &decl, "svc").expect("service");
        assert_eq!(out.role_overrides.len(), 1);
        assert_eq!(out.role_overrides[0].role, ProfileRole::Websocket);
        assert_eq!(out.role_overrides[0].virtual_path, "/t/a/svc");
    }
}
