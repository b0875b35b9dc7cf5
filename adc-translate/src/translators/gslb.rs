//! GSLB objects.
//!
//! Data centers, servers, monitors, prober pools, regions and topology
//! records are global on the appliance and always live in `/Common`,
//! whatever tenant declares them. Pools and wide IPs stay in their
//! tenant; a wide IP is named after its domain.

use decl_core::{ConfigObject, DeclValue};
use serde_json::{Map, Value};

use super::pool::monitor_expression;
use super::{Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::naming::object;
use crate::normalize::{description, enabled_disabled, quote_or_none, quote_string, to_set_or_none, yes_no};
use crate::registry::ObjectKind;

const COMMON: &str = "Common";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GslbKind {
    DataCenter,
    Server,
    Monitor,
    ProberPool,
    TopologyRegion,
    TopologyRecords,
    Pool,
    Domain,
}

impl GslbKind {
    fn object_kind(self) -> ObjectKind {
        match self {
            GslbKind::DataCenter => ObjectKind::GslbDataCenter,
            GslbKind::Server => ObjectKind::GslbServer,
            GslbKind::Monitor => ObjectKind::GslbMonitor,
            GslbKind::ProberPool => ObjectKind::GslbProberPool,
            GslbKind::TopologyRegion => ObjectKind::GslbTopologyRegion,
            GslbKind::TopologyRecords => ObjectKind::GslbTopologyRecords,
            GslbKind::Pool => ObjectKind::GslbPool,
            GslbKind::Domain => ObjectKind::GslbDomain,
        }
    }

    fn is_global(self) -> bool {
        !matches!(self, GslbKind::Pool | GslbKind::Domain)
    }
}

pub struct GslbTranslator {
    kind: GslbKind,
}

impl GslbTranslator {
    pub const fn new(kind: GslbKind) -> Self {
        Self { kind }
    }
}

fn common_path(name: &str) -> String {
    format!("/{COMMON}/{name}")
}

/// `addr:port`, with `.` before the port for IPv6.
fn destination(address: &str, port: u64) -> String {
    let sep = if address.contains(':') { '.' } else { ':' };
    format!("{address}{sep}{port}")
}

fn pointer_or_none(env: &Env<'_>, scope: &ItemScope<'_>, value: Option<&Value>, kinds: &[ObjectKind]) -> Result<String> {
    match value {
        Some(pointer) => env.resolver.resolve_kind(scope, pointer, kinds),
        None => Ok("none".to_string()),
    }
}

fn gslb_monitors(env: &Env<'_>, scope: &ItemScope<'_>, list: &[Value]) -> Result<String> {
    let paths = list
        .iter()
        .map(|m| env.resolver.resolve_kind(scope, m, &[ObjectKind::GslbMonitor]))
        .collect::<Result<Vec<_>>>()?;
    Ok(monitor_expression(&paths, None).unwrap_or_else(|| "none".to_string()))
}

impl Translator for GslbTranslator {
    fn kind(&self) -> ObjectKind {
        self.kind.object_kind()
    }

    fn primary_path(&self, scope: &ItemScope<'_>) -> String {
        match self.kind {
            GslbKind::Domain => scope.sibling(scope.item.str_prop("domainName").unwrap_or(scope.name)),
            kind if kind.is_global() => common_path(scope.name),
            _ => scope.path(),
        }
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let path = self.primary_path(scope);
        let obj = match self.kind {
            GslbKind::DataCenter => data_center(env, scope, path)?,
            GslbKind::Server => server(env, scope, path)?,
            GslbKind::Monitor => monitor(scope, path)?,
            GslbKind::ProberPool => prober_pool(env, scope, path)?,
            GslbKind::TopologyRegion => region(env, scope, path)?,
            GslbKind::TopologyRecords => topology(env, scope, path)?,
            GslbKind::Pool => pool(env, scope, path)?,
            GslbKind::Domain => domain(env, scope, path)?,
        };
        Ok(Translation::single(obj))
    }
}

fn base(scope: &ItemScope<'_>, path: String, command: &str) -> ConfigObject {
    let mut obj = ConfigObject::new(path, command);
    obj.set("description", description(scope.item));
    obj
}

fn prober_settings(env: &Env<'_>, scope: &ItemScope<'_>, obj: &mut ConfigObject) -> Result<()> {
    let item = scope.item;
    obj.set(
        "prober-pool",
        pointer_or_none(env, scope, item.prop("proberPool"), &[ObjectKind::GslbProberPool])?,
    );
    obj.set(
        "prober-preference",
        item.str_prop("proberPreferred").unwrap_or("inherit"),
    );
    obj.set(
        "prober-fallback",
        item.str_prop("proberFallback").unwrap_or("inherit"),
    );
    Ok(())
}

fn data_center(env: &Env<'_>, scope: &ItemScope<'_>, path: String) -> Result<ConfigObject> {
    let item = scope.item;
    let mut dc = base(scope, path, "gtm datacenter");
    dc.set("enabled", item.bool_prop("enabled").unwrap_or(true));
    dc.set("location", quote_or_none(item.str_prop("location")));
    dc.set("contact", quote_or_none(item.str_prop("contact")));
    prober_settings(env, scope, &mut dc)?;
    if dc.property_str("prober-preference") == Some("inherit") {
        dc.set("prober-preference", "inside-datacenter");
    }
    if dc.property_str("prober-fallback") == Some("inherit") {
        dc.set("prober-fallback", "any-available");
    }
    Ok(dc)
}

fn server(env: &Env<'_>, scope: &ItemScope<'_>, path: String) -> Result<ConfigObject> {
    let item = scope.item;
    let Some(dc) = item.prop("dataCenter") else {
        return Err(TranslateError::invalid(path, "GSLB servers need a dataCenter"));
    };
    let mut server = base(scope, path, "gtm server");
    server.set(
        "datacenter",
        env.resolver.resolve_kind(scope, dc, &[ObjectKind::GslbDataCenter])?,
    );
    server.set("enabled", item.bool_prop("enabled").unwrap_or(true));
    server.set("product", item.str_prop("serverType").unwrap_or("bigip"));
    server.set("monitor", gslb_monitors(env, scope, item.array_prop("monitors"))?);
    server.set(
        "virtual-server-discovery",
        enabled_disabled(item.bool_prop("virtualServerDiscoveryMode").unwrap_or(false)),
    );
    server.set(
        "expose-route-domains",
        yes_no(item.bool_prop("exposeRouteDomainsEnabled").unwrap_or(false)),
    );
    prober_settings(env, scope, &mut server)?;

    let mut devices = Map::new();
    for (idx, device) in item.array_prop("devices").iter().enumerate() {
        let Some(address) = device.str_prop("address") else {
            return Err(TranslateError::invalid(scope.path(), "every device needs an address"));
        };
        let translation = device.str_prop("addressTranslation").unwrap_or("none");
        let mut addresses = Map::new();
        addresses.insert(address.to_string(), object([("translation", Value::from(translation))]));
        devices.insert(
            idx.to_string(),
            object([
                ("addresses", Value::Object(addresses)),
                ("description", Value::from(quote_or_none(device.str_prop("remark")))),
            ]),
        );
    }
    server.set("devices", Value::Object(devices));

    let mut virtuals = Map::new();
    for (idx, vs) in item.array_prop("virtualServers").iter().enumerate() {
        let Some(address) = vs.str_prop("address") else {
            return Err(TranslateError::invalid(scope.path(), "every virtual server needs an address"));
        };
        let name = vs.str_prop("name").map_or_else(|| idx.to_string(), str::to_string);
        let port = vs.u64_prop("port").unwrap_or(0);
        virtuals.insert(
            name,
            object([
                ("destination", Value::from(destination(address, port))),
                ("enabled", Value::from(vs.bool_prop("enabled").unwrap_or(true))),
                ("translation-address", Value::from(vs.str_prop("addressTranslation").unwrap_or("none"))),
                ("translation-port", Value::from(vs.u64_prop("addressTranslationPort").unwrap_or(0))),
                ("monitor", Value::from(gslb_monitors(env, scope, vs.array_prop("monitors"))?)),
                ("description", Value::from(quote_or_none(vs.str_prop("remark")))),
            ]),
        );
    }
    server.set("virtual-servers", Value::Object(virtuals));
    Ok(server)
}

fn monitor(scope: &ItemScope<'_>, path: String) -> Result<ConfigObject> {
    let item = scope.item;
    let kind = item.str_prop("monitorType").unwrap_or("http");
    if !matches!(kind, "http" | "https" | "gateway-icmp" | "tcp" | "udp") {
        return Err(TranslateError::invalid(path, format!("unsupported GSLB monitorType {kind}")));
    }
    let mut mon = base(scope, path, &format!("gtm monitor {kind}"));
    mon.set("interval", item.u64_prop("interval").unwrap_or(30));
    mon.set("timeout", item.u64_prop("timeout").unwrap_or(120));
    mon.set("probe-timeout", item.u64_prop("probeTimeout").unwrap_or(5));
    let address = item.str_prop("target").unwrap_or("*");
    mon.set("destination", format!("{address}:*"));
    mon.set(
        "ignore-down-response",
        enabled_disabled(item.bool_prop("ignoreDownResponseEnabled").unwrap_or(false)),
    );
    mon.set(
        "transparent",
        enabled_disabled(item.bool_prop("transparent").unwrap_or(false)),
    );
    if matches!(kind, "http" | "https" | "tcp" | "udp") {
        mon.set("send", quote_or_none(item.str_prop("send")));
        mon.set("recv", quote_or_none(item.str_prop("receive")));
        mon.set("reverse", enabled_disabled(item.bool_prop("reverseEnabled").unwrap_or(false)));
    }
    if kind == "https" {
        mon.set("cipherlist", item.str_prop("ciphers").unwrap_or("DEFAULT"));
    }
    Ok(mon)
}

fn prober_pool(env: &Env<'_>, scope: &ItemScope<'_>, path: String) -> Result<ConfigObject> {
    let item = scope.item;
    let mut pool = base(scope, path, "gtm prober-pool");
    pool.set("enabled", item.bool_prop("enabled").unwrap_or(true));
    pool.set(
        "load-balancing-mode",
        item.str_prop("lbMode").unwrap_or("global-round-robin"),
    );
    let mut members = Map::new();
    for (idx, member) in item.array_prop("members").iter().enumerate() {
        let Some(server) = member.prop("server") else {
            return Err(TranslateError::invalid(scope.path(), "prober members need a server"));
        };
        let server = env.resolver.resolve_kind(scope, server, &[ObjectKind::GslbServer])?;
        members.insert(
            server,
            object([
                ("order", Value::from(idx)),
                ("enabled", Value::from(member.bool_prop("enabled").unwrap_or(true))),
            ]),
        );
    }
    pool.set("members", Value::Object(members));
    Ok(pool)
}

/// Descriptive key for one region/topology match: `[not] <type> <value>`.
fn match_key(env: &Env<'_>, scope: &ItemScope<'_>, spec: &Value) -> Result<String> {
    let kind = spec.str_prop("matchType").unwrap_or("subnet");
    let negated = spec.str_prop("matchOperator") == Some("not-equals");
    let value = match spec.prop("matchValue") {
        Some(value @ Value::Object(_)) => {
            let kinds: &[ObjectKind] = match kind {
                "pool" => &[ObjectKind::GslbPool],
                "datacenter" => &[ObjectKind::GslbDataCenter],
                "region" => &[ObjectKind::GslbTopologyRegion],
                _ => &[],
            };
            if kinds.is_empty() {
                env.resolver.resolve_path(scope, value)?
            } else {
                env.resolver.resolve_kind(scope, value, kinds)?
            }
        }
        Some(Value::String(s)) if kind == "state" || s.chars().any(char::is_whitespace) => quote_string(s),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => {
            return Err(TranslateError::invalid(scope.path(), "matches need a matchValue"));
        }
    };
    let kind = match kind {
        "geoipIsp" => "geoip-isp",
        other => other,
    };
    Ok(if negated {
        format!("not {kind} {value}")
    } else {
        format!("{kind} {value}")
    })
}

fn region(env: &Env<'_>, scope: &ItemScope<'_>, path: String) -> Result<ConfigObject> {
    let keys = scope
        .item
        .array_prop("regionMembers")
        .iter()
        .map(|m| match_key(env, scope, m))
        .collect::<Result<Vec<_>>>()?;
    let mut region = base(scope, path, "gtm region");
    region.set("region-members", to_set_or_none(keys));
    Ok(region)
}

fn topology(env: &Env<'_>, scope: &ItemScope<'_>, path: String) -> Result<ConfigObject> {
    let mut records = Map::new();
    for (idx, record) in scope.item.array_prop("records").iter().enumerate() {
        let (Some(source), Some(dest)) = (record.prop("source"), record.prop("destination")) else {
            return Err(TranslateError::invalid(
                scope.path(),
                "topology records need a source and a destination",
            ));
        };
        let key = format!(
            "ldns: {} server: {}",
            match_key(env, scope, source)?,
            match_key(env, scope, dest)?
        );
        records.insert(
            key,
            object([
                ("order", Value::from(idx)),
                ("score", Value::from(record.u64_prop("weight").unwrap_or(1))),
            ]),
        );
    }
    let mut topology = ConfigObject::new(path, "gtm topology");
    topology.set(
        "longest-match-enabled",
        scope.item.bool_prop("longestMatchEnabled").unwrap_or(true),
    );
    topology.set("records", Value::Object(records));
    Ok(topology)
}

fn pool(env: &Env<'_>, scope: &ItemScope<'_>, path: String) -> Result<ConfigObject> {
    let item = scope.item;
    let rr = item.str_prop("resourceRecordType").unwrap_or("A").to_ascii_lowercase();
    if !matches!(rr.as_str(), "a" | "aaaa" | "cname" | "mx") {
        return Err(TranslateError::invalid(path, format!("unknown resourceRecordType {rr}")));
    }
    let mut pool = base(scope, path, &format!("gtm pool {rr}"));
    pool.set("enabled", item.bool_prop("enabled").unwrap_or(true));
    pool.set("load-balancing-mode", item.str_prop("lbModePreferred").unwrap_or("round-robin"));
    pool.set("alternate-mode", item.str_prop("lbModeAlternate").unwrap_or("round-robin"));
    pool.set("fallback-mode", item.str_prop("lbModeFallback").unwrap_or("return-to-dns"));
    pool.set("manual-resume", enabled_disabled(item.bool_prop("manualResumeEnabled").unwrap_or(false)));
    pool.set("ttl", item.u64_prop("ttl").unwrap_or(30));
    pool.set(
        "verify-member-availability",
        enabled_disabled(item.bool_prop("verifyMemberEnabled").unwrap_or(true)),
    );
    pool.set("monitor", gslb_monitors(env, scope, item.array_prop("monitors"))?);
    if matches!(rr.as_str(), "a" | "aaaa") {
        pool.set("fallback-ip", item.str_prop("fallbackIP").unwrap_or("any"));
    }

    let mut members = Map::new();
    for (idx, member) in item.array_prop("members").iter().enumerate() {
        let mut entry = Map::new();
        entry.insert("member-order".to_string(), Value::from(idx));
        entry.insert("ratio".to_string(), Value::from(member.u64_prop("ratio").unwrap_or(1)));
        entry.insert("enabled".to_string(), Value::from(member.bool_prop("enabled").unwrap_or(true)));
        let key = match rr.as_str() {
            "a" | "aaaa" => {
                let (Some(server), Some(vs)) = (member.prop("server"), member.str_prop("virtualServer")) else {
                    return Err(TranslateError::invalid(
                        scope.path(),
                        "members need a server and a virtualServer",
                    ));
                };
                let server = env.resolver.resolve_kind(scope, server, &[ObjectKind::GslbServer])?;
                let depends = member
                    .array_prop("dependsOn")
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>();
                entry.insert("depends-on".to_string(), to_set_or_none(depends));
                format!("{server}:{vs}")
            }
            "cname" => {
                let Some(name) = member.str_prop("domainName") else {
                    return Err(TranslateError::invalid(scope.path(), "CNAME members need a domainName"));
                };
                entry.insert(
                    "static-target".to_string(),
                    Value::from(yes_no(member.bool_prop("isDomainNameStatic").unwrap_or(false))),
                );
                name.to_string()
            }
            _ => {
                let Some(domain) = member.prop("domainName") else {
                    return Err(TranslateError::invalid(scope.path(), "MX members need a domainName"));
                };
                entry.insert("priority".to_string(), Value::from(member.u64_prop("priority").unwrap_or(1)));
                env.resolver.resolve_kind(scope, domain, &[ObjectKind::GslbDomain])?
            }
        };
        members.insert(key, Value::Object(entry));
    }
    pool.set("members", Value::Object(members));
    Ok(pool)
}

fn domain(env: &Env<'_>, scope: &ItemScope<'_>, path: String) -> Result<ConfigObject> {
    let item = scope.item;
    let rr = item.str_prop("resourceRecordType").unwrap_or("A").to_ascii_lowercase();
    let mut wideip = base(scope, path, &format!("gtm wideip {rr}"));
    wideip.set("enabled", item.bool_prop("enabled").unwrap_or(true));
    wideip.set(
        "aliases",
        to_set_or_none(item.array_prop("aliases").iter().filter_map(Value::as_str).map(str::to_string)),
    );
    wideip.set("pool-lb-mode", item.str_prop("poolLbMode").unwrap_or("round-robin"));
    wideip.set(
        "persistence",
        enabled_disabled(item.bool_prop("persistenceEnabled").unwrap_or(false)),
    );
    wideip.set("ttl-persistence", item.u64_prop("persistenceTTL").unwrap_or(3600));
    wideip.set(
        "minimal-response",
        enabled_disabled(item.bool_prop("minimalResponseEnabled").unwrap_or(true)),
    );
    wideip.set(
        "failure-rcode-response",
        enabled_disabled(item.bool_prop("failureRcodeResponse").unwrap_or(false)),
    );
    wideip.set("failure-rcode", item.str_prop("failureRcode").unwrap_or("noerror"));

    let mut pools = Map::new();
    for (idx, entry) in item.array_prop("pools").iter().enumerate() {
        let path = env.resolver.resolve_kind(scope, entry, &[ObjectKind::GslbPool])?;
        pools.insert(
            path,
            object([
                ("order", Value::from(idx)),
                ("ratio", Value::from(entry.u64_prop("ratio").unwrap_or(1))),
            ]),
        );
    }
    wideip.set("pools", Value::Object(pools));

    let last_resort = match item.prop("lastResortPool") {
        Some(pointer) => format!(
            "{rr} {}",
            env.resolver.resolve_kind(scope, pointer, &[ObjectKind::GslbPool])?
        ),
        None => "none".to_string(),
    };
    wideip.set("last-resort-pool", last_resort);

    let rules = item
        .array_prop("iRules")
        .iter()
        .map(|r| env.resolver.resolve_kind(scope, r, &[ObjectKind::IRule]))
        .collect::<Result<Vec<_>>>()?;
    wideip.set(
        "rules",
        if rules.is_empty() {
            Value::from("none")
        } else {
            crate::normalize::to_ordered_map(rules, "order")
        },
    );
    Ok(wideip)
}
