//! Address parsing plus the `Service_Address` and `SNAT_Pool` classes.

use std::net::{IpAddr, Ipv6Addr};

use decl_core::{ConfigObject, DeclValue};
use serde_json::Value;

use super::{described, Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::normalize::{enabled_disabled, split_route_domain, to_set, with_route_domain, yes_no};
use crate::registry::ObjectKind;

pub(crate) const DEFAULT_TRAFFIC_GROUP: &str = "/Common/traffic-group-1";

/// A literal virtual or SNAT address, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    /// Canonical address without route domain or prefix; `any`/`any6` for
    /// wildcards.
    pub address: String,
    pub route_domain: Option<u32>,
    pub prefix: u8,
    pub ipv6: bool,
}

impl ParsedAddress {
    /// Parse `addr[%rd][/prefix]`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (body, prefix) = match raw.split_once('/') {
            Some((body, prefix)) => (body, Some(prefix.parse::<u8>().ok()?)),
            None => (raw, None),
        };
        let (bare, route_domain) = split_route_domain(body);
        let ip: IpAddr = bare.parse().ok()?;

        let (address, ipv6, full) = match ip {
            IpAddr::V4(v4) => (v4.to_string(), false, 32),
            IpAddr::V6(v6) => (canonical_ipv6(&v6), true, 128),
        };
        let prefix = prefix.unwrap_or(full);
        if prefix > full {
            return None;
        }
        let address = if ip.is_unspecified() && (prefix == 0 || prefix == full) {
            (if ipv6 { "any6" } else { "any" }).to_string()
        } else {
            address
        };
        let prefix = if address.starts_with("any") { 0 } else { prefix };
        Some(Self {
            address,
            route_domain,
            prefix,
            ipv6,
        })
    }

    pub fn is_wildcard(&self) -> bool {
        self.address == "any" || self.address == "any6"
    }

    pub fn is_host(&self) -> bool {
        !self.is_wildcard() && self.prefix == if self.ipv6 { 128 } else { 32 }
    }

    /// Address with the effective route domain applied.
    pub fn with_rd(&self, default_rd: u32) -> String {
        let explicit = match self.route_domain {
            Some(rd) => format!("{}%{rd}", self.address),
            None => self.address.clone(),
        };
        with_route_domain(&explicit, default_rd)
    }

    /// Dotted (IPv4) or hex (IPv6) netmask, `any`/`any6` for wildcards.
    pub fn mask(&self) -> String {
        if self.is_wildcard() {
            return self.address.clone();
        }
        if self.ipv6 {
            let bits: u128 = if self.prefix == 0 {
                0
            } else {
                u128::MAX << (128 - u32::from(self.prefix))
            };
            canonical_ipv6(&Ipv6Addr::from(bits))
        } else {
            let bits: u32 = if self.prefix == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(self.prefix))
            };
            std::net::Ipv4Addr::from(bits).to_string()
        }
    }
}

/// RFC 5952 text, except IPv4-mapped addresses stay in hex.
pub fn canonical_ipv6(addr: &Ipv6Addr) -> String {
    let segments = addr.segments();
    // Longest run of two or more zero segments, first one on ties.
    let mut best: Option<(usize, usize)> = None;
    let mut idx = 0;
    while idx < segments.len() {
        if segments[idx] == 0 {
            let start = idx;
            while idx < segments.len() && segments[idx] == 0 {
                idx += 1;
            }
            let len = idx - start;
            if len >= 2 && best.map_or(true, |(_, best_len)| len > best_len) {
                best = Some((start, len));
            }
        } else {
            idx += 1;
        }
    }

    let hex = |s: &[u16]| s.iter().map(|seg| format!("{seg:x}")).collect::<Vec<_>>().join(":");
    match best {
        Some((start, len)) => format!(
            "{}::{}",
            hex(&segments[..start]),
            hex(&segments[start + len..])
        ),
        None => hex(&segments[..]),
    }
}

/// Properties shared by every `ltm virtual-address`.
pub(crate) fn virtual_address_object(
    path: String,
    parsed: &ParsedAddress,
    route_domain: u32,
    enabled: bool,
) -> ConfigObject {
    let mut obj = ConfigObject::new(path, "ltm virtual-address");
    obj.set("address", parsed.with_rd(route_domain));
    obj.set("arp", "enabled");
    obj.set("icmp-echo", "enabled");
    obj.set("mask", parsed.mask());
    obj.set("route-advertisement", "disabled");
    obj.set("spanning", "disabled");
    obj.set("traffic-group", DEFAULT_TRAFFIC_GROUP);
    obj.set("enabled", yes_no(enabled));
    obj.set("auto-delete", "true");
    obj
}

fn traffic_group(item: &Value) -> String {
    match item.str_prop("trafficGroup") {
        None | Some("default") => DEFAULT_TRAFFIC_GROUP.to_string(),
        Some(group) => group.to_string(),
    }
}

fn tri_state(value: Option<&str>, default: &'static str) -> &'static str {
    match value {
        Some("enable") => "enabled",
        Some("disable") => "disabled",
        Some("selective") => "selective",
        Some("always") => "always",
        Some("any") => "any",
        Some("all") => "all",
        _ => default,
    }
}

pub struct ServiceAddressTranslator;

impl Translator for ServiceAddressTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::ServiceAddress
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let raw = item.str_prop("virtualAddress").ok_or_else(|| {
            TranslateError::invalid(scope.path(), "virtualAddress is required")
        })?;
        let parsed = ParsedAddress::parse(raw).ok_or_else(|| {
            TranslateError::invalid(scope.path(), format!("invalid virtualAddress {raw}"))
        })?;

        let mut obj = described(scope, "ltm virtual-address");
        obj.set("address", parsed.with_rd(scope.route_domain()));
        obj.set(
            "arp",
            enabled_disabled(item.bool_prop("arpEnabled").unwrap_or(true)),
        );
        obj.set("icmp-echo", tri_state(item.str_prop("icmpEcho"), "enabled"));
        obj.set("mask", parsed.mask());
        obj.set(
            "route-advertisement",
            tri_state(item.str_prop("routeAdvertisement"), "disabled"),
        );
        obj.set(
            "spanning",
            enabled_disabled(item.bool_prop("spanningEnabled").unwrap_or(false)),
        );
        obj.set("traffic-group", traffic_group(item));
        obj.set("enabled", yes_no(scope.tenant_enabled()));
        obj.set("auto-delete", "false");
        Ok(Translation::single(obj))
    }
}

pub struct SnatPoolTranslator;

impl Translator for SnatPoolTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::SnatPool
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let mut members = Vec::new();
        for raw in scope.item.array_prop("snatAddresses") {
            let Some(raw) = raw.as_str() else {
                return Err(TranslateError::invalid(
                    scope.path(),
                    "snatAddresses must be strings",
                ));
            };
            members.push(snat_member(scope, raw)?);
        }
        let mut obj = described(scope, "ltm snatpool");
        obj.set("members", to_set(members));
        Ok(Translation::single(obj))
    }
}

/// A SNAT member address: a single host with the route domain applied.
pub(crate) fn snat_member(scope: &ItemScope<'_>, raw: &str) -> Result<String> {
    match ParsedAddress::parse(raw) {
        Some(parsed) if parsed.is_host() => Ok(parsed.with_rd(scope.route_domain())),
        _ => Err(TranslateError::invalid(
            scope.path(),
            format!("{raw} cannot be used as a SNAT address"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use serde_json::json;

    use super::{canonical_ipv6, ParsedAddress};
    use crate::error::TranslateError;
    use crate::translators::testing::{context, declaration, run};

    #[test]
    fn parses_literal_forms() {
        let host = ParsedAddress::parse("192.0.2.10").expect("host");
        assert!(host.is_host());
        assert_eq!(host.mask(), "255.255.255.255");

        let net = ParsedAddress::parse("10.1.0.0%2/16").expect("cidr");
        assert_eq!(net.route_domain, Some(2));
        assert_eq!(net.mask(), "255.255.0.0");
        assert_eq!(net.with_rd(0), "10.1.0.0%2");

        let any = ParsedAddress::parse("0.0.0.0").expect("any");
        assert!(any.is_wildcard());
        assert_eq!(any.address, "any");
        assert_eq!(any.mask(), "any");
        assert_eq!(ParsedAddress::parse("::").expect("any6").address, "any6");
        assert_eq!(ParsedAddress::parse("0.0.0.0/0").expect("any").address, "any");

        assert!(ParsedAddress::parse("not-an-ip").is_none());
        assert!(ParsedAddress::parse("192.0.2.1/40").is_none());
    }

    #[test]
    fn ipv4_mapped_addresses_become_hex() {
        let mapped = ParsedAddress::parse("::ffff:192.0.2.1").expect("mapped");
        assert_eq!(mapped.address, "::ffff:c000:201");
        assert_eq!(
            canonical_ipv6(&"2001:db8:0:0:1:0:0:1".parse::<Ipv6Addr>().expect("v6")),
            "2001:db8::1:0:0:1"
        );
        let v6 = ParsedAddress::parse("2001:db8::/64").expect("v6 net");
        assert_eq!(v6.mask(), "ffff:ffff:ffff:ffff::");
    }

    #[test]
    fn service_address_maps_flags() {
        let decl = declaration(json!({
            "va": {
                "class": "Service_Address",
                "virtualAddress": "192.0.2.20",
                "arpEnabled": false,
                "icmpEcho": "selective",
                "routeAdvertisement": "always",
                "trafficGroup": "/Common/traffic-group-local-only"
            }
        }));
        let ctx = context("15.1");
        let out = run(&ctx, &decl, "va").expect("address");
        let props = &out.configs[0].properties;
        assert_eq!(out.configs[0].command, "ltm virtual-address");
        assert_eq!(props["arp"], json!("disabled"));
        assert_eq!(props["icmp-echo"], json!("selective"));
        assert_eq!(props["route-advertisement"], json!("always"));
        assert_eq!(props["traffic-group"], json!("/Common/traffic-group-local-only"));
        assert_eq!(props["enabled"], json!("yes"));
    }

    #[test]
    fn snat_pool_members_reject_networks() {
        let decl = declaration(json!({
            "snat": { "class": "SNAT_Pool", "snatAddresses": ["192.0.2.30", "192.0.2.31%0"] },
            "bad": { "class": "SNAT_Pool", "snatAddresses": ["192.0.2.0/24"] }
        }));
        let ctx = context("15.1");
        let out = run(&ctx, &decl, "snat").expect("snat");
        assert_eq!(
            out.configs[0].properties["members"],
            json!({ "192.0.2.30": {}, "192.0.2.31": {} })
        );
        let err = run(&ctx, &decl, "bad").expect_err("network");
        assert!(matches!(err, TranslateError::InvalidDeclaration { .. }));
    }
}
