//! Where a virtual listens: the `virtualAddresses` entries of a service.

use decl_core::DeclValue;
use serde_json::Value;
use tracing::warn;

use crate::context::AddressMask;
use crate::error::{Result, TranslateError};
use crate::normalize::split_route_domain;
use crate::registry::ObjectKind;
use crate::resolver::{classify, Reference, Target};
use crate::translators::addresses::ParsedAddress;
use crate::translators::{Env, ItemScope};

/// Destination half of one `virtualAddresses` entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Destination {
    /// Literal address; the service emits its `ltm virtual-address`.
    Literal(ParsedAddress),
    /// A declared `Service_Address`, emitted by its own translator.
    Declared { path: String, parsed: ParsedAddress },
    /// A firewall address list; needs traffic-matching criteria.
    AddressList(String),
    /// A virtual address already on the appliance.
    Existing {
        path: String,
        address: String,
        mask: String,
    },
}

const HOST_MASKS: [&str; 2] = ["255.255.255.255", "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"];

impl Destination {
    /// Bare address with the route domain applied, when one is known.
    pub(crate) fn address(&self, route_domain: u32) -> Option<String> {
        match self {
            Destination::Literal(parsed) | Destination::Declared { parsed, .. } => {
                Some(parsed.with_rd(route_domain))
            }
            Destination::Existing { address, .. } => Some(address.clone()),
            Destination::AddressList(_) => None,
        }
    }

    pub(crate) fn is_ipv6(&self) -> bool {
        match self {
            Destination::Literal(parsed) | Destination::Declared { parsed, .. } => parsed.ipv6,
            Destination::Existing { address, .. } => split_route_domain(address).0.contains(':'),
            Destination::AddressList(_) => false,
        }
    }

    pub(crate) fn mask(&self) -> Option<String> {
        match self {
            Destination::Literal(parsed) | Destination::Declared { parsed, .. } => Some(parsed.mask()),
            Destination::Existing { mask, .. } => Some(mask.clone()),
            Destination::AddressList(_) => None,
        }
    }

    /// True when the destination names exactly one address.
    pub(crate) fn is_host(&self) -> bool {
        match self {
            Destination::Literal(parsed) | Destination::Declared { parsed, .. } => parsed.is_host(),
            Destination::Existing { mask, .. } => HOST_MASKS.contains(&mask.as_str()),
            Destination::AddressList(_) => false,
        }
    }

    /// Path of the `ltm virtual-address` a virtual's `destination` names.
    /// Literal addresses live in `partition`; address lists have none.
    pub(crate) fn object_path(&self, partition: &str, route_domain: u32) -> Option<String> {
        match self {
            Destination::Literal(parsed) => Some(format!("/{partition}/{}", parsed.with_rd(route_domain))),
            Destination::Declared { path, .. } | Destination::Existing { path, .. } => Some(path.clone()),
            Destination::AddressList(_) => None,
        }
    }
}

/// One resolved `virtualAddresses` entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Endpoint {
    pub destination: Destination,
    /// Source filter in `addr[%rd]/prefix` form.
    pub source: Option<String>,
}

fn parse_literal(scope: &ItemScope<'_>, raw: &str) -> Result<ParsedAddress> {
    ParsedAddress::parse(raw).ok_or_else(|| {
        TranslateError::invalid(scope.path(), format!("invalid virtual address {raw}"))
    })
}

fn source_filter(scope: &ItemScope<'_>, raw: &str) -> Result<String> {
    let parsed = parse_literal(scope, raw)?;
    let rd = parsed.with_rd(scope.route_domain());
    let bare = if parsed.is_wildcard() {
        let zero = if parsed.ipv6 { "::" } else { "0.0.0.0" };
        rd.replacen(&parsed.address, zero, 1)
    } else {
        rd
    };
    Ok(format!("{bare}/{}", parsed.prefix))
}

fn mask_or_host(recorded: &AddressMask) -> String {
    match &recorded.mask {
        Some(mask) => mask.clone(),
        None if recorded.address.contains(':') => "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff".to_string(),
        None => "255.255.255.255".to_string(),
    }
}

/// Look a pre-existing virtual address up: the inventory's address list
/// first, then addresses a previous task recorded for this entry, then
/// the last path segment with a host mask.
fn existing(env: &Env<'_>, scope: &ItemScope<'_>, path: &str, index: usize) -> Destination {
    let inventory = env.ctx.inventory();

    if let Some(record) = inventory
        .virtual_addresses()
        .into_iter()
        .find(|record| record.full_path == path)
    {
        let mask = record
            .metadata
            .str_prop("mask")
            .map(str::to_string)
            .unwrap_or_else(|| {
                mask_or_host(&AddressMask {
                    address: record.address.clone(),
                    mask: None,
                })
            });
        return Destination::Existing {
            path: record.full_path,
            address: record.address,
            mask,
        };
    }

    let recorded = inventory.task_metadata_virtual_addresses(
        scope.tenant,
        scope.app.unwrap_or_default(),
        scope.name,
    );
    if let Some(found) = recorded.get(index).and_then(|entry| entry.destination()) {
        return Destination::Existing {
            path: path.to_string(),
            address: found.address.clone(),
            mask: mask_or_host(found),
        };
    }

    let address = path.rsplit('/').next().unwrap_or(path).to_string();
    warn!(
        service = %scope.path(),
        virtual_address = %path,
        "virtual address not found in inventory, assuming a host address"
    );
    let mask = mask_or_host(&AddressMask {
        address: address.clone(),
        mask: None,
    });
    Destination::Existing {
        path: path.to_string(),
        address,
        mask,
    }
}

fn destination(env: &Env<'_>, scope: &ItemScope<'_>, value: &Value, index: usize) -> Result<Destination> {
    if let Value::String(raw) = value {
        if ParsedAddress::parse(raw).is_some() {
            return Ok(Destination::Literal(parse_literal(scope, raw)?));
        }
    }
    match classify(value) {
        Reference::Inline(_) => Err(TranslateError::invalid(
            scope.path(),
            format!("unsupported virtual address {value}"),
        )),
        _ => match env.resolver.target(scope, value)? {
            Target::BigIp(path) => Ok(existing(env, scope, &path, index)),
            Target::Declared(located) => match located.kind() {
                Some(ObjectKind::ServiceAddress) => {
                    let raw = located.item.str_prop("virtualAddress").unwrap_or_default();
                    Ok(Destination::Declared {
                        path: located.primary_path(),
                        parsed: parse_literal(scope, raw)?,
                    })
                }
                Some(ObjectKind::FirewallAddressList) => {
                    Ok(Destination::AddressList(located.primary_path()))
                }
                _ => Err(TranslateError::WrongClass {
                    reference: value.to_string(),
                    found: located.class().unwrap_or("none").to_string(),
                    expected: "Service_Address, Firewall_Address_List".to_string(),
                }),
            },
        },
    }
}

/// Resolve every `virtualAddresses` entry, in declaration order.
pub(crate) fn endpoints(env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Vec<Endpoint>> {
    let entries = scope.item.array_prop("virtualAddresses");
    if entries.is_empty() {
        return Err(TranslateError::invalid(
            scope.path(),
            "virtualAddresses must not be empty",
        ));
    }
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Array(pair) => {
                let (Some(dest), Some(Value::String(source))) = (pair.first(), pair.get(1)) else {
                    return Err(TranslateError::invalid(
                        scope.path(),
                        "address pairs are [destination, source]",
                    ));
                };
                Ok(Endpoint {
                    destination: destination(env, scope, dest, index)?,
                    source: Some(source_filter(scope, source)?),
                })
            }
            single => Ok(Endpoint {
                destination: destination(env, scope, single, index)?,
                source: None,
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{endpoints, Destination};
    use crate::context::{StaticInventory, TaskAddress};
    use crate::resolver::Resolver;
    use crate::translators::testing::{context, context_with, declaration};
    use crate::translators::{Env, ItemScope};

    fn resolve(decl: &decl_core::Declaration, ctx: &crate::context::Context<'_>) -> Vec<super::Endpoint> {
        let tenant = decl.tenant("t").expect("tenant");
        let item = decl.item("t", "a", "svc").expect("svc");
        let scope = ItemScope {
            tenant: "t",
            app: Some("a"),
            name: "svc",
            item,
            tenant_value: tenant,
        };
        let env = Env::new(ctx, Resolver::new(decl));
        endpoints(&env, &scope).expect("endpoints")
    }

    #[test]
    fn literals_pairs_and_declared_addresses() {
        let decl = declaration(json!({
            "va": { "class": "Service_Address", "virtualAddress": "192.0.2.40" },
            "svc": {
                "class": "Service_TCP",
                "virtualPort": 8080,
                "virtualAddresses": [
                    "192.0.2.10",
                    ["192.0.2.11", "10.0.0.0/8"],
                    { "use": "va" }
                ]
            }
        }));
        let eps = resolve(&decl, &context("15.1"));
        assert!(matches!(eps[0].destination, Destination::Literal(_)));
        assert_eq!(eps[1].source.as_deref(), Some("10.0.0.0/8"));
        assert_eq!(eps[2].destination.address(0).as_deref(), Some("192.0.2.40"));
        assert_eq!(eps[2].destination.object_path("t", 0).as_deref(), Some("/t/a/va"));
        assert_eq!(eps[0].destination.object_path("Common", 2).as_deref(), Some("/Common/192.0.2.10%2"));
        assert!(eps[0].destination.is_host());
    }

    #[test]
    fn existing_addresses_come_from_inventory_then_task_metadata() {
        let decl = declaration(json!({
            "svc": {
                "class": "Service_TCP",
                "virtualPort": 80,
                "virtualAddresses": [
                    { "bigip": "/Common/known" },
                    { "bigip": "/Common/recorded" },
                    { "bigip": "/Common/192.0.2.99" }
                ]
            }
        }));
        let mut inv = StaticInventory::default();
        inv.virtual_addresses.push(crate::context::VirtualAddressRecord {
            full_path: "/Common/known".to_string(),
            partition: "Common".to_string(),
            address: "192.0.2.50".to_string(),
            metadata: json!({ "mask": "255.255.255.0" }),
        });
        let recorded: Vec<TaskAddress> = serde_json::from_value(json!([
            { "address": "192.0.2.60" },
            { "address": "192.0.2.61", "mask": "255.255.255.255" }
        ]))
        .expect("metadata");
        inv.task_metadata.insert("t/a/svc".to_string(), recorded);
        let ctx = context_with("15.1", &inv);

        let eps = resolve(&decl, &ctx);
        assert_eq!(eps[0].destination.address(0).as_deref(), Some("192.0.2.50"));
        assert_eq!(eps[0].destination.mask().as_deref(), Some("255.255.255.0"));
        assert_eq!(eps[1].destination.address(0).as_deref(), Some("192.0.2.61"));
        assert_eq!(eps[2].destination.address(0).as_deref(), Some("192.0.2.99"));
        assert_eq!(eps[2].destination.mask().as_deref(), Some("255.255.255.255"));
        assert_eq!(eps[0].destination.object_path("t", 0).as_deref(), Some("/Common/known"));
        assert!(!eps[0].destination.is_host());
        assert_eq!(eps[2].destination.object_path("t", 0).as_deref(), Some("/Common/192.0.2.99"));
        assert!(eps[2].destination.is_host());
    }
}
