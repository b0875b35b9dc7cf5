//! Service-discovery tasks: dynamic pool members and `Address_Discovery`.
//!
//! A dynamic pool member (`addressDiscovery: aws|azure|gce|consul|event`)
//! becomes exactly one task that fills the pool at runtime. An
//! `Address_Discovery` object owns one task whose resources are every pool
//! member in the declaration pointing at it; its identity is a hash over a
//! canonical, order-insensitive rendering so reordering pools or members
//! never changes the task id.

use decl_core::tree::{applications, items};
use decl_core::{ConfigObject, DeclValue};
use serde_json::{Map, Value};

use super::{Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::naming::{canonical_sort, hashed_id, item_path, object, partition_path};
use crate::registry::ObjectKind;
use crate::resolver::{classify, Reference, Target};

pub(crate) const TASK_COMMAND: &str = "mgmt shared service-discovery task";
const TASK_SCHEMA: &str = "1.0.0";
const ID_PREFIX: &str = "sd_";
const ALT_ID_PREFIX: &str = "sda_";
const DEFAULT_UPDATE_INTERVAL: u64 = 60;

/// Runtime source of pool members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Aws,
    Azure,
    Gce,
    Consul,
    Event,
}

impl Provider {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "aws" => Some(Provider::Aws),
            "azure" => Some(Provider::Azure),
            "gce" => Some(Provider::Gce),
            "consul" => Some(Provider::Consul),
            "event" => Some(Provider::Event),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Gce => "gce",
            Provider::Consul => "consul",
            Provider::Event => "event",
        }
    }

    fn option_keys(self) -> &'static [&'static str] {
        match self {
            Provider::Aws => &[
                "region",
                "tagKey",
                "tagValue",
                "accessKeyId",
                "secretAccessKey",
                "roleARN",
                "externalId",
            ],
            Provider::Azure => &[
                "resourceGroup",
                "subscriptionId",
                "resourceType",
                "resourceId",
                "tagKey",
                "tagValue",
                "directoryId",
                "applicationId",
                "apiAccessKey",
                "environment",
                "useManagedIdentity",
            ],
            Provider::Gce => &[
                "region",
                "tagKey",
                "tagValue",
                "encodedCredentials",
                "projectId",
            ],
            Provider::Consul => &[
                "uri",
                "encodedToken",
                "trustCA",
                "rejectUnauthorized",
                "jmesPathQuery",
            ],
            Provider::Event => &[],
        }
    }
}

/// Provider named by a member's `addressDiscovery`, when it is a string.
pub(crate) fn member_provider(member: &Value) -> Option<Provider> {
    member.str_prop("addressDiscovery").and_then(Provider::from_name)
}

/// Whether a member's `addressDiscovery` points at an `Address_Discovery`.
pub(crate) fn uses_discovery_object(member: &Value) -> bool {
    matches!(
        member.prop("addressDiscovery").map(classify),
        Some(Reference::Use(_))
    ) && member_provider(member).is_none()
        && !matches!(member.str_prop("addressDiscovery"), Some("static" | "fqdn"))
}

/// Provider configuration shared by every resource of one task.
fn provider_config(provider: Provider, source: &Value, route_domain: u32) -> Value {
    let options: Map<String, Value> = provider
        .option_keys()
        .iter()
        .filter_map(|key| source.prop(key).map(|v| (key.to_string(), v.clone())))
        .collect();
    let mut config = Map::new();
    config.insert("provider".to_string(), Value::from(provider.name()));
    config.insert("providerOptions".to_string(), Value::Object(options));
    config.insert(
        "updateInterval".to_string(),
        Value::from(source.u64_prop("updateInterval").unwrap_or(DEFAULT_UPDATE_INTERVAL)),
    );
    config.insert("routeDomain".to_string(), Value::from(route_domain));
    config.insert(
        "addressRealm".to_string(),
        Value::from(source.str_prop("addressRealm").unwrap_or("private")),
    );
    Value::Object(config)
}

/// Pool resource fed by a task, carrying the member's pool-side settings.
pub(crate) fn pool_resource(pool_path: &str, member: &Value) -> Value {
    let mut options = Map::new();
    options.insert(
        "servicePort".to_string(),
        Value::from(member.u64_prop("servicePort").unwrap_or(0)),
    );
    for (from, to) in [
        ("connectionLimit", "connectionLimit"),
        ("rateLimit", "rateLimit"),
        ("dynamicRatio", "dynamicRatio"),
        ("ratio", "ratio"),
        ("priorityGroup", "priorityGroup"),
    ] {
        if let Some(value) = member.prop(from) {
            options.insert(to.to_string(), value.clone());
        }
    }
    object([
        ("type", Value::from("pool")),
        ("path", Value::from(pool_path)),
        ("options", Value::Object(options)),
    ])
}

/// Assemble one task object.
fn task(path: String, tenant: &str, config: Value, resources: Vec<Value>) -> ConfigObject {
    let alt_id = hashed_id(ALT_ID_PREFIX, &config);
    let id = hashed_id(
        ID_PREFIX,
        &object([
            ("config", config.clone()),
            ("resources", Value::Array(resources.clone())),
        ]),
    );
    let mut obj = ConfigObject::new(path, TASK_COMMAND);
    obj.set("schemaVersion", TASK_SCHEMA);
    obj.set("id", id);
    obj.set("altId", alt_id);
    obj.set("resources", Value::Array(resources));
    obj.set("nodePrefix", partition_path(tenant));
    if let Value::Object(config) = config {
        for (key, value) in config {
            obj.set(key, value);
        }
    }
    obj
}

/// Task for one dynamic member of the pool at `pool`.
pub(crate) fn member_task(
    scope: &ItemScope<'_>,
    provider: Provider,
    member: &Value,
    route_domain: u32,
) -> ConfigObject {
    let config = provider_config(provider, member, route_domain);
    let resources = vec![pool_resource(&scope.path(), member)];
    let mut obj = task(String::new(), scope.tenant, config, resources);
    let id = obj.property_str("id").unwrap_or_default().to_string();
    obj.path = item_path(scope.tenant, scope.app, &id);
    obj
}

pub struct AddressDiscoveryTranslator;

impl Translator for AddressDiscoveryTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::AddressDiscovery
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let provider_name = scope.item.str_prop("addressDiscovery").unwrap_or("event");
        let provider = Provider::from_name(provider_name).ok_or_else(|| {
            TranslateError::invalid(
                scope.path(),
                format!("unknown discovery provider {provider_name}"),
            )
        })?;
        let route_domain = scope
            .item
            .u64_prop("routeDomain")
            .and_then(|rd| u32::try_from(rd).ok())
            .unwrap_or_else(|| scope.route_domain());

        let mut resources = self.referencing_members(env, scope)?;
        canonical_sort(&mut resources);
        resources.dedup();

        let config = provider_config(provider, scope.item, route_domain);
        Ok(Translation::single(task(
            scope.path(),
            scope.tenant,
            config,
            resources,
        )))
    }
}

impl AddressDiscoveryTranslator {
    /// Pool resources for every member in the declaration that points here.
    fn referencing_members(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Vec<Value>> {
        let own_path = scope.path();
        let decl = env.resolver.declaration();
        let mut resources = Vec::new();

        for (tenant, tenant_value) in decl.tenants() {
            for (app, app_value) in applications(tenant_value) {
                for (name, item) in items(app_value) {
                    if ObjectKind::from_class(item.str_prop("class").unwrap_or_default())
                        != Some(ObjectKind::Pool)
                    {
                        continue;
                    }
                    let pool_scope = ItemScope {
                        tenant,
                        app: Some(app),
                        name,
                        item,
                        tenant_value,
                    };
                    for member in item.array_prop("members") {
                        if !uses_discovery_object(member) || member.bool_prop("enable") == Some(false) {
                            continue;
                        }
                        let Some(pointer) = member.prop("addressDiscovery") else {
                            continue;
                        };
                        // Members whose pointer fails are reported by the pool itself.
                        let Ok(Target::Declared(target)) = env.resolver.target(&pool_scope, pointer)
                        else {
                            continue;
                        };
                        if target.property.is_empty() && target.primary_path() == own_path {
                            resources.push(pool_resource(&pool_scope.path(), member));
                        }
                    }
                }
            }
        }
        Ok(resources)
    }
}
