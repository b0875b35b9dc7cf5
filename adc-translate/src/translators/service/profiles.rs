//! Profiles a virtual carries, explicit and implied.

use std::collections::BTreeMap;

use decl_core::DeclValue;
use serde_json::{Map, Value};
use tracing::warn;

use super::ServiceKind;
use crate::error::{Result, TranslateError};
use crate::naming::object;
use crate::registry::ObjectKind;
use crate::resolver::Target;
use crate::translators::tls::client_ssl_paths;
use crate::translators::{Env, ItemScope, ProfileRole};
use crate::version::Feature;

pub(crate) const WEBSECURITY: &str = "/Common/websecurity";
const BOT_DEFENSE: &str = "/Common/bot-defense";
const HTTP_ROUTER: &str = "/Common/httprouter";
const SSL_ORCHESTRATOR: &str = "ssl-orchestrator";
const ACCESS_EXTRAS: [&str; 2] = ["/Common/rba", "/Common/websso"];

/// Which side of the proxy a profile applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    All,
    Client,
    Server,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::All => "all",
            Side::Client => "clientside",
            Side::Server => "serverside",
        }
    }
}

/// Plain pointer properties attached with context `all`.
const POINTER_PROFILES: [&str; 10] = [
    "profileMultiplex",
    "profileHTTPCompression",
    "profileHTTPAcceleration",
    "profileFTP",
    "profileDNS",
    "profileStream",
    "profileRewrite",
    "profileNTLM",
    "profileTrafficLog",
    "profileAnalytics",
];

/// Profiles keyed by path; a later `add` of the same path keeps the first
/// side.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct ProfileSet {
    entries: BTreeMap<String, Side>,
}

impl ProfileSet {
    pub(crate) fn add(&mut self, path: impl Into<String>, side: Side) {
        self.entries.entry(path.into()).or_insert(side);
    }

    pub(crate) fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub(crate) fn into_value(self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .into_iter()
            .map(|(path, side)| (path, object([("context", Value::from(side.as_str()))])))
            .collect();
        Value::Object(map)
    }
}

/// Explicit profiles on the service, and the roles they fill.
#[derive(Debug, Default)]
pub(crate) struct Attached {
    pub profiles: ProfileSet,
    pub roles: Vec<ProfileRole>,
}

fn pointer(env: &Env<'_>, scope: &ItemScope<'_>, value: &Value) -> Result<String> {
    env.resolver.resolve_path(scope, value)
}

/// `profileTCP` style property: a pointer, or `{ingress, egress}` for
/// distinct client and server sides.
fn sided(
    env: &Env<'_>,
    scope: &ItemScope<'_>,
    set: &mut ProfileSet,
    key: &str,
    default: Option<&str>,
) -> Result<()> {
    match scope.item.prop(key) {
        Some(Value::Object(map)) if map.contains_key("ingress") || map.contains_key("egress") => {
            if let Some(ingress) = map.get("ingress") {
                set.add(pointer(env, scope, ingress)?, Side::Client);
            }
            if let Some(egress) = map.get("egress") {
                set.add(pointer(env, scope, egress)?, Side::Server);
            }
        }
        Some(value) => set.add(pointer(env, scope, value)?, Side::All),
        None => {
            if let Some(path) = default {
                set.add(path, Side::All);
            }
        }
    }
    Ok(())
}

fn protocol(env: &Env<'_>, scope: &ItemScope<'_>, kind: ServiceKind, set: &mut ProfileSet) -> Result<()> {
    let key = match kind {
        ServiceKind::Udp => "profileUDP",
        ServiceKind::Sctp => "profileSCTP",
        ServiceKind::L4 | ServiceKind::Generic | ServiceKind::Forwarding => "profileL4",
        ServiceKind::Http | ServiceKind::Https | ServiceKind::Tcp => "profileTCP",
    };
    sided(env, scope, set, key, kind.protocol_profile())
}

fn http(env: &Env<'_>, scope: &ItemScope<'_>, kind: ServiceKind, attached: &mut Attached) -> Result<()> {
    if !kind.is_http() {
        return Ok(());
    }
    let path = match scope.item.prop("profileHTTP") {
        Some(Value::String(keyword)) if keyword == "basic" => "/Common/http".to_string(),
        Some(value) => env
            .resolver
            .resolve_kind(scope, value, &[ObjectKind::HttpProfile])?,
        None => "/Common/http".to_string(),
    };
    attached.profiles.add(path, Side::All);

    for (key, role) in [
        ("profileWebSocket", ProfileRole::Websocket),
        ("profileHTTPProxyConnect", ProfileRole::ProxyConnect),
    ] {
        if let Some(value) = scope.item.prop(key) {
            attached.profiles.add(pointer(env, scope, value)?, Side::All);
            attached.roles.push(role);
        }
    }
    Ok(())
}

fn tls(env: &Env<'_>, scope: &ItemScope<'_>, set: &mut ProfileSet) -> Result<()> {
    for value in listed(scope.item, "serverTLS") {
        match env.resolver.target(scope, value)? {
            Target::BigIp(path) => set.add(path, Side::Client),
            Target::Declared(located) => {
                if located.kind() != Some(ObjectKind::TlsServer) {
                    return Err(TranslateError::WrongClass {
                        reference: value.to_string(),
                        found: located.class().unwrap_or("none").to_string(),
                        expected: ObjectKind::TlsServer.class_name().to_string(),
                    });
                }
                for path in client_ssl_paths(env, &located) {
                    set.add(path, Side::Client);
                }
            }
        }
    }
    for value in listed(scope.item, "clientTLS") {
        let path = env
            .resolver
            .resolve_kind(scope, value, &[ObjectKind::TlsClient])?;
        set.add(path, Side::Server);
    }
    Ok(())
}

/// A property that may hold one value or an array of them.
pub(crate) fn listed<'v>(item: &'v Value, key: &str) -> Vec<&'v Value> {
    match item.prop(key) {
        Some(Value::Array(values)) => values.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(value) => vec![value],
    }
}

fn provisioned(env: &Env<'_>, scope: &ItemScope<'_>, modules: &[&str], property: &str) -> bool {
    let ok = env.ctx.is_provisioned(modules);
    if !ok {
        warn!(
            service = %scope.path(),
            property,
            modules = ?modules,
            "required module not provisioned, leaving profile out"
        );
    }
    ok
}

/// Whether a declared DOS profile enables application bot defense.
fn dos_has_bot_defense(env: &Env<'_>, scope: &ItemScope<'_>, value: &Value) -> bool {
    match env.resolver.target(scope, value) {
        Ok(Target::Declared(located)) => located
            .item
            .walk(&["application", "botDefense"])
            .and_then(|bot| bot.str_prop("mode"))
            .is_some_and(|mode| mode != "off"),
        _ => false,
    }
}

fn security(env: &Env<'_>, scope: &ItemScope<'_>, set: &mut ProfileSet) -> Result<()> {
    let item = scope.item;
    let explicit_bot = item.prop("profileBotDefense");
    if let Some(value) = explicit_bot {
        if provisioned(env, scope, &["asm"], "profileBotDefense") {
            set.add(pointer(env, scope, value)?, Side::All);
        }
    }
    if let Some(value) = item.prop("profileDOS") {
        if provisioned(env, scope, &["afm", "asm"], "profileDOS") {
            set.add(
                env.resolver.resolve_kind(scope, value, &[ObjectKind::DosProfile])?,
                Side::All,
            );
            if explicit_bot.is_none()
                && dos_has_bot_defense(env, scope, value)
                && provisioned(env, scope, &["asm"], "profileDOS")
            {
                set.add(BOT_DEFENSE, Side::All);
            }
        }
    }
    if let Some(value) = item.prop("profileProtocolInspection") {
        if provisioned(env, scope, &["afm"], "profileProtocolInspection") {
            set.add(
                env.resolver
                    .resolve_kind(scope, value, &[ObjectKind::ProtocolInspectionProfile])?,
                Side::All,
            );
        }
    }
    if let Some(value) = item.prop("profileAccess") {
        if provisioned(env, scope, &["apm"], "profileAccess") {
            let path = pointer(env, scope, value)?;
            let access_type = env.ctx.inventory().access_profile_type(&path);
            set.add(path, Side::All);
            match access_type.as_deref() {
                Some(SSL_ORCHESTRATOR) | None => {}
                Some(_) => {
                    for extra in ACCESS_EXTRAS {
                        set.add(extra, Side::All);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Every profile the virtuals of this service carry.
pub(crate) fn attached(env: &Env<'_>, scope: &ItemScope<'_>, kind: ServiceKind) -> Result<Attached> {
    let mut out = Attached::default();
    protocol(env, scope, kind, &mut out.profiles)?;
    http(env, scope, kind, &mut out)?;
    if matches!(kind, ServiceKind::Https | ServiceKind::Tcp | ServiceKind::L4 | ServiceKind::Http) {
        tls(env, scope, &mut out.profiles)?;
    }
    for key in POINTER_PROFILES {
        if let Some(value) = scope.item.prop(key) {
            out.profiles.add(pointer(env, scope, value)?, Side::All);
        }
    }
    security(env, scope, &mut out.profiles)?;

    if scope.item.bool_prop("httpMrfRoutingEnabled").unwrap_or(false) {
        env.ctx.require(Feature::HttpMrfRouter, &scope.path())?;
        out.profiles.add(HTTP_ROUTER, Side::All);
    }
    Ok(out)
}
