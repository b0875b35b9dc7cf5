//! TLS profiles and cipher objects.
//!
//! A `TLS_Server` with several certificates is either collapsed into one
//! client-ssl profile whose `cert-key-chain` carries one set per certificate
//! (targets with multi-chain support, and only when no certificate asks for
//! SNI matching), or expanded into `name`, `name-1-`, ... with one
//! certificate each and exactly one SNI default.

use decl_core::DeclValue;
use serde_json::{Map, Value};

use super::certificate::{cert_paths, CertPaths};
use super::{described, Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::naming::{indexed, item_path};
use crate::normalize::{
    enabled_disabled, indefinite_as_literal, indefinite_as_max, to_set, to_set_or_none, true_false,
};
use crate::registry::ObjectKind;
use crate::resolver::{Located, Target};
use crate::version::Feature;

const CLIENT_SSL_PARENT: &str = "/Common/clientssl";
const SERVER_SSL_PARENT: &str = "/Common/serverssl";

/// How a `TLS_Server` is laid out on the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// One profile, one chain set per certificate.
    Collapsed,
    /// One profile per certificate.
    Expanded(usize),
}

fn layout(env: &Env<'_>, item: &Value) -> Layout {
    let certs = item.array_prop("certificates");
    let sni_matching = certs.iter().any(|c| c.str_prop("matchToSNI").is_some());
    if certs.len() <= 1 || (env.ctx.supports(Feature::TlsMultiCertChain) && !sni_matching) {
        Layout::Collapsed
    } else {
        Layout::Expanded(certs.len())
    }
}

/// Paths of every client-ssl profile a `TLS_Server` produces, in order.
pub(crate) fn client_ssl_paths(env: &Env<'_>, located: &Located<'_>) -> Vec<String> {
    let base = located.primary_path();
    match layout(env, located.item) {
        Layout::Collapsed => vec![base],
        Layout::Expanded(count) => (0..count)
            .map(|idx| item_path(located.tenant, located.app, &indexed(located.name, idx)))
            .collect(),
    }
}

/// Option flags shared by client and server profiles.
fn tls_options(env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Value> {
    let item = scope.item;
    let mut options = Vec::new();
    for (key, default, flag) in [
        ("tls1_0Enabled", true, "no-tlsv1"),
        ("tls1_1Enabled", true, "no-tlsv1.1"),
        ("tls1_2Enabled", true, "no-tlsv1.2"),
    ] {
        if !item.bool_prop(key).unwrap_or(default) {
            options.push(flag);
        }
    }
    let tls13 = item.bool_prop("tls1_3Enabled").unwrap_or(false);
    if env.ctx.supports(Feature::Tls13) {
        if !tls13 {
            options.push("no-tlsv1.3");
        }
    } else if tls13 {
        env.ctx.require(Feature::Tls13, &scope.path())?;
    }
    if item.bool_prop("singleUseDhEnabled").unwrap_or(false) {
        options.push("single-dh-use");
    }
    if !item.bool_prop("insertEmptyFragmentsEnabled").unwrap_or(false) {
        options.push("dont-insert-empty-fragments");
    }
    Ok(to_set_or_none(options))
}

/// `ciphers` / `cipher-group`, which are mutually exclusive.
fn cipher_settings(env: &Env<'_>, scope: &ItemScope<'_>) -> Result<(Value, Value)> {
    match scope.item.prop("cipherGroup") {
        Some(group) => {
            env.ctx.require(Feature::CipherGroups, &scope.path())?;
            let path = env
                .resolver
                .resolve_kind(scope, group, &[ObjectKind::CipherGroup])?;
            Ok((Value::from("none"), Value::from(path)))
        }
        None => Ok((
            Value::from(scope.item.str_prop("ciphers").unwrap_or("DEFAULT")),
            Value::from("none"),
        )),
    }
}

/// Renegotiation and timeout settings.
fn renegotiation(item: &Value, props: &mut Map<String, Value>) {
    props.insert(
        "renegotiation".to_string(),
        Value::from(enabled_disabled(
            item.bool_prop("renegotiationEnabled").unwrap_or(true),
        )),
    );
    for (key, prop) in [
        ("renegotiatePeriod", "renegotiate-period"),
        ("renegotiateSize", "renegotiate-size"),
        ("renegotiateMaxRecordDelay", "renegotiate-max-record-delay"),
    ] {
        let value = item.prop(key).cloned().unwrap_or_else(|| Value::from("indefinite"));
        props.insert(prop.to_string(), indefinite_as_max(&value));
    }
    let alert = item.prop("alertTimeout").cloned().unwrap_or_else(|| Value::from("indefinite"));
    props.insert("alert-timeout".to_string(), indefinite_as_literal(&alert));
    props.insert(
        "cache-timeout".to_string(),
        Value::from(item.u64_prop("cacheTimeout").unwrap_or(3600)),
    );
    props.insert(
        "handshake-timeout".to_string(),
        Value::from(item.u64_prop("handshakeTimeout").unwrap_or(10)),
    );
}

/// Certificate paths for one `certificates[]` entry.
fn certificate_entry(env: &Env<'_>, scope: &ItemScope<'_>, pointer: &Value) -> Result<CertPaths> {
    match env.resolver.target(scope, pointer)? {
        Target::BigIp(cert) => {
            let key = cert
                .strip_suffix(".crt")
                .map(|stem| format!("{stem}.key"))
                .unwrap_or_else(|| "none".to_string());
            Ok(CertPaths {
                cert,
                key: Some(key),
                chain: None,
            })
        }
        Target::Declared(located) => {
            if located.kind() != Some(ObjectKind::Certificate) || !located.property.is_empty() {
                return Err(TranslateError::WrongClass {
                    reference: pointer.to_string(),
                    found: located.class().unwrap_or("unknown").to_string(),
                    expected: ObjectKind::Certificate.class_name().to_string(),
                });
            }
            cert_paths(&env.resolver, &located.scope())
        }
    }
}

fn chain_set(paths: &CertPaths) -> Value {
    let mut set = Map::new();
    set.insert("cert".to_string(), Value::from(paths.cert.clone()));
    set.insert(
        "key".to_string(),
        Value::from(paths.key.clone().unwrap_or_else(|| "none".to_string())),
    );
    set.insert(
        "chain".to_string(),
        Value::from(paths.chain.clone().unwrap_or_else(|| "none".to_string())),
    );
    Value::Object(set)
}

fn ca_file(env: &Env<'_>, scope: &ItemScope<'_>, key: &str) -> Result<Value> {
    match scope.item.prop(key) {
        Some(value) => Ok(Value::from(env.resolver.resolve_kind(
            scope,
            value,
            &[ObjectKind::CaBundle, ObjectKind::Certificate],
        )?)),
        None => Ok(Value::from("none")),
    }
}

pub struct TlsServerTranslator;

impl Translator for TlsServerTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::TlsServer
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let entries = item.array_prop("certificates");
        if entries.is_empty() {
            return Err(TranslateError::invalid(
                scope.path(),
                "at least one certificate is required",
            ));
        }
        let mut certs = Vec::with_capacity(entries.len());
        for entry in entries {
            let pointer = entry.prop("certificate").ok_or_else(|| {
                TranslateError::invalid(scope.path(), "certificates entries need a certificate")
            })?;
            certs.push(certificate_entry(env, scope, pointer)?);
        }
        let default_idx = entries
            .iter()
            .position(|e| e.bool_prop("sniDefault") == Some(true))
            .unwrap_or(0);

        let mut common = described(scope, "ltm profile client-ssl").properties;
        common.insert("defaults-from".to_string(), Value::from(CLIENT_SSL_PARENT));
        common.insert("options".to_string(), tls_options(env, scope)?);
        let (ciphers, group) = cipher_settings(env, scope)?;
        common.insert("ciphers".to_string(), ciphers);
        common.insert("cipher-group".to_string(), group);
        common.insert(
            "peer-cert-mode".to_string(),
            Value::from(item.str_prop("authenticationMode").unwrap_or("ignore")),
        );
        common.insert("ca-file".to_string(), ca_file(env, scope, "authenticationTrustCA")?);
        common.insert(
            "sni-require".to_string(),
            Value::from(true_false(item.bool_prop("requireSNI").unwrap_or(false))),
        );
        renegotiation(item, &mut common);

        let mut out = Translation::default();
        match layout(env, item) {
            Layout::Collapsed => {
                let mut order: Vec<usize> = (0..certs.len()).collect();
                order.retain(|idx| *idx != default_idx);
                order.insert(0, default_idx);
                let chains: Map<String, Value> = order
                    .iter()
                    .enumerate()
                    .map(|(set, idx)| (format!("set{set}"), chain_set(&certs[*idx])))
                    .collect();
                let mut profile = decl_core::ConfigObject::new(scope.path(), "ltm profile client-ssl")
                    .with_properties(common);
                profile.set("cert-key-chain", Value::Object(chains));
                profile.set(
                    "server-name",
                    entries[default_idx].str_prop("matchToSNI").unwrap_or("none"),
                );
                profile.set("sni-default", "false");
                out.push(profile);
            }
            Layout::Expanded(count) => {
                for idx in 0..count {
                    let mut profile = decl_core::ConfigObject::new(
                        scope.sibling(&indexed(scope.name, idx)),
                        "ltm profile client-ssl",
                    )
                    .with_properties(common.clone());
                    let mut chains = Map::new();
                    chains.insert("set0".to_string(), chain_set(&certs[idx]));
                    profile.set("cert-key-chain", Value::Object(chains));
                    profile.set(
                        "server-name",
                        entries[idx].str_prop("matchToSNI").unwrap_or("none"),
                    );
                    profile.set("sni-default", true_false(idx == default_idx));
                    out.push(profile);
                }
            }
        }
        Ok(out)
    }
}

pub struct TlsClientTranslator;

impl Translator for TlsClientTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::TlsClient
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let mut profile = described(scope, "ltm profile server-ssl");
        profile.set("defaults-from", SERVER_SSL_PARENT);

        let paths = match item.prop("clientCertificate") {
            Some(pointer) => Some(certificate_entry(env, scope, pointer)?),
            None => None,
        };
        profile.set(
            "cert",
            paths.as_ref().map(|p| p.cert.clone()).unwrap_or_else(|| "none".to_string()),
        );
        profile.set(
            "key",
            paths
                .as_ref()
                .and_then(|p| p.key.clone())
                .unwrap_or_else(|| "none".to_string()),
        );
        profile.set(
            "chain",
            paths
                .as_ref()
                .and_then(|p| p.chain.clone())
                .unwrap_or_else(|| "none".to_string()),
        );

        profile.set("options", tls_options(env, scope)?);
        let (ciphers, group) = cipher_settings(env, scope)?;
        profile.set("ciphers", ciphers);
        profile.set("cipher-group", group);
        profile.set(
            "peer-cert-mode",
            if item.bool_prop("validateCertificate").unwrap_or(false) {
                "require"
            } else {
                "ignore"
            },
        );
        profile.set("ca-file", ca_file(env, scope, "trustCA")?);
        profile.set("server-name", item.str_prop("serverName").unwrap_or("none"));
        profile.set(
            "sni-default",
            true_false(item.bool_prop("sniDefault").unwrap_or(false)),
        );
        profile.set(
            "expire-cert-response-control",
            if item.bool_prop("ignoreExpired").unwrap_or(false) {
                "ignore"
            } else {
                "drop"
            },
        );
        profile.set(
            "untrusted-cert-response-control",
            if item.bool_prop("ignoreUntrusted").unwrap_or(false) {
                "ignore"
            } else {
                "drop"
            },
        );
        renegotiation(item, &mut profile.properties);
        Ok(Translation::single(profile))
    }
}

fn colon_list(item: &Value, key: &str, default: &str) -> String {
    let values: Vec<&str> = item.array_prop(key).iter().filter_map(Value::as_str).collect();
    if values.is_empty() {
        default.to_string()
    } else {
        values.join(":")
    }
}

pub struct CipherRuleTranslator;

impl Translator for CipherRuleTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::CipherRule
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        env.ctx.require(Feature::CipherGroups, &scope.path())?;
        let mut rule = described(scope, "ltm cipher rule");
        rule.set("cipher", colon_list(scope.item, "cipherSuites", ""));
        rule.set("dh-groups", colon_list(scope.item, "namedGroups", "DEFAULT"));
        rule.set(
            "signature-algorithms",
            colon_list(scope.item, "signatureAlgorithms", "DEFAULT"),
        );
        Ok(Translation::single(rule))
    }
}

pub struct CipherGroupTranslator;

impl Translator for CipherGroupTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::CipherGroup
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        env.ctx.require(Feature::CipherGroups, &scope.path())?;
        let mut group = described(scope, "ltm cipher group");
        for (key, prop) in [("allowCipherRules", "allow"), ("excludeCipherRules", "exclude"), ("requireCipherRules", "require")] {
            let rules = scope
                .item
                .array_prop(key)
                .iter()
                .map(|rule| env.resolver.resolve_kind(scope, rule, &[ObjectKind::CipherRule]))
                .collect::<Result<Vec<_>>>()?;
            group.set(prop, to_set(rules));
        }
        group.set("ordering", scope.item.str_prop("order").unwrap_or("default"));
        Ok(Translation::single(group))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::error::TranslateError;
    use crate::translators::testing::{context, declaration, find, paths, run};

    const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----";

    fn multi_cert(sni: bool) -> decl_core::Declaration {
        let second = if sni {
            json!({ "certificate": "c2", "matchToSNI": "www.example.com" })
        } else {
            json!({ "certificate": "c2", "sniDefault": true })
        };
        declaration(json!({
            "c1": { "class": "Certificate", "certificate": PEM, "privateKey": PEM },
            "c2": { "class": "Certificate", "certificate": PEM, "privateKey": PEM },
            "tls": {
                "class": "TLS_Server",
                "certificates": [{ "certificate": "c1" }, second],
                "renegotiateSize": "indefinite",
                "alertTimeout": "indefinite"
            }
        }))
    }

    #[test]
    fn collapses_certificates_on_new_targets() {
        let ctx = context("14.1");
        let out = run(&ctx, &multi_cert(false), "tls").expect("tls");
        assert_eq!(out.configs.len(), 1);
        let chains = &out.configs[0].properties["cert-key-chain"];
        assert_eq!(chains["set0"]["cert"], json!("/t/a/c2.crt"));
        assert_eq!(chains["set1"]["cert"], json!("/t/a/c1.crt"));
        assert_eq!(out.configs[0].properties["renegotiate-size"], json!(4294967295u64));
        assert_eq!(out.configs[0].properties["alert-timeout"], json!("indefinite"));
        assert_eq!(
            out.configs[0].properties["options"],
            json!({ "dont-insert-empty-fragments": {}, "no-tlsv1.3": {} })
        );
    }

    #[test]
    fn expands_certificates_on_old_targets_or_with_sni() {
        let ctx = context("13.1");
        let out = run(&ctx, &multi_cert(false), "tls").expect("tls");
        assert_eq!(
            paths(&out),
            vec![
                ("ltm profile client-ssl", "/t/a/tls"),
                ("ltm profile client-ssl", "/t/a/tls-1-"),
            ]
        );
        assert_eq!(find(&out, "/t/a/tls").properties["sni-default"], json!("false"));
        assert_eq!(find(&out, "/t/a/tls-1-").properties["sni-default"], json!("true"));
        assert_eq!(
            find(&out, "/t/a/tls").properties["options"],
            json!({ "dont-insert-empty-fragments": {} })
        );

        let ctx = context("15.1");
        let out = run(&ctx, &multi_cert(true), "tls").expect("tls");
        assert_eq!(out.configs.len(), 2);
        assert_eq!(find(&out, "/t/a/tls").properties["sni-default"], json!("true"));
        assert_eq!(
            find(&out, "/t/a/tls-1-").properties["server-name"],
            json!("www.example.com")
        );
    }

    #[test]
    fn tls13_and_cipher_groups_are_gated() {
        let decl = declaration(json!({
            "c1": { "class": "Certificate", "certificate": PEM },
            "tls": {
                "class": "TLS_Server",
                "certificates": [{ "certificate": "c1" }],
                "tls1_3Enabled": true
            },
            "rule": { "class": "Cipher_Rule", "cipherSuites": ["ECDHE-RSA-AES128-GCM-SHA256", "ECDHE-RSA-AES256-GCM-SHA384"] },
            "group": { "class": "Cipher_Group", "allowCipherRules": [{ "use": "rule" }, { "bigip": "/Common/f5-default" }] }
        }));
        let err = run(&context("13.1"), &decl, "tls").expect_err("tls13");
        assert!(matches!(err, TranslateError::UnsupportedVersion { .. }));
        assert!(run(&context("13.0"), &decl, "rule").is_err());

        let ctx = context("14.1");
        let rule = run(&ctx, &decl, "rule").expect("rule");
        assert_eq!(
            rule.configs[0].properties["cipher"],
            json!("ECDHE-RSA-AES128-GCM-SHA256:ECDHE-RSA-AES256-GCM-SHA384")
        );
        let group = run(&ctx, &decl, "group").expect("group");
        assert_eq!(
            group.configs[0].properties["allow"],
            json!({ "/Common/f5-default": {}, "/t/a/rule": {} })
        );
    }

    #[test]
    fn tls_client_uses_certificate_parts() {
        let decl = declaration(json!({
            "c1": { "class": "Certificate", "certificate": PEM, "privateKey": PEM },
            "client": {
                "class": "TLS_Client",
                "clientCertificate": { "use": "c1" },
                "validateCertificate": true,
                "serverName": "backend.example.com"
            }
        }));
        let out = run(&context("15.1"), &decl, "client").expect("client");
        let props = &out.configs[0].properties;
        assert_eq!(out.configs[0].command, "ltm profile server-ssl");
        assert_eq!(props["cert"], json!("/t/a/c1.crt"));
        assert_eq!(props["key"], json!("/t/a/c1.key"));
        assert_eq!(props["chain"], json!("none"));
        assert_eq!(props["peer-cert-mode"], json!("require"));
        assert_eq!(props["server-name"], json!("backend.example.com"));
    }
}
