//! DOS, security logging and protocol inspection profiles.
//!
//! Deprecated property names are already renamed by the alias table before
//! these translators run. Blocks that end up with no entries are left out
//! of the output entirely rather than emitted empty.

use decl_core::DeclValue;
use serde_json::{Map, Value};

use super::{described, Env, ItemScope, Translation, Translator};
use crate::error::Result;
use crate::normalize::{enabled_disabled, quote_or_none, to_set, yes_no};
use crate::registry::ObjectKind;
use crate::version::Feature;

/// Property bag that drops keys whose value would be an empty object.
#[derive(Debug, Default)]
struct Block(Map<String, Value>);

impl Block {
    fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if !is_empty_block(&value) {
            self.0.insert(key.to_string(), value);
        }
    }

    fn flag(&mut self, item: &Value, key: &str, prop: &str, default: bool) {
        self.set(prop, enabled_disabled(item.bool_prop(key).unwrap_or(default)));
    }

    fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn is_empty_block(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}

fn string_set(values: &[Value]) -> Value {
    to_set(values.iter().filter_map(Value::as_str).map(str::to_string))
}

/// `{ name: block }` keyed by the profile's own name, or nothing when the
/// block is empty.
fn named(scope: &ItemScope<'_>, block: Block) -> Option<Value> {
    if block.is_empty() {
        return None;
    }
    let mut map = Map::new();
    map.insert(scope.name.to_string(), block.into_value());
    Some(Value::Object(map))
}

/// Vector settings shared by network, DNS and SIP DOS vectors.
const VECTOR_FIELDS: &[(&str, &str)] = &[
    ("state", "state"),
    ("thresholdMode", "threshold-mode"),
    ("attackFloor", "floor"),
    ("attackCeiling", "ceiling"),
    ("rateIncreasePercent", "rate-increase"),
    ("rateLimit", "rate-limit"),
    ("rateThreshold", "rate-threshold"),
    ("packetsPerSecond", "default-internal-rate-limit"),
];

const VECTOR_FLAGS: &[(&str, &str)] = &[
    ("autoAttackCeilingEnabled", "ceiling-auto"),
    ("autoAttackFloorEnabled", "floor-auto"),
    ("badActorDetectionEnabled", "bad-actor"),
    ("autoDenylistEnabled", "auto-blacklisting"),
    ("simulateAutoThresholdEnabled", "simulate-auto-threshold"),
];

fn vectors(list: &[Value]) -> Block {
    let mut out = Block::default();
    for vector in list {
        let Some(kind) = vector.str_prop("type") else {
            continue;
        };
        let mut entry = Map::new();
        for (key, prop) in VECTOR_FIELDS {
            if let Some(value) = vector.prop(key) {
                entry.insert(prop.to_string(), value.clone());
            }
        }
        for (key, prop) in VECTOR_FLAGS {
            if let Some(flag) = vector.bool_prop(key) {
                entry.insert(prop.to_string(), Value::from(enabled_disabled(flag)));
            }
        }
        out.0.insert(kind.to_string(), Value::Object(entry));
    }
    out
}

pub struct DosProfileTranslator;

impl Translator for DosProfileTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::DosProfile
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let allowlist_naming = env.ctx.supports(Feature::AllowlistNaming);
        let mut profile = described(scope, "security dos profile");
        profile.set(
            "threshold-sensitivity",
            item.str_prop("thresholdSensitivity").unwrap_or("medium"),
        );
        let allowlist = match item.prop("allowlist") {
            Some(pointer) => Value::from(env.resolver.resolve_kind(
                scope,
                pointer,
                &[ObjectKind::FirewallAddressList],
            )?),
            None => Value::from("none"),
        };
        profile.set(if allowlist_naming { "allowlist" } else { "whitelist" }, allowlist);

        if let Some(app) = item.prop("application") {
            let mut block = Block::default();
            block.set(
                "trigger-irule",
                enabled_disabled(app.bool_prop("triggerIRuleEnabled").unwrap_or(false)),
            );
            block.set(
                "scrubbing-duration-sec",
                app.u64_prop("scrubbingDuration").unwrap_or(42),
            );
            block.set(
                "remote-triggered-black-hole-duration-sec",
                app.u64_prop("rtbhDurationSec").unwrap_or(300),
            );

            if let Some(bot) = app.prop("botDefense") {
                let mut b = Block::default();
                b.set("mode", bot.str_prop("mode").unwrap_or("off"));
                b.flag(bot, "blockSuspiciousBrowsers", "block-suspicious-browsers", true);
                b.flag(bot, "issueCaptchaChallenge", "captcha-response", true);
                b.set("grace-period", bot.u64_prop("gracePeriod").unwrap_or(300));
                b.set(
                    "cross-domain-requests",
                    bot.str_prop("crossDomainRequests").unwrap_or("allow-all"),
                );
                b.set("site-domains", string_set(bot.array_prop("siteDomains")));
                b.set("external-domains", string_set(bot.array_prop("externalDomains")));
                let urls = string_set(bot.array_prop("urlAllowlist"));
                b.set(if allowlist_naming { "url-allowlist" } else { "url-whitelist" }, urls);
                block.set("bot-defense", b.into_value());
            }

            if let Some(signatures) = app.prop("botSignatures") {
                let mut s = Block::default();
                s.flag(signatures, "checkingEnabled", "check", false);
                let mut categories = Map::new();
                for (key, action) in [("blockedCategories", "block"), ("reportedCategories", "report")] {
                    for category in signatures.array_prop(key) {
                        if let Ok(path) = env.resolver.resolve_path(scope, category) {
                            categories.insert(path, crate::naming::object([("action", Value::from(action))]));
                        }
                    }
                }
                s.set("categories", Value::Object(categories));
                block.set("bot-signatures", s.into_value());
            }

            if let Some(mobile) = app.prop("mobileDefense") {
                env.ctx.require(Feature::DosMobileDefense, &scope.path())?;
                let mut m = Block::default();
                m.flag(mobile, "enabled", "enabled", false);
                m.flag(mobile, "allowAndroidPublishers", "allow-android-rooted-device", false);
                m.flag(mobile, "allowJailbrokenDevices", "allow-jailbroken-devices", false);
                m.flag(mobile, "allowEmulators", "allow-emulators", false);
                m.set("client-side-challenge-mode", mobile.str_prop("clientSideChallengeMode").unwrap_or("pass"));
                block.set("mobile-detection", m.into_value());
            }

            if let Some(stress) = app.prop("stressBasedDetection") {
                let mut s = Block::default();
                s.set("mode", stress.str_prop("operationMode").unwrap_or("off"));
                s.flag(stress, "badActorDetectionEnabled", "bad-actor-detection", false);
                block.set("stress-based", s.into_value());
            }

            if let Some(value) = named(scope, block) {
                profile.set("application", value);
            }
        }

        if let Some(network) = item.prop("network") {
            let mut block = Block::default();
            block.set("network-attack-vector", vectors(network.array_prop("vectors")).into_value());
            if let Some(dynamic) = network.prop("dynamicSignatures") {
                let mut d = Block::default();
                d.set("detection", dynamic.str_prop("detectionMode").unwrap_or("disabled"));
                d.set("mitigation", dynamic.str_prop("mitigationMode").unwrap_or("none"));
                d.set("scrubber-enable", yes_no(dynamic.bool_prop("scrubbingEnabled").unwrap_or(false)));
                block.set("dynamic-signatures", d.into_value());
            }
            if let Some(value) = named(scope, block) {
                profile.set("dos-network", value);
            }
        }

        for (key, prop, vector_prop) in [
            ("protocolDNS", "protocol-dns", "dns-query-vector"),
            ("protocolSIP", "protocol-sip", "sip-attack-vector"),
        ] {
            if let Some(proto) = item.prop(key) {
                let mut block = Block::default();
                block.set(vector_prop, vectors(proto.array_prop("vectors")).into_value());
                if let Some(value) = named(scope, block) {
                    profile.set(prop, value);
                }
            }
        }
        Ok(Translation::single(profile))
    }
}

pub struct SecurityLogProfileTranslator;

impl Translator for SecurityLogProfileTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::SecurityLogProfile
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let mut profile = described(scope, "security log profile");
        let publisher = |value: Option<&Value>| -> Result<Value> {
            match value {
                Some(pointer) => Ok(Value::from(env.resolver.resolve_path(scope, pointer)?)),
                None => Ok(Value::from("none")),
            }
        };

        if let Some(app) = item.prop("application") {
            let mut block = Block::default();
            block.set("facility", app.str_prop("facility").unwrap_or("local0"));
            block.set("local-storage", enabled_disabled(app.bool_prop("localStorage").unwrap_or(true)));
            block.set("maximum-entry-length", app.str_prop("maxEntryLength").unwrap_or("2k"));
            block.set("protocol", app.str_prop("protocol").unwrap_or("tcp"));
            block.set("remote-storage", app.str_prop("remoteStorage").unwrap_or("none"));
            block.set(
                "report-anomalies",
                enabled_disabled(app.bool_prop("reportAnomaliesEnabled").unwrap_or(false)),
            );
            let servers: Vec<String> = app
                .array_prop("servers")
                .iter()
                .filter_map(|s| Some(format!("{}:{}", s.str_prop("address")?, s.str_prop("port")?)))
                .collect();
            block.set("servers", if servers.is_empty() { Value::from("none") } else { to_set(servers) });

            if let Some(filter) = app.prop("storageFilter") {
                let mut f = Block::default();
                f.set("request-type", filter.str_prop("requestType").unwrap_or("illegal"));
                f.set("logic-operation", filter.str_prop("logicalOperation").unwrap_or("or"));
                f.set("protocols", string_set(filter.array_prop("protocols")));
                let codes: Vec<String> = filter
                    .array_prop("httpResponseCodes")
                    .iter()
                    .map(|c| c.as_str().map_or_else(|| c.to_string(), str::to_string))
                    .collect();
                f.set("response-code", to_set(codes));
                if let Some(contains) = filter.prop("requestContains") {
                    f.set(
                        "search-in-request",
                        crate::naming::object([
                            ("search-in", Value::from(contains.str_prop("searchIn").unwrap_or("search-all"))),
                            ("value", Value::from(quote_or_none(contains.str_prop("value")))),
                        ]),
                    );
                }
                block.set("filter", f.into_value());
            }
            if let Some(value) = named(scope, block) {
                profile.set("application", value);
            }
        }

        if let Some(network) = item.prop("network") {
            let mut block = Block::default();
            block.set("publisher", publisher(network.prop("publisher"))?);
            let mut filter = Block::default();
            for (key, prop) in [
                ("logRuleMatchAccepts", "log-acl-match-accept"),
                ("logRuleMatchDrops", "log-acl-match-drop"),
                ("logRuleMatchRejects", "log-acl-match-reject"),
                ("logIpErrors", "log-ip-errors"),
                ("logTcpErrors", "log-tcp-errors"),
                ("logTcpEvents", "log-tcp-events"),
                ("logTranslationFields", "log-translation-fields"),
            ] {
                filter.flag(network, key, prop, false);
            }
            block.set("filter", filter.into_value());
            block.set("format", network.str_prop("storageFormat").unwrap_or("none"));
            if let Some(value) = named(scope, block) {
                profile.set("network", value);
            }
        }

        if let Some(dos) = item.prop("dos") {
            for (key, prop) in [
                ("applicationDos", "dos-application"),
                ("networkDos", "dos-network-publisher"),
                ("dnsDos", "protocol-dns-dos-publisher"),
                ("sipDos", "protocol-sip-dos-publisher"),
            ] {
                if let Some(section) = dos.prop(key) {
                    let pointer = section.prop("publisher").or_else(|| section.prop("remotePublisher"));
                    profile.set(prop, publisher(pointer)?);
                }
            }
        }

        if let Some(bot) = item.prop("botDefense") {
            env.ctx.require(Feature::BotDefenseLogging, &scope.path())?;
            let mut block = Block::default();
            block.set("remote-publisher", publisher(bot.prop("remotePublisher"))?);
            for (key, prop) in [
                ("logAlarm", "log-alarm"),
                ("logBlock", "log-block"),
                ("logCaptcha", "log-captcha"),
                ("logChallengeFailureRequest", "log-challenge-failure-requests"),
                ("logHumanAndBrowser", "log-browser"),
                ("logMaliciousBot", "log-malicious-bot"),
                ("logSuspiciousBrowser", "log-suspicious-browser"),
                ("logTrustedBot", "log-trusted-bot"),
                ("logUnknown", "log-unknown"),
            ] {
                block.flag(bot, key, prop, false);
            }
            block.flag(bot, "localPublisherEnabled", "local-publisher", false);
            if let Some(value) = named(scope, block) {
                profile.set("bot-defense", value);
            }
        }

        if let Some(inspection) = item.prop("protocolInspection") {
            let mut block = Block::default();
            block.set("publisher", publisher(inspection.prop("publisher"))?);
            block.set(
                "log-packet",
                enabled_disabled(inspection.bool_prop("logPacketPayloadEnabled").unwrap_or(false)),
            );
            if !block.is_empty() {
                profile.set("protocol-inspection", block.into_value());
            }
        }
        Ok(Translation::single(profile))
    }
}

pub struct ProtocolInspectionTranslator;

impl Translator for ProtocolInspectionTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::ProtocolInspectionProfile
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let mut profile = described(scope, "security protocol-inspection profile");
        profile.set(
            "avr-stat-collect",
            enabled_disabled(item.bool_prop("collectAVRStats").unwrap_or(true)),
        );
        profile.set(
            "compliance",
            enabled_disabled(item.bool_prop("complianceChecksEnabled").unwrap_or(true)),
        );
        profile.set(
            "signature",
            enabled_disabled(item.bool_prop("signatureChecksEnabled").unwrap_or(true)),
        );
        profile.set(
            "auto-add-new-inspections",
            if item.bool_prop("autoAddNewInspections").unwrap_or(false) { "on" } else { "off" },
        );
        profile.set(
            "auto-publish-suggestion",
            if item.bool_prop("autoPublish").unwrap_or(false) { "on" } else { "off" },
        );
        profile.set(
            "defaults-from",
            item.str_prop("defaultsFrom").unwrap_or("/Common/protocol_inspection"),
        );

        let mut services = Block::default();
        for service in item.array_prop("services") {
            let Some(kind) = service.str_prop("type") else {
                continue;
            };
            let mut block = Block::default();
            let mut compliance = Map::new();
            for check in service.array_prop("compliance") {
                if let Some(name) = check.str_prop("check") {
                    let mut entry = Map::new();
                    if let Some(value) = check.str_prop("value") {
                        entry.insert("value".to_string(), Value::from(quote_or_none(Some(value))));
                    }
                    compliance.insert(name.to_string(), Value::Object(entry));
                }
            }
            block.set("compliance", Value::Object(compliance));
            let mut signature = Map::new();
            for check in service.array_prop("signature") {
                if let Some(name) = check.str_prop("check") {
                    let mut entry = Map::new();
                    entry.insert(
                        "action".to_string(),
                        Value::from(check.str_prop("action").unwrap_or("accept")),
                    );
                    entry.insert(
                        "log".to_string(),
                        Value::from(yes_no(check.bool_prop("log").unwrap_or(true))),
                    );
                    signature.insert(name.to_string(), Value::Object(entry));
                }
            }
            block.set("signature", Value::Object(signature));
            let ports: Vec<String> = service
                .array_prop("ports")
                .iter()
                .map(|p| p.as_str().map_or_else(|| p.to_string(), str::to_string))
                .collect();
            if !ports.is_empty() {
                block.set("ports", to_set(ports));
            }
            services.set(kind, block.into_value());
        }
        if !services.is_empty() {
            profile.set("services", services.into_value());
        }
        Ok(Translation::single(profile))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::TranslateError;
    use crate::translators::testing::{context, declaration, run};

    #[test]
    fn dos_profile_honours_allowlist_naming_and_drops_empty_blocks() {
        let decl = declaration(json!({
            "addrs": { "class": "Firewall_Address_List", "addresses": ["192.0.2.0/24"] },
            "dos": {
                "class": "DOS_Profile",
                "whitelist": { "use": "addrs" },
                "application": {
                    "botDefense": { "mode": "always", "urlWhitelist": ["/login"] }
                },
                "network": { "vectors": [] },
                "protocolDNS": {
                    "vectors": [{ "type": "a", "state": "mitigate", "autoAttackCeilingEnabled": true }]
                }
            }
        }));
        let old = run(&context("15.1"), &decl, "dos").expect("15.1");
        let props = &old.configs[0].properties;
        assert_eq!(props["whitelist"], json!("/t/a/addrs"));
        assert_eq!(
            props["application"]["dos"]["bot-defense"]["url-whitelist"],
            json!({ "/login": {} })
        );
        assert!(props.get("dos-network").is_none());
        assert_eq!(
            props["protocol-dns"]["dos"]["dns-query-vector"]["a"],
            json!({ "state": "mitigate", "ceiling-auto": "enabled" })
        );

        let new = run(&context("16.1"), &decl, "dos").expect("16.1");
        let props = &new.configs[0].properties;
        assert_eq!(props["allowlist"], json!("/t/a/addrs"));
        assert!(props["application"]["dos"]["bot-defense"].get("url-allowlist").is_some());
    }

    #[test]
    fn mobile_defense_is_gated() {
        let decl = declaration(json!({
            "dos": { "class": "DOS_Profile", "application": { "mobileDefense": { "enabled": true } } }
        }));
        let err = run(&context("14.0"), &decl, "dos").expect_err("gated");
        assert!(matches!(err, TranslateError::UnsupportedVersion { .. }));
        assert!(run(&context("14.1"), &decl, "dos").is_ok());
    }

    #[test]
    fn security_log_profile_sections() {
        let decl = declaration(json!({
            "log": {
                "class": "Security_Log_Profile",
                "application": {
                    "localStorage": false,
                    "storageFilter": { "requestType": "all", "responseCodes": [404, 500] }
                },
                "network": { "publisher": { "bigip": "/Common/local-db-publisher" }, "logRuleMatchDrops": true },
                "botDefense": { "logAlarm": true }
            }
        }));
        let out = run(&context("15.1"), &decl, "log").expect("log");
        let props = &out.configs[0].properties;
        assert_eq!(out.configs[0].command, "security log profile");
        let app = &props["application"]["log"];
        assert_eq!(app["local-storage"], json!("disabled"));
        assert_eq!(app["filter"]["response-code"], json!({ "404": {}, "500": {} }));
        assert!(app["filter"].get("protocols").is_none());
        assert_eq!(props["network"]["log"]["publisher"], json!("/Common/local-db-publisher"));
        assert_eq!(props["network"]["log"]["filter"]["log-acl-match-drop"], json!("enabled"));
        assert_eq!(props["bot-defense"]["log"]["log-alarm"], json!("enabled"));

        assert!(run(&context("14.0"), &decl, "log").is_err());
    }

    #[test]
    fn protocol_inspection_omits_empty_checks() {
        let decl = declaration(json!({
            "pi": {
                "class": "Protocol_Inspection_Profile",
                "enableComplianceChecks": false,
                "services": [
                    { "type": "dns", "compliance": [{ "check": "dns_maximum_reply_length", "value": "512" }], "signature": [], "ports": [53] },
                    { "type": "http", "compliance": [], "signature": [] }
                ]
            },
            "bare": { "class": "Protocol_Inspection_Profile" }
        }));
        let ctx = context("15.1");
        let out = run(&ctx, &decl, "pi").expect("pi");
        let props = &out.configs[0].properties;
        assert_eq!(props["compliance"], json!("disabled"));
        let dns = &props["services"]["dns"];
        assert_eq!(dns["compliance"]["dns_maximum_reply_length"]["value"], json!("\"512\""));
        assert!(dns.get("signature").is_none());
        assert_eq!(dns["ports"], json!({ "53": {} }));
        assert!(props["services"].get("http").is_none());

        let bare = run(&ctx, &decl, "bare").expect("bare");
        assert!(bare.configs[0].properties.get("services").is_none());
    }
}
