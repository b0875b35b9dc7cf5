//! HTTP, TCP and UDP profiles plus persistence methods.
//!
//! TCP and UDP settings are table-driven: each row names the declared
//! property, the appliance property, a default and how the value is
//! rendered.

use decl_core::{ConfigObject, DeclValue};
use serde_json::Value;

use super::{described, quoted_prop, Env, ItemScope, ProfileLink, ProfileRole, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::normalize::{enabled_disabled, indefinite_as_literal, indefinite_as_max, quote_string, to_set_or_none};
use crate::registry::ObjectKind;
use crate::version::Feature;

pub(crate) const WEBSOCKET_SUFFIX: &str = "-websocket";
pub(crate) const PROXY_CONNECT_SUFFIX: &str = "-proxy-connect";

/// How one table row renders its value.
#[derive(Debug, Clone, Copy)]
enum Render {
    /// Number or string copied through.
    Plain,
    /// `enabled` / `disabled`.
    Toggle,
    /// `indefinite` becomes the platform maximum.
    IndefiniteMax,
    /// `indefinite` stays a keyword.
    IndefiniteLiteral,
}

/// `(declared key, appliance key, default, render)`.
type Row = (&'static str, &'static str, Fallback, Render);

#[derive(Debug, Clone, Copy)]
enum Fallback {
    Num(u64),
    Flag(bool),
    Text(&'static str),
}

impl Fallback {
    fn value(self) -> Value {
        match self {
            Fallback::Num(n) => Value::from(n),
            Fallback::Flag(b) => Value::from(b),
            Fallback::Text(s) => Value::from(s),
        }
    }
}

const TCP_ROWS: &[Row] = &[
    ("abc", "abc", Fallback::Flag(true), Render::Toggle),
    ("ackOnPush", "ack-on-push", Fallback::Flag(true), Render::Toggle),
    ("autoProxyBufferSize", "proxy-buffer-auto", Fallback::Flag(true), Render::Toggle),
    ("autoReceiveWindowSize", "receive-window-auto", Fallback::Flag(true), Render::Toggle),
    ("autoSendBufferSize", "send-buffer-auto", Fallback::Flag(true), Render::Toggle),
    ("closeWaitTimeout", "close-wait-timeout", Fallback::Num(5), Render::IndefiniteMax),
    ("congestionControl", "congestion-control", Fallback::Text("woodside"), Render::Plain),
    ("deferredAccept", "deferred-accept", Fallback::Flag(false), Render::Toggle),
    ("delayedAcks", "delayed-acks", Fallback::Flag(true), Render::Toggle),
    ("dsack", "dsack", Fallback::Flag(false), Render::Toggle),
    ("ecn", "ecn", Fallback::Flag(true), Render::Toggle),
    ("finWait2Timeout", "fin-wait-2-timeout", Fallback::Num(300), Render::IndefiniteMax),
    ("finWaitTimeout", "fin-wait-timeout", Fallback::Num(5), Render::IndefiniteMax),
    ("idleTimeout", "idle-timeout", Fallback::Num(300), Render::IndefiniteMax),
    ("initCwnd", "init-cwnd", Fallback::Num(16), Render::Plain),
    ("initRwnd", "init-rwnd", Fallback::Num(16), Render::Plain),
    ("ipTos", "ip-tos-to-client", Fallback::Num(0), Render::Plain),
    ("keepAliveInterval", "keep-alive-interval", Fallback::Num(1800), Render::IndefiniteMax),
    ("limitedTransmit", "limited-transmit", Fallback::Flag(true), Render::Toggle),
    ("linkQos", "link-qos-to-client", Fallback::Num(0), Render::Plain),
    ("maxRetrans", "max-retrans", Fallback::Num(8), Render::Plain),
    ("maxSegmentSize", "max-segment-size", Fallback::Num(0), Render::Plain),
    ("md5Signature", "md5-signature", Fallback::Flag(false), Render::Toggle),
    ("minimumRto", "minimum-rto", Fallback::Num(1000), Render::Plain),
    ("mptcp", "mptcp", Fallback::Text("disabled"), Render::Plain),
    ("nagle", "nagle", Fallback::Text("auto"), Render::Plain),
    ("pktLossIgnoreBurst", "pkt-loss-ignore-burst", Fallback::Num(0), Render::Plain),
    ("pktLossIgnoreRate", "pkt-loss-ignore-rate", Fallback::Num(0), Render::Plain),
    ("proxyBufferHigh", "proxy-buffer-high", Fallback::Num(262_144), Render::Plain),
    ("proxyBufferLow", "proxy-buffer-low", Fallback::Num(196_608), Render::Plain),
    ("proxyMss", "proxy-mss", Fallback::Flag(true), Render::Toggle),
    ("proxyOptions", "proxy-options", Fallback::Flag(false), Render::Toggle),
    ("ratepace", "rate-pace", Fallback::Flag(true), Render::Toggle),
    ("receiveWindowSize", "receive-window-size", Fallback::Num(131_072), Render::Plain),
    ("resetOnTimeout", "reset-on-timeout", Fallback::Flag(true), Render::Toggle),
    ("selectiveAcks", "selective-acks", Fallback::Flag(true), Render::Toggle),
    ("sendBufferSize", "send-buffer-size", Fallback::Num(262_144), Render::Plain),
    ("slowStart", "slow-start", Fallback::Flag(true), Render::Toggle),
    ("synCookieEnable", "syn-cookie-enable", Fallback::Flag(true), Render::Toggle),
    ("synMaxRetrans", "syn-max-retrans", Fallback::Num(3), Render::Plain),
    ("synRtoBase", "syn-rto-base", Fallback::Num(3000), Render::Plain),
    ("timeWaitRecycle", "time-wait-recycle", Fallback::Flag(true), Render::Toggle),
    ("timeWaitTimeout", "time-wait-timeout", Fallback::Num(2000), Render::IndefiniteLiteral),
    ("timestamps", "timestamps", Fallback::Flag(true), Render::Toggle),
    ("verifiedAccept", "verified-accept", Fallback::Flag(false), Render::Toggle),
    ("zeroWindowTimeout", "zero-window-timeout", Fallback::Num(20_000), Render::Plain),
];

const UDP_ROWS: &[Row] = &[
    ("allowNoPayload", "allow-no-payload", Fallback::Flag(false), Render::Toggle),
    ("bufferMaxBytes", "buffer-max-bytes", Fallback::Num(655_350), Render::Plain),
    ("bufferMaxPackets", "buffer-max-packets", Fallback::Num(0), Render::Plain),
    ("datagramLoadBalancing", "datagram-load-balancing", Fallback::Flag(false), Render::Toggle),
    ("idleTimeout", "idle-timeout", Fallback::Num(60), Render::IndefiniteLiteral),
    ("ipDfMode", "ip-df-mode", Fallback::Text("pmtu"), Render::Plain),
    ("ipTosToClient", "ip-tos-to-client", Fallback::Num(0), Render::Plain),
    ("ipTtlMode", "ip-ttl-mode", Fallback::Text("proxy"), Render::Plain),
    ("ipTtlV4", "ip-ttl-v4", Fallback::Num(255), Render::Plain),
    ("ipTtlV6", "ip-ttl-v6", Fallback::Num(64), Render::Plain),
    ("linkQosToClient", "link-qos-to-client", Fallback::Num(0), Render::Plain),
    ("noChecksum", "no-checksum", Fallback::Flag(false), Render::Toggle),
    ("proxyMss", "proxy-mss", Fallback::Flag(false), Render::Toggle),
];

fn apply_rows(item: &Value, rows: &[Row], obj: &mut ConfigObject) {
    for (key, prop, default, render) in rows {
        let value = item.prop(key).cloned().unwrap_or_else(|| default.value());
        let rendered = match (render, &value) {
            (Render::Toggle, Value::Bool(flag)) => Value::from(enabled_disabled(*flag)),
            (Render::IndefiniteMax, v) => indefinite_as_max(v),
            (Render::IndefiniteLiteral, v) => indefinite_as_literal(v),
            (_, v) => v.clone(),
        };
        obj.set(*prop, rendered);
    }
}

/// `selective` and `sustain` swap depending on what the target knows.
fn chunking(env: &Env<'_>, mode: &str) -> String {
    let sustain = env.ctx.supports(Feature::HttpChunkingSustain);
    match mode {
        "selective" if sustain => "sustain".to_string(),
        "sustain" if !sustain => "selective".to_string(),
        other => other.to_string(),
    }
}

pub struct HttpProfileTranslator;

impl Translator for HttpProfileTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::HttpProfile
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let path = scope.path();
        let mut http = described(scope, "ltm profile http");

        let proxy_type = item.str_prop("proxyType").unwrap_or("reverse");
        if !matches!(proxy_type, "reverse" | "transparent" | "explicit") {
            return Err(TranslateError::invalid(path, format!("unknown proxyType {proxy_type}")));
        }
        http.set("proxy-type", proxy_type);
        http.set("defaults-from", "/Common/http");
        http.set(
            "request-chunking",
            chunking(env, item.str_prop("requestChunking").unwrap_or("preserve")),
        );
        http.set(
            "response-chunking",
            chunking(env, item.str_prop("responseChunking").unwrap_or("selective")),
        );
        http.set(
            "insert-xforwarded-for",
            enabled_disabled(item.bool_prop("xForwardedFor").unwrap_or(true)),
        );
        http.set("fallback-host", quoted_prop(item, "fallbackRedirect"));
        http.set(
            "fallback-status-codes",
            to_set_or_none(
                item.array_prop("fallbackStatusCodes")
                    .iter()
                    .map(|code| match code {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    }),
            ),
        );
        http.set("header-erase", quoted_prop(item, "eraseHeader"));
        http.set("header-insert", quoted_prop(item, "insertHeader"));
        http.set("server-agent-name", quoted_prop(item, "serverHeaderValue"));
        http.set("redirect-rewrite", item.str_prop("rewriteRedirects").unwrap_or("none"));
        http.set(
            "oneconnect-transformations",
            enabled_disabled(item.bool_prop("multiplexTransformations").unwrap_or(true)),
        );
        http.set("via-request", item.str_prop("viaRequest").unwrap_or("preserve"));
        http.set("via-response", item.str_prop("viaResponse").unwrap_or("preserve"));
        http.set("via-host-name", quoted_prop(item, "viaHost"));

        let mut enforcement = serde_json::Map::new();
        enforcement.insert(
            "known-methods".to_string(),
            to_set_or_none(
                item.array_prop("knownMethods")
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string),
            ),
        );
        enforcement.insert(
            "max-header-count".to_string(),
            Value::from(item.u64_prop("maxHeaderCount").unwrap_or(64)),
        );
        enforcement.insert(
            "max-header-size".to_string(),
            Value::from(item.u64_prop("maxHeaderSize").unwrap_or(32_768)),
        );
        enforcement.insert(
            "max-requests".to_string(),
            Value::from(item.u64_prop("maxRequests").unwrap_or(0)),
        );
        enforcement.insert(
            "pipeline".to_string(),
            Value::from(item.str_prop("pipelineAction").unwrap_or("allow")),
        );
        enforcement.insert(
            "unknown-method".to_string(),
            Value::from(item.str_prop("unknownMethodAction").unwrap_or("allow")),
        );
        enforcement.insert(
            "truncated-redirects".to_string(),
            Value::from(enabled_disabled(item.bool_prop("truncatedRedirects").unwrap_or(false))),
        );
        http.set("enforcement", Value::Object(enforcement));

        let mut hsts = serde_json::Map::new();
        hsts.insert(
            "mode".to_string(),
            Value::from(enabled_disabled(item.bool_prop("hstsInsert").unwrap_or(false))),
        );
        hsts.insert(
            "maximum-age".to_string(),
            Value::from(item.u64_prop("hstsPeriod").unwrap_or(7_862_400)),
        );
        hsts.insert(
            "include-subdomains".to_string(),
            Value::from(enabled_disabled(item.bool_prop("hstsIncludeSubdomains").unwrap_or(true))),
        );
        hsts.insert(
            "preload".to_string(),
            Value::from(enabled_disabled(item.bool_prop("hstsPreload").unwrap_or(false))),
        );
        http.set("hsts", Value::Object(hsts));

        let mut out = Translation::single(http);

        if item.bool_prop("webSocketsEnabled").unwrap_or(false) {
            let ws_path = format!("{path}{WEBSOCKET_SUFFIX}");
            let mut ws = ConfigObject::new(ws_path.clone(), "ltm profile websocket");
            ws.set("defaults-from", "/Common/websocket");
            ws.set("masking", item.str_prop("webSocketMasking").unwrap_or("unmask"));
            out.push(ws);
            out.profile_links.push(ProfileLink {
                parent: path.clone(),
                profile: ws_path,
                role: ProfileRole::Websocket,
            });
        }

        if item.bool_prop("proxyConnectEnabled").unwrap_or(false) {
            if proxy_type != "explicit" {
                return Err(TranslateError::invalid(
                    path,
                    "proxyConnectEnabled needs an explicit proxyType",
                ));
            }
            let pc_path = format!("{path}{PROXY_CONNECT_SUFFIX}");
            let mut pc = ConfigObject::new(pc_path.clone(), "ltm profile http-proxy-connect");
            pc.set("defaults-from", "/Common/http-proxy-connect");
            pc.set("default-state", "enabled");
            out.push(pc);
            out.profile_links.push(ProfileLink {
                parent: path,
                profile: pc_path,
                role: ProfileRole::ProxyConnect,
            });
        }
        Ok(out)
    }
}

pub struct TcpProfileTranslator;

impl Translator for TcpProfileTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::TcpProfile
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let mut tcp = described(scope, "ltm profile tcp");
        tcp.set("defaults-from", "/Common/f5-tcp-progressive");
        apply_rows(item, TCP_ROWS, &mut tcp);

        let allowlist = enabled_disabled(item.bool_prop("synCookieAllowlist").unwrap_or(false));
        if env.ctx.supports(Feature::AllowlistNaming) {
            tcp.set("syn-cookie-allowlist", allowlist);
        } else {
            tcp.set("syn-cookie-whitelist", allowlist);
        }
        Ok(Translation::single(tcp))
    }
}

pub struct UdpProfileTranslator;

impl Translator for UdpProfileTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::UdpProfile
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let mut udp = described(scope, "ltm profile udp");
        udp.set("defaults-from", "/Common/udp");
        apply_rows(scope.item, UDP_ROWS, &mut udp);
        Ok(Translation::single(udp))
    }
}

/// `persistenceMethod` → command suffix and parent profile.
fn persist_method(method: &str) -> Option<(&'static str, &'static str)> {
    Some(match method {
        "cookie" => ("cookie", "/Common/cookie"),
        "destination-address" => ("dest-addr", "/Common/dest_addr"),
        "source-address" => ("source-addr", "/Common/source_addr"),
        "hash" => ("hash", "/Common/hash"),
        "msrdp" => ("msrdp", "/Common/msrdp"),
        "sip-info" => ("sip", "/Common/sip_info"),
        "tls-session-id" => ("ssl", "/Common/ssl"),
        "universal" => ("universal", "/Common/universal"),
        _ => return None,
    })
}

pub struct PersistTranslator;

impl Translator for PersistTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Persist
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let method = item.str_prop("persistenceMethod").unwrap_or("cookie");
        let Some((suffix, parent)) = persist_method(method) else {
            return Err(TranslateError::invalid(
                scope.path(),
                format!("unknown persistenceMethod {method}"),
            ));
        };

        let mut persist = described(scope, &format!("ltm persistence {suffix}"));
        persist.set("defaults-from", parent);
        let duration = item.prop("duration").cloned().unwrap_or_else(|| Value::from(180));
        persist.set("timeout", indefinite_as_literal(&duration));
        persist.set(
            "mirror",
            enabled_disabled(item.bool_prop("mirror").unwrap_or(false)),
        );
        for (key, prop) in [
            ("matchAcrossPools", "match-across-pools"),
            ("matchAcrossServices", "match-across-services"),
            ("matchAcrossVirtuals", "match-across-virtuals"),
            ("overrideConnectionLimit", "override-connection-limit"),
        ] {
            persist.set(prop, enabled_disabled(item.bool_prop(key).unwrap_or(false)));
        }

        match suffix {
            "cookie" => {
                persist.set("method", item.str_prop("cookieMethod").unwrap_or("insert"));
                persist.set("cookie-name", quoted_prop(item, "cookieName"));
                let ttl = item.prop("ttl").cloned().unwrap_or_else(|| Value::from(0));
                persist.set("expiration", indefinite_as_literal(&ttl));
                persist.set(
                    "cookie-encryption",
                    item.str_prop("encrypt").unwrap_or("disabled"),
                );
                match item.prop("passphrase") {
                    Some(secret) => {
                        persist.set(
                            "cookie-encryption-passphrase",
                            super::certificate::decode_secret(scope, secret)?,
                        );
                        if secret.bool_prop("ignoreChanges").unwrap_or(false) {
                            persist = persist.ignoring("cookie-encryption-passphrase");
                        }
                    }
                    None => persist.set("cookie-encryption-passphrase", "none"),
                }
            }
            "source-addr" | "dest-addr" => {
                persist.set("mask", item.str_prop("addressMask").unwrap_or("none"));
                persist.set(
                    "hash-algorithm",
                    item.str_prop("hashAlgorithm").unwrap_or("default"),
                );
            }
            "hash" | "universal" => {
                let rule = match item.prop("iRule") {
                    Some(rule) => env.resolver.resolve_kind(scope, rule, &[ObjectKind::IRule])?,
                    None => "none".to_string(),
                };
                persist.set("rule", rule);
            }
            "sip" => {
                persist.set(
                    "sip-info",
                    item.str_prop("header").map(quote_string).unwrap_or_else(|| "none".to_string()),
                );
            }
            _ => {}
        }
        Ok(Translation::single(persist))
    }
}
