use decl_core::{ConfigObject, DeclValue};
use serde_json::{Map, Value};

use super::certificate::{cert_paths, decode_secret};
use super::{described, Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::normalize::{enabled_disabled, quote_or_none, quote_string, yes_no};
use crate::registry::ObjectKind;
use crate::resolver::Target;
use crate::version::Feature;

const SCRIPT_SUFFIX: &str = "-script";

/// Monitor types and the appliance command each maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorType {
    Http,
    Https,
    Http2,
    Tcp,
    Udp,
    Icmp,
    GatewayIcmp,
    External,
    Ldap,
    Sip,
    Smtp,
    Dns,
    Radius,
    Mysql,
    Postgresql,
    TcpHalfOpen,
    Inband,
}

impl MonitorType {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "http" => MonitorType::Http,
            "https" => MonitorType::Https,
            "http2" => MonitorType::Http2,
            "tcp" => MonitorType::Tcp,
            "udp" => MonitorType::Udp,
            "icmp" => MonitorType::Icmp,
            "gateway-icmp" => MonitorType::GatewayIcmp,
            "external" => MonitorType::External,
            "ldap" => MonitorType::Ldap,
            "sip" => MonitorType::Sip,
            "smtp" => MonitorType::Smtp,
            "dns" => MonitorType::Dns,
            "radius" => MonitorType::Radius,
            "mysql" => MonitorType::Mysql,
            "postgresql" => MonitorType::Postgresql,
            "tcp-half-open" => MonitorType::TcpHalfOpen,
            "inband" => MonitorType::Inband,
            _ => return None,
        })
    }

    fn command(self) -> &'static str {
        match self {
            MonitorType::Http => "ltm monitor http",
            MonitorType::Https => "ltm monitor https",
            MonitorType::Http2 => "ltm monitor http2",
            MonitorType::Tcp => "ltm monitor tcp",
            MonitorType::Udp => "ltm monitor udp",
            MonitorType::Icmp => "ltm monitor icmp",
            MonitorType::GatewayIcmp => "ltm monitor gateway-icmp",
            MonitorType::External => "ltm monitor external",
            MonitorType::Ldap => "ltm monitor ldap",
            MonitorType::Sip => "ltm monitor sip",
            MonitorType::Smtp => "ltm monitor smtp",
            MonitorType::Dns => "ltm monitor dns",
            MonitorType::Radius => "ltm monitor radius",
            MonitorType::Mysql => "ltm monitor mysql",
            MonitorType::Postgresql => "ltm monitor postgresql",
            MonitorType::TcpHalfOpen => "ltm monitor tcp-half-open",
            MonitorType::Inband => "ltm monitor inband",
        }
    }

    fn has_send_receive(self) -> bool {
        matches!(
            self,
            MonitorType::Http
                | MonitorType::Https
                | MonitorType::Http2
                | MonitorType::Tcp
                | MonitorType::Udp
        )
    }
}

/// `address:port` with `*` wildcards; IPv6 uses `.` before the port.
fn destination(item: &Value) -> String {
    let address = match item.str_prop("targetAddress") {
        Some(addr) if !addr.is_empty() => addr,
        _ => "*",
    };
    let port = match item.u64_prop("targetPort") {
        Some(port) if port != 0 => port.to_string(),
        _ => "*".to_string(),
    };
    let sep = if address.contains(':') { '.' } else { ':' };
    format!("{address}{sep}{port}")
}

pub struct MonitorTranslator;

impl Translator for MonitorTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Monitor
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let raw_type = item.str_prop("monitorType").unwrap_or("http");
        let kind = MonitorType::parse(raw_type).ok_or_else(|| {
            TranslateError::invalid(scope.path(), format!("unsupported monitorType {raw_type}"))
        })?;
        if kind == MonitorType::Http2 {
            env.ctx.require(Feature::MonitorHttp2, &scope.path())?;
        }

        let mut out = Translation::default();
        let mut monitor = described(scope, kind.command());
        let props = &mut monitor.properties;

        if kind == MonitorType::Inband {
            set(props, "failures", item.u64_prop("failures").unwrap_or(3));
            set(props, "failure-interval", item.u64_prop("failureInterval").unwrap_or(30));
            set(props, "response-time", item.u64_prop("responseTime").unwrap_or(10));
            set(props, "retry-time", item.u64_prop("retryTime").unwrap_or(300));
            out.push(monitor);
            return Ok(out);
        }

        set(props, "interval", item.u64_prop("interval").unwrap_or(5));
        set(props, "timeout", item.u64_prop("timeout").unwrap_or(16));
        set(props, "up-interval", item.u64_prop("upInterval").unwrap_or(0));
        set(props, "time-until-up", item.u64_prop("timeUntilUp").unwrap_or(0));
        set(props, "destination", destination(item));

        if kind.has_send_receive() {
            set(props, "send", quote_or_none(item.str_prop("send")));
            set(props, "recv", quote_or_none(item.str_prop("receive")));
            set(props, "recv-disable", quote_or_none(item.str_prop("receiveDown")));
            set(props, "reverse", enabled_disabled(item.bool_prop("reverse").unwrap_or(false)));
            set(
                props,
                "transparent",
                enabled_disabled(item.bool_prop("transparent").unwrap_or(false)),
            );
            set(props, "ip-dscp", item.u64_prop("dscp").unwrap_or(0));
        }
        if matches!(kind, MonitorType::Http | MonitorType::Https | MonitorType::Http2) {
            set(props, "username", quote_or_none(item.str_prop("username")));
            set(props, "password", secret_or_none(scope, item.prop("passphrase"))?);
        }
        if matches!(kind, MonitorType::Https | MonitorType::Http2) {
            set(
                props,
                "cipherlist",
                item.str_prop("ciphers").unwrap_or("DEFAULT:+SHA:+3DES:+kEDH"),
            );
            let (cert, key) = match item.prop("clientCertificate") {
                Some(pointer) => client_cert(env, scope, pointer)?,
                None => ("none".to_string(), "none".to_string()),
            };
            set(props, "cert", cert);
            set(props, "key", key);
        }

        match kind {
            MonitorType::External => {
                let run = match (item.str_prop("script"), item.str_prop("pathname")) {
                    (Some(script), _) => {
                        let script_path = scope.sibling(&format!("{}{SCRIPT_SUFFIX}", scope.name));
                        let mut file = ConfigObject::new(script_path.clone(), "sys file external-monitor");
                        file.set("content", script);
                        out.push(file);
                        script_path
                    }
                    (None, Some(pathname)) => pathname.to_string(),
                    (None, None) => {
                        return Err(TranslateError::invalid(
                            scope.path(),
                            "external monitors need a script or a pathname",
                        ));
                    }
                };
                set(props, "run", run);
                set(props, "args", quote_or_none(item.str_prop("arguments")));
                let vars: Map<String, Value> = item
                    .object_prop("environmentVariables")
                    .map(|vars| {
                        vars.iter()
                            .map(|(k, v)| (k.clone(), Value::from(v.as_str().map(quote_string).unwrap_or_default())))
                            .collect()
                    })
                    .unwrap_or_default();
                set(props, "user-defined", Value::Object(vars));
            }
            MonitorType::Ldap => {
                set(props, "base", quote_or_none(item.str_prop("base")));
                set(props, "filter", quote_or_none(item.str_prop("filter")));
                set(props, "security", item.str_prop("security").unwrap_or("none"));
                set(
                    props,
                    "mandatory-attributes",
                    yes_no(item.bool_prop("mandatoryAttributes").unwrap_or(false)),
                );
                set(
                    props,
                    "chase-referrals",
                    yes_no(item.bool_prop("chaseReferrals").unwrap_or(true)),
                );
                set(props, "username", quote_or_none(item.str_prop("username")));
                set(props, "password", secret_or_none(scope, item.prop("passphrase"))?);
            }
            MonitorType::Sip => {
                set(props, "mode", item.str_prop("protocol").unwrap_or("udp"));
                set(props, "request", quote_or_none(item.str_prop("request")));
                set(props, "headers", quote_or_none(item.str_prop("headers")));
                set(props, "filter", item.str_prop("codesUp").unwrap_or("none"));
                set(props, "filter-neg", item.str_prop("codesDown").unwrap_or("none"));
            }
            MonitorType::Smtp => {
                set(props, "domain", quote_or_none(item.str_prop("domain")));
            }
            MonitorType::Dns => {
                let Some(qname) = item.str_prop("queryName") else {
                    return Err(TranslateError::invalid(scope.path(), "dns monitors need a queryName"));
                };
                set(props, "qname", qname);
                set(props, "qtype", item.str_prop("queryType").unwrap_or("a"));
                set(props, "accept-rcode", item.str_prop("acceptRCODE").unwrap_or("no-error"));
                set(props, "answer-contains", item.str_prop("answerContains").unwrap_or("query-type"));
                set(props, "recv", item.str_prop("receive").unwrap_or("none"));
                set(props, "reverse", yes_no(item.bool_prop("reverse").unwrap_or(false)));
                set(props, "transparent", yes_no(item.bool_prop("transparent").unwrap_or(false)));
            }
            MonitorType::Radius => {
                set(props, "username", quote_or_none(item.str_prop("username")));
                set(props, "password", secret_or_none(scope, item.prop("passphrase"))?);
                set(props, "secret", secret_or_none(scope, item.prop("secret"))?);
                set(props, "nas-ip-address", item.str_prop("nasIpAddress").unwrap_or("none"));
            }
            MonitorType::Mysql | MonitorType::Postgresql => {
                set(props, "database", quote_or_none(item.str_prop("database")));
                set(props, "username", quote_or_none(item.str_prop("username")));
                set(props, "password", secret_or_none(scope, item.prop("passphrase"))?);
                set(props, "count", item.u64_prop("count").unwrap_or(0));
                set(props, "send", quote_or_none(item.str_prop("send")));
                set(props, "recv", quote_or_none(item.str_prop("receive")));
                set(props, "recv-column", quote_or_none(item.str_prop("receiveColumn")));
                set(props, "recv-row", quote_or_none(item.str_prop("receiveRow")));
            }
            _ => {}
        }

        out.push(monitor);
        Ok(out)
    }
}

fn set(props: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    props.insert(key.to_string(), value.into());
}

fn secret_or_none(scope: &ItemScope<'_>, secret: Option<&Value>) -> Result<String> {
    match secret {
        Some(secret) => decode_secret(scope, secret),
        None => Ok("none".to_string()),
    }
}

fn client_cert(env: &Env<'_>, scope: &ItemScope<'_>, pointer: &Value) -> Result<(String, String)> {
    match env.resolver.target(scope, pointer)? {
        Target::BigIp(path) => Ok((path, "none".to_string())),
        Target::Declared(located) if located.kind() == Some(ObjectKind::Certificate) => {
            let paths = cert_paths(&env.resolver, &located.scope())?;
            Ok((paths.cert, paths.key.unwrap_or_else(|| "none".to_string())))
        }
        Target::Declared(located) => Err(TranslateError::WrongClass {
            reference: pointer.to_string(),
            found: located.class().unwrap_or("unknown").to_string(),
            expected: ObjectKind::Certificate.class_name().to_string(),
        }),
    }
}
