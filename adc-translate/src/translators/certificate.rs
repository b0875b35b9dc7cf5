//! Certificate, key and CA bundle files.
//!
//! A `Certificate` named `c` owns up to three files: `c.crt`, `c.key` and
//! `c-bundle.crt`. When a part is a `bigip` reference nothing is uploaded;
//! instead a path update tells the executor to rewrite every mention of the
//! generated name to the existing object.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use decl_core::{ConfigObject, DeclValue};
use serde_json::Value;

use super::{Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::normalize::quote_string;
use crate::registry::ObjectKind;
use crate::resolver::{classify, Reference, Resolver};

pub(crate) const CERT_SUFFIX: &str = ".crt";
pub(crate) const KEY_SUFFIX: &str = ".key";
pub(crate) const BUNDLE_SUFFIX: &str = "-bundle.crt";

/// File paths a TLS profile needs from one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPaths {
    pub cert: String,
    pub key: Option<String>,
    pub chain: Option<String>,
}

/// Paths for the `Certificate` at `scope`, honouring `bigip` parts.
pub(crate) fn cert_paths(resolver: &Resolver<'_>, scope: &ItemScope<'_>) -> Result<CertPaths> {
    let base = scope.path();
    let item = scope.item;
    let cert = part_path(item.prop("certificate"), format!("{base}{CERT_SUFFIX}"))?;
    let key = match item.prop("privateKey") {
        Some(value) => Some(part_path(Some(value), format!("{base}{KEY_SUFFIX}"))?),
        None => None,
    };
    let chain = match item.prop("chainCA") {
        None => None,
        Some(Value::String(_)) => Some(format!("{base}{BUNDLE_SUFFIX}")),
        Some(value) => Some(resolver.resolve_kind(
            scope,
            value,
            &[ObjectKind::CaBundle, ObjectKind::Certificate],
        )?),
    };
    Ok(CertPaths { cert, key, chain })
}

fn part_path(value: Option<&Value>, generated: String) -> Result<String> {
    match value.map(classify) {
        Some(Reference::BigIp(path)) => checked(path),
        _ => Ok(generated),
    }
}

fn checked(path: &str) -> Result<String> {
    if path.starts_with('/') {
        Ok(path.to_string())
    } else {
        Err(TranslateError::InvalidReference {
            reference: path.to_string(),
            reason: "bigip references must be absolute paths".to_string(),
        })
    }
}

/// Decode a `{ ciphertext }` secret into quoted text.
pub(crate) fn decode_secret(scope: &ItemScope<'_>, secret: &Value) -> Result<String> {
    let Some(ciphertext) = secret.str_prop("ciphertext") else {
        return Err(TranslateError::invalid(
            scope.path(),
            "secret needs a ciphertext",
        ));
    };
    let bytes = STANDARD
        .decode(ciphertext)
        .or_else(|_| URL_SAFE_NO_PAD.decode(ciphertext.trim_end_matches('=')))
        .map_err(|err| TranslateError::invalid(scope.path(), format!("secret is not base64: {err}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| TranslateError::invalid(scope.path(), "secret is not valid UTF-8"))?;
    Ok(quote_string(&text))
}

fn file_object(path: String, command: &str, content: &str) -> ConfigObject {
    let mut obj = ConfigObject::new(path, command);
    obj.set("content", content);
    obj
}

pub struct CertificateTranslator;

impl Translator for CertificateTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Certificate
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let base = scope.path();
        let item = scope.item;
        let mut out = Translation::default();

        match item.prop("certificate") {
            Some(Value::String(pem)) => {
                out.push(file_object(format!("{base}{CERT_SUFFIX}"), "sys file ssl-cert", pem));
            }
            Some(other) => match classify(other) {
                Reference::BigIp(path) => out.update_path(format!("{base}{CERT_SUFFIX}"), checked(path)?),
                _ => {
                    return Err(TranslateError::invalid(
                        base,
                        "certificate must be PEM text or a bigip reference",
                    ));
                }
            },
            None => return Err(TranslateError::invalid(base, "certificate is required")),
        }

        match item.prop("privateKey") {
            None => {}
            Some(Value::String(pem)) => {
                let mut key = file_object(format!("{base}{KEY_SUFFIX}"), "sys file ssl-key", pem);
                if let Some(secret) = item.prop("passphrase") {
                    key.set("passphrase", decode_secret(scope, secret)?);
                    if secret.bool_prop("ignoreChanges").unwrap_or(false) {
                        key = key.ignoring("passphrase");
                    }
                }
                out.push(key);
            }
            Some(other) => match classify(other) {
                Reference::BigIp(path) => out.update_path(format!("{base}{KEY_SUFFIX}"), checked(path)?),
                _ => {
                    return Err(TranslateError::invalid(
                        base,
                        "privateKey must be PEM text or a bigip reference",
                    ));
                }
            },
        }

        match item.prop("chainCA") {
            Some(Value::String(pem)) => {
                out.push(file_object(
                    format!("{base}{BUNDLE_SUFFIX}"),
                    "sys file ssl-cert",
                    pem,
                ));
            }
            Some(other) => {
                if let Reference::BigIp(path) = classify(other) {
                    out.update_path(format!("{base}{BUNDLE_SUFFIX}"), checked(path)?);
                }
            }
            None => {}
        }
        Ok(out)
    }
}

pub struct CaBundleTranslator;

impl Translator for CaBundleTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::CaBundle
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let mut out = Translation::default();
        match scope.item.prop("bundle") {
            Some(Value::String(pem)) => {
                out.push(file_object(scope.path(), "sys file ssl-cert", pem));
            }
            Some(other) => match classify(other) {
                Reference::BigIp(path) => out.update_path(scope.path(), checked(path)?),
                _ => {
                    return Err(TranslateError::invalid(
                        scope.path(),
                        "bundle must be PEM text or a bigip reference",
                    ));
                }
            },
            None => {
                return Err(TranslateError::invalid(scope.path(), "bundle is required"));
            }
        }
        Ok(out)
    }
}
