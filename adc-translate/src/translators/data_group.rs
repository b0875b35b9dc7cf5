//! Internal and external data groups.
//!
//! External groups fetched with credentials go through an upload object
//! the executor runs before the file is created; the file then reads the
//! downloaded copy.

use decl_core::{ConfigObject, DeclValue};
use serde_json::{Map, Value};

use super::certificate::decode_secret;
use super::{described, Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::normalize::quote_string;
use crate::registry::ObjectKind;

const FILE_SUFFIX: &str = "-file";
const UPLOAD_SUFFIX: &str = "-upload";
const DOWNLOAD_DIR: &str = "file:/var/config/rest/downloads/";

fn key_type(item: &Value, path: &str) -> Result<&'static str> {
    match item.str_prop("keyDataType").unwrap_or("string") {
        "string" => Ok("string"),
        "integer" => Ok("integer"),
        "ip" => Ok("ip"),
        other => Err(TranslateError::invalid(path, format!("unknown keyDataType {other}"))),
    }
}

fn record_key(value: &Value, key_type: &str) -> Option<String> {
    match (value, key_type) {
        (Value::Number(n), _) => Some(n.to_string()),
        (Value::String(s), "string") => Some(quote_string(s)),
        (Value::String(s), _) => Some(s.clone()),
        _ => None,
    }
}

/// Download location for an uploaded file, flattened to one name.
fn download_path(upload_path: &str) -> String {
    let flat: String = upload_path
        .trim_start_matches('/')
        .chars()
        .map(|ch| if ch == '/' { '~' } else { ch })
        .collect();
    format!("{DOWNLOAD_DIR}{flat}")
}

pub struct DataGroupTranslator;

impl Translator for DataGroupTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::DataGroup
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let item = scope.item;
        let path = scope.path();
        let key_type = key_type(item, &path)?;

        match item.str_prop("storageType").unwrap_or("internal") {
            "internal" => {
                let mut records = Map::new();
                for record in item.array_prop("records") {
                    let Some(key) = record.prop("key").and_then(|k| record_key(k, key_type)) else {
                        return Err(TranslateError::invalid(&path, "every record needs a key"));
                    };
                    let mut entry = Map::new();
                    if let Some(value) = record.str_prop("value") {
                        entry.insert("data".to_string(), Value::from(quote_string(value)));
                    }
                    records.insert(key, Value::Object(entry));
                }
                let mut group = described(scope, "ltm data-group internal");
                group.set("type", key_type);
                group.set(
                    "records",
                    if records.is_empty() {
                        Value::from("none")
                    } else {
                        Value::Object(records)
                    },
                );
                Ok(Translation::single(group))
            }
            "external" => external(scope, key_type),
            other => Err(TranslateError::invalid(path, format!("unknown storageType {other}"))),
        }
    }
}

fn external(scope: &ItemScope<'_>, key_type: &str) -> Result<Translation> {
    let item = scope.item;
    let content = item.prop("dataGroupContent").unwrap_or(&Value::Null);
    let url = match content {
        Value::String(url) => Some(url.as_str()),
        other => other.str_prop("url"),
    };
    let Some(url) = url else {
        return Err(TranslateError::invalid(
            scope.path(),
            "external data groups need a dataGroupContent url",
        ));
    };
    let ignore_changes = content.bool_prop("ignoreChanges").unwrap_or(false);

    let mut out = Translation::default();
    let file_path = scope.sibling(&format!("{}{FILE_SUFFIX}", scope.name));
    let mut file = ConfigObject::new(file_path.clone(), "sys file data-group");
    file.set("type", key_type);
    file.set(
        "separator",
        quote_string(item.str_prop("separator").unwrap_or(":=")),
    );

    match content.prop("authentication") {
        Some(auth) => {
            let upload_path = scope.sibling(&format!("{}{UPLOAD_SUFFIX}", scope.name));
            let mut upload = ConfigObject::new(upload_path.clone(), "mgmt shared file-transfer uploads");
            upload.set("url", url);
            upload.set(
                "skipCertificateCheck",
                content.bool_prop("skipCertificateCheck").unwrap_or(false),
            );
            let mut headers = Map::new();
            match auth.str_prop("method").unwrap_or("basic") {
                "basic" => {
                    let username = auth.str_prop("username").unwrap_or_default();
                    upload.set("username", username);
                    if let Some(secret) = auth.prop("passphrase") {
                        upload.set("passphrase", decode_secret(scope, secret)?);
                    }
                }
                "bearer-token" => {
                    let Some(token) = auth.prop("token") else {
                        return Err(TranslateError::invalid(
                            scope.path(),
                            "bearer-token authentication needs a token",
                        ));
                    };
                    let token = decode_secret(scope, token)?;
                    headers.insert(
                        "Authorization".to_string(),
                        Value::from(format!("Bearer {}", token.trim_matches('"'))),
                    );
                }
                other => {
                    return Err(TranslateError::invalid(
                        scope.path(),
                        format!("unknown authentication method {other}"),
                    ));
                }
            }
            for header in content.array_prop("httpHeaders") {
                if let (Some(name), Some(value)) = (header.str_prop("name"), header.str_prop("value")) {
                    headers.insert(name.to_string(), Value::from(value));
                }
            }
            upload.set("headers", Value::Object(headers));
            if ignore_changes {
                for prop in ["url", "username", "passphrase", "headers", "skipCertificateCheck"] {
                    upload = upload.ignoring(prop);
                }
            }
            file.set("source-path", download_path(&upload_path));
            out.push(upload);
        }
        None => file.set("source-path", url),
    }
    if ignore_changes {
        file = file.ignoring("source-path");
    }
    out.push(file);

    let mut group = described(scope, "ltm data-group external");
    group.set("external-file-name", file_path);
    out.push(group);
    Ok(out)
}
