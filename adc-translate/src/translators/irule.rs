//! iRules and iFiles.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use decl_core::{ConfigObject, DeclValue};
use serde_json::Value;

use super::{described, Env, ItemScope, Translation, Translator};
use crate::error::{Result, TranslateError};
use crate::registry::ObjectKind;

const FILE_SUFFIX: &str = "-file";

/// Text of an inline resource: plain text, `{ "base64": ... }` or
/// `{ "text": ... }`.
fn inline_text(scope: &ItemScope<'_>, key: &str) -> Result<String> {
    match scope.item.prop(key) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(value @ Value::Object(_)) => {
            if let Some(text) = value.str_prop("text") {
                return Ok(text.to_string());
            }
            let Some(encoded) = value.str_prop("base64") else {
                return Err(TranslateError::invalid(
                    scope.path(),
                    format!("{key} needs text or base64 content"),
                ));
            };
            let bytes = STANDARD.decode(encoded.trim()).map_err(|err| {
                TranslateError::invalid(scope.path(), format!("{key} is not base64: {err}"))
            })?;
            String::from_utf8(bytes)
                .map_err(|_| TranslateError::invalid(scope.path(), format!("{key} is not UTF-8")))
        }
        _ => Err(TranslateError::invalid(scope.path(), format!("{key} is required"))),
    }
}

pub struct IRuleTranslator;

impl Translator for IRuleTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::IRule
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let mut rule = described(scope, "ltm rule");
        // Rule bodies are sent verbatim; the command language parses them itself.
        rule.set("api-anonymous", inline_text(scope, "iRule")?);
        Ok(Translation::single(rule))
    }
}

pub struct IFileTranslator;

impl Translator for IFileTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::IFile
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let file_path = scope.sibling(&format!("{}{FILE_SUFFIX}", scope.name));
        let mut file = ConfigObject::new(file_path.clone(), "sys file ifile");
        match scope.item.walk(&["iFile", "url"]).and_then(Value::as_str) {
            Some(url) => file.set("source-path", url),
            None => {
                file.set("source-path", "none");
                file.set("content", inline_text(scope, "iFile")?);
            }
        }

        let mut ifile = described(scope, "ltm ifile");
        ifile.set("file-name", file_path);

        let mut out = Translation::single(file);
        out.push(ifile);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::translators::testing::{context, declaration, paths, run};

    #[test]
    fn irule_accepts_text_and_base64() {
        let decl = declaration(json!({
            "plain": { "class": "iRule", "iRule": "when HTTP_REQUEST { log local0. hi }" },
            "encoded": { "class": "iRule", "iRule": { "base64": "d2hlbiBDTElFTlRfQUNDRVBURUQge30=" } },
            "broken": { "class": "iRule", "iRule": { "base64": "***" } }
        }));
        let ctx = context("15.1");
        let plain = run(&ctx, &decl, "plain").expect("plain");
        assert_eq!(plain.configs[0].command, "ltm rule");
        assert_eq!(
            plain.configs[0].properties["api-anonymous"],
            json!("when HTTP_REQUEST { log local0. hi }")
        );
        let encoded = run(&ctx, &decl, "encoded").expect("encoded");
        assert_eq!(
            encoded.configs[0].properties["api-anonymous"],
            json!("when CLIENT_ACCEPTED {}")
        );
        assert!(run(&ctx, &decl, "broken").is_err());
    }

    #[test]
    fn ifile_emits_file_then_reference() {
        let decl = declaration(json!({
            "page": { "class": "iFile", "iFile": "<html></html>", "remark": "maintenance" },
            "remote": { "class": "iFile", "iFile": { "url": "https://example.com/page.html" } }
        }));
        let ctx = context("15.1");
        let out = run(&ctx, &decl, "page").expect("ifile");
        assert_eq!(
            paths(&out),
            vec![("sys file ifile", "/t/a/page-file"), ("ltm ifile", "/t/a/page")]
        );
        assert_eq!(out.configs[0].properties["content"], json!("<html></html>"));
        assert_eq!(out.configs[1].properties["file-name"], json!("/t/a/page-file"));
        assert_eq!(out.configs[1].properties["description"], json!("\"maintenance\""));

        let remote = run(&ctx, &decl, "remote").expect("remote");
        assert_eq!(
            remote.configs[0].properties["source-path"],
            json!("https://example.com/page.html")
        );
        assert!(remote.configs[0].properties.get("content").is_none());
    }
}
