//! Whole-declaration translation.
//!
//! Tenants are visited with `Common` first and the rest in name order.
//! Inside a tenant the partition comes first, then tenant-level objects,
//! then each application: its folder, then its objects by class rank and
//! name. A failing item is recorded and contributes nothing; the rest of
//! the declaration is still translated.

use decl_core::tree::{applications, items};
use decl_core::{class_of, Declaration, TranslationResult};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::TranslateError;
use crate::naming::item_path;
use crate::postprocess::finalize;
use crate::registry::ObjectKind;
use crate::resolver::Resolver;
use crate::translators::{Env, ItemScope, Translation};

const COMMON: &str = "Common";
const CONSTANTS_CLASS: &str = "Constants";

/// An item that could not be translated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub path: String,
    pub class: String,
    #[serde(serialize_with = "error_text")]
    pub error: TranslateError,
}

fn error_text<S: serde::Serializer>(err: &TranslateError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&err.to_string())
}

/// Everything one run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub result: TranslationResult,
    pub failures: Vec<ItemFailure>,
    /// Paths of objects whose class has no translator.
    pub skipped: Vec<String>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Run<'r> {
    env: Env<'r>,
    collected: Translation,
    failures: Vec<ItemFailure>,
    skipped: Vec<String>,
}

impl Run<'_> {
    fn translate(&mut self, kind: ObjectKind, scope: &ItemScope<'_>, path: &str) {
        match kind.translator().translate(&self.env, scope) {
            Ok(translation) => {
                debug!(
                    path,
                    class = kind.class_name(),
                    configs = translation.configs.len(),
                    "translated"
                );
                self.collected.extend(translation);
            }
            Err(error) => {
                warn!(path, class = kind.class_name(), %error, "translation failed");
                self.failures.push(ItemFailure {
                    path: path.to_string(),
                    class: kind.class_name().to_string(),
                    error,
                });
            }
        }
    }

    fn item(&mut self, tenant: &str, app: Option<&str>, name: &str, item: &Value, tenant_value: &Value) {
        let path = item_path(tenant, app, name);
        let Some(class) = class_of(item) else {
            return;
        };
        if class == CONSTANTS_CLASS {
            debug!(path = %path, "skipping constants");
            return;
        }
        let Some(kind) = ObjectKind::from_class(class) else {
            warn!(path = %path, class, "no translator for class, skipping");
            self.skipped.push(path);
            return;
        };
        let aliased = self.env.ctx.aliases().apply(class, item);
        let scope = ItemScope {
            tenant,
            app,
            name,
            item: &aliased,
            tenant_value,
        };
        self.translate(kind, &scope, &path);
    }

    /// Objects of one container sorted by class rank, then name.
    fn container(&mut self, tenant: &str, app: Option<&str>, container: &Value, tenant_value: &Value) {
        let mut entries: Vec<(Option<ObjectKind>, &str, &Value)> = items(container)
            .map(|(name, item)| (class_of(item).and_then(ObjectKind::from_class), name, item))
            .collect();
        // Unknown classes sort last.
        entries.sort_by(|a, b| match (a.0, b.0) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.1.cmp(b.1)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.1.cmp(b.1),
        });
        for (_, name, item) in entries {
            self.item(tenant, app, name, item, tenant_value);
        }
    }
}

/// Translate every tenant of `decl` for the target described by `ctx`.
pub fn translate_declaration(ctx: &Context<'_>, decl: &Declaration) -> Outcome {
    let mut run = Run {
        env: Env::new(ctx, Resolver::new(decl)),
        collected: Translation::default(),
        failures: Vec::new(),
        skipped: Vec::new(),
    };

    let mut tenants: Vec<(&str, &Value)> = decl.tenants().collect();
    tenants.sort_by_key(|(name, _)| (*name != COMMON, *name));

    for (tenant, tenant_value) in tenants {
        let scope = ItemScope {
            tenant,
            app: None,
            name: tenant,
            item: tenant_value,
            tenant_value,
        };
        run.translate(ObjectKind::Tenant, &scope, &format!("/{tenant}/"));
        run.container(tenant, None, tenant_value, tenant_value);

        for (app, app_value) in applications(tenant_value) {
            let scope = ItemScope {
                tenant,
                app: None,
                name: app,
                item: app_value,
                tenant_value,
            };
            run.translate(ObjectKind::Application, &scope, &format!("/{tenant}/{app}/"));
            run.container(tenant, Some(app), app_value, tenant_value);
        }
    }

    Outcome {
        result: finalize(run.collected),
        failures: run.failures,
        skipped: run.skipped,
    }
}

#[cfg(test)]
mod tests {
    use decl_core::Declaration;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::translate_declaration;
    use crate::error::TranslateError;
    use crate::translators::testing::context;

    fn commands(decl: &Declaration) -> Vec<(String, String)> {
        translate_declaration(&context("15.1"), decl)
            .result
            .configs
            .into_iter()
            .map(|c| (c.command, c.path))
            .collect()
    }

    #[test]
    fn containers_come_before_their_objects_and_rank_orders_items() {
        let decl = Declaration::from_value(json!({
            "class": "ADC",
            "schemaVersion": "3.0.0",
            "t": {
                "class": "Tenant",
                "a": {
                    "class": "Application",
                    "svc": { "class": "Service_TCP", "virtualPort": 80, "virtualAddresses": ["192.0.2.1"], "pool": "p" },
                    "p": { "class": "Pool", "monitors": [{ "use": "m" }] },
                    "m": { "class": "Monitor", "monitorType": "tcp" }
                }
            }
        }))
        .expect("declaration");
        assert_eq!(
            commands(&decl),
            vec![
                ("auth partition".to_string(), "/t/".to_string()),
                ("sys folder".to_string(), "/t/a/".to_string()),
                ("ltm monitor tcp".to_string(), "/t/a/m".to_string()),
                ("ltm pool".to_string(), "/t/a/p".to_string()),
                ("ltm virtual-address".to_string(), "/t/192.0.2.1".to_string()),
                ("ltm virtual".to_string(), "/t/a/svc".to_string()),
            ]
        );
    }

    #[test]
    fn failures_are_isolated_and_unknown_classes_skipped() {
        let decl = Declaration::from_value(json!({
            "class": "ADC",
            "schemaVersion": "3.0.0",
            "t": {
                "class": "Tenant",
                "a": {
                    "class": "Application",
                    "constants": { "class": "Constants", "x": 1 },
                    "odd": { "class": "Mystery_Class" },
                    "bad": { "class": "Pool", "monitors": [{ "use": "missing" }] },
                    "good": { "class": "Pool" }
                }
            }
        }))
        .expect("declaration");
        let outcome = translate_declaration(&context("15.1"), &decl);
        assert!(!outcome.is_success());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, "/t/a/bad");
        assert!(matches!(
            outcome.failures[0].error,
            TranslateError::UnresolvedReference { .. }
        ));
        assert_eq!(outcome.skipped, vec!["/t/a/odd".to_string()]);
        assert!(outcome.result.find("/t/a/good").is_some());
        assert!(outcome.result.find("/t/a/bad").is_none());
    }

    #[test]
    fn common_is_translated_first() {
        let decl = Declaration::from_value(json!({
            "class": "ADC",
            "schemaVersion": "3.0.0",
            "Alpha": { "class": "Tenant" },
            "Common": {
                "class": "Tenant",
                "Shared": { "class": "Application", "mon": { "class": "Monitor", "monitorType": "icmp" } }
            }
        }))
        .expect("declaration");
        let cmds = commands(&decl);
        assert_eq!(cmds[0], ("sys folder".to_string(), "/Common/Shared/".to_string()));
        assert_eq!(cmds[1].1, "/Common/Shared/mon");
        assert_eq!(cmds[2], ("auth partition".to_string(), "/Alpha/".to_string()));
    }
}
