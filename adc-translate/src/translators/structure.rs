//! Tenant partitions and application folders.
//!
//! For these two kinds the scope's `name` is the tenant (or application)
//! itself and `app` is `None`.

use decl_core::{ConfigObject, DeclValue};
use serde_json::Value;

use super::{Env, ItemScope, Translation, Translator};
use crate::error::Result;
use crate::naming::{folder_path, partition_path};
use crate::normalize::description;
use crate::registry::ObjectKind;

const COMMON: &str = "Common";

pub struct TenantTranslator;

impl Translator for TenantTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Tenant
    }

    fn primary_path(&self, scope: &ItemScope<'_>) -> String {
        partition_path(scope.tenant)
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        // Common always exists on the appliance.
        if scope.tenant == COMMON {
            return Ok(Translation::default());
        }
        let mut partition = ConfigObject::new(partition_path(scope.tenant), "auth partition");
        partition.set(
            "default-route-domain",
            Value::from(scope.item.u64_prop("defaultRouteDomain").unwrap_or(0)),
        );
        partition.set("description", description(scope.item));
        Ok(Translation::single(partition))
    }
}

pub struct ApplicationTranslator;

impl Translator for ApplicationTranslator {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Application
    }

    fn primary_path(&self, scope: &ItemScope<'_>) -> String {
        folder_path(scope.tenant, scope.name)
    }

    fn translate(&self, _env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation> {
        let mut folder = ConfigObject::new(folder_path(scope.tenant, scope.name), "sys folder");
        folder.set("description", description(scope.item));
        Ok(Translation::single(folder))
    }
}

#[cfg(test)]
mod tests {
    use decl_core::Declaration;
    use serde_json::json;

    use super::{ApplicationTranslator, TenantTranslator};
    use crate::resolver::Resolver;
    use crate::translators::testing::context;
    use crate::translators::{Env, ItemScope, Translator};

    fn decl() -> Declaration {
        Declaration::from_value(json!({
            "class": "ADC",
            "Common": { "class": "Tenant" },
            "t": {
                "class": "Tenant",
                "defaultRouteDomain": 3,
                "remark": "tenant ${x}",
                "a": { "class": "Application", "remark": "app" }
            }
        }))
        .expect("declaration")
    }

    #[test]
    fn tenant_becomes_partition_except_common() {
        let decl = decl();
        let ctx = context("15.1");
        let env = Env::new(&ctx, Resolver::new(&decl));
        let tenant = decl.tenant("t").expect("tenant");
        let scope = ItemScope {
            tenant: "t",
            app: None,
            name: "t",
            item: tenant,
            tenant_value: tenant,
        };
        let out = TenantTranslator.translate(&env, &scope).expect("tenant");
        assert_eq!(out.configs[0].path, "/t/");
        assert_eq!(out.configs[0].command, "auth partition");
        assert_eq!(out.configs[0].properties["default-route-domain"], json!(3));
        assert_eq!(out.configs[0].properties["description"], json!(r#""tenant \$\{x\}""#));

        let common = decl.tenant("Common").expect("common");
        let scope = ItemScope {
            tenant: "Common",
            app: None,
            name: "Common",
            item: common,
            tenant_value: common,
        };
        assert!(TenantTranslator
            .translate(&env, &scope)
            .expect("common")
            .configs
            .is_empty());
    }

    #[test]
    fn application_becomes_folder() {
        let decl = decl();
        let ctx = context("15.1");
        let env = Env::new(&ctx, Resolver::new(&decl));
        let scope = ItemScope {
            tenant: "t",
            app: None,
            name: "a",
            item: decl.application("t", "a").expect("app"),
            tenant_value: decl.tenant("t").expect("tenant"),
        };
        let out = ApplicationTranslator.translate(&env, &scope).expect("app");
        assert_eq!(out.configs[0].path, "/t/a/");
        assert_eq!(out.configs[0].command, "sys folder");
        assert_eq!(out.configs[0].properties["description"], json!("\"app\""));
    }
}
