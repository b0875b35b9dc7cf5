//! Per-class translators and the pieces they share.
//!
//! A translator turns one declared object into zero or more
//! [`ConfigObject`]s. It never mutates the declaration, never performs I/O
//! and reads live state only through the context's inventory handle.

pub mod addresses;
pub mod certificate;
pub mod data_group;
pub mod discovery;
pub mod endpoint_policy;
pub mod firewall;
pub mod gslb;
pub mod idle_timeout;
pub mod irule;
pub mod monitor;
pub mod pool;
pub mod profiles;
pub mod security;
pub mod service;
pub mod structure;
pub mod tls;

use decl_core::{ConfigObject, DeclValue, PathUpdate};
use serde_json::Value;

use crate::context::Context;
use crate::error::Result;
use crate::naming::item_path;
use crate::normalize::{description, quote_or_none};
use crate::registry::ObjectKind;
use crate::resolver::Resolver;

/// Where a declared object lives, plus the object itself.
#[derive(Debug, Clone, Copy)]
pub struct ItemScope<'s> {
    pub tenant: &'s str,
    /// `None` for objects declared directly under the tenant.
    pub app: Option<&'s str>,
    pub name: &'s str,
    pub item: &'s Value,
    /// The enclosing tenant, for tenant-wide defaults.
    pub tenant_value: &'s Value,
}

impl<'s> ItemScope<'s> {
    /// `/tenant/app/name` (or `/tenant/name`).
    pub fn path(&self) -> String {
        item_path(self.tenant, self.app, self.name)
    }

    /// Path of a sibling object generated from this one.
    pub fn sibling(&self, name: &str) -> String {
        item_path(self.tenant, self.app, name)
    }

    /// Tenant `defaultRouteDomain`, 0 when unset.
    pub fn route_domain(&self) -> u32 {
        self.tenant_value
            .u64_prop("defaultRouteDomain")
            .and_then(|rd| u32::try_from(rd).ok())
            .unwrap_or(0)
    }

    /// Whether the tenant is enabled (default true).
    pub fn tenant_enabled(&self) -> bool {
        self.tenant_value.bool_prop("enable").unwrap_or(true)
    }

    /// Scope of another object, keeping this one's tenant.
    pub fn with_item(&self, app: Option<&'s str>, name: &'s str, item: &'s Value) -> Self {
        Self {
            app,
            name,
            item,
            ..*self
        }
    }
}

/// Everything a translator may consult besides the object itself.
pub struct Env<'r> {
    pub ctx: &'r Context<'r>,
    pub resolver: Resolver<'r>,
}

impl<'r> Env<'r> {
    pub fn new(ctx: &'r Context<'r>, resolver: Resolver<'r>) -> Self {
        Self { ctx, resolver }
    }
}

/// Role of a profile that is attached to services implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProfileRole {
    Websocket,
    ProxyConnect,
}

/// "Whenever a virtual carries `parent`, also attach `profile`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLink {
    pub parent: String,
    pub profile: String,
    pub role: ProfileRole,
}

/// A virtual that declared its own profile for `role`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOverride {
    pub virtual_path: String,
    pub role: ProfileRole,
}

/// Output of one translator run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    pub configs: Vec<ConfigObject>,
    pub path_updates: Vec<PathUpdate>,
    pub profile_links: Vec<ProfileLink>,
    pub role_overrides: Vec<RoleOverride>,
}

impl Translation {
    pub fn single(config: ConfigObject) -> Self {
        Self {
            configs: vec![config],
            ..Self::default()
        }
    }

    pub fn push(&mut self, config: ConfigObject) {
        self.configs.push(config);
    }

    pub fn extend(&mut self, other: Translation) {
        self.configs.extend(other.configs);
        self.path_updates.extend(other.path_updates);
        self.profile_links.extend(other.profile_links);
        self.role_overrides.extend(other.role_overrides);
    }

    pub fn update_path(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.path_updates.push(PathUpdate {
            old_string: old.into(),
            new_string: new.into(),
        });
    }
}

/// One class's translation.
pub trait Translator: Sync {
    fn kind(&self) -> ObjectKind;

    /// Path other objects use when they point at this one.
    fn primary_path(&self, scope: &ItemScope<'_>) -> String {
        scope.path()
    }

    fn translate(&self, env: &Env<'_>, scope: &ItemScope<'_>) -> Result<Translation>;
}

/// Config object at the item's own path with its `description` already set.
pub(crate) fn described(scope: &ItemScope<'_>, command: &str) -> ConfigObject {
    let mut obj = ConfigObject::new(scope.path(), command);
    obj.set("description", description(scope.item));
    obj
}

/// Copy a string property through [`quote_or_none`].
pub(crate) fn quoted_prop(item: &Value, key: &str) -> Value {
    Value::String(quote_or_none(item.str_prop(key)))
}

/// Copy a scalar property if present, else use `default`.
pub(crate) fn prop_or(item: &Value, key: &str, default: impl Into<Value>) -> Value {
    match item.prop(key) {
        Some(Value::Null) | None => default.into(),
        Some(value) => value.clone(),
    }
}

/// Pointer-typed property → resolved path, or `none` when absent.
pub(crate) fn pointer_or_none(env: &Env<'_>, scope: &ItemScope<'_>, key: &str) -> Result<Value> {
    match scope.item.prop(key) {
        Some(value) if !value.is_null() => Ok(Value::String(env.resolver.resolve_path(scope, value)?)),
        _ => Ok(Value::from("none")),
    }
}

/// Every element of an array property resolved to a path.
pub(crate) fn pointer_list(env: &Env<'_>, scope: &ItemScope<'_>, key: &str) -> Result<Vec<String>> {
    scope
        .item
        .array_prop(key)
        .iter()
        .map(|value| env.resolver.resolve_path(scope, value))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for translator unit tests.

    use decl_core::{ConfigObject, Declaration};
    use serde_json::Value;

    use super::{Env, ItemScope, Translation};
    use crate::context::{Context, EmptyInventory, InventoryReader};
    use crate::error::Result;
    use crate::registry::ObjectKind;
    use crate::resolver::Resolver;
    use crate::version::Version;

    /// Wrap `app_items` as tenant `t`, application `a`.
    pub fn declaration(app_items: Value) -> Declaration {
        let mut app = serde_json::json!({ "class": "Application", "template": "generic" });
        if let (Some(target), Some(items)) = (app.as_object_mut(), app_items.as_object()) {
            for (k, v) in items {
                target.insert(k.clone(), v.clone());
            }
        }
        Declaration::from_value(serde_json::json!({
            "class": "ADC",
            "schemaVersion": "3.0.0",
            "t": { "class": "Tenant", "a": app }
        }))
        .expect("declaration")
    }

    pub fn context(version: &str) -> Context<'static> {
        static EMPTY: EmptyInventory = EmptyInventory;
        Context::new(Version::parse(version), &EMPTY)
    }

    pub fn context_with<'a>(version: &str, inventory: &'a dyn InventoryReader) -> Context<'a> {
        Context::new(Version::parse(version), inventory)
    }

    /// Translate item `name` of tenant `t` / application `a`.
    pub fn run(ctx: &Context<'_>, decl: &Declaration, name: &str) -> Result<Translation> {
        run_in(ctx, decl, "t", Some("a"), name)
    }

    pub fn run_in(
        ctx: &Context<'_>,
        decl: &Declaration,
        tenant: &str,
        app: Option<&str>,
        name: &str,
    ) -> Result<Translation> {
        let tenant_value = decl.tenant(tenant).expect("tenant");
        let item = match app {
            Some(app) => decl.item(tenant, app, name),
            None => decl.tenant_item(tenant, name),
        }
        .expect("item");
        let class = item.get("class").and_then(Value::as_str).expect("class");
        let kind = ObjectKind::from_class(class).expect("known class");
        let aliased = ctx.aliases().apply(class, item);
        let scope = ItemScope {
            tenant,
            app,
            name,
            item: &aliased,
            tenant_value,
        };
        let env = Env::new(ctx, Resolver::new(decl));
        kind.translator().translate(&env, &scope)
    }

    pub fn find<'t>(translation: &'t Translation, path: &str) -> &'t ConfigObject {
        translation
            .configs
            .iter()
            .find(|c| c.path == path)
            .unwrap_or_else(|| panic!("no config at {path}"))
    }

    pub fn paths(translation: &Translation) -> Vec<(&str, &str)> {
        translation
            .configs
            .iter()
            .map(|c| (c.command.as_str(), c.path.as_str()))
            .collect()
    }
}
