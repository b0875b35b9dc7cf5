//! Reference resolution inside one declaration.
//!
//! Pointers are split on `/` only, so dots inside names (`app.v2`,
//! `0.0.0.0`) are never special. Resolution is read-only and never calls a
//! translator's `translate`; it only asks for the target's primary path.

use std::collections::BTreeSet;

use decl_core::{class_of, DeclValue, Declaration};
use serde_json::Value;

use crate::error::{Result, TranslateError};
use crate::naming::item_path;
use crate::registry::ObjectKind;
use crate::translators::ItemScope;

/// Longest chain of pointer-to-pointer hops that is followed.
pub const MAX_DEPTH: usize = 16;
const COMMON: &str = "Common";
const SHARED: &str = "Shared";

/// How a property value refers to something.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reference<'v> {
    /// `{ "bigip": "/Common/x" }`: an object already on the appliance.
    BigIp(&'v str),
    /// `{ "use": "name" }` or a bare pointer string.
    Use(&'v str),
    /// Anything else, taken literally.
    Inline(&'v Value),
}

pub fn classify(value: &Value) -> Reference<'_> {
    match value {
        Value::String(pointer) => Reference::Use(pointer),
        Value::Object(map) => {
            if let Some(Value::String(path)) = map.get("bigip") {
                Reference::BigIp(path)
            } else if let Some(Value::String(pointer)) = map.get("use") {
                Reference::Use(pointer)
            } else {
                Reference::Inline(value)
            }
        }
        other => Reference::Inline(other),
    }
}

/// A declared object found by a pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<'d> {
    pub tenant: &'d str,
    pub app: Option<&'d str>,
    pub name: &'d str,
    /// The declared object itself.
    pub item: &'d Value,
    pub tenant_value: &'d Value,
    /// Property path below the object, empty when the pointer names the
    /// object.
    pub property: Vec<String>,
    /// Value at `property` (the object itself when `property` is empty).
    pub value: &'d Value,
}

impl<'d> Located<'d> {
    pub fn class(&self) -> Option<&'d str> {
        class_of(self.item)
    }

    pub fn kind(&self) -> Option<ObjectKind> {
        self.class().and_then(ObjectKind::from_class)
    }

    /// Scope suitable for calling the owning class's translator helpers.
    pub fn scope(&self) -> ItemScope<'d> {
        ItemScope {
            tenant: self.tenant,
            app: self.app,
            name: self.name,
            item: self.item,
            tenant_value: self.tenant_value,
        }
    }

    /// Path the owning class's translator reports for this object.
    pub fn primary_path(&self) -> String {
        match self.kind() {
            Some(kind) => kind.translator().primary_path(&self.scope()),
            None => item_path(self.tenant, self.app, self.name),
        }
    }

    fn key(&self) -> String {
        let mut key = item_path(self.tenant, self.app, self.name);
        for segment in &self.property {
            key.push('/');
            key.push_str(segment);
        }
        key
    }
}

/// End of a reference chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Target<'d> {
    /// Pre-existing appliance object.
    BigIp(String),
    /// Object (or property) in this declaration.
    Declared(Located<'d>),
}

/// Pointer resolver bound to one declaration.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'d> {
    decl: &'d Declaration,
}

impl<'d> Resolver<'d> {
    pub fn new(decl: &'d Declaration) -> Self {
        Self { decl }
    }

    pub fn declaration(&self) -> &'d Declaration {
        self.decl
    }

    /// Follow a reference value from `from` to its end.
    pub fn target(&self, from: &ItemScope<'_>, value: &Value) -> Result<Target<'d>> {
        let mut visited = BTreeSet::new();
        match classify(value) {
            Reference::BigIp(path) => Ok(Target::BigIp(checked_bigip(path)?)),
            Reference::Use(pointer) => self.follow(from.tenant, from.app, pointer, &mut visited),
            Reference::Inline(inline) => Err(TranslateError::InvalidReference {
                reference: inline.to_string(),
                reason: "expected a pointer, a use or a bigip reference".to_string(),
            }),
        }
    }

    /// Locate the declared object a `use` pointer names, following nested
    /// property references.
    pub fn locate(&self, from: &ItemScope<'_>, pointer: &str) -> Result<Located<'d>> {
        let mut visited = BTreeSet::new();
        match self.follow(from.tenant, from.app, pointer, &mut visited)? {
            Target::Declared(located) => Ok(located),
            Target::BigIp(path) => Err(TranslateError::InvalidReference {
                reference: pointer.to_string(),
                reason: format!("resolves to existing appliance object {path}"),
            }),
        }
    }

    /// Resolve a reference value to the path of the object it names.
    pub fn resolve_path(&self, from: &ItemScope<'_>, value: &Value) -> Result<String> {
        match self.target(from, value)? {
            Target::BigIp(path) => Ok(path),
            Target::Declared(located) => object_path(&located, value),
        }
    }

    /// Like [`Resolver::resolve_path`], additionally requiring a declared
    /// target to be one of `expected`.
    pub fn resolve_kind(
        &self,
        from: &ItemScope<'_>,
        value: &Value,
        expected: &[ObjectKind],
    ) -> Result<String> {
        match self.target(from, value)? {
            Target::BigIp(path) => Ok(path),
            Target::Declared(located) => {
                check_kind(&located, value, expected)?;
                object_path(&located, value)
            }
        }
    }

    fn follow(
        &self,
        tenant: &str,
        app: Option<&str>,
        pointer: &str,
        visited: &mut BTreeSet<String>,
    ) -> Result<Target<'d>> {
        let located = self.find(tenant, app, pointer)?;
        let key = located.key();
        if visited.len() >= MAX_DEPTH || !visited.insert(key.clone()) {
            return Err(TranslateError::ReferenceCycle(key));
        }
        if located.property.is_empty() {
            return Ok(Target::Declared(located));
        }
        match classify(located.value) {
            Reference::BigIp(path) => Ok(Target::BigIp(checked_bigip(path)?)),
            Reference::Use(next) if located.value.is_string() => {
                // Bare strings below an object may be literals rather than pointers.
                match self.follow(located.tenant, located.app, next, visited) {
                    Err(TranslateError::UnresolvedReference { .. }) => Ok(Target::Declared(located)),
                    other => other,
                }
            }
            Reference::Use(next) => self.follow(located.tenant, located.app, next, visited),
            Reference::Inline(_) => Ok(Target::Declared(located)),
        }
    }

    fn find(&self, tenant: &str, app: Option<&str>, pointer: &str) -> Result<Located<'d>> {
        let unresolved = || TranslateError::UnresolvedReference {
            reference: pointer.to_string(),
            scope: match app {
                Some(app) => format!("/{tenant}/{app}/"),
                None => format!("/{tenant}/"),
            },
        };
        let segments: Vec<&str> = pointer.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(unresolved());
        }

        let found = if pointer.starts_with('/') {
            self.find_absolute(&segments)
        } else {
            self.find_relative(tenant, app, &segments)
        };
        found.ok_or_else(unresolved)
    }

    fn find_absolute(&self, segments: &[&str]) -> Option<Located<'d>> {
        let tenant = segments[0];
        if segments.len() >= 3 {
            if let Some(found) = self.in_app(tenant, segments[1], segments[2], &segments[3..]) {
                return Some(found);
            }
        }
        if segments.len() >= 2 {
            if let Some(found) = self.in_tenant(tenant, segments[1], &segments[2..]) {
                return Some(found);
            }
            if tenant == COMMON {
                return self.in_app(COMMON, SHARED, segments[1], &segments[2..]);
            }
        }
        None
    }

    fn find_relative(&self, tenant: &str, app: Option<&str>, segments: &[&str]) -> Option<Located<'d>> {
        let first = segments[0];
        if segments.len() >= 2 && self.decl.application(tenant, first).is_some() {
            if let Some(found) = self.in_app(tenant, first, segments[1], &segments[2..]) {
                return Some(found);
            }
        }
        let rest = &segments[1..];
        app.and_then(|app| self.in_app(tenant, app, first, rest))
            .or_else(|| self.in_tenant(tenant, first, rest))
            .or_else(|| self.in_app(COMMON, SHARED, first, rest))
    }

    fn in_app(&self, tenant: &str, app: &str, name: &str, property: &[&str]) -> Option<Located<'d>> {
        let tenant_map = self.decl.root().as_object()?;
        let (tenant_key, tenant_value) = tenant_map.get_key_value(tenant)?;
        let (app_key, app_value) = tenant_value.as_object()?.get_key_value(app)?;
        if class_of(app_value) != Some(decl_core::tree::APPLICATION_CLASS) {
            return None;
        }
        let (name_key, item) = app_value.as_object()?.get_key_value(name)?;
        class_of(item)?;
        located(tenant_key, Some(app_key), name_key, item, tenant_value, property)
    }

    fn in_tenant(&self, tenant: &str, name: &str, property: &[&str]) -> Option<Located<'d>> {
        let tenant_map = self.decl.root().as_object()?;
        let (tenant_key, tenant_value) = tenant_map.get_key_value(tenant)?;
        if class_of(tenant_value) != Some(decl_core::tree::TENANT_CLASS) {
            return None;
        }
        let (name_key, item) = tenant_value.as_object()?.get_key_value(name)?;
        match class_of(item) {
            Some(decl_core::tree::APPLICATION_CLASS) | None => None,
            Some(_) => located(tenant_key, None, name_key, item, tenant_value, property),
        }
    }
}

fn located<'d>(
    tenant: &'d str,
    app: Option<&'d str>,
    name: &'d str,
    item: &'d Value,
    tenant_value: &'d Value,
    property: &[&str],
) -> Option<Located<'d>> {
    let value = item.walk(property)?;
    Some(Located {
        tenant,
        app,
        name,
        item,
        tenant_value,
        property: property.iter().map(|s| s.to_string()).collect(),
        value,
    })
}

fn checked_bigip(path: &str) -> Result<String> {
    if path.starts_with('/') {
        Ok(path.to_string())
    } else {
        Err(TranslateError::InvalidReference {
            reference: path.to_string(),
            reason: "bigip references must be absolute paths".to_string(),
        })
    }
}

fn object_path(located: &Located<'_>, value: &Value) -> Result<String> {
    if located.property.is_empty() {
        Ok(located.primary_path())
    } else {
        Err(TranslateError::InvalidReference {
            reference: value.to_string(),
            reason: format!("{} is a property, not an object", located.key()),
        })
    }
}

fn check_kind(located: &Located<'_>, value: &Value, expected: &[ObjectKind]) -> Result<()> {
    match located.kind() {
        Some(kind) if expected.contains(&kind) => Ok(()),
        _ => Err(TranslateError::WrongClass {
            reference: match classify(value) {
                Reference::Use(pointer) | Reference::BigIp(pointer) => pointer.to_string(),
                Reference::Inline(inline) => inline.to_string(),
            },
            found: located.class().unwrap_or("unknown").to_string(),
            expected: expected
                .iter()
                .map(|k| k.class_name())
                .collect::<Vec<_>>()
                .join(" or "),
        }),
    }
}
