use serde_json::{Map, Value};

use crate::parser::ParseError;

/// Root class every declaration must carry.
pub const ADC_CLASS: &str = "ADC";
/// Class of a top-level tenant container.
pub const TENANT_CLASS: &str = "Tenant";
/// Class of an application container inside a tenant.
pub const APPLICATION_CLASS: &str = "Application";

/// An immutable, validated declaration document.
///
/// All accessors hand out shared borrows, so nothing that walks a
/// `Declaration` can change it.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    root: Value,
}

impl Declaration {
    /// Wrap a JSON value, checking that it is an `ADC` root object.
    pub fn from_value(root: Value) -> Result<Self, ParseError> {
        let Some(map) = root.as_object() else {
            return Err(ParseError::Malformed(
                "declaration root must be an object".to_string(),
            ));
        };
        match map.get("class").and_then(Value::as_str) {
            Some(ADC_CLASS) => Ok(Self { root }),
            Some(other) => Err(ParseError::Malformed(format!(
                "declaration root class must be {ADC_CLASS}, found {other}"
            ))),
            None => Err(ParseError::Malformed(
                "declaration root is missing its class".to_string(),
            )),
        }
    }

    /// The raw root value.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Consume the declaration and return the raw value.
    pub fn into_value(self) -> Value {
        self.root
    }

    /// Declared `schemaVersion`, if any.
    pub fn schema_version(&self) -> Option<&str> {
        self.root.str_prop("schemaVersion")
    }

    /// All tenants in key order.
    pub fn tenants(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        classed_children(&self.root, |class| class == TENANT_CLASS)
    }

    /// Look up one tenant by name.
    pub fn tenant(&self, name: &str) -> Option<&Value> {
        self.root
            .get(name)
            .filter(|v| class_of(v) == Some(TENANT_CLASS))
    }

    /// Look up one application inside a tenant.
    pub fn application(&self, tenant: &str, app: &str) -> Option<&Value> {
        self.tenant(tenant)?
            .get(app)
            .filter(|v| class_of(v) == Some(APPLICATION_CLASS))
    }

    /// Look up a declared object inside an application.
    pub fn item(&self, tenant: &str, app: &str, name: &str) -> Option<&Value> {
        self.application(tenant, app)?
            .get(name)
            .filter(|v| class_of(v).is_some())
    }

    /// Look up a declared object placed directly under a tenant.
    pub fn tenant_item(&self, tenant: &str, name: &str) -> Option<&Value> {
        self.tenant(tenant)?.get(name).filter(|v| {
            class_of(v).is_some_and(|class| class != APPLICATION_CLASS)
        })
    }

    /// Walk raw path segments from the root. Numeric segments index arrays.
    pub fn lookup(&self, segments: &[&str]) -> Option<&Value> {
        self.root.walk(segments)
    }
}

/// Applications of a tenant in key order.
pub fn applications(tenant: &Value) -> impl Iterator<Item = (&str, &Value)> + '_ {
    classed_children(tenant, |class| class == APPLICATION_CLASS)
}

/// Declared objects of a container (application or tenant), skipping nested
/// applications.
pub fn items(container: &Value) -> impl Iterator<Item = (&str, &Value)> + '_ {
    classed_children(container, |class| {
        class != APPLICATION_CLASS && class != TENANT_CLASS
    })
}

/// The `class` of a declared object.
pub fn class_of(value: &Value) -> Option<&str> {
    value.get("class").and_then(Value::as_str)
}

fn classed_children<'a>(
    parent: &'a Value,
    keep: impl Fn(&str) -> bool + 'a,
) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
    parent
        .as_object()
        .into_iter()
        .flat_map(|map| map.iter())
        .filter(move |(_, value)| class_of(value).is_some_and(&keep))
        .map(|(key, value)| (key.as_str(), value))
}

/// Typed, non-panicking accessors over declaration values.
pub trait DeclValue {
    /// Raw property lookup.
    fn prop(&self, key: &str) -> Option<&Value>;

    /// String property.
    fn str_prop(&self, key: &str) -> Option<&str> {
        self.prop(key).and_then(Value::as_str)
    }

    /// Boolean property.
    fn bool_prop(&self, key: &str) -> Option<bool> {
        self.prop(key).and_then(Value::as_bool)
    }

    /// Unsigned integer property.
    fn u64_prop(&self, key: &str) -> Option<u64> {
        self.prop(key).and_then(Value::as_u64)
    }

    /// Signed integer property.
    fn i64_prop(&self, key: &str) -> Option<i64> {
        self.prop(key).and_then(Value::as_i64)
    }

    /// Array property; absent or non-array values yield an empty slice.
    fn array_prop(&self, key: &str) -> &[Value] {
        self.prop(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Object property.
    fn object_prop(&self, key: &str) -> Option<&Map<String, Value>> {
        self.prop(key).and_then(Value::as_object)
    }

    /// Follow nested keys (numeric keys index arrays).
    fn walk(&self, path: &[&str]) -> Option<&Value>;
}

impl DeclValue for Value {
    fn prop(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }

    fn walk(&self, path: &[&str]) -> Option<&Value> {
        let mut current = self;
        for segment in path {
            current = match current {
                Value::Object(map) => map.get(*segment)?,
                Value::Array(list) => list.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}
