use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One imperative configuration unit handed to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigObject {
    /// Absolute location on the target appliance.
    pub path: String,
    /// Management-plane command, e.g. `ltm pool`.
    pub command: String,
    /// Normalized property bag.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Property paths the executor must not diff or overwrite.
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl ConfigObject {
    /// Create an object with no properties.
    pub fn new(path: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            command: command.into(),
            properties: Map::new(),
            ignore: Vec::new(),
        }
    }

    /// Replace the property bag.
    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Add a property path to the ignore list, keeping it free of repeats.
    pub fn ignoring(mut self, property: impl Into<String>) -> Self {
        let property = property.into();
        if !self.ignore.contains(&property) {
            self.ignore.push(property);
        }
        self
    }

    /// Set one property.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Look up one property.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Look up one string property.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// Instruction to replace every occurrence of one path with another across
/// an emitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathUpdate {
    pub old_string: String,
    pub new_string: String,
}

/// Output of translating a declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub configs: Vec<ConfigObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_updates: Vec<PathUpdate>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub update_path: bool,
}

impl TranslationResult {
    /// First config object emitted at `path`.
    pub fn find(&self, path: &str) -> Option<&ConfigObject> {
        self.configs.iter().find(|c| c.path == path)
    }

    /// Config object at `path` with the given command.
    pub fn find_command(&self, path: &str, command: &str) -> Option<&ConfigObject> {
        self.configs
            .iter()
            .find(|c| c.path == path && c.command == command)
    }

    /// All config objects using `command`, in emission order.
    pub fn with_command<'a>(&'a self, command: &'a str) -> impl Iterator<Item = &'a ConfigObject> {
        self.configs.iter().filter(move |c| c.command == command)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
