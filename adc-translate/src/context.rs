//! Translation context and the live-inventory read interface.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::{Result, TranslateError};
use crate::normalize::AliasTable;
use crate::version::{Feature, FeatureMatrix, Version};

/// Virtual address known to the appliance, as reported by the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualAddressRecord {
    pub full_path: String,
    #[serde(default)]
    pub partition: String,
    pub address: String,
    #[serde(default)]
    pub metadata: Value,
}

/// An address/mask pair recorded by a previous task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMask {
    pub address: String,
    #[serde(default)]
    pub mask: Option<String>,
}

/// Task metadata for one declared virtual address: either a destination, or
/// a `[destination, source]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskAddress {
    Single(AddressMask),
    Pair(Vec<AddressMask>),
}

impl TaskAddress {
    /// The destination half.
    pub fn destination(&self) -> Option<&AddressMask> {
        match self {
            TaskAddress::Single(addr) => Some(addr),
            TaskAddress::Pair(pair) => pair.first(),
        }
    }
}

/// Read-only view of live appliance state.
///
/// Implementations must return stable answers for the duration of one
/// translation. Absent data means "not found".
pub trait InventoryReader: Sync {
    /// Type of an access profile (`all`, `ssl-orchestrator`, ...).
    fn access_profile_type(&self, path: &str) -> Option<String>;

    /// Virtual addresses present on the appliance.
    fn virtual_addresses(&self) -> Vec<VirtualAddressRecord>;

    /// Addresses recorded for a service by a previous task.
    fn task_metadata_virtual_addresses(&self, tenant: &str, app: &str, item: &str)
        -> Vec<TaskAddress>;
}

/// Inventory that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyInventory;

impl InventoryReader for EmptyInventory {
    fn access_profile_type(&self, _path: &str) -> Option<String> {
        None
    }

    fn virtual_addresses(&self) -> Vec<VirtualAddressRecord> {
        Vec::new()
    }

    fn task_metadata_virtual_addresses(
        &self,
        _tenant: &str,
        _app: &str,
        _item: &str,
    ) -> Vec<TaskAddress> {
        Vec::new()
    }
}

/// Errors returned when loading an inventory snapshot.
#[derive(Debug, Error)]
pub enum InventoryLoadError {
    #[error("failed to read inventory snapshot {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse inventory snapshot {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Inventory backed by a JSON snapshot taken before translation.
///
/// `taskMetadata` is keyed by `tenant/application/item`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticInventory {
    #[serde(default)]
    pub access_profiles: BTreeMap<String, String>,
    #[serde(default)]
    pub virtual_addresses: Vec<VirtualAddressRecord>,
    #[serde(default)]
    pub task_metadata: BTreeMap<String, Vec<TaskAddress>>,
    #[serde(default)]
    pub provisioned: Vec<String>,
}

impl StaticInventory {
    /// Load a snapshot file.
    pub fn load(path: &Path) -> std::result::Result<Self, InventoryLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| InventoryLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| InventoryLoadError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

impl InventoryReader for StaticInventory {
    fn access_profile_type(&self, path: &str) -> Option<String> {
        self.access_profiles.get(path).cloned()
    }

    fn virtual_addresses(&self) -> Vec<VirtualAddressRecord> {
        self.virtual_addresses.clone()
    }

    fn task_metadata_virtual_addresses(
        &self,
        tenant: &str,
        app: &str,
        item: &str,
    ) -> Vec<TaskAddress> {
        self.task_metadata
            .get(&format!("{tenant}/{app}/{item}"))
            .cloned()
            .unwrap_or_default()
    }
}

/// Per-run facts about the target appliance.
pub struct Context<'a> {
    target: Version,
    provisioned: BTreeSet<String>,
    features: FeatureMatrix,
    aliases: AliasTable,
    inventory: &'a dyn InventoryReader,
}

impl<'a> Context<'a> {
    /// Context for `target` with nothing provisioned and the built-in
    /// feature matrix.
    pub fn new(target: Version, inventory: &'a dyn InventoryReader) -> Self {
        Self {
            target,
            provisioned: BTreeSet::new(),
            features: FeatureMatrix::embedded(),
            aliases: AliasTable::embedded(),
            inventory,
        }
    }

    /// Mark modules (`asm`, `afm`, ...) as provisioned.
    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.provisioned.extend(
            modules
                .into_iter()
                .map(|m| m.as_ref().trim().to_ascii_lowercase())
                .filter(|m| !m.is_empty()),
        );
        self
    }

    /// Replace the feature matrix.
    pub fn with_features(mut self, features: FeatureMatrix) -> Self {
        self.features = features;
        self
    }

    /// Replace the deprecated-property alias table.
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn target(&self) -> &Version {
        &self.target
    }

    pub fn inventory(&self) -> &'a dyn InventoryReader {
        self.inventory
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Whether the target version supports `feature`.
    pub fn supports(&self, feature: Feature) -> bool {
        self.features.supports(feature, &self.target)
    }

    /// Fail with [`TranslateError::UnsupportedVersion`] unless `feature`
    /// applies.
    pub fn require(&self, feature: Feature, path: &str) -> Result<()> {
        if self.supports(feature) {
            return Ok(());
        }
        let min = self
            .features
            .gate(feature)
            .map(|g| g.min.clone())
            .unwrap_or_default();
        Err(TranslateError::UnsupportedVersion {
            path: path.to_string(),
            feature: feature.name().to_string(),
            min,
            target: self.target.to_string(),
        })
    }

    /// Whether at least one of `modules` is provisioned.
    pub fn is_provisioned(&self, modules: &[&str]) -> bool {
        modules.iter().any(|m| self.provisioned.contains(*m))
    }

    /// Provisioned modules in name order.
    pub fn provisioned(&self) -> impl Iterator<Item = &str> {
        self.provisioned.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{Context, EmptyInventory, InventoryReader, StaticInventory, TaskAddress};
    use crate::version::{Feature, Version};

    #[test]
    fn provisioning_is_any_of_and_defaults_to_nothing() {
        let ctx = Context::new(Version::parse("15.1"), &EmptyInventory);
        assert!(!ctx.is_provisioned(&["asm"]));

        let ctx = ctx.with_modules(["ASM", " afm "]);
        assert!(ctx.is_provisioned(&["asm"]));
        assert!(ctx.is_provisioned(&["pem", "afm"]));
        assert!(!ctx.is_provisioned(&["apm"]));
    }

    #[test]
    fn require_reports_minimum_version() {
        let ctx = Context::new(Version::parse("14.0"), &EmptyInventory);
        let err = ctx
            .require(Feature::TrafficMatchingCriteria, "/t/a/svc")
            .expect_err("gated");
        assert!(err.to_string().contains("14.1"));
        assert!(ctx.require(Feature::Tls13, "/t/a/tls").is_ok());
    }

    #[test]
    fn static_inventory_reads_snapshot_json() {
        let inv: StaticInventory = serde_json::from_str(
            r#"{
                "accessProfiles": { "/Common/access": "all" },
                "virtualAddresses": [
                    { "fullPath": "/Common/va1", "partition": "Common", "address": "192.0.2.50" }
                ],
                "taskMetadata": {
                    "t/a/svc": [ { "address": "192.0.2.60", "mask": "255.255.255.255" },
                                 [ { "address": "192.0.2.61" }, { "address": "0.0.0.0" } ] ]
                }
            }"#,
        )
        .expect("inventory");

        assert_eq!(inv.access_profile_type("/Common/access").as_deref(), Some("all"));
        assert_eq!(inv.virtual_addresses()[0].address, "192.0.2.50");
        let meta = inv.task_metadata_virtual_addresses("t", "a", "svc");
        assert_eq!(meta.len(), 2);
        assert!(matches!(meta[1], TaskAddress::Pair(_)));
        assert_eq!(
            meta[1].destination().map(|a| a.address.as_str()),
            Some("192.0.2.61")
        );
    }
}
