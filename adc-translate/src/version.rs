//! Target-version comparison and the feature matrix.
//!
//! Version strings compare numerically by dot-separated component
//! (`"14.1" > "9.0"`, `"15.0" == "15.0.0"`). Translators never compare
//! versions themselves: they ask the [`FeatureMatrix`] (through
//! [`crate::context::Context::supports`]) whether a named [`Feature`] applies
//! to the target, and the matrix holds the min/max bounds for each feature.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// A dotted platform version such as `14.1.2.3`.
#[derive(Debug, Clone, Default)]
pub struct Version {
    parts: Vec<u32>,
    raw: String,
}

impl Version {
    /// Parse leniently: each component contributes its leading digits, and
    /// anything unparseable counts as zero (`"15.1.0-0.0.4"` → 15.1.0).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let parts = raw
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse::<u32>().unwrap_or(0)
            })
            .collect();
        Self {
            parts,
            raw: raw.to_string(),
        }
    }

    fn component(&self, idx: usize) -> u32 {
        self.parts.get(idx).copied().unwrap_or(0)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|idx| self.component(idx).cmp(&other.component(idx)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// Whether `target` lies in `[min, max)`.
pub fn supports(target: &Version, min: &str, max: Option<&str>) -> bool {
    if *target < Version::parse(min) {
        return false;
    }
    match max {
        Some(max) => *target < Version::parse(max),
        None => true,
    }
}

/// Version-gated behaviours known to the translators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    HttpChunkingSustain,
    TlsMultiCertChain,
    Tls13,
    CipherGroups,
    TrafficMatchingCriteria,
    HttpMrfRouter,
    IdleTimeoutPolicy,
    AllowlistNaming,
    BotDefenseLogging,
    MonitorHttp2,
    DosMobileDefense,
}

impl Feature {
    pub const ALL: [Feature; 11] = [
        Feature::HttpChunkingSustain,
        Feature::TlsMultiCertChain,
        Feature::Tls13,
        Feature::CipherGroups,
        Feature::TrafficMatchingCriteria,
        Feature::HttpMrfRouter,
        Feature::IdleTimeoutPolicy,
        Feature::AllowlistNaming,
        Feature::BotDefenseLogging,
        Feature::MonitorHttp2,
        Feature::DosMobileDefense,
    ];

    /// Name used in the matrix file.
    pub fn name(self) -> &'static str {
        match self {
            Feature::HttpChunkingSustain => "http.chunking-sustain",
            Feature::TlsMultiCertChain => "tls.multi-cert-chain",
            Feature::Tls13 => "tls.tls1_3",
            Feature::CipherGroups => "tls.cipher-groups",
            Feature::TrafficMatchingCriteria => "service.traffic-matching-criteria",
            Feature::HttpMrfRouter => "service.http-mrf-router",
            Feature::IdleTimeoutPolicy => "service.idle-timeout-policy",
            Feature::AllowlistNaming => "security.allowlist-naming",
            Feature::BotDefenseLogging => "security.bot-defense-logging",
            Feature::MonitorHttp2 => "monitor.http2",
            Feature::DosMobileDefense => "dos.mobile-defense",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn default_min(self) -> &'static str {
        match self {
            Feature::HttpChunkingSustain => "15.0",
            Feature::TlsMultiCertChain | Feature::Tls13 => "14.0",
            Feature::CipherGroups => "13.1",
            Feature::TrafficMatchingCriteria
            | Feature::HttpMrfRouter
            | Feature::IdleTimeoutPolicy
            | Feature::BotDefenseLogging
            | Feature::DosMobileDefense => "14.1",
            Feature::AllowlistNaming => "16.0",
            Feature::MonitorHttp2 => "15.1",
        }
    }
}

/// Bounds for one feature.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeatureGate {
    pub name: String,
    pub min: String,
    #[serde(default)]
    pub max: Option<String>,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
struct MatrixFile {
    #[serde(default)]
    feature: Vec<FeatureGate>,
}

/// Errors returned when loading a feature matrix file.
#[derive(Debug, Error)]
pub enum MatrixLoadError {
    #[error("failed to read feature matrix {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse feature matrix {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("feature matrix {path} names unknown feature {name}")]
    UnknownFeature { path: String, name: String },
}

/// Per-feature version bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMatrix {
    gates: BTreeMap<Feature, FeatureGate>,
}

impl FeatureMatrix {
    /// Built-in matrix shipped with the crate.
    pub fn embedded() -> Self {
        let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/features.toml"));
        parse_matrix(raw, "embedded features".to_string()).unwrap_or_else(|_| Self::fallback())
    }

    /// Load a matrix from a TOML file; features it omits keep their built-in
    /// bounds.
    pub fn load(path: &Path) -> Result<Self, MatrixLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| MatrixLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_matrix(&raw, path.display().to_string())
    }

    /// Whether `feature` applies to `target`.
    pub fn supports(&self, feature: Feature, target: &Version) -> bool {
        match self.gates.get(&feature) {
            Some(gate) => supports(target, &gate.min, gate.max.as_deref()),
            None => supports(target, feature.default_min(), None),
        }
    }

    /// Bounds for one feature.
    pub fn gate(&self, feature: Feature) -> Option<&FeatureGate> {
        self.gates.get(&feature)
    }

    /// All gates in feature order.
    pub fn gates(&self) -> impl Iterator<Item = (Feature, &FeatureGate)> {
        self.gates.iter().map(|(feature, gate)| (*feature, gate))
    }

    fn fallback() -> Self {
        let gates = Feature::ALL
            .into_iter()
            .map(|feature| {
                (
                    feature,
                    FeatureGate {
                        name: feature.name().to_string(),
                        min: feature.default_min().to_string(),
                        max: None,
                        note: String::new(),
                    },
                )
            })
            .collect();
        Self { gates }
    }
}

impl Default for FeatureMatrix {
    fn default() -> Self {
        Self::embedded()
    }
}

fn parse_matrix(raw: &str, path: String) -> Result<FeatureMatrix, MatrixLoadError> {
    let parsed: MatrixFile = toml::from_str(raw).map_err(|source| MatrixLoadError::Parse {
        path: path.clone(),
        source,
    })?;
    let mut matrix = FeatureMatrix::fallback();
    for gate in parsed.feature {
        let Some(feature) = Feature::from_name(&gate.name) else {
            return Err(MatrixLoadError::UnknownFeature {
                path,
                name: gate.name,
            });
        };
        matrix.gates.insert(feature, gate);
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{supports, Feature, FeatureMatrix, MatrixLoadError, Version};

    #[test]
    fn compares_numerically_not_lexically() {
        assert!(Version::parse("14.1") > Version::parse("9.0"));
        assert!(Version::parse("13.1.0.8") < Version::parse("13.10"));
        assert_eq!(Version::parse("15.0"), Version::parse("15.0.0"));
        assert!(Version::parse("15.1.0-0.0.4") > Version::parse("15.0.9"));
    }

    #[test]
    fn min_is_inclusive_and_max_exclusive() {
        let v = Version::parse("15.0");
        assert!(supports(&v, "15.0", None));
        assert!(!supports(&Version::parse("14.1"), "15.0", None));
        assert!(!supports(&v, "14.0", Some("15.0")));
        assert!(supports(&Version::parse("14.1.4"), "14.0", Some("15.0")));
    }

    #[test]
    fn embedded_matrix_covers_every_feature() {
        let matrix = FeatureMatrix::embedded();
        for feature in Feature::ALL {
            assert!(matrix.gate(feature).is_some(), "{}", feature.name());
        }
        assert!(matrix.supports(Feature::HttpChunkingSustain, &Version::parse("15.0")));
        assert!(!matrix.supports(Feature::HttpChunkingSustain, &Version::parse("14.1")));
    }

    #[test]
    fn override_file_replaces_only_named_features() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("features.toml");
        fs::write(
            &path,
            r#"
[[feature]]
name = "tls.multi-cert-chain"
min = "17.0"
"#,
        )
        .expect("write");

        let matrix = FeatureMatrix::load(&path).expect("load");
        assert!(!matrix.supports(Feature::TlsMultiCertChain, &Version::parse("16.1")));
        assert!(matrix.supports(Feature::Tls13, &Version::parse("14.0")));
    }

    #[test]
    fn unknown_feature_names_are_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("features.toml");
        fs::write(&path, "[[feature]]\nname = \"nope\"\nmin = \"1.0\"\n").expect("write");
        let err = FeatureMatrix::load(&path).expect_err("unknown");
        assert!(matches!(err, MatrixLoadError::UnknownFeature { .. }));
    }
}
