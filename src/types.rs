use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One mirror: an ordered list of equivalent base URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorDefinition {
    #[serde(default)]
    pub id: String, // e.g. "openbsd"
    #[serde(default)]
    pub urls: Vec<String>, // e.g. ["https://cdn.openbsd.org/pub/", ...]
}

impl MirrorDefinition {
    #[cfg(test)]
    pub fn new(id: &str, urls: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            urls: urls.iter().map(|u| u.to_string()).collect(),
        }
    }
}

/// `mirrors` as it appears in config.toml: either `[mirrors.<id>]` tables
/// or a `[[mirrors]]` array carrying an explicit `id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MirrorsConfig {
    Keyed(HashMap<String, MirrorDefinition>),
    List(Vec<MirrorDefinition>),
}

/// Canonical, read-only mirror lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorRegistry {
    mirrors: HashMap<String, MirrorDefinition>,
}

impl MirrorRegistry {
    /// Normalize either config shape into the canonical map.
    pub fn from_config(config: MirrorsConfig) -> Self {
        let mut mirrors = HashMap::new();
        match config {
            MirrorsConfig::Keyed(map) => {
                for (id, mut def) in map {
                    def.id = id.clone();
                    mirrors.insert(id, def);
                }
            }
            MirrorsConfig::List(list) => {
                // An entry without an id can never be referenced.
                for def in list.into_iter().filter(|def| !def.id.is_empty()) {
                    // First definition for an id wins.
                    mirrors.entry(def.id.clone()).or_insert(def);
                }
            }
        }
        Self { mirrors }
    }

    pub fn get(&self, id: &str) -> Option<&MirrorDefinition> {
        self.mirrors.get(id)
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

impl FromIterator<MirrorDefinition> for MirrorRegistry {
    fn from_iter<I: IntoIterator<Item = MirrorDefinition>>(iter: I) -> Self {
        Self::from_config(MirrorsConfig::List(iter.into_iter().collect()))
    }
}

/// Outcome of probing one concrete URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    pub available: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub latency_ms: Option<u64>, // None on failure
}

impl ProbeResult {
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            available: false,
            status_code: None,
            error: Some(error.into()),
            latency_ms: None,
        }
    }
}

/// Normalized result for one input URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckResult {
    Direct(ProbeResult),
    Mirror(MirrorCheck),
}

impl CheckResult {
    pub fn available(&self) -> bool {
        match self {
            CheckResult::Direct(p) => p.available,
            CheckResult::Mirror(m) => m.available,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CheckResult::Direct(_) => "direct",
            CheckResult::Mirror(_) => "mirror",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorCheck {
    pub mirror: String,
    pub path: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub entries: Vec<ProbeResult>,
}

/// One `[[distfiles]]` entry of a board-image manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Distfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// A parsed board-image manifest file.
#[derive(Debug, Clone)]
pub struct BoardManifest {
    pub path: std::path::PathBuf, // relative to the repo root
    pub board: String,
    pub distfiles: Vec<Distfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistfileReport {
    pub name: String,
    pub urls: Vec<CheckResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardReport {
    pub distfiles: Vec<DistfileReport>,
}

/// The `status.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub boards: BTreeMap<String, BoardReport>,
}
