use crate::error::{CheckerError, Result};
use crate::probe::{default_user_agent, DEFAULT_TIMEOUT};
use crate::types::{BoardManifest, Distfile, MirrorRegistry, MirrorsConfig};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// packages-index/config.toml; only `mirrors` matters here.
#[derive(Debug, Deserialize)]
struct IndexConfig {
    mirrors: Option<MirrorsConfig>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    distfiles: Vec<Distfile>,
}

/// Load the mirror registry from the package index config file.
/// A file without a `mirrors` key yields an empty registry.
pub fn load_mirror_registry(path: &Path) -> Result<MirrorRegistry> {
    if !path.is_file() {
        return Err(CheckerError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let config: IndexConfig = toml::from_str(&content)?;

    let registry = config
        .mirrors
        .map(MirrorRegistry::from_config)
        .unwrap_or_default();
    info!("Loaded {} mirror(s) from {:?}", registry.len(), path);
    Ok(registry)
}

/// Load every board-image manifest (`**/*.toml`) under `dir`, sorted by path.
///
/// Paths in the result are relative to `repo_root` when possible; the board
/// name is the manifest's parent directory.
pub fn load_board_manifests(dir: &Path, repo_root: &Path) -> Result<Vec<BoardManifest>> {
    if !dir.is_dir() {
        return Err(CheckerError::NotFound(dir.to_path_buf()));
    }

    let pattern = format!("{}/**/*.toml", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in glob::glob(&pattern)? {
        // An unreadable directory would silently drop its manifests.
        let path = entry?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut manifests = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(&path)?;
        let file: ManifestFile = toml::from_str(&content)
            .map_err(|e| CheckerError::Custom(format!("{}: {}", path.display(), e)))?;

        let board = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let relative = path
            .strip_prefix(repo_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());

        debug!(path = %relative.display(), board = %board, distfiles = file.distfiles.len(), "loaded manifest");
        manifests.push(BoardManifest {
            path: relative,
            board,
            distfiles: file.distfiles,
        });
    }

    info!("Loaded {} board-image manifest(s) from {:?}", manifests.len(), dir);
    Ok(manifests)
}

// --- Tool settings ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub checker: CheckerSettings,
    pub index: IndexSettings,
    pub report: ReportSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckerSettings {
    pub timeout_secs: f64,
    pub user_agent: String,
    pub concurrency: usize,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs_f64(),
            user_agent: default_user_agent(),
            concurrency: 1,
        }
    }
}

impl CheckerSettings {
    /// Per-request timeout; must be a finite number of seconds above zero.
    pub fn timeout(&self) -> Result<Duration> {
        let secs = self.timeout_secs;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(CheckerError::Custom(format!(
                "timeout must be a positive number of seconds, got {}",
                secs
            )));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| CheckerError::Custom(format!("invalid timeout {}: {}", secs, e)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub repo_root: PathBuf,
    pub manifests_dir: PathBuf,
    pub mirror_config: PathBuf,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            manifests_dir: PathBuf::from("packages-index/manifests/board-image"),
            mirror_config: PathBuf::from("packages-index/config.toml"),
        }
    }
}

impl IndexSettings {
    pub fn manifests_path(&self) -> PathBuf {
        self.repo_root.join(&self.manifests_dir)
    }

    pub fn mirror_config_path(&self) -> PathBuf {
        self.repo_root.join(&self.mirror_config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub output: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output: PathBuf::from("status.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub results_url: String,
    pub refresh_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            results_url: "status.json".to_string(),
            refresh_interval_secs: 3 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Resolve settings:
    /// 1. An explicit path (must exist)
    /// 2. User config (~/.config/distcheck/config.toml)
    /// 3. Built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(CheckerError::NotFound(path.to_path_buf()));
            }
            return Self::from_file(path);
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", "distcheck") {
            let config_path = proj_dirs.config_dir().join("config.toml");
            if config_path.is_file() {
                return Self::from_file(&config_path);
            }
        }

        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
