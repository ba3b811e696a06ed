//! Service configuration.
//!
//! Loaded from a TOML file and overridable from the CLI. Everything
//! the core consumes is an explicit injected struct; there are no
//! module-level singletons, including the build metadata.

use crate::error::{Result, ServiceError};
use crate::types::Language;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Build metadata injected at startup.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<String>,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: std::env::var("UINDEX_GIT_HASH").ok(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "defaults::host")]
    pub host: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
    /// Glob patterns the watcher never offers for ingest.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub zoekt: ZoektConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
}

/// One indexed project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default = "defaults::language")]
    pub language: Language,
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    /// Root of the project's virtual content paths.
    #[serde(default)]
    pub content_root: Option<String>,
}

/// Storage locations.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataConfig {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub mirror_dir: Option<PathBuf>,
    #[serde(default)]
    pub index_dir: Option<PathBuf>,
}

impl DataConfig {
    /// Resolved store path, defaulting under the platform data dir.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("index.db"))
    }

    /// Resolved mirror directory for the external full-text engine.
    #[must_use]
    pub fn mirror_dir(&self) -> PathBuf {
        self.mirror_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("mirror"))
    }

    /// Resolved directory for the engine's own shards.
    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        self.index_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("zoekt-index"))
    }
}

/// External full-text engine settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoektConfig {
    #[serde(default = "defaults::yes")]
    pub enabled: bool,
    #[serde(default = "defaults::zoekt_port")]
    pub web_port: u16,
    #[serde(default = "defaults::parallelism")]
    pub parallelism: usize,
    #[serde(default = "defaults::file_limit")]
    pub file_limit_bytes: u64,
    #[serde(default = "defaults::reindex_debounce")]
    pub reindex_debounce_ms: u64,
    #[serde(default = "defaults::search_timeout")]
    pub search_timeout_ms: u64,
    #[serde(default)]
    pub zoekt_bin: Option<PathBuf>,
}

impl Default for ZoektConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            web_port: defaults::zoekt_port(),
            parallelism: defaults::parallelism(),
            file_limit_bytes: defaults::file_limit(),
            reindex_debounce_ms: defaults::reindex_debounce(),
            search_timeout_ms: defaults::search_timeout(),
            zoekt_bin: None,
        }
    }
}

/// File-watcher coalescing (the watcher itself is external).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherConfig {
    #[serde(default = "defaults::debounce")]
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::debounce(),
        }
    }
}

mod defaults {
    use crate::types::Language;

    pub fn host() -> String {
        "127.0.0.1".to_string()
    }
    pub const fn port() -> u16 {
        8734
    }
    pub const fn language() -> Language {
        Language::Cpp
    }
    pub const fn yes() -> bool {
        true
    }
    pub const fn zoekt_port() -> u16 {
        6070
    }
    pub const fn parallelism() -> usize {
        4
    }
    pub const fn file_limit() -> u64 {
        2 * 1024 * 1024
    }
    pub const fn reindex_debounce() -> u64 {
        2_000
    }
    pub const fn search_timeout() -> u64 {
        10_000
    }
    pub const fn debounce() -> u64 {
        500
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("uindex")
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Config` when the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("reading {}: {e}", path.display()))
        })?;
        toml::from_str(&text)
            .map_err(|e| ServiceError::Config(format!("parsing {}: {e}", path.display())))
    }

    #[must_use]
    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn project_names(&self) -> Vec<String> {
        self.projects.iter().map(|p| p.name.clone()).collect()
    }

    /// Project owning an absolute path, by longest matching root.
    #[must_use]
    pub fn project_for_path(&self, path: &str) -> Option<&ProjectConfig> {
        let normalized = path.replace('\\', "/");
        self.projects
            .iter()
            .flat_map(|p| {
                p.paths
                    .iter()
                    .map(move |root| (p, root.to_string_lossy().replace('\\', "/")))
            })
            .filter(|(_, root)| normalized.starts_with(root.as_str()))
            .max_by_key(|(_, root)| root.len())
            .map(|(p, _)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            host = "0.0.0.0"
            port = 9000
            exclude = ["**/Intermediate/**", "**/Saved/**"]

            [[projects]]
            name = "Game"
            paths = ["/work/game/Source"]
            language = "cpp"
            contentRoot = "/Game"

            [[projects]]
            name = "Script"
            paths = ["/work/game/Script"]
            language = "angelscript"
            extensions = ["as"]

            [data]
            dbPath = "/var/lib/uindex/index.db"
            mirrorDir = "/var/lib/uindex/mirror"

            [zoekt]
            webPort = 6071
            searchTimeoutMs = 5000

            [watcher]
            debounceMs = 250
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.projects.len(), 2);
        assert_eq!(config.projects[1].language, Language::AngelScript);
        assert_eq!(config.data.db_path(), PathBuf::from("/var/lib/uindex/index.db"));
        assert_eq!(config.zoekt.web_port, 6071);
        assert_eq!(config.zoekt.search_timeout_ms, 5000);
        assert!(config.zoekt.enabled);
        assert_eq!(config.watcher.debounce_ms, 250);
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8734);
        assert_eq!(config.zoekt.search_timeout_ms, 10_000);
        assert_eq!(config.zoekt.file_limit_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_project_for_path_longest_root_wins() {
        let toml = r#"
            [[projects]]
            name = "Engine"
            paths = ["/work"]

            [[projects]]
            name = "Game"
            paths = ["/work/game"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.project_for_path("/work/game/Source/Hero.h").unwrap().name,
            "Game"
        );
        assert_eq!(
            config.project_for_path("/work/engine/Core.h").unwrap().name,
            "Engine"
        );
        assert!(config.project_for_path("/elsewhere/x.h").is_none());
    }
}
