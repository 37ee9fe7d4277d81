//! Claude Code Plugin Registry (read side)
//!
//! Reads known_marketplaces.json, installed_plugins.json, settings files,
//! the install-count cache and marketplace catalogs. Nothing is cached:
//! every accessor reflects the disk at call time, and every accessor returns
//! an empty value instead of an error.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::plugin::decode;
use crate::plugin::types::{
    AgentConfig, EnabledStates, InstallCounts, InstalledPlugins, MarketplaceCatalog,
    MarketplaceRecord,
};

const KNOWN_MARKETPLACES_FILE: &str = "known_marketplaces.json";
const INSTALLED_PLUGINS_FILE: &str = "installed_plugins.json";
const AGENT_CONFIG_FILE: &str = "config.json";
const INSTALL_COUNTS_FILE: &str = "install-counts-cache.json";
const MARKETPLACES_DIR: &str = "marketplaces";
const CATALOG_FILE: &str = ".claude-plugin/marketplace.json";

/// Claude Code settings file names
const SETTINGS_FILE: &str = "settings.json";
const SETTINGS_LOCAL_FILE: &str = "settings.local.json";

/// Where Claude Code keeps the files this crate reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeLayout {
    /// Plugin data root (~/.claude/plugins)
    pub plugins_dir: PathBuf,
    /// User scope settings (~/.claude/settings.json)
    pub user_settings: PathBuf,
    /// Project whose `.claude/` settings overlay the user scope.
    /// `None` means the current working directory.
    pub project_dir: Option<PathBuf>,
}

impl ClaudeLayout {
    pub fn from_claude_dir(claude_dir: &Path) -> Self {
        Self {
            plugins_dir: claude_dir.join("plugins"),
            user_settings: claude_dir.join(SETTINGS_FILE),
            project_dir: None,
        }
    }

    /// Same layout, with project settings resolved against `project_dir`
    pub fn for_project(&self, project_dir: Option<&Path>) -> Self {
        match project_dir {
            Some(dir) => Self {
                project_dir: Some(dir.to_path_buf()),
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    /// Project settings files, lowest precedence first
    pub fn project_settings(&self) -> Vec<PathBuf> {
        let base = match &self.project_dir {
            Some(dir) => dir.clone(),
            None => match std::env::current_dir() {
                Ok(cwd) => cwd,
                Err(_) => return Vec::new(),
            },
        };
        let claude_dir = base.join(".claude");
        vec![
            claude_dir.join(SETTINGS_FILE),
            claude_dir.join(SETTINGS_LOCAL_FILE),
        ]
    }
}

/// Plugin Registry - read-only view of Claude Code plugin state
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    layout: ClaudeLayout,
}

impl PluginRegistry {
    pub fn new(layout: ClaudeLayout) -> Self {
        Self { layout }
    }

    /// Create with custom plugins directory and settings file (for testing)
    pub fn with_dir(plugins_dir: PathBuf, user_settings: PathBuf) -> Self {
        Self::new(ClaudeLayout {
            plugins_dir,
            user_settings,
            project_dir: None,
        })
    }

    pub fn layout(&self) -> &ClaudeLayout {
        &self.layout
    }

    /// Registry whose project settings come from `project_dir`
    pub fn for_project(&self, project_dir: Option<&Path>) -> Self {
        Self::new(self.layout.for_project(project_dir))
    }

    /// Get the plugins directory path
    pub fn plugins_dir(&self) -> &Path {
        &self.layout.plugins_dir
    }

    /// Get the marketplaces directory path
    pub fn marketplaces_dir(&self) -> PathBuf {
        self.layout.plugins_dir.join(MARKETPLACES_DIR)
    }

    /// Whether Claude Code's plugin system exists on this machine
    pub fn is_available(&self) -> bool {
        self.layout.plugins_dir.is_dir()
    }

    fn read(&self, file: &str) -> serde_json::Value {
        decode::read_json(&self.layout.plugins_dir.join(file)).unwrap_or_default()
    }

    // ========== Known Marketplaces ==========

    pub fn known_marketplaces(&self) -> BTreeMap<String, MarketplaceRecord> {
        decode::known_marketplaces(&self.read(KNOWN_MARKETPLACES_FILE))
    }

    /// Registered marketplaces plus directories under `marketplaces/`
    pub fn marketplace_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.known_marketplaces().into_keys().collect();
        names.extend(self.marketplace_dirs());
        names
    }

    /// Marketplace directories physically present on disk
    pub fn marketplace_dirs(&self) -> BTreeSet<String> {
        let Ok(entries) = fs::read_dir(self.marketplaces_dir()) else {
            return BTreeSet::new();
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect()
    }

    // ========== Catalogs ==========

    /// Candidate catalog files for a marketplace, in lookup order
    pub fn catalog_paths(&self, name: &str) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(location) = self
            .known_marketplaces()
            .get(name)
            .and_then(|r| r.install_location.clone())
        {
            paths.push(PathBuf::from(location).join(CATALOG_FILE));
        }
        let default = self.marketplaces_dir().join(name).join(CATALOG_FILE);
        if !paths.contains(&default) {
            paths.push(default);
        }
        paths
    }

    /// First catalog that exists and parses, or `None`
    pub fn catalog(&self, name: &str) -> Option<MarketplaceCatalog> {
        for path in self.catalog_paths(name) {
            if let Some(catalog) =
                decode::read_json(&path).and_then(|v| decode::marketplace_catalog(name, &v))
            {
                return Some(catalog);
            }
        }
        debug!(marketplace = name, "no readable catalog");
        None
    }

    /// Path of the catalog file that `catalog()` would read
    pub fn catalog_file(&self, name: &str) -> Option<PathBuf> {
        self.catalog_paths(name).into_iter().find(|p| p.is_file())
    }

    /// Every parseable catalog, keyed by marketplace name
    pub fn catalogs(&self) -> BTreeMap<String, MarketplaceCatalog> {
        self.marketplace_names()
            .into_iter()
            .filter_map(|name| self.catalog(&name).map(|c| (name, c)))
            .collect()
    }

    // ========== Installed Plugins ==========

    pub fn installed_plugins(&self) -> InstalledPlugins {
        decode::installed_plugins(&self.read(INSTALLED_PLUGINS_FILE))
    }

    // ========== Enabled State ==========

    /// `enabledPlugins` merged: user < project < project-local
    pub fn enabled_plugins(&self) -> EnabledStates {
        let mut states = decode::read_json(&self.layout.user_settings)
            .map(|v| decode::enabled_plugins(&v))
            .unwrap_or_default();

        for path in self.layout.project_settings() {
            if path == self.layout.user_settings {
                continue;
            }
            if let Some(value) = decode::read_json(&path) {
                states.overlay(decode::enabled_plugins(&value));
            }
        }
        states
    }

    // ========== Misc ==========

    pub fn install_counts(&self) -> InstallCounts {
        decode::install_counts(&self.read(INSTALL_COUNTS_FILE))
    }

    pub fn agent_config(&self) -> AgentConfig {
        decode::agent_config(&self.read(AGENT_CONFIG_FILE))
    }
}
