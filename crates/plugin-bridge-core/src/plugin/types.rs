//! Claude Code plugin state types
//!
//! Views over the JSON files Claude Code keeps under `~/.claude/plugins`.
//! Every type here is produced by [`crate::plugin::decode`]; nothing in this
//! crate writes them back.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

/// Composite plugin identifier (`name@marketplace`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PluginKey {
    pub name: String,
    pub marketplace: String,
}

impl PluginKey {
    pub fn new(name: impl Into<String>, marketplace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            marketplace: marketplace.into(),
        }
    }

    /// Split `name@marketplace` at the last `@`
    pub fn parse(s: &str) -> Option<Self> {
        let (name, marketplace) = s.rsplit_once('@')?;
        if name.is_empty() || marketplace.is_empty() {
            return None;
        }
        Some(Self::new(name, marketplace))
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.marketplace)
    }
}

/// Installation scope accepted by the external CLI's `--scope` flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallScope {
    /// User scope (~/.claude/settings.json)
    #[default]
    User,
    /// Project scope (.claude/settings.json)
    Project,
    /// Local scope (.claude/settings.local.json)
    Local,
}

impl InstallScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for InstallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "project" => Ok(Self::Project),
            "local" => Ok(Self::Local),
            other => Err(format!(
                "invalid scope '{}': expected user, project or local",
                other
            )),
        }
    }
}

/// Where a marketplace comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarketplaceSource {
    /// Source type: "github", "git", "url", "directory", ...
    pub kind: String,
    pub repo: Option<String>,
    pub url: Option<String>,
    pub path: Option<String>,
}

impl MarketplaceSource {
    /// One-line description, e.g. `github:anthropics/claude-plugins-official`
    pub fn describe(&self) -> String {
        let location = self
            .repo
            .as_deref()
            .or(self.url.as_deref())
            .or(self.path.as_deref());
        match (self.kind.is_empty(), location) {
            (false, Some(loc)) => format!("{}:{}", self.kind, loc),
            (true, Some(loc)) => loc.to_string(),
            (false, None) => self.kind.clone(),
            (true, None) => "unknown".to_string(),
        }
    }
}

/// Entry of known_marketplaces.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarketplaceRecord {
    pub name: String,
    pub source: MarketplaceSource,
    pub install_location: Option<String>,
    pub last_updated: Option<String>,
    pub auto_update: bool,
}

/// Plugin or marketplace author
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginAuthor {
    pub name: String,
    pub email: Option<String>,
}

/// One plugin as published in a marketplace catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub category: Option<String>,
    pub homepage: Option<String>,
    /// Tags and keywords, deduplicated
    pub tags: Vec<String>,
    pub author: Option<PluginAuthor>,
    pub strict: bool,
    pub provides_skills: bool,
    pub provides_lsp: bool,
}

/// Parsed `.claude-plugin/marketplace.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarketplaceCatalog {
    /// Directory/registry name the catalog was found under
    pub marketplace: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub owner: Option<PluginAuthor>,
    pub plugins: Vec<PluginDescriptor>,
}

/// One row of installed_plugins.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallRow {
    /// Raw scope string (user / project / local / managed)
    pub scope: String,
    pub project_path: Option<String>,
    pub install_path: Option<String>,
    pub version: Option<String>,
    pub installed_at: Option<String>,
    pub last_updated: Option<String>,
    pub git_commit_sha: Option<String>,
}

/// installed_plugins.json
///
/// Rows keep file order. The first row of a key is the canonical row; the
/// external tool does not promise that order is stable across rewrites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstalledPlugins {
    pub version: u64,
    pub plugins: BTreeMap<String, Vec<InstallRow>>,
}

impl InstalledPlugins {
    pub fn rows(&self, key: &str) -> &[InstallRow] {
        self.plugins.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn row_count(&self, key: &str) -> usize {
        self.rows(key).len()
    }

    pub fn canonical(&self, key: &str) -> Option<&InstallRow> {
        self.rows(key).first()
    }

    pub fn is_installed(&self, key: &str) -> bool {
        !self.rows(key).is_empty()
    }

    /// Keys with at least one row
    pub fn installed_keys(&self) -> Vec<String> {
        self.plugins
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn total_rows(&self) -> usize {
        self.plugins.values().map(Vec::len).sum()
    }
}

/// Merged `enabledPlugins` across settings layers
///
/// A missing key is "unknown", which is not the same as disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnabledStates {
    pub plugins: BTreeMap<String, bool>,
}

impl EnabledStates {
    pub fn get(&self, key: &str) -> Option<bool> {
        self.plugins.get(key).copied()
    }

    /// Overlay another layer; its values win on collision
    pub fn overlay(&mut self, other: EnabledStates) {
        self.plugins.extend(other.plugins);
    }

    pub fn count(&self, enabled: bool) -> usize {
        self.plugins.values().filter(|v| **v == enabled).count()
    }
}

/// Popularity data from install-counts-cache.json
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallCounts {
    pub counts: HashMap<String, u64>,
}

impl InstallCounts {
    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

/// Plugin data root config.json
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentConfig {
    pub enabled_agents: Vec<String>,
    pub sync_mode: Option<String>,
    /// Remaining top-level keys, untouched
    pub other: BTreeMap<String, Value>,
}

/// Catalog entry joined with installed state, popularity and enabled flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailablePlugin {
    pub key: String,
    pub marketplace: String,
    #[serde(flatten)]
    pub descriptor: PluginDescriptor,
    pub installed: bool,
    pub installs: u64,
    pub install_rows: usize,
    pub installed_version: Option<String>,
    pub installed_at: Option<String>,
    pub last_updated: Option<String>,
    pub enabled: Option<bool>,
}

impl AvailablePlugin {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}
