//! Read-only queries over the aggregated plugin view
//!
//! None of these touch the external CLI. Each one checks that the plugin
//! system exists first and refuses with the same message mutations use.

use std::cmp::Reverse;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Refusal;
use crate::ops::OpResult;
use crate::plugin::catalog::{list_available_plugins, resolve_in_registry};
use crate::plugin::registry::PluginRegistry;
use crate::plugin::types::{
    AgentConfig, AvailablePlugin, InstallRow, MarketplaceRecord, PluginDescriptor, PluginKey,
};

fn require_plugin_system(registry: &PluginRegistry) -> OpResult<()> {
    if registry.is_available() {
        Ok(())
    } else {
        Err(Refusal::PluginSystemUnavailable {
            plugins_dir: registry.plugins_dir().to_path_buf(),
        })
    }
}

// ========== Search ==========

/// Search filters
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Whitespace-separated terms; each must match some field
    pub query: Option<String>,
    /// Exact category (case-insensitive)
    pub category: Option<String>,
    /// Exact marketplace name
    pub marketplace: Option<String>,
    pub installed_only: bool,
    pub limit: Option<usize>,
}

/// Catalog plugins matching `options`, installed first, then by popularity
pub fn search(registry: &PluginRegistry, options: &SearchOptions) -> OpResult<Vec<AvailablePlugin>> {
    require_plugin_system(registry)?;

    let terms: Vec<String> = options
        .query
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    let category = non_empty(options.category.as_deref()).map(str::to_lowercase);
    let marketplace = non_empty(options.marketplace.as_deref());

    let mut results: Vec<AvailablePlugin> = list_available_plugins(registry)
        .into_iter()
        .filter(|p| !options.installed_only || p.installed)
        .filter(|p| marketplace.map_or(true, |m| p.marketplace == m))
        .filter(|p| {
            category.as_deref().map_or(true, |c| {
                p.descriptor
                    .category
                    .as_deref()
                    .is_some_and(|pc| pc.to_lowercase() == c)
            })
        })
        .filter(|p| {
            let haystack = search_text(p);
            terms.iter().all(|t| haystack.contains(t.as_str()))
        })
        .collect();

    results.sort_by(|a, b| {
        b.installed
            .cmp(&a.installed)
            .then_with(|| b.installs.cmp(&a.installs))
            .then_with(|| a.key.cmp(&b.key))
    });

    if let Some(limit) = options.limit {
        results.truncate(limit);
    }
    Ok(results)
}

/// Lowercased text a search term may hit
fn search_text(plugin: &AvailablePlugin) -> String {
    let d = &plugin.descriptor;
    let mut fields = vec![d.name.as_str(), plugin.marketplace.as_str()];
    fields.extend(d.description.as_deref());
    fields.extend(d.category.as_deref());
    fields.extend(d.author.as_ref().map(|a| a.name.as_str()));
    fields.extend(d.tags.iter().map(String::as_str));
    fields.join("\n").to_lowercase()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ========== Info ==========

/// Everything known about one plugin key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub plugin: AvailablePlugin,
    /// `false` when the key is only known from installed rows
    pub in_catalog: bool,
    pub rows: Vec<InstallRow>,
    pub marketplace: Option<MarketplaceRecord>,
}

pub fn info(
    registry: &PluginRegistry,
    plugin: &str,
    marketplace: Option<&str>,
) -> OpResult<PluginInfo> {
    require_plugin_system(registry)?;
    let key = resolve_in_registry(registry, plugin, marketplace).into_key(plugin)?;
    let key_str = key.to_string();

    let installed = registry.installed_plugins();
    let rows = installed.rows(&key_str).to_vec();
    let catalog_entry = list_available_plugins(registry)
        .into_iter()
        .find(|p| p.key == key_str);
    let in_catalog = catalog_entry.is_some();

    let plugin = catalog_entry.unwrap_or_else(|| orphan_entry(registry, &key, &rows));
    let marketplace = registry.known_marketplaces().remove(&key.marketplace);

    Ok(PluginInfo {
        plugin,
        in_catalog,
        rows,
        marketplace,
    })
}

/// Entry for an installed plugin whose catalog no longer lists it
fn orphan_entry(registry: &PluginRegistry, key: &PluginKey, rows: &[InstallRow]) -> AvailablePlugin {
    let key_str = key.to_string();
    let canonical = rows.first();
    AvailablePlugin {
        marketplace: key.marketplace.clone(),
        descriptor: PluginDescriptor {
            name: key.name.clone(),
            ..Default::default()
        },
        installed: !rows.is_empty(),
        installs: registry.install_counts().get(&key_str),
        install_rows: rows.len(),
        installed_version: canonical.and_then(|r| r.version.clone()),
        installed_at: canonical.and_then(|r| r.installed_at.clone()),
        last_updated: canonical.and_then(|r| r.last_updated.clone()),
        enabled: registry.enabled_plugins().get(&key_str),
        key: key_str,
    }
}

// ========== List installed ==========

/// Ordering for installed plugin listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListSort {
    #[default]
    Name,
    Marketplace,
    /// Most recently updated first
    Updated,
}

impl FromStr for ListSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "marketplace" => Ok(Self::Marketplace),
            "updated" => Ok(Self::Updated),
            other => Err(format!(
                "invalid sort '{}': expected name, marketplace or updated",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub marketplace: Option<String>,
    pub enabled: Option<bool>,
    pub sort: ListSort,
}

/// One installed key, described by its canonical (first) row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledEntry {
    pub key: String,
    pub name: String,
    pub marketplace: String,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub rows: usize,
    pub canonical: InstallRow,
}

pub fn list_installed(
    registry: &PluginRegistry,
    options: &ListOptions,
) -> OpResult<Vec<InstalledEntry>> {
    require_plugin_system(registry)?;

    let installed = registry.installed_plugins();
    let enabled = registry.enabled_plugins();
    let catalog = list_available_plugins(registry);
    let marketplace = non_empty(options.marketplace.as_deref());

    let mut entries: Vec<InstalledEntry> = installed
        .installed_keys()
        .into_iter()
        .filter_map(|key| {
            let parsed = PluginKey::parse(&key);
            let (name, market) = match parsed {
                Some(k) => (k.name, k.marketplace),
                None => (key.clone(), String::new()),
            };
            let rows = installed.rows(&key);
            Some(InstalledEntry {
                description: catalog
                    .iter()
                    .find(|p| p.key == key)
                    .and_then(|p| p.descriptor.description.clone()),
                enabled: enabled.get(&key),
                rows: rows.len(),
                canonical: rows.first()?.clone(),
                key,
                name,
                marketplace: market,
            })
        })
        .filter(|e| marketplace.map_or(true, |m| e.marketplace == m))
        .filter(|e| options.enabled.map_or(true, |want| e.enabled == Some(want)))
        .collect();

    match options.sort {
        ListSort::Name => entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.key.cmp(&b.key))),
        ListSort::Marketplace => entries.sort_by(|a, b| {
            a.marketplace
                .cmp(&b.marketplace)
                .then_with(|| a.name.cmp(&b.name))
        }),
        ListSort::Updated => entries.sort_by_cached_key(|e| {
            (recency(e.canonical.last_updated.as_deref()), e.key.clone())
        }),
    }

    Ok(entries)
}

/// Sort key for "newest first"
///
/// RFC 3339 timestamps come first, newest first; unparseable values follow
/// in descending string order; missing values sort last.
type RecencyKey = (u8, Reverse<Option<DateTime<Utc>>>, Reverse<String>);

fn recency(value: Option<&str>) -> RecencyKey {
    match value {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => (0, Reverse(Some(t.with_timezone(&Utc))), Reverse(raw.to_string())),
            Err(_) => (1, Reverse(None), Reverse(raw.to_string())),
        },
        None => (2, Reverse(None), Reverse(String::new())),
    }
}

// ========== Status ==========

/// Overview of the plugin data root
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginStatus {
    pub plugins_dir: PathBuf,
    pub marketplaces_registered: usize,
    pub marketplace_dirs: usize,
    pub catalogs_readable: usize,
    pub catalog_plugins: usize,
    pub installed_keys: usize,
    pub install_rows: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub agent_config: AgentConfig,
}

pub fn status(registry: &PluginRegistry) -> OpResult<PluginStatus> {
    require_plugin_system(registry)?;

    let catalogs = registry.catalogs();
    let installed = registry.installed_plugins();
    let enabled = registry.enabled_plugins();

    Ok(PluginStatus {
        plugins_dir: registry.plugins_dir().to_path_buf(),
        marketplaces_registered: registry.known_marketplaces().len(),
        marketplace_dirs: registry.marketplace_dirs().len(),
        catalogs_readable: catalogs.len(),
        catalog_plugins: catalogs.values().map(|c| c.plugins.len()).sum(),
        installed_keys: installed.installed_keys().len(),
        install_rows: installed.total_rows(),
        enabled: enabled.count(true),
        disabled: enabled.count(false),
        agent_config: registry.agent_config(),
    })
}

// ========== Marketplaces ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketplaceEntry {
    pub name: String,
    /// Listed in known_marketplaces.json (otherwise directory-only)
    pub registered: bool,
    pub source: Option<String>,
    pub last_updated: Option<String>,
    pub auto_update: bool,
    /// `None` when the catalog is missing or unreadable
    pub catalog_plugins: Option<usize>,
    pub description: Option<String>,
}

pub fn marketplace_list(registry: &PluginRegistry) -> OpResult<Vec<MarketplaceEntry>> {
    require_plugin_system(registry)?;

    let known = registry.known_marketplaces();
    let entries = registry
        .marketplace_names()
        .into_iter()
        .map(|name| {
            let record = known.get(&name);
            let catalog = registry.catalog(&name);
            MarketplaceEntry {
                registered: record.is_some(),
                source: record.map(|r| r.source.describe()),
                last_updated: record.and_then(|r| r.last_updated.clone()),
                auto_update: record.is_some_and(|r| r.auto_update),
                catalog_plugins: catalog.as_ref().map(|c| c.plugins.len()),
                description: catalog.and_then(|c| c.description),
                name,
            }
        })
        .collect();
    Ok(entries)
}
