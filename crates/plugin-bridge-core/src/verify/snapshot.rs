//! Before/after captures of the registry slice a mutation touches

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::bridge::command::Mutation;
use crate::plugin::registry::PluginRegistry;

/// The registry slice relevant to one mutation kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// Installed rows of one plugin key (install / uninstall / update)
    Plugin {
        rows: usize,
        version: Option<String>,
        last_updated: Option<String>,
    },
    /// Merged enabled flag of one plugin key (enable / disable)
    Enabled(Option<bool>),
    /// Registered marketplaces with a state summary each
    Marketplaces(BTreeMap<String, String>),
}

impl Snapshot {
    /// Read the slice `mutation` needs from the current disk state
    pub fn capture(registry: &PluginRegistry, mutation: &Mutation) -> Self {
        match mutation {
            Mutation::Install { key, .. }
            | Mutation::Uninstall { key, .. }
            | Mutation::Update { key, .. } => {
                let installed = registry.installed_plugins();
                let key = key.to_string();
                let canonical = installed.canonical(&key);
                Self::Plugin {
                    rows: installed.row_count(&key),
                    version: canonical.and_then(|r| r.version.clone()),
                    last_updated: canonical.and_then(|r| r.last_updated.clone()),
                }
            }
            Mutation::Enable { key, .. } | Mutation::Disable { key, .. } => {
                Self::Enabled(registry.enabled_plugins().get(&key.to_string()))
            }
            Mutation::MarketplaceAdd { .. }
            | Mutation::MarketplaceUpdate { .. }
            | Mutation::MarketplaceRemove { .. } => Self::Marketplaces(marketplace_states(registry)),
        }
    }

    /// Human-readable form, narrowed to what `mutation` targets
    pub fn describe(&self, mutation: &Mutation) -> String {
        match self {
            Self::Plugin { rows: 0, .. } => "not installed (0 rows)".to_string(),
            Self::Plugin {
                rows,
                version,
                last_updated,
            } => format!(
                "installed ({} row{}), version {}, last updated {}",
                rows,
                if *rows == 1 { "" } else { "s" },
                version.as_deref().unwrap_or("unknown"),
                last_updated.as_deref().unwrap_or("unknown"),
            ),
            Self::Enabled(state) => describe_enabled(*state).to_string(),
            Self::Marketplaces(states) => match mutation {
                Mutation::MarketplaceRemove { name } => match states.contains_key(name) {
                    true => format!("{} registered", name),
                    false => format!("{} not registered", name),
                },
                Mutation::MarketplaceUpdate { name: Some(name) } => states
                    .get(name)
                    .map(|s| format!("{}: {}", name, s))
                    .unwrap_or_else(|| format!("{} not registered", name)),
                Mutation::MarketplaceUpdate { name: None } if !states.is_empty() => states
                    .iter()
                    .map(|(name, s)| format!("{}: {}", name, s))
                    .collect::<Vec<_>>()
                    .join("; "),
                _ if states.is_empty() => "no marketplaces registered".to_string(),
                _ => format!(
                    "registered: {}",
                    states.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            },
        }
    }
}

pub(crate) fn describe_enabled(state: Option<bool>) -> &'static str {
    match state {
        Some(true) => "enabled",
        Some(false) => "disabled",
        None => "no explicit setting",
    }
}

/// Summary string per registered marketplace
///
/// Any change in the registry record or the catalog file (content size or
/// modification time) changes the summary.
pub fn marketplace_states(registry: &PluginRegistry) -> BTreeMap<String, String> {
    registry
        .known_marketplaces()
        .into_iter()
        .map(|(name, record)| {
            let catalog = registry.catalog(&name);
            let modified = registry
                .catalog_file(&name)
                .and_then(|path| std::fs::metadata(path).ok())
                .and_then(|meta| meta.modified().ok())
                .map(|time| DateTime::<Utc>::from(time).to_rfc3339())
                .unwrap_or_else(|| "-".to_string());

            let summary = format!(
                "source={} location={} lastUpdated={} catalog={} plugins, version {}, modified {}",
                record.source.describe(),
                record.install_location.as_deref().unwrap_or("-"),
                record.last_updated.as_deref().unwrap_or("-"),
                catalog.as_ref().map_or(0, |c| c.plugins.len()),
                catalog
                    .as_ref()
                    .and_then(|c| c.version.as_deref())
                    .unwrap_or("-"),
                modified,
            );
            (name, summary)
        })
        .collect()
}
