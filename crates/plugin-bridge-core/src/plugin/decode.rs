//! Tolerant decoder for Claude Code's plugin JSON files
//!
//! The external CLI owns these files and their schema changes without notice.
//! All field access goes through this module: wrong types and missing keys
//! fall back to empty values, and an entry is only dropped when it has no
//! usable identity at all.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::plugin::types::{
    AgentConfig, EnabledStates, InstallCounts, InstallRow, InstalledPlugins, MarketplaceCatalog,
    MarketplaceRecord, MarketplaceSource, PluginAuthor, PluginDescriptor,
};

/// Read a JSON file, or `None` if it is missing, unreadable or malformed
pub fn read_json(path: &Path) -> Option<Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %path.display(), error = %e, "unreadable JSON file");
            }
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "malformed JSON file");
            None
        }
    }
}

// ========== Field helpers ==========

fn as_object(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object()
}

/// First non-empty string among `keys`
fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Bool, accepting `"true"`/`"false"` strings
fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Non-negative integer, accepting floats and numeric strings
fn u64_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Array of strings; a lone string counts as one element
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Present and not an empty container
fn is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(_)) => true,
    }
}

fn author(value: Option<&Value>) -> Option<PluginAuthor> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(PluginAuthor {
            name: s.trim().to_string(),
            email: None,
        }),
        Value::Object(obj) => Some(PluginAuthor {
            name: str_field(obj, &["name"])?,
            email: str_field(obj, &["email"]),
        }),
        _ => None,
    }
}

// ========== known_marketplaces.json ==========

fn marketplace_source(value: Option<&Value>) -> MarketplaceSource {
    match value {
        Some(Value::Object(obj)) => MarketplaceSource {
            kind: str_field(obj, &["source", "type", "kind"]).unwrap_or_default(),
            repo: str_field(obj, &["repo", "repository"]),
            url: str_field(obj, &["url"]),
            path: str_field(obj, &["path"]),
        },
        Some(Value::String(s)) => MarketplaceSource {
            kind: String::new(),
            repo: None,
            url: Some(s.clone()),
            path: None,
        },
        _ => MarketplaceSource::default(),
    }
}

/// Decode known_marketplaces.json (`name -> record`)
pub fn known_marketplaces(value: &Value) -> BTreeMap<String, MarketplaceRecord> {
    let Some(obj) = as_object(value) else {
        return BTreeMap::new();
    };

    obj.iter()
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, entry)| {
            let record = match entry.as_object() {
                Some(fields) => MarketplaceRecord {
                    name: name.clone(),
                    source: marketplace_source(fields.get("source")),
                    install_location: str_field(fields, &["installLocation", "install_location"]),
                    last_updated: str_field(fields, &["lastUpdated", "last_updated"]),
                    auto_update: bool_field(fields, "autoUpdate").unwrap_or(false),
                },
                None => MarketplaceRecord {
                    name: name.clone(),
                    ..Default::default()
                },
            };
            (name.clone(), record)
        })
        .collect()
}

// ========== installed_plugins.json ==========

fn install_row(value: &Value) -> Option<InstallRow> {
    let obj = value.as_object()?;
    Some(InstallRow {
        scope: str_field(obj, &["scope"]).unwrap_or_else(|| "user".to_string()),
        project_path: str_field(obj, &["projectPath", "project_path"]),
        install_path: str_field(obj, &["installPath", "install_path"]),
        version: str_field(obj, &["version"]),
        installed_at: str_field(obj, &["installedAt", "installed_at"]),
        last_updated: str_field(obj, &["lastUpdated", "last_updated"]),
        git_commit_sha: str_field(obj, &["gitCommitSha", "git_commit_sha", "commit"]),
    })
}

/// Decode installed_plugins.json
///
/// Accepts the current `{version, plugins: {key: [row]}}` shape and the
/// older single-row `{plugins: {key: row}}` shape.
pub fn installed_plugins(value: &Value) -> InstalledPlugins {
    let Some(obj) = as_object(value) else {
        return InstalledPlugins::default();
    };

    let version = obj.get("version").and_then(u64_value).unwrap_or(0);
    let plugins = obj
        .get("plugins")
        .and_then(Value::as_object)
        .map(|plugins| {
            plugins
                .iter()
                .map(|(key, rows)| {
                    let rows = match rows {
                        Value::Array(items) => items.iter().filter_map(install_row).collect(),
                        Value::Object(_) => install_row(rows).into_iter().collect(),
                        _ => Vec::new(),
                    };
                    (key.clone(), rows)
                })
                .collect()
        })
        .unwrap_or_default();

    InstalledPlugins { version, plugins }
}

// ========== settings.json ==========

/// Decode the `enabledPlugins` map of one settings file
pub fn enabled_plugins(value: &Value) -> EnabledStates {
    let plugins = value
        .get("enabledPlugins")
        .and_then(Value::as_object)
        .map(|map| {
            map.keys()
                .filter_map(|key| bool_field(map, key).map(|b| (key.clone(), b)))
                .collect()
        })
        .unwrap_or_default();

    EnabledStates { plugins }
}

// ========== install-counts-cache.json ==========

/// Decode `{counts: [{plugin, unique_installs}]}`
pub fn install_counts(value: &Value) -> InstallCounts {
    let counts: HashMap<String, u64> = value
        .get("counts")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|entry| {
                    let plugin = str_field(entry, &["plugin", "name"])?;
                    let installs = entry
                        .get("unique_installs")
                        .or_else(|| entry.get("installs"))
                        .and_then(u64_value)
                        .unwrap_or(0);
                    Some((plugin, installs))
                })
                .collect()
        })
        .unwrap_or_default();

    InstallCounts { counts }
}

// ========== config.json ==========

/// Decode the plugin data root config.json
pub fn agent_config(value: &Value) -> AgentConfig {
    let Some(obj) = as_object(value) else {
        return AgentConfig::default();
    };

    AgentConfig {
        enabled_agents: string_list(obj.get("enabled_agents")),
        sync_mode: str_field(obj, &["sync_mode"]),
        other: obj
            .iter()
            .filter(|(k, _)| k.as_str() != "enabled_agents" && k.as_str() != "sync_mode")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

// ========== marketplace.json ==========

fn plugin_descriptor(value: &Value) -> Option<PluginDescriptor> {
    let obj = value.as_object()?;
    let name = str_field(obj, &["name"])?;

    let mut tags = string_list(obj.get("tags"));
    for keyword in string_list(obj.get("keywords")) {
        if !tags.contains(&keyword) {
            tags.push(keyword);
        }
    }

    Some(PluginDescriptor {
        name,
        description: str_field(obj, &["description"]),
        version: str_field(obj, &["version"]),
        category: str_field(obj, &["category"]),
        homepage: str_field(obj, &["homepage", "repository"]),
        tags,
        author: author(obj.get("author")),
        strict: bool_field(obj, "strict").unwrap_or(true),
        provides_skills: is_populated(obj.get("skills")),
        provides_lsp: is_populated(obj.get("lspServers")),
    })
}

/// Decode a marketplace catalog
///
/// `marketplace` is the name the catalog was found under; the file's own
/// `name` field is ignored so keys always match the registry.
/// Returns `None` when the root is not an object.
pub fn marketplace_catalog(marketplace: &str, value: &Value) -> Option<MarketplaceCatalog> {
    let obj = as_object(value)?;
    let metadata = obj.get("metadata").and_then(Value::as_object);

    Some(MarketplaceCatalog {
        marketplace: marketplace.to_string(),
        description: str_field(obj, &["description"])
            .or_else(|| metadata.and_then(|m| str_field(m, &["description"]))),
        version: str_field(obj, &["version"])
            .or_else(|| metadata.and_then(|m| str_field(m, &["version"]))),
        owner: author(obj.get("owner")),
        plugins: obj
            .get("plugins")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(plugin_descriptor).collect())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_read_json_missing_and_malformed() {
        let temp = TempDir::new().unwrap();
        assert!(read_json(&temp.path().join("absent.json")).is_none());

        let bad = temp.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert!(read_json(&bad).is_none());

        let good = temp.path().join("good.json");
        fs::write(&good, r#"{"a": 1}"#).unwrap();
        assert_eq!(read_json(&good), Some(json!({"a": 1})));
    }

    #[test]
    fn test_known_marketplaces() {
        let value = json!({
            "official": {
                "source": {"source": "github", "repo": "anthropics/claude-plugins-official"},
                "installLocation": "/home/me/.claude/plugins/marketplaces/official",
                "lastUpdated": "2025-06-01T00:00:00Z",
                "autoUpdate": true
            },
            "weird": 42
        });

        let records = known_marketplaces(&value);
        assert_eq!(records.len(), 2);

        let official = &records["official"];
        assert_eq!(official.source.kind, "github");
        assert_eq!(
            official.source.repo.as_deref(),
            Some("anthropics/claude-plugins-official")
        );
        assert!(official.auto_update);
        assert_eq!(official.last_updated.as_deref(), Some("2025-06-01T00:00:00Z"));

        // A non-object entry keeps its name so its presence is still observable
        assert_eq!(records["weird"].source, MarketplaceSource::default());
    }

    #[test]
    fn test_known_marketplaces_wrong_root() {
        assert!(known_marketplaces(&json!([1, 2, 3])).is_empty());
        assert!(known_marketplaces(&Value::Null).is_empty());
    }

    #[test]
    fn test_installed_plugins_shapes() {
        let value = json!({
            "version": 2,
            "plugins": {
                "a@m": [
                    {"scope": "user", "installPath": "/x", "version": "1.0.0",
                     "installedAt": "t0", "lastUpdated": "t1", "gitCommitSha": "abc"},
                    {"scope": "project", "projectPath": "/repo", "version": "1.1.0"},
                    "garbage"
                ],
                "legacy@m": {"version": "0.1.0"},
                "broken@m": 7
            }
        });

        let installed = installed_plugins(&value);
        assert_eq!(installed.version, 2);
        assert_eq!(installed.row_count("a@m"), 2);
        assert_eq!(
            installed.canonical("a@m").unwrap().git_commit_sha.as_deref(),
            Some("abc")
        );
        assert_eq!(
            installed.rows("a@m")[1].project_path.as_deref(),
            Some("/repo")
        );
        assert_eq!(installed.row_count("legacy@m"), 1);
        assert_eq!(installed.canonical("legacy@m").unwrap().scope, "user");
        assert_eq!(installed.row_count("broken@m"), 0);
    }

    #[test]
    fn test_installed_plugins_missing_plugins_key() {
        let installed = installed_plugins(&json!({"version": 2}));
        assert!(installed.plugins.is_empty());
    }

    #[test]
    fn test_enabled_plugins() {
        let value = json!({
            "model": "opus",
            "enabledPlugins": {"a@m": true, "b@m": false, "c@m": "true", "d@m": null}
        });
        let states = enabled_plugins(&value);
        assert_eq!(states.get("a@m"), Some(true));
        assert_eq!(states.get("b@m"), Some(false));
        assert_eq!(states.get("c@m"), Some(true));
        assert_eq!(states.get("d@m"), None);

        assert!(enabled_plugins(&json!({"enabledPlugins": []})).plugins.is_empty());
    }

    #[test]
    fn test_install_counts() {
        let value = json!({
            "counts": [
                {"plugin": "a@m", "unique_installs": 120},
                {"plugin": "b@m", "unique_installs": "7"},
                {"unique_installs": 3}
            ]
        });
        let counts = install_counts(&value);
        assert_eq!(counts.get("a@m"), 120);
        assert_eq!(counts.get("b@m"), 7);
        assert_eq!(counts.get("missing@m"), 0);
        assert_eq!(counts.counts.len(), 2);
    }

    #[test]
    fn test_agent_config() {
        let value = json!({"enabled_agents": ["claude", "codex"], "sync_mode": "mirror", "x": 1});
        let config = agent_config(&value);
        assert_eq!(config.enabled_agents, vec!["claude", "codex"]);
        assert_eq!(config.sync_mode.as_deref(), Some("mirror"));
        assert_eq!(config.other.get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_marketplace_catalog() {
        let value = json!({
            "name": "ignored-name",
            "owner": {"name": "Acme", "email": "dev@acme.test"},
            "metadata": {"version": "3"},
            "plugins": [
                {
                    "name": "formatter",
                    "description": "Formats code",
                    "version": "1.2.0",
                    "category": "development",
                    "tags": ["fmt", "style"],
                    "keywords": ["style", "lint"],
                    "author": "Jane",
                    "strict": false,
                    "skills": ["./skills/fmt"],
                    "source": "./plugins/formatter"
                },
                {"name": "lsp-rust", "lspServers": {"rust": {"command": "rust-analyzer"}}},
                {"description": "no name"}
            ]
        });

        let catalog = marketplace_catalog("acme", &value).unwrap();
        assert_eq!(catalog.marketplace, "acme");
        assert_eq!(catalog.version.as_deref(), Some("3"));
        assert_eq!(catalog.owner.as_ref().unwrap().name, "Acme");
        assert_eq!(catalog.plugins.len(), 2);

        let formatter = &catalog.plugins[0];
        assert_eq!(formatter.tags, vec!["fmt", "style", "lint"]);
        assert_eq!(formatter.author.as_ref().unwrap().name, "Jane");
        assert!(!formatter.strict);
        assert!(formatter.provides_skills);
        assert!(!formatter.provides_lsp);

        let lsp = &catalog.plugins[1];
        assert!(lsp.strict);
        assert!(lsp.provides_lsp);
    }

    #[test]
    fn test_marketplace_catalog_non_object() {
        assert!(marketplace_catalog("m", &json!("nope")).is_none());
    }
}
