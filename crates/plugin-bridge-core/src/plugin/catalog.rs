//! Catalog aggregation and plugin identifier resolution

use std::collections::BTreeSet;

use crate::error::Refusal;
use crate::plugin::registry::PluginRegistry;
use crate::plugin::types::{AvailablePlugin, PluginKey};

/// Join every catalog entry with installed rows, install counts and the
/// merged enabled flag. One row per `name@marketplace`, ordered by
/// marketplace then catalog order.
pub fn list_available_plugins(registry: &PluginRegistry) -> Vec<AvailablePlugin> {
    let installed = registry.installed_plugins();
    let counts = registry.install_counts();
    let enabled = registry.enabled_plugins();

    let mut seen = BTreeSet::new();
    let mut plugins = Vec::new();

    for (marketplace, catalog) in registry.catalogs() {
        for descriptor in catalog.plugins {
            let key = PluginKey::new(&descriptor.name, &marketplace).to_string();
            if !seen.insert(key.clone()) {
                continue;
            }

            let canonical = installed.canonical(&key);
            plugins.push(AvailablePlugin {
                marketplace: marketplace.clone(),
                installed: installed.is_installed(&key),
                installs: counts.get(&key),
                install_rows: installed.row_count(&key),
                installed_version: canonical.and_then(|r| r.version.clone()),
                installed_at: canonical.and_then(|r| r.installed_at.clone()),
                last_updated: canonical.and_then(|r| r.last_updated.clone()),
                enabled: enabled.get(&key),
                descriptor,
                key,
            });
        }
    }

    plugins
}

/// Outcome of resolving a user-supplied plugin identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(PluginKey),
    NotFound,
    Ambiguous(Vec<String>),
}

impl Resolution {
    /// Convert to the target key or the refusal a tool should report
    pub fn into_key(self, query: &str) -> std::result::Result<PluginKey, Refusal> {
        match self {
            Self::Found(key) => Ok(key),
            Self::NotFound => Err(Refusal::PluginNotFound {
                query: query.to_string(),
            }),
            Self::Ambiguous(candidates) => Err(Refusal::AmbiguousPlugin {
                query: query.to_string(),
                candidates,
            }),
        }
    }
}

/// Resolve `name`, `name@marketplace`, or `name` plus a marketplace hint
/// against a set of known keys.
///
/// An identifier containing `@` matches its exact composite key only.
pub fn resolve_plugin_target<'a, I>(
    known_keys: I,
    plugin: &str,
    marketplace: Option<&str>,
) -> Resolution
where
    I: IntoIterator<Item = &'a str>,
{
    let plugin = plugin.trim();
    let marketplace = marketplace.map(str::trim).filter(|m| !m.is_empty());

    let keys: BTreeSet<&str> = known_keys.into_iter().collect();

    if plugin.contains('@') {
        return match keys.contains(plugin) {
            true => PluginKey::parse(plugin)
                .map(Resolution::Found)
                .unwrap_or(Resolution::NotFound),
            false => Resolution::NotFound,
        };
    }

    let mut matches: Vec<PluginKey> = keys
        .iter()
        .filter_map(|k| PluginKey::parse(k))
        .filter(|k| k.name == plugin)
        .filter(|k| marketplace.map_or(true, |m| k.marketplace == m))
        .collect();

    match matches.len() {
        0 => Resolution::NotFound,
        1 => Resolution::Found(matches.remove(0)),
        _ => Resolution::Ambiguous(matches.iter().map(ToString::to_string).collect()),
    }
}

/// Resolve against catalog entries and installed rows together, so a plugin
/// whose marketplace catalog disappeared can still be targeted.
pub fn resolve_in_registry(
    registry: &PluginRegistry,
    plugin: &str,
    marketplace: Option<&str>,
) -> Resolution {
    let mut keys: BTreeSet<String> = list_available_plugins(registry)
        .into_iter()
        .map(|p| p.key)
        .collect();
    keys.extend(registry.installed_plugins().installed_keys());
    resolve_plugin_target(keys.iter().map(String::as_str), plugin, marketplace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::registry::testing::Fixture;

    fn fixture() -> Fixture {
        let fx = Fixture::new();
        fx.write(
            "known_marketplaces.json",
            r#"{"A": {"source": {"source": "github", "repo": "a/a"}},
                "B": {"source": {"source": "github", "repo": "b/b"}},
                "C": {"source": {"source": "github", "repo": "c/c"}}}"#,
        );
        fx.write_catalog(
            "A",
            r#"{"owner": {"name": "a"}, "plugins": [
                {"name": "x", "description": "x from A"},
                {"name": "y", "category": "tools"},
                {"name": "y", "description": "duplicate entry"}
            ]}"#,
        );
        fx.write_catalog("B", r#"{"plugins": [{"name": "x"}]}"#);
        fx.write(
            "installed_plugins.json",
            r#"{"version": 2, "plugins": {
                "y@A": [
                    {"scope": "user", "version": "1.0.0", "installedAt": "t0", "lastUpdated": "t1"},
                    {"scope": "project", "version": "0.9.0"}
                ],
                "ghost@Gone": [{"scope": "user", "version": "0.1.0"}]
            }}"#,
        );
        fx.write(
            "install-counts-cache.json",
            r#"{"counts": [{"plugin": "x@B", "unique_installs": 50}]}"#,
        );
        fx.write_user_settings(r#"{"enabledPlugins": {"y@A": true}}"#);
        fx
    }

    #[test]
    fn test_list_available_plugins_joins_state() {
        let fx = fixture();
        let plugins = list_available_plugins(&fx.registry);

        let keys: Vec<&str> = plugins.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["x@A", "y@A", "x@B"]);

        let y = &plugins[1];
        assert!(y.installed);
        assert_eq!(y.install_rows, 2);
        assert_eq!(y.installed_version.as_deref(), Some("1.0.0"));
        assert_eq!(y.installed_at.as_deref(), Some("t0"));
        assert_eq!(y.last_updated.as_deref(), Some("t1"));
        assert_eq!(y.enabled, Some(true));
        assert_eq!(y.installs, 0);

        let xb = &plugins[2];
        assert!(!xb.installed);
        assert_eq!(xb.installs, 50);
        assert_eq!(xb.enabled, None);
        assert!(xb.installed_version.is_none());
    }

    #[test]
    fn test_missing_catalog_is_skipped() {
        let fx = fixture();
        // C is registered but has no catalog; only A and B contribute
        let marketplaces: BTreeSet<String> = list_available_plugins(&fx.registry)
            .into_iter()
            .map(|p| p.marketplace)
            .collect();
        assert_eq!(marketplaces.len(), 2);
        assert!(!marketplaces.contains("C"));
    }

    #[test]
    fn test_resolve_exact_key_only() {
        let keys = ["x@A", "x@B", "xx@A"];
        assert_eq!(
            resolve_plugin_target(keys, "x@A", None),
            Resolution::Found(PluginKey::new("x", "A"))
        );
        assert_eq!(resolve_plugin_target(keys, "x@Z", None), Resolution::NotFound);
        // A qualified id never falls back to substring or name matching
        assert_eq!(resolve_plugin_target(keys, "x@", None), Resolution::NotFound);
        assert_eq!(resolve_plugin_target(keys, "@A", None), Resolution::NotFound);
    }

    #[test]
    fn test_resolve_by_name() {
        let keys = ["x@A", "x@B", "xx@A"];
        assert_eq!(
            resolve_plugin_target(keys, "x", None),
            Resolution::Ambiguous(vec!["x@A".to_string(), "x@B".to_string()])
        );
        assert_eq!(
            resolve_plugin_target(keys, "x", Some("B")),
            Resolution::Found(PluginKey::new("x", "B"))
        );
        assert_eq!(
            resolve_plugin_target(keys, "xx", None),
            Resolution::Found(PluginKey::new("xx", "A"))
        );
        assert_eq!(resolve_plugin_target(keys, "x", Some("Q")), Resolution::NotFound);
        assert_eq!(resolve_plugin_target(keys, "nope", None), Resolution::NotFound);
    }

    #[test]
    fn test_resolve_in_registry_includes_installed_only_keys() {
        let fx = fixture();
        assert_eq!(
            resolve_in_registry(&fx.registry, "ghost", None),
            Resolution::Found(PluginKey::new("ghost", "Gone"))
        );
    }

    #[test]
    fn test_into_key_refusals() {
        let refusal = Resolution::Ambiguous(vec!["x@A".into(), "x@B".into()])
            .into_key("x")
            .unwrap_err();
        assert!(matches!(refusal, Refusal::AmbiguousPlugin { ref candidates, .. } if candidates.len() == 2));
        assert_eq!(
            Resolution::NotFound.into_key("q").unwrap_err(),
            Refusal::PluginNotFound {
                query: "q".to_string()
            }
        );
    }
}
