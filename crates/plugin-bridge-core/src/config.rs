use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::plugin::ClaudeLayout;

const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the base directory
pub const BASE_DIR_ENV: &str = "PLUGIN_BRIDGE_BASE";

/// Environment variable holding the `tracing` filter for the binaries
pub const LOG_ENV: &str = "PLUGIN_BRIDGE_LOG";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# plugin-bridge configuration file
# Location: ~/.plugin-bridge/config.toml

[cli]
# External Claude Code executable (name on PATH or absolute path)
binary = "claude"

# Upper bound for install/update/marketplace calls, in seconds
timeout_secs = 300

# Upper bound for the `--version` availability probe, in seconds
probe_timeout_secs = 15

[paths]
# Claude Code home directory
# Default: ~/.claude
# claude_dir = "/home/me/.claude"

# Plugin data root (default: <claude_dir>/plugins)
# plugins_dir = "/home/me/.claude/plugins"
"#;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cli: CliConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

/// External CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_binary")]
    pub binary: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_binary() -> String {
    "claude".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_probe_timeout_secs() -> u64 {
    15
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            timeout_secs: default_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl CliConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Location overrides for the external assistant's data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins_dir: Option<PathBuf>,
}

/// Base directory: explicit flag, then `PLUGIN_BRIDGE_BASE`, then `~/.plugin-bridge`
pub fn resolve_base_dir(cli_base: Option<PathBuf>) -> PathBuf {
    if let Some(base) = cli_base {
        return base;
    }

    if let Ok(base) = std::env::var(BASE_DIR_ENV) {
        return PathBuf::from(base);
    }

    dirs::home_dir()
        .map(|h| h.join(".plugin-bridge"))
        .unwrap_or_else(|| PathBuf::from(".plugin-bridge"))
}

impl Config {
    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content).map_err(|e| BridgeError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "cli.binary" => self.cli.binary = value.trim().to_string(),
            "cli.timeout_secs" => self.cli.timeout_secs = parse_secs(key, value)?,
            "cli.probe_timeout_secs" => self.cli.probe_timeout_secs = parse_secs(key, value)?,
            "paths.claude_dir" => self.paths.claude_dir = parse_optional_path(value),
            "paths.plugins_dir" => self.paths.plugins_dir = parse_optional_path(value),
            _ => {
                return Err(BridgeError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        let show = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(default)".to_string())
        };
        vec![
            ("cli.binary".to_string(), self.cli.binary.clone()),
            (
                "cli.timeout_secs".to_string(),
                self.cli.timeout_secs.to_string(),
            ),
            (
                "cli.probe_timeout_secs".to_string(),
                self.cli.probe_timeout_secs.to_string(),
            ),
            ("paths.claude_dir".to_string(), show(&self.paths.claude_dir)),
            (
                "paths.plugins_dir".to_string(),
                show(&self.paths.plugins_dir),
            ),
        ]
    }

    /// Resolve where the external assistant keeps its plugin state
    pub fn layout(&self) -> Result<ClaudeLayout> {
        let claude_dir = match &self.paths.claude_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or(BridgeError::HomeNotFound)?
                .join(".claude"),
        };

        let mut layout = ClaudeLayout::from_claude_dir(&claude_dir);
        if let Some(plugins_dir) = &self.paths.plugins_dir {
            layout.plugins_dir = plugins_dir.clone();
        }
        Ok(layout)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| BridgeError::ConfigValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
    if secs == 0 {
        return Err(BridgeError::ConfigValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(secs)
}

fn parse_optional_path(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cli.binary, "claude");
        assert_eq!(config.cli.timeout(), Duration::from_secs(300));
        assert_eq!(config.cli.probe_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = Config::init(temp.path()).unwrap();
        assert!(path.exists());

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.cli.binary, "claude");
        assert_eq!(config.cli.timeout_secs, 300);
        assert!(config.paths.claude_dir.is_none());
    }

    #[test]
    fn test_explicit_base_dir_wins() {
        let base = resolve_base_dir(Some(PathBuf::from("/tmp/pb")));
        assert_eq!(base, PathBuf::from("/tmp/pb"));
    }

    #[test]
    fn test_load_missing_is_default() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.cli.probe_timeout_secs, 15);
    }

    #[test]
    fn test_load_malformed_is_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "[cli\nbinary = ").unwrap();
        let err = Config::load(temp.path()).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigParse { .. }));
    }

    #[test]
    fn test_config_get_set() {
        let mut config = Config::default();

        config.set("cli.binary", "/opt/claude/bin/claude").unwrap();
        config.set("cli.timeout_secs", "42").unwrap();
        assert_eq!(config.get("cli.binary").unwrap(), "/opt/claude/bin/claude");
        assert_eq!(config.cli.timeout_secs, 42);

        assert!(config.set("cli.timeout_secs", "0").is_err());
        assert!(config.set("cli.timeout_secs", "soon").is_err());
        assert!(config.set("nope", "1").is_err());
    }

    #[test]
    fn test_save_roundtrip_and_layout_override() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config
            .set("paths.claude_dir", &temp.path().join("claude").to_string_lossy())
            .unwrap();
        config.save(temp.path()).unwrap();

        let loaded = Config::load(temp.path()).unwrap();
        let layout = loaded.layout().unwrap();
        assert_eq!(layout.plugins_dir, temp.path().join("claude").join("plugins"));
        assert_eq!(
            layout.user_settings,
            temp.path().join("claude").join("settings.json")
        );
    }
}
