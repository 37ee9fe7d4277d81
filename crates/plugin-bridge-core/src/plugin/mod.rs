//! Plugin Module
//!
//! Read-only access to Claude Code's plugin state.
//!
//! - `decode`: tolerant decoding of the external JSON files
//! - `registry`: file locations and per-file accessors
//! - `catalog`: aggregated plugin view and identifier resolution

pub mod catalog;
pub mod decode;
pub mod registry;
pub mod types;

// Re-exports
pub use catalog::{list_available_plugins, resolve_in_registry, resolve_plugin_target, Resolution};
pub use registry::{ClaudeLayout, PluginRegistry};
pub use types::{
    AgentConfig, AvailablePlugin, EnabledStates, InstallCounts, InstallRow, InstallScope,
    InstalledPlugins, MarketplaceCatalog, MarketplaceRecord, MarketplaceSource, PluginAuthor,
    PluginDescriptor, PluginKey,
};
