pub mod bridge;
pub mod config;
pub mod error;
pub mod ops;
pub mod plugin;
pub mod query;
pub mod render;
pub mod verify;

pub use bridge::{ClaudeCli, CliResult, CliRunner, Mutation, MutationKind, RunOptions};
pub use config::Config;
pub use error::{BridgeError, Refusal, Result};
pub use ops::{
    MutationReport, OpResult, PluginOps, PluginRequest, PluginUpdate, UpdateAllReport,
    UpdateStatus,
};
pub use plugin::{
    AvailablePlugin, ClaudeLayout, InstallScope, PluginKey, PluginRegistry, Resolution,
};
pub use query::{
    InstalledEntry, ListOptions, ListSort, MarketplaceEntry, PluginInfo, PluginStatus,
    SearchOptions,
};
pub use verify::{Basis, Snapshot, Verification};
