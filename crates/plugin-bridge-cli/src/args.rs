use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use plugin_bridge_core::{InstallScope, ListSort};

#[derive(Parser)]
#[command(name = "plugin-bridge")]
#[command(about = "Inspect and manage Claude Code plugins with verified mutations")]
#[command(version)]
pub struct Cli {
    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Base directory (default: ~/.plugin-bridge)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Plugin identifier plus per-call options shared by plugin mutations
#[derive(Args, Debug)]
pub struct PluginTarget {
    /// Plugin name or name@marketplace
    pub plugin: String,

    /// Marketplace to pick when the name exists in several
    #[arg(short, long)]
    pub marketplace: Option<String>,

    /// Scope passed to the CLI (user, project, local)
    #[arg(short, long)]
    pub scope: Option<InstallScope>,

    /// Project directory the change applies to
    #[arg(short, long)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search plugins across marketplace catalogs
    Search {
        /// Search terms (all must match)
        query: Vec<String>,

        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// Filter by marketplace
        #[arg(short, long)]
        marketplace: Option<String>,

        /// Only installed plugins
        #[arg(short, long)]
        installed: bool,

        /// Maximum results to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show details for one plugin
    Info {
        /// Plugin name or name@marketplace
        plugin: String,

        /// Marketplace to pick when the name exists in several
        #[arg(short, long)]
        marketplace: Option<String>,
    },

    /// List installed plugins
    List {
        /// Filter by marketplace
        #[arg(short, long)]
        marketplace: Option<String>,

        /// Only enabled plugins
        #[arg(long, conflicts_with = "disabled")]
        enabled: bool,

        /// Only disabled plugins
        #[arg(long)]
        disabled: bool,

        /// Sort order (name, marketplace, updated)
        #[arg(short, long, default_value = "name")]
        sort: ListSort,
    },

    /// Summarize the plugin system state
    Status,

    /// Install a plugin
    Install(PluginTarget),

    /// Uninstall a plugin
    Uninstall(PluginTarget),

    /// Update a plugin
    Update(PluginTarget),

    /// Update all marketplaces, then every installed plugin
    UpdateAll {
        /// Scope passed to the CLI (user, project, local)
        #[arg(short, long)]
        scope: Option<InstallScope>,

        /// Project directory the updates apply to
        #[arg(short, long)]
        project: Option<PathBuf>,
    },

    /// Enable a plugin
    Enable(PluginTarget),

    /// Disable a plugin
    Disable(PluginTarget),

    /// Manage marketplaces
    Marketplace {
        #[command(subcommand)]
        action: MarketplaceAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum MarketplaceAction {
    /// List registered and directory-only marketplaces
    List,

    /// Register a marketplace
    Add {
        /// GitHub owner/repo, git URL, or local path
        source: String,
    },

    /// Refresh one marketplace, or all of them
    Update {
        /// Marketplace name (default: all)
        name: Option<String>,
    },

    /// Remove a registered marketplace
    Remove {
        /// Marketplace name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., cli.timeout_secs)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., cli.binary)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all config values
    #[command(alias = "show")]
    List,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init,
}
