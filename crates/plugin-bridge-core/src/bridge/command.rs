//! Typed command builder for the external `claude plugin` CLI
//!
//! Each mutation maps to a fixed argument token list. Tokens are passed to
//! the process as-is; nothing here goes through a shell.

use std::fmt;

use crate::plugin::types::{InstallScope, PluginKey};

/// A state change delegated to the external CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Install {
        key: PluginKey,
        scope: Option<InstallScope>,
    },
    Uninstall {
        key: PluginKey,
        scope: Option<InstallScope>,
    },
    Update {
        key: PluginKey,
        scope: Option<InstallScope>,
    },
    Enable {
        key: PluginKey,
        scope: Option<InstallScope>,
    },
    Disable {
        key: PluginKey,
        scope: Option<InstallScope>,
    },
    MarketplaceAdd {
        source: String,
    },
    /// `None` updates every marketplace
    MarketplaceUpdate {
        name: Option<String>,
    },
    MarketplaceRemove {
        name: String,
    },
}

/// Mutation without its arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Install,
    Uninstall,
    Update,
    Enable,
    Disable,
    MarketplaceAdd,
    MarketplaceUpdate,
    MarketplaceRemove,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Update => "update",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::MarketplaceAdd => "marketplace add",
            Self::MarketplaceUpdate => "marketplace update",
            Self::MarketplaceRemove => "marketplace remove",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Install { .. } => MutationKind::Install,
            Self::Uninstall { .. } => MutationKind::Uninstall,
            Self::Update { .. } => MutationKind::Update,
            Self::Enable { .. } => MutationKind::Enable,
            Self::Disable { .. } => MutationKind::Disable,
            Self::MarketplaceAdd { .. } => MutationKind::MarketplaceAdd,
            Self::MarketplaceUpdate { .. } => MutationKind::MarketplaceUpdate,
            Self::MarketplaceRemove { .. } => MutationKind::MarketplaceRemove,
        }
    }

    /// Plugin this mutation targets, if it is a plugin mutation
    pub fn plugin_key(&self) -> Option<&PluginKey> {
        match self {
            Self::Install { key, .. }
            | Self::Uninstall { key, .. }
            | Self::Update { key, .. }
            | Self::Enable { key, .. }
            | Self::Disable { key, .. } => Some(key),
            _ => None,
        }
    }

    /// First positional operand the CLI would parse as an option
    pub fn option_like_operand(&self) -> Option<String> {
        let operand = match self {
            Self::Install { key, .. }
            | Self::Uninstall { key, .. }
            | Self::Update { key, .. }
            | Self::Enable { key, .. }
            | Self::Disable { key, .. } => key.to_string(),
            Self::MarketplaceAdd { source } => source.clone(),
            Self::MarketplaceUpdate { name } => name.clone()?,
            Self::MarketplaceRemove { name } => name.clone(),
        };
        operand.starts_with('-').then_some(operand)
    }

    /// Argument tokens after the binary name
    pub fn args(&self) -> Vec<String> {
        let plugin = |verb: &str, key: &PluginKey, scope: &Option<InstallScope>| {
            let mut args = vec!["plugin".to_string(), verb.to_string(), key.to_string()];
            if let Some(scope) = scope {
                args.push("--scope".to_string());
                args.push(scope.to_string());
            }
            args
        };
        let marketplace = |verb: &str| {
            vec![
                "plugin".to_string(),
                "marketplace".to_string(),
                verb.to_string(),
            ]
        };

        match self {
            Self::Install { key, scope } => plugin("install", key, scope),
            Self::Uninstall { key, scope } => plugin("uninstall", key, scope),
            Self::Update { key, scope } => plugin("update", key, scope),
            Self::Enable { key, scope } => plugin("enable", key, scope),
            Self::Disable { key, scope } => plugin("disable", key, scope),
            Self::MarketplaceAdd { source } => {
                let mut args = marketplace("add");
                args.push(source.clone());
                args
            }
            Self::MarketplaceUpdate { name } => {
                let mut args = marketplace("update");
                args.extend(name.iter().cloned());
                args
            }
            Self::MarketplaceRemove { name } => {
                let mut args = marketplace("remove");
                args.push(name.clone());
                args
            }
        }
    }
}

/// Render a binary and its tokens for display, quoting where needed
pub fn display_command(binary: &str, args: &[String]) -> String {
    std::iter::once(binary)
        .chain(args.iter().map(String::as_str))
        .map(quote_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_token(token: &str) -> String {
    let plain = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@=+,%".contains(c));
    if plain {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}
