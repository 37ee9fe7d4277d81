use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Home directory not found")]
    HomeNotFound,

    #[error("Failed to parse config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Unknown config key: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("Invalid value for {key}: {message}")]
    ConfigValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Refused(#[from] Refusal),

    #[error("{operation} not verified: {reason}")]
    NotVerified { operation: String, reason: String },
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::HomeNotFound => 2,
            Self::ConfigParse { .. } => 3,
            Self::ConfigKeyNotFound { .. } | Self::ConfigValue { .. } => 4,
            Self::Refused(_) => 5,
            Self::NotVerified { .. } => 6,
            _ => 1,
        }
    }
}

/// Reasons a tool call stops before (or instead of) running the external CLI.
///
/// These are soft failures: front-ends render them as plain messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("Claude Code plugin system not available: {} does not exist", plugins_dir.display())]
    PluginSystemUnavailable { plugins_dir: PathBuf },

    #[error("External CLI '{binary}' is not available: {detail}")]
    CliUnavailable { binary: String, detail: String },

    #[error("Plugin not found: {query}")]
    PluginNotFound { query: String },

    #[error("Ambiguous plugin '{query}'; specify one of: {}", candidates.join(", "))]
    AmbiguousPlugin {
        query: String,
        candidates: Vec<String>,
    },

    #[error("Marketplace not found: {name}")]
    MarketplaceNotFound { name: String },

    #[error("Refusing to pass '{value}' to the CLI: it starts with '-' and would be read as an option")]
    OptionLikeOperand { value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_lists_candidates() {
        let refusal = Refusal::AmbiguousPlugin {
            query: "x".to_string(),
            candidates: vec!["x@A".to_string(), "x@B".to_string()],
        };
        let message = refusal.to_string();
        assert!(message.contains("x@A, x@B"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BridgeError::HomeNotFound.exit_code(), 2);
        assert_eq!(
            BridgeError::ConfigKeyNotFound {
                key: "x".to_string()
            }
            .exit_code(),
            4
        );

        let refused: BridgeError = Refusal::MarketplaceNotFound {
            name: "m".to_string(),
        }
        .into();
        assert_eq!(refused.exit_code(), 5);
        assert_eq!(refused.to_string(), "Marketplace not found: m");

        let option_like: BridgeError = Refusal::OptionLikeOperand {
            value: "--help".to_string(),
        }
        .into();
        assert_eq!(option_like.exit_code(), 5);
    }
}
