//! Text signals in external CLI output
//!
//! The CLI's output format is not a contract. These heuristics only back up
//! state diffs in the two cases a diff cannot tell apart: an update that had
//! nothing to do, and an enable/disable that left the merged map unchanged.
//! Extend the phrase lists here; callers never match text themselves.

use crate::plugin::types::PluginKey;

/// Phrases meaning "nothing to do, already current" (matched lowercase)
pub const NO_OP_PHRASES: &[&str] = &[
    "up to date",
    "up-to-date",
    "already at the latest",
    "already on the latest",
    "already latest",
    "no updates",
    "no update available",
    "no change",
    "nothing to update",
];

/// Words confirming an enable action (matched lowercase)
pub const ENABLE_WORDS: &[&str] = &["enabled", "enabling"];

/// Words confirming a disable action (matched lowercase)
pub const DISABLE_WORDS: &[&str] = &["disabled", "disabling"];

/// A line containing any of these never counts as a confirmation
pub const NEGATIVE_MARKERS: &[&str] = &[
    "error",
    "failed",
    "not found",
    "could not",
    "cannot",
    "unable",
];

/// First no-op phrase found in `output`, case-insensitive
pub fn detect_noop(output: &str) -> Option<&'static str> {
    let lower = output.to_lowercase();
    NO_OP_PHRASES.iter().copied().find(|p| lower.contains(p))
}

/// Direction of an enable/disable mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Enable,
    Disable,
}

impl Toggle {
    fn words(&self) -> &'static [&'static str] {
        match self {
            Self::Enable => ENABLE_WORDS,
            Self::Disable => DISABLE_WORDS,
        }
    }
}

/// Whether some line of `output` reports `toggle` for `key`
///
/// The line must name the plugin (full key or bare name, as a whole token)
/// and use a toggle word, and must not carry a failure marker.
pub fn confirms_toggle(output: &str, toggle: Toggle, key: &PluginKey) -> bool {
    let full = key.to_string().to_lowercase();
    let name = key.name.to_lowercase();

    output.lines().map(str::to_lowercase).any(|line| {
        let mentions = contains_token(&line, &full) || contains_token(&line, &name);
        let toggled = toggle.words().iter().any(|w| line.contains(w));
        let negative = NEGATIVE_MARKERS.iter().any(|m| line.contains(m));
        mentions && toggled && !negative
    })
}

/// Characters that continue a plugin identifier
fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '@')
}

/// `token` occurs in `line` with no identifier character on either side
fn contains_token(line: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    line.match_indices(token).any(|(start, _)| {
        let before = line[..start].chars().next_back();
        let after = line[start + token.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_noop() {
        assert_eq!(
            detect_noop("formatter@acme is already up to date"),
            Some("up to date")
        );
        assert_eq!(
            detect_noop("Plugin ALREADY AT THE LATEST version"),
            Some("already at the latest")
        );
        assert_eq!(detect_noop("No updates available"), Some("no updates"));
        assert_eq!(detect_noop("Updated formatter to 1.2.0"), None);
        assert_eq!(detect_noop(""), None);
    }

    #[test]
    fn test_confirms_enable() {
        let key = PluginKey::new("formatter", "acme");
        assert!(confirms_toggle(
            "✔ Enabled plugin formatter@acme",
            Toggle::Enable,
            &key
        ));
        assert!(confirms_toggle(
            "Plugin 'formatter' enabled for project scope",
            Toggle::Enable,
            &key
        ));
    }

    #[test]
    fn test_disable_words_do_not_confirm_enable() {
        let key = PluginKey::new("formatter", "acme");
        assert!(!confirms_toggle(
            "Disabled plugin formatter@acme",
            Toggle::Enable,
            &key
        ));
        assert!(confirms_toggle(
            "Disabled plugin formatter@acme",
            Toggle::Disable,
            &key
        ));
    }

    #[test]
    fn test_requires_plugin_mention_on_same_line() {
        let key = PluginKey::new("formatter", "acme");
        assert!(!confirms_toggle(
            "Enabled plugin linter@acme",
            Toggle::Enable,
            &key
        ));
        assert!(!confirms_toggle(
            "Enabled\nformatter@acme",
            Toggle::Enable,
            &key
        ));
    }

    #[test]
    fn test_similar_plugin_names_do_not_confirm() {
        let key = PluginKey::new("fmt", "A");
        assert!(!confirms_toggle("Enabled plugin fmt-pro@A", Toggle::Enable, &key));
        assert!(!confirms_toggle("Enabled plugin myfmt", Toggle::Enable, &key));
        assert!(!confirms_toggle("Enabled plugin fmt@Acme", Toggle::Enable, &key));
        assert!(!confirms_toggle("Enabled plugin fmt@B", Toggle::Enable, &key));

        assert!(confirms_toggle("Enabled plugin fmt@A", Toggle::Enable, &key));
        assert!(confirms_toggle("Plugin \"fmt\" enabled.", Toggle::Enable, &key));
        assert!(confirms_toggle("enabled: fmt", Toggle::Enable, &key));
    }

    #[test]
    fn test_negative_markers_block_confirmation() {
        let key = PluginKey::new("formatter", "acme");
        assert!(!confirms_toggle(
            "Error: plugin formatter@acme could not be enabled",
            Toggle::Enable,
            &key
        ));
        assert!(!confirms_toggle(
            "Failed disabling formatter@acme",
            Toggle::Disable,
            &key
        ));
    }
}
