//! Verification of delegated mutations
//!
//! An exit code of 0 only says the external CLI thinks it succeeded. The
//! verdict here compares before/after snapshots of the registry with a
//! predicate per mutation kind. A CLI success that the disk does not confirm
//! becomes a drift warning: the CLI's behavior or file schema may have
//! changed underneath us.

pub mod signals;
pub mod snapshot;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::bridge::command::Mutation;
use crate::bridge::runner::CliResult;
use crate::plugin::types::PluginKey;
use signals::{confirms_toggle, detect_noop, Toggle};
pub use snapshot::{marketplace_states, Snapshot};

/// What a verdict rests on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    /// The registry changed the way the mutation should change it
    StateChanged,
    /// Nothing changed and the CLI said there was nothing to do
    NoOp,
    /// Nothing changed in the merged view, but the CLI reported the action
    OutputConfirmed,
    /// The CLI failed; nothing is verified
    CliFailed,
    /// The CLI succeeded but nothing confirms it
    Unconfirmed,
}

impl Basis {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::StateChanged | Self::NoOp | Self::OutputConfirmed)
    }
}

/// Verdict for one mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub verified: bool,
    pub basis: Basis,
    pub before: String,
    pub after: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Compute the verdict for `mutation` from its snapshots and CLI result
pub fn verify(
    mutation: &Mutation,
    before: &Snapshot,
    after: &Snapshot,
    cli: &CliResult,
) -> Verification {
    let (basis, reason) = if cli.ok {
        evaluate(mutation, before, after, cli)
    } else {
        (Basis::CliFailed, failure_reason(cli, before != after))
    };

    let warning = (basis == Basis::Unconfirmed).then(|| {
        format!(
            "Possible external tool behavior or schema change: `{}` reported success \
             (exit 0) but the on-disk state does not confirm it ({}).",
            mutation.kind(),
            reason
        )
    });

    Verification {
        verified: basis.is_verified(),
        basis,
        before: before.describe(mutation),
        after: after.describe(mutation),
        reason,
        warning,
    }
}

fn failure_reason(cli: &CliResult, state_changed: bool) -> String {
    let mut reason = if cli.timed_out {
        format!("CLI {}", cli.stderr.trim())
    } else {
        format!("CLI exited with code {}", cli.exit_code)
    };
    if state_changed {
        reason.push_str("; registry state changed anyway (possible partial mutation)");
    }
    reason
}

fn evaluate(
    mutation: &Mutation,
    before: &Snapshot,
    after: &Snapshot,
    cli: &CliResult,
) -> (Basis, String) {
    use Snapshot::{Enabled, Marketplaces, Plugin};

    match (mutation, before, after) {
        (Mutation::Install { .. }, Plugin { rows: b, .. }, Plugin { rows: a, .. }) => {
            if a > b {
                (Basis::StateChanged, format!("install row count increased ({} → {})", b, a))
            } else {
                (Basis::Unconfirmed, format!("install row count did not increase ({} → {})", b, a))
            }
        }

        (Mutation::Uninstall { .. }, Plugin { rows: b, .. }, Plugin { rows: a, .. }) => {
            if a < b {
                (Basis::StateChanged, format!("install row count decreased ({} → {})", b, a))
            } else {
                (Basis::Unconfirmed, format!("install row count did not decrease ({} → {})", b, a))
            }
        }

        (
            Mutation::Update { .. },
            Plugin {
                rows: br,
                version: bv,
                last_updated: bt,
            },
            Plugin {
                rows: ar,
                version: av,
                last_updated: at,
            },
        ) => {
            // Without a canonical row on both sides there is nothing to compare
            if *br == 0 {
                (
                    Basis::Unconfirmed,
                    "plugin was not installed before the call (0 rows)".to_string(),
                )
            } else if *ar == 0 {
                (
                    Basis::Unconfirmed,
                    format!("plugin is no longer installed after the call ({} → 0 rows)", br),
                )
            } else if bv != av {
                (
                    Basis::StateChanged,
                    format!(
                        "installed version changed ({} → {})",
                        bv.as_deref().unwrap_or("none"),
                        av.as_deref().unwrap_or("none")
                    ),
                )
            } else if bt != at {
                (Basis::StateChanged, "last-updated timestamp changed".to_string())
            } else if let Some(phrase) = detect_noop(&cli.combined_output()) {
                (
                    Basis::NoOp,
                    format!("no-op: CLI reported \"{}\"; plugin already current", phrase),
                )
            } else {
                (
                    Basis::Unconfirmed,
                    "version and last-updated timestamp unchanged, and the CLI did not report a no-op"
                        .to_string(),
                )
            }
        }

        (Mutation::Enable { key, .. }, Enabled(b), Enabled(a)) => {
            toggle_verdict(Toggle::Enable, key, *b, *a, cli)
        }

        (Mutation::Disable { key, .. }, Enabled(b), Enabled(a)) => {
            toggle_verdict(Toggle::Disable, key, *b, *a, cli)
        }

        (Mutation::MarketplaceAdd { .. }, Marketplaces(b), Marketplaces(a)) => {
            let added: Vec<&str> = a
                .keys()
                .filter(|k| !b.contains_key(*k))
                .map(String::as_str)
                .collect();
            if added.is_empty() {
                (Basis::Unconfirmed, "no new marketplace key appeared".to_string())
            } else {
                (Basis::StateChanged, format!("marketplace registered: {}", added.join(", ")))
            }
        }

        (Mutation::MarketplaceUpdate { name }, Marketplaces(b), Marketplaces(a)) => {
            let targets: BTreeSet<&String> = match name {
                Some(name) => std::iter::once(name).collect(),
                None => b.keys().chain(a.keys()).collect(),
            };
            let existing: Vec<&String> = targets.into_iter().filter(|t| a.contains_key(*t)).collect();

            if existing.is_empty() {
                return (
                    Basis::Unconfirmed,
                    "no targeted marketplace is registered after the call".to_string(),
                );
            }

            let changed: Vec<&str> = existing
                .iter()
                .filter(|t| b.get(**t) != a.get(**t))
                .map(|t| t.as_str())
                .collect();

            if !changed.is_empty() {
                (Basis::StateChanged, format!("marketplace state changed: {}", changed.join(", ")))
            } else if let Some(phrase) = detect_noop(&cli.combined_output()) {
                (
                    Basis::NoOp,
                    format!("no-op: CLI reported \"{}\"; marketplaces already current", phrase),
                )
            } else {
                (
                    Basis::Unconfirmed,
                    "marketplace state unchanged, and the CLI did not report a no-op".to_string(),
                )
            }
        }

        (Mutation::MarketplaceRemove { name }, Marketplaces(b), Marketplaces(a)) => {
            match (b.contains_key(name), a.contains_key(name)) {
                (true, false) => (Basis::StateChanged, format!("marketplace {} no longer registered", name)),
                (false, _) => (
                    Basis::Unconfirmed,
                    format!("marketplace {} was not registered before the call", name),
                ),
                (true, true) => (
                    Basis::Unconfirmed,
                    format!("marketplace {} is still registered", name),
                ),
            }
        }

        _ => (
            Basis::Unconfirmed,
            "snapshot does not match the mutation kind".to_string(),
        ),
    }
}

fn toggle_verdict(
    toggle: Toggle,
    key: &PluginKey,
    before: Option<bool>,
    after: Option<bool>,
    cli: &CliResult,
) -> (Basis, String) {
    let target = toggle == Toggle::Enable;
    let verb = if target { "enable" } else { "disable" };

    if before != Some(target) && after == Some(target) {
        (
            Basis::StateChanged,
            format!(
                "enabled state changed ({} → {})",
                snapshot::describe_enabled(before),
                snapshot::describe_enabled(after)
            ),
        )
    } else if confirms_toggle(&cli.combined_output(), toggle, key) {
        (
            Basis::OutputConfirmed,
            format!("CLI output confirms {} of {}", verb, key),
        )
    } else {
        (
            Basis::Unconfirmed,
            format!(
                "enabled state did not flip to {} ({} → {}) and the CLI output does not confirm it",
                target,
                snapshot::describe_enabled(before),
                snapshot::describe_enabled(after)
            ),
        )
    }
}
