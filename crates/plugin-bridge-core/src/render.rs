//! Plain-text rendering of query and mutation results
//!
//! Both front-ends show these strings as-is: the MCP server returns them as
//! tool output, the CLI prints them (optionally colored).

use serde::Serialize;

use crate::ops::{MutationReport, UpdateAllReport, UpdateStatus};
use crate::plugin::types::AvailablePlugin;
use crate::query::{InstalledEntry, MarketplaceEntry, PluginInfo, PluginStatus};
use crate::verify::{Basis, Verification};

/// Pretty JSON for any serializable result
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {}\"}}", e))
}

/// Join lines, newline-terminated
fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn enabled_label(enabled: Option<bool>) -> &'static str {
    match enabled {
        Some(true) => "enabled",
        Some(false) => "disabled",
        None => "default",
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// One-word verdict used as the headline tag
pub fn verdict_tag(verification: &Verification) -> &'static str {
    match verification.basis {
        Basis::StateChanged | Basis::OutputConfirmed => "VERIFIED",
        Basis::NoOp => "NO-OP",
        Basis::CliFailed => "FAILED",
        Basis::Unconfirmed => "UNVERIFIED",
    }
}

// ========== Mutations ==========

pub fn mutation_report(report: &MutationReport) -> String {
    let v = &report.verification;
    let mut lines = vec![
        format!("[{}] {} {}", verdict_tag(v), report.operation, report.target),
        format!("Command: {}", report.command),
        format!(
            "Exit code: {}{}",
            report.exit_code,
            if report.timed_out { " (timed out)" } else { "" }
        ),
    ];
    output_block(&mut lines, "Stdout", &report.stdout);
    output_block(&mut lines, "Stderr", &report.stderr);

    lines.push("Verification:".to_string());
    lines.push(format!("  verified: {}", v.verified));
    lines.push(format!("  before: {}", v.before));
    lines.push(format!("  after: {}", v.after));
    lines.push(format!("  reason: {}", v.reason));
    if let Some(warning) = &v.warning {
        lines.push(format!("  warning: {}", warning));
    }
    finish(lines)
}

fn output_block(lines: &mut Vec<String>, label: &str, text: &str) {
    if text.is_empty() {
        lines.push(format!("{}: (empty)", label));
        return;
    }
    lines.push(format!("{}:", label));
    lines.extend(text.lines().map(|line| format!("  {}", line)));
}

pub fn update_all_report(report: &UpdateAllReport) -> String {
    let mut lines = vec![
        format!(
            "Update all: {} updated, {} already latest, {} failed, {} unverified",
            report.plugins_updated,
            report.plugins_already_latest,
            report.plugins_failed,
            report.plugins_unverified
        ),
        format!("overall_verified: {}", report.overall_verified),
        String::new(),
    ];

    match &report.marketplace_update {
        Some(market) => {
            lines.push("== Marketplaces ==".to_string());
            lines.push(mutation_report(market).trim_end().to_string());
        }
        None => lines.push("Marketplaces: none registered, refresh skipped".to_string()),
    }

    if report.plugins.is_empty() {
        lines.push(String::new());
        lines.push("No installed plugins.".to_string());
    }
    for plugin in &report.plugins {
        let status = match plugin.status {
            UpdateStatus::Updated => "updated",
            UpdateStatus::AlreadyLatest => "already latest",
            UpdateStatus::Failed => "failed",
            UpdateStatus::Unverified => "unverified",
        };
        lines.push(String::new());
        lines.push(format!("== {} ({}) ==", plugin.key, status));
        lines.push(mutation_report(&plugin.report).trim_end().to_string());
    }
    finish(lines)
}

// ========== Queries ==========

pub fn search_results(plugins: &[AvailablePlugin]) -> String {
    if plugins.is_empty() {
        return "No plugins found.\n".to_string();
    }

    let mut lines = vec![format!("Found {} plugin(s):", plugins.len())];
    for p in plugins {
        let mut flags = Vec::new();
        if p.installed {
            flags.push(format!(
                "installed {}",
                or_dash(p.installed_version.as_deref())
            ));
            flags.push(enabled_label(p.enabled).to_string());
        }
        if p.installs > 0 {
            flags.push(format!("{} installs", p.installs));
        }

        lines.push(String::new());
        if flags.is_empty() {
            lines.push(p.key.clone());
        } else {
            lines.push(format!("{} [{}]", p.key, flags.join(", ")));
        }
        if let Some(description) = &p.descriptor.description {
            lines.push(format!("  {}", description));
        }
        if let Some(category) = &p.descriptor.category {
            lines.push(format!("  category: {}", category));
        }
    }
    finish(lines)
}

pub fn plugin_info(info: &PluginInfo) -> String {
    let p = &info.plugin;
    let d = &p.descriptor;
    let mut lines = vec![p.key.clone()];

    if !info.in_catalog {
        lines.push("  (not listed in any readable catalog)".to_string());
    }
    lines.push(format!("  Description: {}", or_dash(d.description.as_deref())));
    lines.push(format!("  Version: {}", or_dash(d.version.as_deref())));
    lines.push(format!("  Category: {}", or_dash(d.category.as_deref())));
    lines.push(format!("  Homepage: {}", or_dash(d.homepage.as_deref())));
    if let Some(author) = &d.author {
        lines.push(match &author.email {
            Some(email) => format!("  Author: {} <{}>", author.name, email),
            None => format!("  Author: {}", author.name),
        });
    }
    if !d.tags.is_empty() {
        lines.push(format!("  Tags: {}", d.tags.join(", ")));
    }
    lines.push(format!(
        "  Strict: {}  Skills: {}  LSP: {}",
        d.strict, d.provides_skills, d.provides_lsp
    ));
    lines.push(format!("  Installs: {}", p.installs));
    lines.push(format!("  Enabled: {}", enabled_label(p.enabled)));

    if let Some(market) = &info.marketplace {
        lines.push(format!(
            "  Marketplace: {} ({})",
            market.name,
            market.source.describe()
        ));
    }

    if info.rows.is_empty() {
        lines.push("  Installed: no".to_string());
    } else {
        lines.push(format!("  Installed: {} row(s)", info.rows.len()));
        for (i, row) in info.rows.iter().enumerate() {
            lines.push(format!(
                "    - scope={}{} version={} installed={} updated={}{}",
                row.scope,
                row.project_path
                    .as_deref()
                    .map(|p| format!(" project={}", p))
                    .unwrap_or_default(),
                or_dash(row.version.as_deref()),
                or_dash(row.installed_at.as_deref()),
                or_dash(row.last_updated.as_deref()),
                if i == 0 && info.rows.len() > 1 {
                    " (canonical)"
                } else {
                    ""
                }
            ));
        }
    }
    finish(lines)
}

pub fn installed_list(entries: &[InstalledEntry]) -> String {
    if entries.is_empty() {
        return "No installed plugins match.\n".to_string();
    }

    let mut lines = vec![format!("{} installed plugin(s):", entries.len())];
    for e in entries {
        lines.push(String::new());
        lines.push(format!(
            "{} [{}] version {} ({})",
            e.key,
            enabled_label(e.enabled),
            or_dash(e.canonical.version.as_deref()),
            e.canonical.scope
        ));
        if e.rows > 1 {
            lines.push(format!("  {} install rows; showing the first", e.rows));
        }
        if let Some(updated) = &e.canonical.last_updated {
            lines.push(format!("  updated: {}", updated));
        }
        if let Some(description) = &e.description {
            lines.push(format!("  {}", description));
        }
    }
    finish(lines)
}

pub fn status(status: &PluginStatus) -> String {
    let mut lines = vec![
        format!("Plugin data root: {}", status.plugins_dir.display()),
        format!(
            "Marketplaces: {} registered, {} directories, {} readable catalogs",
            status.marketplaces_registered, status.marketplace_dirs, status.catalogs_readable
        ),
        format!("Catalog plugins: {}", status.catalog_plugins),
        format!(
            "Installed: {} plugin(s), {} row(s)",
            status.installed_keys, status.install_rows
        ),
        format!(
            "Enabled flags: {} enabled, {} disabled",
            status.enabled, status.disabled
        ),
    ];

    let agent = &status.agent_config;
    if !agent.enabled_agents.is_empty() {
        lines.push(format!("Enabled agents: {}", agent.enabled_agents.join(", ")));
    }
    if let Some(mode) = &agent.sync_mode {
        lines.push(format!("Sync mode: {}", mode));
    }
    lines.extend(
        agent
            .other
            .iter()
            .map(|(key, value)| format!("config.{}: {}", key, value)),
    );
    finish(lines)
}

pub fn marketplaces(entries: &[MarketplaceEntry]) -> String {
    if entries.is_empty() {
        return "No marketplaces.\n".to_string();
    }

    let mut lines = vec![format!("{} marketplace(s):", entries.len())];
    for m in entries {
        lines.push(String::new());
        lines.push(format!(
            "{}{}",
            m.name,
            if m.registered { "" } else { " (directory only)" }
        ));
        if let Some(source) = &m.source {
            lines.push(format!("  source: {}", source));
        }
        if m.registered {
            lines.push(format!(
                "  last updated: {}  auto-update: {}",
                or_dash(m.last_updated.as_deref()),
                m.auto_update
            ));
        }
        lines.push(match m.catalog_plugins {
            Some(count) => format!("  catalog: {} plugin(s)", count),
            None => "  catalog: not readable".to_string(),
        });
        if let Some(description) = &m.description {
            lines.push(format!("  {}", description));
        }
    }
    finish(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(basis: Basis, warning: Option<&str>) -> MutationReport {
        MutationReport {
            operation: "install".to_string(),
            target: "y@A".to_string(),
            command: "claude plugin install y@A".to_string(),
            exit_code: 0,
            ok: true,
            timed_out: false,
            stdout: "Installed y@A\nDone".to_string(),
            stderr: String::new(),
            verification: Verification {
                verified: basis.is_verified(),
                basis,
                before: "not installed (0 rows)".to_string(),
                after: "not installed (0 rows)".to_string(),
                reason: "install row count unchanged (0 → 0)".to_string(),
                warning: warning.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_mutation_report_lists_every_field() {
        let text = mutation_report(&report(Basis::Unconfirmed, Some("drift")));
        assert!(text.starts_with("[UNVERIFIED] install y@A"));
        assert!(text.contains("Command: claude plugin install y@A"));
        assert!(text.contains("Exit code: 0\n"));
        assert!(text.contains("Stdout:\n  Installed y@A\n  Done"));
        assert!(text.contains("Stderr: (empty)"));
        assert!(text.contains("verified: false"));
        assert!(text.contains("warning: drift"));
    }

    #[test]
    fn test_mutation_report_without_warning() {
        let text = mutation_report(&report(Basis::StateChanged, None));
        assert!(text.starts_with("[VERIFIED]"));
        assert!(!text.contains("warning:"));
    }

    #[test]
    fn test_json_includes_verification() {
        let json = to_json(&report(Basis::NoOp, None));
        assert!(json.contains("\"basis\": \"no_op\""));
        assert!(!json.contains("\"warning\""));
    }

    #[test]
    fn test_update_all_report_layout() {
        let all = UpdateAllReport {
            marketplace_update: None,
            plugins: vec![crate::ops::PluginUpdate {
                key: "y@A".to_string(),
                status: UpdateStatus::Updated,
                report: report(Basis::StateChanged, None),
            }],
            plugins_updated: 1,
            plugins_already_latest: 0,
            plugins_failed: 0,
            plugins_unverified: 0,
            overall_verified: true,
        };
        let text = update_all_report(&all);
        assert!(text.starts_with(
            "Update all: 1 updated, 0 already latest, 0 failed, 0 unverified\n\
             overall_verified: true\n\n\
             Marketplaces: none registered, refresh skipped\n\n\
             == y@A (updated) ==\n[VERIFIED] install y@A\n"
        ));
        assert!(text.ends_with("reason: install row count unchanged (0 → 0)\n"));
        assert!(!text.ends_with("\n\n"));
    }

    #[test]
    fn test_empty_lists() {
        assert_eq!(search_results(&[]), "No plugins found.\n");
        assert_eq!(marketplaces(&[]), "No marketplaces.\n");
    }
}
