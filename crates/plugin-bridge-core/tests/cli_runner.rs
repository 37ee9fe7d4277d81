//! The real process runner against a stand-in `claude` shell script
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use tempfile::TempDir;

use plugin_bridge_core::{ClaudeCli, ClaudeLayout, InstallScope, PluginOps, PluginRegistry, PluginRequest};

const FAKE_CLAUDE: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "1.0.0 (Claude Code)"
    exit 0
fi
if [ "$1 $2" = "plugin install" ]; then
    pwd > "$PLUGINS_DIR/cwd.txt"
    printf '{"version": 2, "plugins": {"%s": [{"scope": "%s"}]}}' "$3" "$5" > "$PLUGINS_DIR/installed_plugins.json"
    echo "Installed $3"
    exit 0
fi
echo "unknown command: $*" >&2
exit 3
"#;

#[tokio::test]
async fn install_through_real_process() {
    let temp = TempDir::new().unwrap();
    let claude = temp.path().join("claude");
    let plugins = claude.join("plugins");
    let project = temp.path().join("project");
    fs::create_dir_all(plugins.join("marketplaces/A/.claude-plugin")).unwrap();
    fs::create_dir_all(&project).unwrap();
    fs::write(
        plugins.join("marketplaces/A/.claude-plugin/marketplace.json"),
        r#"{"plugins": [{"name": "y"}]}"#,
    )
    .unwrap();

    let script = temp.path().join("fake-claude");
    fs::write(&script, FAKE_CLAUDE.replace("$PLUGINS_DIR", &plugins.display().to_string())).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let registry = PluginRegistry::new(ClaudeLayout::from_claude_dir(&claude));
    let cli = ClaudeCli::new(script.display().to_string(), Duration::from_secs(10));
    let ops = PluginOps::new(registry, cli, Duration::from_secs(10));

    let request = PluginRequest {
        plugin: "y".to_string(),
        scope: Some(InstallScope::Project),
        project_path: Some(project.clone()),
        ..Default::default()
    };
    let report = ops.install(&request).await.unwrap();

    assert!(report.ok, "stderr: {}", report.stderr);
    assert_eq!(report.stdout, "Installed y@A");
    assert!(report.command.ends_with("plugin install y@A --scope project"));
    assert!(report.verification.verified);

    let cwd = fs::read_to_string(plugins.join("cwd.txt")).unwrap();
    let cwd = fs::canonicalize(cwd.trim()).unwrap();
    assert_eq!(cwd, fs::canonicalize(&project).unwrap());

    // Unknown subcommands exit non-zero and are never verified
    let report = ops.marketplace_add("acme/plugins").await.unwrap();
    assert!(!report.ok);
    assert_eq!(report.exit_code, 3);
    assert!(report.stderr.contains("unknown command"));
    assert!(!report.verification.verified);
}
