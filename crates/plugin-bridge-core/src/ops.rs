//! Verified mutations
//!
//! Every mutating operation follows the same bracket: check preconditions,
//! resolve the target, snapshot the relevant registry slice, run the
//! external CLI once, snapshot again and compute a verdict. Nothing is
//! retried.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::bridge::command::Mutation;
use crate::bridge::runner::{ClaudeCli, CliRunner, RunOptions};
use crate::config::Config;
use crate::error::Refusal;
use crate::plugin::catalog::resolve_in_registry;
use crate::plugin::registry::PluginRegistry;
use crate::plugin::types::{InstallScope, PluginKey};
use crate::verify::{verify, Basis, Snapshot, Verification};

pub type OpResult<T> = std::result::Result<T, Refusal>;

/// Plugin identifier as a user supplied it, plus per-call options
#[derive(Debug, Clone, Default)]
pub struct PluginRequest {
    /// `name` or `name@marketplace`
    pub plugin: String,
    /// Marketplace hint for a bare name
    pub marketplace: Option<String>,
    pub scope: Option<InstallScope>,
    /// Project the call acts on (CLI working directory and project settings)
    pub project_path: Option<PathBuf>,
}

impl PluginRequest {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            ..Default::default()
        }
    }
}

/// Everything a front-end reports about one delegated mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    pub operation: String,
    pub target: String,
    pub command: String,
    pub exit_code: i32,
    pub ok: bool,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub verification: Verification,
}

/// Per-plugin classification inside `update_all`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Updated,
    AlreadyLatest,
    Failed,
    Unverified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginUpdate {
    pub key: String,
    pub status: UpdateStatus,
    pub report: MutationReport,
}

/// Aggregate result of updating every marketplace and installed plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateAllReport {
    /// `None` when no marketplace is registered
    pub marketplace_update: Option<MutationReport>,
    pub plugins: Vec<PluginUpdate>,
    pub plugins_updated: usize,
    pub plugins_already_latest: usize,
    pub plugins_failed: usize,
    pub plugins_unverified: usize,
    /// No plugin failed and none is unverified
    pub overall_verified: bool,
}

/// Mutating operations over a registry and an external CLI runner
pub struct PluginOps<R: CliRunner> {
    registry: PluginRegistry,
    runner: R,
    timeout: Duration,
}

impl<R: CliRunner> PluginOps<R> {
    pub fn new(registry: PluginRegistry, runner: R, timeout: Duration) -> Self {
        Self {
            registry,
            runner,
            timeout,
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    // ========== Preconditions ==========

    fn require_plugin_system(&self) -> OpResult<()> {
        if self.registry.is_available() {
            Ok(())
        } else {
            Err(Refusal::PluginSystemUnavailable {
                plugins_dir: self.registry.plugins_dir().to_path_buf(),
            })
        }
    }

    async fn require_cli(&self) -> OpResult<()> {
        self.runner
            .probe()
            .await
            .map_err(|detail| Refusal::CliUnavailable {
                binary: self.runner.binary().to_string(),
                detail,
            })
    }

    fn resolve(&self, request: &PluginRequest) -> OpResult<PluginKey> {
        let registry = self.registry.for_project(request.project_path.as_deref());
        resolve_in_registry(&registry, &request.plugin, request.marketplace.as_deref())
            .into_key(&request.plugin)
    }

    fn require_plain_operands(mutation: &Mutation) -> OpResult<()> {
        match mutation.option_like_operand() {
            Some(value) => Err(Refusal::OptionLikeOperand { value }),
            None => Ok(()),
        }
    }

    fn require_marketplace(&self, name: &str) -> OpResult<()> {
        if self.registry.known_marketplaces().contains_key(name) {
            Ok(())
        } else {
            Err(Refusal::MarketplaceNotFound {
                name: name.to_string(),
            })
        }
    }

    // ========== The bracket ==========

    /// Snapshot, run, snapshot, verify. Preconditions are the caller's job.
    pub async fn execute(&self, mutation: &Mutation, project: Option<&Path>) -> MutationReport {
        let registry = self.registry.for_project(project);
        let options = RunOptions {
            cwd: project.map(Path::to_path_buf),
            timeout: self.timeout,
        };

        let before = Snapshot::capture(&registry, mutation);
        let cli = self.runner.run(&mutation.args(), &options).await;
        // The CLI may have changed state even when it failed or timed out
        let after = Snapshot::capture(&registry, mutation);
        let verification = verify(mutation, &before, &after, &cli);

        let target = target_label(mutation);
        match (&verification.basis, &verification.warning) {
            (_, Some(warning)) => warn!(operation = %mutation.kind(), %target, "{}", warning),
            (Basis::CliFailed, None) => warn!(
                operation = %mutation.kind(),
                %target,
                exit_code = cli.exit_code,
                "external CLI failed"
            ),
            _ => info!(
                operation = %mutation.kind(),
                %target,
                reason = %verification.reason,
                "mutation verified"
            ),
        }

        MutationReport {
            operation: mutation.kind().to_string(),
            target,
            command: cli.command,
            exit_code: cli.exit_code,
            ok: cli.ok,
            timed_out: cli.timed_out,
            stdout: cli.stdout.trim().to_string(),
            stderr: cli.stderr.trim().to_string(),
            verification,
        }
    }

    async fn plugin_mutation<F>(&self, request: &PluginRequest, build: F) -> OpResult<MutationReport>
    where
        F: FnOnce(PluginKey, Option<InstallScope>) -> Mutation,
    {
        self.require_plugin_system()?;
        let key = self.resolve(request)?;
        let mutation = build(key, request.scope);
        Self::require_plain_operands(&mutation)?;
        self.require_cli().await?;

        Ok(self
            .execute(&mutation, request.project_path.as_deref())
            .await)
    }

    // ========== Plugins ==========

    pub async fn install(&self, request: &PluginRequest) -> OpResult<MutationReport> {
        self.plugin_mutation(request, |key, scope| Mutation::Install { key, scope })
            .await
    }

    pub async fn uninstall(&self, request: &PluginRequest) -> OpResult<MutationReport> {
        self.plugin_mutation(request, |key, scope| Mutation::Uninstall { key, scope })
            .await
    }

    pub async fn update(&self, request: &PluginRequest) -> OpResult<MutationReport> {
        self.plugin_mutation(request, |key, scope| Mutation::Update { key, scope })
            .await
    }

    pub async fn enable(&self, request: &PluginRequest) -> OpResult<MutationReport> {
        self.plugin_mutation(request, |key, scope| Mutation::Enable { key, scope })
            .await
    }

    pub async fn disable(&self, request: &PluginRequest) -> OpResult<MutationReport> {
        self.plugin_mutation(request, |key, scope| Mutation::Disable { key, scope })
            .await
    }

    /// Refresh marketplaces once, then update every installed plugin
    pub async fn update_all(
        &self,
        scope: Option<InstallScope>,
        project: Option<&Path>,
    ) -> OpResult<UpdateAllReport> {
        self.require_plugin_system()?;
        self.require_cli().await?;

        let marketplace_update = if self.registry.known_marketplaces().is_empty() {
            None
        } else {
            Some(
                self.execute(&Mutation::MarketplaceUpdate { name: None }, project)
                    .await,
            )
        };

        let keys = self
            .registry
            .for_project(project)
            .installed_plugins()
            .installed_keys();

        let mut plugins = Vec::with_capacity(keys.len());
        for raw_key in keys {
            let Some(key) = PluginKey::parse(&raw_key) else {
                warn!(key = %raw_key, "skipping malformed installed plugin key");
                continue;
            };
            let mutation = Mutation::Update { key, scope };
            if Self::require_plain_operands(&mutation).is_err() {
                warn!(key = %raw_key, "skipping installed plugin key that starts with '-'");
                continue;
            }
            let report = self.execute(&mutation, project).await;
            let status = classify_update(&report);
            plugins.push(PluginUpdate {
                key: raw_key,
                status,
                report,
            });
        }

        let count = |status: UpdateStatus| plugins.iter().filter(|p| p.status == status).count();
        let plugins_updated = count(UpdateStatus::Updated);
        let plugins_already_latest = count(UpdateStatus::AlreadyLatest);
        let plugins_failed = count(UpdateStatus::Failed);
        let plugins_unverified = count(UpdateStatus::Unverified);

        info!(
            plugins_updated,
            plugins_already_latest, plugins_failed, plugins_unverified, "update_all finished"
        );

        Ok(UpdateAllReport {
            marketplace_update,
            plugins_updated,
            plugins_already_latest,
            plugins_failed,
            plugins_unverified,
            overall_verified: plugins_failed == 0 && plugins_unverified == 0,
            plugins,
        })
    }

    // ========== Marketplaces ==========

    pub async fn marketplace_add(&self, source: &str) -> OpResult<MutationReport> {
        self.require_plugin_system()?;
        let mutation = Mutation::MarketplaceAdd {
            source: source.trim().to_string(),
        };
        Self::require_plain_operands(&mutation)?;
        self.require_cli().await?;

        Ok(self.execute(&mutation, None).await)
    }

    /// Update one marketplace, or all of them when `name` is `None`
    pub async fn marketplace_update(&self, name: Option<&str>) -> OpResult<MutationReport> {
        self.require_plugin_system()?;
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        if let Some(name) = name {
            self.require_marketplace(name)?;
        }
        let mutation = Mutation::MarketplaceUpdate {
            name: name.map(str::to_string),
        };
        Self::require_plain_operands(&mutation)?;
        self.require_cli().await?;

        Ok(self.execute(&mutation, None).await)
    }

    pub async fn marketplace_remove(&self, name: &str) -> OpResult<MutationReport> {
        self.require_plugin_system()?;
        let name = name.trim();
        self.require_marketplace(name)?;
        let mutation = Mutation::MarketplaceRemove {
            name: name.to_string(),
        };
        Self::require_plain_operands(&mutation)?;
        self.require_cli().await?;

        Ok(self.execute(&mutation, None).await)
    }
}

impl PluginOps<ClaudeCli> {
    /// Operations against the real CLI, as configured
    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        let registry = PluginRegistry::new(config.layout()?);
        let cli = ClaudeCli::new(&config.cli.binary, config.cli.probe_timeout());
        Ok(Self::new(registry, cli, config.cli.timeout()))
    }
}

fn target_label(mutation: &Mutation) -> String {
    match mutation {
        Mutation::MarketplaceAdd { source } => source.clone(),
        Mutation::MarketplaceUpdate { name } => name.clone().unwrap_or_else(|| "all".to_string()),
        Mutation::MarketplaceRemove { name } => name.clone(),
        other => other
            .plugin_key()
            .map(ToString::to_string)
            .unwrap_or_default(),
    }
}

fn classify_update(report: &MutationReport) -> UpdateStatus {
    match report.verification.basis {
        Basis::CliFailed => UpdateStatus::Failed,
        Basis::StateChanged | Basis::OutputConfirmed => UpdateStatus::Updated,
        Basis::NoOp => UpdateStatus::AlreadyLatest,
        Basis::Unconfirmed => UpdateStatus::Unverified,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::bridge::runner::CliResult;
    use crate::plugin::registry::testing::Fixture;

    /// Runner that records calls and answers from a closure
    struct FakeRunner<F> {
        available: bool,
        calls: Mutex<Vec<Vec<String>>>,
        respond: F,
    }

    impl<F> FakeRunner<F>
    where
        F: Fn(&[String]) -> CliResult + Send + Sync,
    {
        fn new(respond: F) -> Self {
            Self {
                available: true,
                calls: Mutex::new(Vec::new()),
                respond,
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<F> CliRunner for FakeRunner<F>
    where
        F: Fn(&[String]) -> CliResult + Send + Sync,
    {
        fn binary(&self) -> &str {
            "claude"
        }

        async fn run(&self, args: &[String], _options: &RunOptions) -> CliResult {
            self.calls.lock().unwrap().push(args.to_vec());
            (self.respond)(args)
        }

        async fn probe(&self) -> std::result::Result<(), String> {
            if self.available {
                Ok(())
            } else {
                Err("not on PATH".to_string())
            }
        }
    }

    fn ok(args: &[String]) -> CliResult {
        CliResult::exited(args.join(" "), 0, "done".to_string(), String::new())
    }

    fn fixture() -> Fixture {
        let fx = Fixture::new();
        fx.write(
            "known_marketplaces.json",
            r#"{"A": {"source": {"source": "github", "repo": "a/a"}, "lastUpdated": "t0"}}"#,
        );
        fx.write_catalog("A", r#"{"plugins": [{"name": "y"}, {"name": "z"}]}"#);
        fx
    }

    fn ops<F>(fx: &Fixture, runner: FakeRunner<F>) -> PluginOps<FakeRunner<F>>
    where
        F: Fn(&[String]) -> CliResult + Send + Sync,
    {
        PluginOps::new(fx.registry.clone(), runner, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_unavailable_plugin_system_short_circuits() {
        let temp = tempfile::TempDir::new().unwrap();
        let registry = PluginRegistry::with_dir(temp.path().join("missing"), temp.path().join("s.json"));
        let ops = PluginOps::new(registry, FakeRunner::new(ok), Duration::from_secs(5));

        let refusal = ops.install(&PluginRequest::new("y@A")).await.unwrap_err();
        assert!(matches!(refusal, Refusal::PluginSystemUnavailable { .. }));
        assert!(ops.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_cli_unavailable_never_runs_mutation() {
        let fx = fixture();
        let mut runner = FakeRunner::new(ok);
        runner.available = false;
        let ops = ops(&fx, runner);

        let refusal = ops.install(&PluginRequest::new("y@A")).await.unwrap_err();
        assert!(matches!(refusal, Refusal::CliUnavailable { ref binary, .. } if binary == "claude"));
        assert!(ops.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_plugin_refused_before_cli() {
        let fx = fixture();
        let ops = ops(&fx, FakeRunner::new(ok));
        let refusal = ops.install(&PluginRequest::new("nope")).await.unwrap_err();
        assert_eq!(
            refusal,
            Refusal::PluginNotFound {
                query: "nope".to_string()
            }
        );
        assert!(ops.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_install_success_with_row_increase() {
        let fx = fixture();
        let plugins_dir = fx.plugins_dir().to_path_buf();
        let runner = FakeRunner::new(move |args: &[String]| {
            std::fs::write(
                plugins_dir.join("installed_plugins.json"),
                r#"{"version": 2, "plugins": {"y@A": [{"scope": "user", "version": "1.0.0"}]}}"#,
            )
            .unwrap();
            ok(args)
        });
        let ops = ops(&fx, runner);

        let mut request = PluginRequest::new("y");
        request.scope = Some(InstallScope::User);
        let report = ops.install(&request).await.unwrap();

        assert_eq!(
            ops.runner().calls(),
            vec![vec!["plugin", "install", "y@A", "--scope", "user"]]
        );
        assert!(report.verification.verified);
        assert_eq!(report.target, "y@A");
        assert_eq!(report.stdout, "done");
    }

    #[tokio::test]
    async fn test_enable_without_state_change_warns() {
        let fx = fixture();
        fx.write_user_settings(r#"{"enabledPlugins": {"y@A": false}}"#);
        let ops = ops(&fx, FakeRunner::new(ok));

        let report = ops.enable(&PluginRequest::new("y@A")).await.unwrap();
        assert!(report.ok);
        assert!(!report.verification.verified);
        assert!(report.verification.warning.is_some());
    }

    #[tokio::test]
    async fn test_marketplace_remove_unknown_refused() {
        let fx = fixture();
        let ops = ops(&fx, FakeRunner::new(ok));
        let refusal = ops.marketplace_remove("B").await.unwrap_err();
        assert!(matches!(refusal, Refusal::MarketplaceNotFound { .. }));
        assert!(ops.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_option_like_operands_never_reach_cli() {
        let fx = fixture();
        fx.write(
            "known_marketplaces.json",
            r#"{"A": {"source": {"source": "github", "repo": "a/a"}}, "--force": {}}"#,
        );
        fx.write_catalog("A", r#"{"plugins": [{"name": "y"}, {"name": "--help"}]}"#);
        let ops = ops(&fx, FakeRunner::new(ok));

        let refusal = ops.marketplace_add("--help").await.unwrap_err();
        assert_eq!(
            refusal,
            Refusal::OptionLikeOperand {
                value: "--help".to_string()
            }
        );
        assert!(matches!(
            ops.marketplace_remove("--force").await,
            Err(Refusal::OptionLikeOperand { .. })
        ));
        assert!(matches!(
            ops.install(&PluginRequest::new("--help@A")).await,
            Err(Refusal::OptionLikeOperand { .. })
        ));
        assert!(ops.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_project_path_scopes_snapshots() {
        let fx = fixture();
        let project = fx.project_dir();
        let settings = project.join(".claude").join("settings.json");
        let runner = FakeRunner::new(move |args: &[String]| {
            std::fs::create_dir_all(settings.parent().unwrap()).unwrap();
            std::fs::write(&settings, r#"{"enabledPlugins": {"z@A": false}}"#).unwrap();
            ok(args)
        });
        let ops = ops(&fx, runner);

        let request = PluginRequest {
            plugin: "z@A".to_string(),
            scope: Some(InstallScope::Project),
            project_path: Some(fx.project_dir()),
            ..Default::default()
        };
        let report = ops.disable(&request).await.unwrap();
        assert!(report.verification.verified);
        assert_eq!(report.verification.after, "disabled");
    }

    #[tokio::test]
    async fn test_update_all_without_marketplaces_or_plugins() {
        let fx = Fixture::new();
        let ops = ops(&fx, FakeRunner::new(ok));
        let report = ops.update_all(None, None).await.unwrap();
        assert!(report.marketplace_update.is_none());
        assert!(report.plugins.is_empty());
        assert!(report.overall_verified);
        assert!(ops.runner().calls().is_empty());
    }
}
