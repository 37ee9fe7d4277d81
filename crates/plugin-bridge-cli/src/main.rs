use std::io;
use std::path::Path;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use plugin_bridge_core::config::{resolve_base_dir, Config, LOG_ENV};
use plugin_bridge_core::query::{self, ListOptions, SearchOptions};
use plugin_bridge_core::{
    render, BridgeError, ClaudeCli, MutationReport, PluginOps, PluginRegistry, PluginRequest,
    Result,
};

mod args;
use args::{Cli, Commands, ConfigAction, MarketplaceAction, PluginTarget, Shell};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base_dir = resolve_base_dir(cli.base_dir);
    let json = cli.json;

    let result = match cli.command {
        Commands::Config { action } => handle_config(action, &base_dir),
        Commands::Completions { shell } => {
            handle_completions(shell);
            Ok(())
        }
        command => run(command, &base_dir, json).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,plugin_bridge_core=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "plugin-bridge", &mut io::stdout());
}

fn handle_config(action: ConfigAction, base_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load(base_dir)?;
            match config.get(&key) {
                Some(value) => {
                    println!("{}", value);
                }
                None => {
                    return Err(BridgeError::ConfigKeyNotFound { key });
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load(base_dir)?;
            config.set(&key, &value)?;
            config.save(base_dir)?;
            println!("{} {} = {}", "Set:".green(), key, value);
        }
        ConfigAction::List => {
            let config = Config::load(base_dir)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            let path = Config::path(base_dir);
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            let path = Config::init(base_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}

/// Print `value` as JSON, or as the rendered text
fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) {
    if json {
        println!("{}", render::to_json(value));
    } else {
        print!("{}", text(value));
    }
}

async fn run(command: Commands, base_dir: &Path, json: bool) -> Result<()> {
    let config = Config::load(base_dir)?;
    let ops = PluginOps::from_config(&config)?;
    let registry = ops.registry();

    match command {
        Commands::Search {
            query,
            category,
            marketplace,
            installed,
            limit,
        } => {
            let options = SearchOptions {
                query: (!query.is_empty()).then(|| query.join(" ")),
                category,
                marketplace,
                installed_only: installed,
                limit,
            };
            let plugins = query::search(registry, &options)?;
            emit(json, &plugins, |p| render::search_results(p));
        }
        Commands::Info {
            plugin,
            marketplace,
        } => {
            let info = query::info(registry, &plugin, marketplace.as_deref())?;
            emit(json, &info, render::plugin_info);
        }
        Commands::List {
            marketplace,
            enabled,
            disabled,
            sort,
        } => {
            let options = ListOptions {
                marketplace,
                enabled: match (enabled, disabled) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                sort,
            };
            let entries = query::list_installed(registry, &options)?;
            emit(json, &entries, |e| render::installed_list(e));
        }
        Commands::Status => {
            let status = query::status(registry)?;
            emit(json, &status, render::status);
        }
        Commands::Install(target) => {
            let report = ops.install(&request(target)).await?;
            finish_mutation(json, &report)?;
        }
        Commands::Uninstall(target) => {
            let report = ops.uninstall(&request(target)).await?;
            finish_mutation(json, &report)?;
        }
        Commands::Update(target) => {
            let report = ops.update(&request(target)).await?;
            finish_mutation(json, &report)?;
        }
        Commands::Enable(target) => {
            let report = ops.enable(&request(target)).await?;
            finish_mutation(json, &report)?;
        }
        Commands::Disable(target) => {
            let report = ops.disable(&request(target)).await?;
            finish_mutation(json, &report)?;
        }
        Commands::UpdateAll { scope, project } => {
            let report = ops.update_all(scope, project.as_deref()).await?;
            if json {
                println!("{}", render::to_json(&report));
            } else {
                print_colored_report(&render::update_all_report(&report));
            }
            if !report.overall_verified {
                return Err(BridgeError::NotVerified {
                    operation: "update-all".to_string(),
                    reason: format!(
                        "{} failed, {} unverified",
                        report.plugins_failed, report.plugins_unverified
                    ),
                });
            }
        }
        Commands::Marketplace { action } => {
            handle_marketplace(action, &ops, registry, json).await?;
        }
        Commands::Config { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

async fn handle_marketplace(
    action: MarketplaceAction,
    ops: &PluginOps<ClaudeCli>,
    registry: &PluginRegistry,
    json: bool,
) -> Result<()> {
    let report = match action {
        MarketplaceAction::List => {
            let entries = query::marketplace_list(registry)?;
            emit(json, &entries, |e| render::marketplaces(e));
            return Ok(());
        }
        MarketplaceAction::Add { source } => ops.marketplace_add(&source).await?,
        MarketplaceAction::Update { name } => ops.marketplace_update(name.as_deref()).await?,
        MarketplaceAction::Remove { name } => ops.marketplace_remove(&name).await?,
    };
    finish_mutation(json, &report)
}

fn request(target: PluginTarget) -> PluginRequest {
    PluginRequest {
        plugin: target.plugin,
        marketplace: target.marketplace,
        scope: target.scope,
        project_path: target.project,
    }
}

/// Print a mutation report; an unverified mutation exits non-zero
fn finish_mutation(json: bool, report: &MutationReport) -> Result<()> {
    if json {
        println!("{}", render::to_json(report));
    } else {
        print_colored_report(&render::mutation_report(report));
    }

    if report.verification.verified {
        Ok(())
    } else {
        Err(BridgeError::NotVerified {
            operation: format!("{} {}", report.operation, report.target),
            reason: report.verification.reason.clone(),
        })
    }
}

/// Color the `[TAG]` headlines and warning lines of rendered reports
fn print_colored_report(text: &str) {
    for line in text.lines() {
        let trimmed = line.trim_start();
        if line.starts_with("[VERIFIED]") || line.starts_with("[NO-OP]") {
            println!("{}", line.green().bold());
        } else if line.starts_with("[UNVERIFIED]") {
            println!("{}", line.yellow().bold());
        } else if line.starts_with("[FAILED]") {
            println!("{}", line.red().bold());
        } else if trimmed.starts_with("warning:") {
            println!("{}", line.yellow());
        } else if line.starts_with("== ") {
            println!("{}", line.cyan().bold());
        } else {
            println!("{}", line);
        }
    }
}
