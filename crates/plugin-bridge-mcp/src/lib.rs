//! MCP server exposing Claude Code plugin management as tools
//!
//! Read tools answer from the on-disk registries. Mutating tools go through
//! [`PluginOps`]: the external CLI does the work, and every result carries
//! the command, its output and a verification verdict.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, ErrorData as McpError, Implementation, ProtocolVersion,
    ServerCapabilities, ServerInfo,
};
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use plugin_bridge_core::ops::OpResult;
use plugin_bridge_core::query::{self, ListOptions, ListSort, SearchOptions};
use plugin_bridge_core::{render, CliRunner, InstallScope, PluginOps, PluginRequest};

// ========== Tool parameters ==========

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Words to look for in name, description, category, marketplace, author and tags
    pub query: Option<String>,
    /// Only plugins in this category
    pub category: Option<String>,
    /// Only plugins from this marketplace
    pub marketplace: Option<String>,
    /// Only installed plugins
    pub installed_only: Option<bool>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InfoParams {
    /// Plugin name or name@marketplace
    pub plugin: String,
    /// Marketplace to pick when the name exists in several
    pub marketplace: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListParams {
    /// Only plugins from this marketplace
    pub marketplace: Option<String>,
    /// Only enabled (true) or disabled (false) plugins
    pub enabled: Option<bool>,
    /// Sort order: name, marketplace or updated
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PluginMutationParams {
    /// Plugin name or name@marketplace
    pub plugin: String,
    /// Marketplace to pick when the name exists in several
    pub marketplace: Option<String>,
    /// Scope passed to the CLI: user, project or local
    pub scope: Option<String>,
    /// Project directory the change applies to
    pub project_path: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct UpdateAllParams {
    /// Scope passed to the CLI: user, project or local
    pub scope: Option<String>,
    /// Project directory the updates apply to
    pub project_path: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MarketplaceAddParams {
    /// GitHub owner/repo, git URL, or local path
    pub source: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct MarketplaceUpdateParams {
    /// Marketplace to update; all when omitted
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MarketplaceRemoveParams {
    /// Registered marketplace name
    pub name: String,
}

fn parse_scope(scope: Option<&str>) -> Result<Option<InstallScope>, McpError> {
    scope
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|e: String| McpError::invalid_params(e, None)))
        .transpose()
}

fn project_path(path: Option<String>) -> Option<PathBuf> {
    path.filter(|p| !p.trim().is_empty()).map(PathBuf::from)
}

/// Refusals are tool errors the host can read, never protocol errors
fn respond<T>(result: OpResult<T>, format: impl FnOnce(&T) -> String) -> CallToolResult {
    match result {
        Ok(value) => CallToolResult::success(vec![Content::text(format(&value))]),
        Err(refusal) => CallToolResult::error(vec![Content::text(refusal.to_string())]),
    }
}

// ========== Server ==========

#[derive(Clone)]
pub struct PluginBridgeServer {
    tool_router: ToolRouter<Self>,
    ops: Arc<PluginOps<Box<dyn CliRunner>>>,
    /// Held for the whole snapshot/run/snapshot bracket of each mutation
    mutation_lock: Arc<Mutex<()>>,
}

#[tool_router]
impl PluginBridgeServer {
    pub fn new(ops: PluginOps<Box<dyn CliRunner>>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            ops: Arc::new(ops),
            mutation_lock: Arc::new(Mutex::new(())),
        }
    }

    // ----- read-only -----

    #[tool(
        annotations(read_only_hint = true),
        description = "Search plugins across all marketplace catalogs. Installed plugins come first, then by install count."
    )]
    async fn plugin_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        debug!(?params, "plugin_search");
        let options = SearchOptions {
            query: params.query,
            category: params.category,
            marketplace: params.marketplace,
            installed_only: params.installed_only.unwrap_or(false),
            limit: params.limit,
        };
        let result = query::search(self.ops.registry(), &options);
        Ok(respond(result, |plugins| render::search_results(plugins)))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Show catalog metadata, install rows and enabled state for one plugin. A bare name that exists in several marketplaces returns the candidates."
    )]
    async fn plugin_info(
        &self,
        Parameters(params): Parameters<InfoParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = query::info(
            self.ops.registry(),
            &params.plugin,
            params.marketplace.as_deref(),
        );
        Ok(respond(result, render::plugin_info))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "List installed plugins. Optional filters: marketplace, enabled. Sort by name, marketplace or updated (newest first)."
    )]
    async fn plugin_list(
        &self,
        Parameters(params): Parameters<ListParams>,
    ) -> Result<CallToolResult, McpError> {
        let sort = match params.sort.as_deref() {
            Some(sort) => sort
                .parse::<ListSort>()
                .map_err(|e| McpError::invalid_params(e, None))?,
            None => ListSort::default(),
        };
        let options = ListOptions {
            marketplace: params.marketplace,
            enabled: params.enabled,
            sort,
        };
        let result = query::list_installed(self.ops.registry(), &options);
        Ok(respond(result, |entries| render::installed_list(entries)))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Summarize the Claude Code plugin system: data root, marketplaces, catalogs, installed and enabled counts, config.json."
    )]
    async fn plugin_status(&self) -> Result<CallToolResult, McpError> {
        Ok(respond(query::status(self.ops.registry()), render::status))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "List marketplaces: registered ones and directories present without a registration."
    )]
    async fn marketplace_list(&self) -> Result<CallToolResult, McpError> {
        let result = query::marketplace_list(self.ops.registry());
        Ok(respond(result, |entries| render::marketplaces(entries)))
    }

    // ----- mutating -----

    fn plugin_request(params: PluginMutationParams) -> Result<PluginRequest, McpError> {
        Ok(PluginRequest {
            scope: parse_scope(params.scope.as_deref())?,
            project_path: project_path(params.project_path),
            plugin: params.plugin,
            marketplace: params.marketplace,
        })
    }

    #[tool(
        annotations(open_world_hint = true),
        description = "Install a plugin via the claude CLI, then verify a new install row appeared."
    )]
    async fn plugin_install(
        &self,
        Parameters(params): Parameters<PluginMutationParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = Self::plugin_request(params)?;
        let _guard = self.mutation_lock.lock().await;
        Ok(respond(self.ops.install(&request).await, render::mutation_report))
    }

    #[tool(
        annotations(destructive_hint = true),
        description = "Uninstall a plugin via the claude CLI, then verify an install row disappeared."
    )]
    async fn plugin_uninstall(
        &self,
        Parameters(params): Parameters<PluginMutationParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = Self::plugin_request(params)?;
        let _guard = self.mutation_lock.lock().await;
        Ok(respond(self.ops.uninstall(&request).await, render::mutation_report))
    }

    #[tool(
        annotations(open_world_hint = true),
        description = "Update a plugin via the claude CLI, then verify its version or timestamp changed (or that it was already current)."
    )]
    async fn plugin_update(
        &self,
        Parameters(params): Parameters<PluginMutationParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = Self::plugin_request(params)?;
        let _guard = self.mutation_lock.lock().await;
        Ok(respond(self.ops.update(&request).await, render::mutation_report))
    }

    #[tool(
        annotations(open_world_hint = true),
        description = "Update all marketplaces once, then every installed plugin. Reports updated, already-latest, failed and unverified counts."
    )]
    async fn update_all(
        &self,
        Parameters(params): Parameters<UpdateAllParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = parse_scope(params.scope.as_deref())?;
        let project = project_path(params.project_path);
        let _guard = self.mutation_lock.lock().await;
        let result = self.ops.update_all(scope, project.as_deref()).await;
        Ok(respond(result, render::update_all_report))
    }

    #[tool(description = "Enable a plugin via the claude CLI, then verify its enabled flag.")]
    async fn plugin_enable(
        &self,
        Parameters(params): Parameters<PluginMutationParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = Self::plugin_request(params)?;
        let _guard = self.mutation_lock.lock().await;
        Ok(respond(self.ops.enable(&request).await, render::mutation_report))
    }

    #[tool(description = "Disable a plugin via the claude CLI, then verify its enabled flag.")]
    async fn plugin_disable(
        &self,
        Parameters(params): Parameters<PluginMutationParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = Self::plugin_request(params)?;
        let _guard = self.mutation_lock.lock().await;
        Ok(respond(self.ops.disable(&request).await, render::mutation_report))
    }

    #[tool(
        annotations(open_world_hint = true),
        description = "Register a marketplace via the claude CLI, then verify a new marketplace key appeared."
    )]
    async fn marketplace_add(
        &self,
        Parameters(params): Parameters<MarketplaceAddParams>,
    ) -> Result<CallToolResult, McpError> {
        let _guard = self.mutation_lock.lock().await;
        let result = self.ops.marketplace_add(&params.source).await;
        Ok(respond(result, render::mutation_report))
    }

    #[tool(
        annotations(open_world_hint = true),
        description = "Refresh one marketplace (or all) via the claude CLI, then verify its registry state changed or the CLI reported it current."
    )]
    async fn marketplace_update(
        &self,
        Parameters(params): Parameters<MarketplaceUpdateParams>,
    ) -> Result<CallToolResult, McpError> {
        let _guard = self.mutation_lock.lock().await;
        let result = self.ops.marketplace_update(params.name.as_deref()).await;
        Ok(respond(result, render::mutation_report))
    }

    #[tool(
        annotations(destructive_hint = true),
        description = "Remove a registered marketplace via the claude CLI, then verify it is gone."
    )]
    async fn marketplace_remove(
        &self,
        Parameters(params): Parameters<MarketplaceRemoveParams>,
    ) -> Result<CallToolResult, McpError> {
        let _guard = self.mutation_lock.lock().await;
        let result = self.ops.marketplace_remove(&params.name).await;
        Ok(respond(result, render::mutation_report))
    }
}

#[tool_handler]
impl ServerHandler for PluginBridgeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "plugin-bridge".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Manage Claude Code plugins and marketplaces.\n\
                 READ: plugin_search, plugin_info, plugin_list, plugin_status, marketplace_list read the registries directly.\n\
                 WRITE: plugin_install, plugin_uninstall, plugin_update, update_all, plugin_enable, plugin_disable, \
                 marketplace_add, marketplace_update, marketplace_remove run the claude CLI and re-read the registries.\n\
                 Each write result has a Verification block. A `warning` means the CLI reported success but the \
                 files do not show the change: tell the user instead of assuming success.\n\
                 Plugin identifiers are name@marketplace; a bare name that exists in several marketplaces is refused \
                 with the candidate list."
                    .to_string(),
            ),
        }
    }
}
