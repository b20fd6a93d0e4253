//! HTTP tool transport (§4.8 transport A): an `rmcp` `tool_router` server
//! wrapping the shared `pkb_tools::ToolContext` — each handler here stays a
//! thin adapter that maps a `PkbError` onto `McpError` and otherwise just
//! calls straight into `pkb-tools`.

use std::sync::Arc;

use pkb_errors::{PkbError, PkbErrorKind};
use pkb_tools::{
    ProjectContext, ProposalInfoOutput, ProposeChangeInput, ProposeChangeOutput, StatusFilterInput,
    ToolContext,
};
use pkb_types::{SearchOptions, SearchResult};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars::JsonSchema,
    tool, tool_handler, tool_router,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ErrorData as McpError, Json, ServerHandler,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Clone)]
pub struct PkbMcpServer {
    ctx: Arc<ToolContext>,
    tool_router: ToolRouter<Self>,
}

impl PkbMcpServer {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl PkbMcpServer {
    #[tool(name = "cypher_query", description = "Run a MATCH/RETURN query over the space graph.")]
    async fn cypher_query(
        &self,
        Parameters(input): Parameters<CypherQueryInput>,
    ) -> Result<Json<Vec<Value>>, McpError> {
        let rows = pkb_tools::cypher_query(&self.ctx, &input.query)
            .await
            .map_err(pkb_error_to_mcp)?;
        Ok(Json(rows))
    }

    #[tool(name = "keyword_search", description = "BM25 keyword search over indexed chunks.")]
    async fn keyword_search(
        &self,
        Parameters(input): Parameters<KeywordSearchInput>,
    ) -> Result<Json<Vec<SearchResult>>, McpError> {
        let results = pkb_tools::keyword_search(&self.ctx, &input.query, input.limit)
            .await
            .map_err(pkb_error_to_mcp)?;
        Ok(Json(results))
    }

    #[tool(name = "semantic_search", description = "Vector similarity search over indexed chunks.")]
    async fn semantic_search(
        &self,
        Parameters(input): Parameters<SemanticSearchInput>,
    ) -> Result<Json<Vec<SearchResult>>, McpError> {
        let results = pkb_tools::semantic_search(&self.ctx, &input.query, &input.options)
            .await
            .map_err(pkb_error_to_mcp)?;
        Ok(Json(results))
    }

    #[tool(name = "hybrid_search", description = "Fused keyword + semantic search over indexed chunks.")]
    async fn hybrid_search(
        &self,
        Parameters(input): Parameters<SemanticSearchInput>,
    ) -> Result<Json<Vec<SearchResult>>, McpError> {
        let results = pkb_tools::hybrid_search(&self.ctx, &input.query, &input.options)
            .await
            .map_err(pkb_error_to_mcp)?;
        Ok(Json(results))
    }

    #[tool(name = "get_graph_schema", description = "Return the fixed node/edge vocabulary of the space graph.")]
    async fn get_graph_schema(&self) -> Result<Json<pkb_tools::GraphSchema>, McpError> {
        Ok(Json(pkb_tools::get_graph_schema()))
    }

    #[tool(name = "read_page", description = "Read a page's raw Markdown content by name.")]
    async fn read_page(
        &self,
        Parameters(input): Parameters<ReadPageInput>,
    ) -> Result<Json<ReadPageOutput>, McpError> {
        let content = pkb_tools::read_page(&self.ctx, &input.page_name)
            .await
            .map_err(pkb_error_to_mcp)?;
        Ok(Json(ReadPageOutput { content }))
    }

    #[tool(
        name = "get_project_context",
        description = "Resolve a project page and its related pages by GitHub remote or folder path."
    )]
    async fn get_project_context(
        &self,
        Parameters(input): Parameters<GetProjectContextInput>,
    ) -> Result<Json<ProjectContext>, McpError> {
        let context = pkb_tools::get_project_context(
            &self.ctx,
            input.github_remote.as_deref(),
            input.folder_path.as_deref(),
        )
        .await
        .map_err(pkb_error_to_mcp)?;
        Ok(Json(context))
    }

    #[tool(name = "propose_change", description = "Write a reviewable proposal for a page change.")]
    async fn propose_change(
        &self,
        Parameters(input): Parameters<ProposeChangeInput>,
    ) -> Result<Json<ProposeChangeOutput>, McpError> {
        let result = pkb_tools::propose_change(&self.ctx, input)
            .await
            .map_err(pkb_error_to_mcp)?;
        Ok(Json(result))
    }

    #[tool(name = "list_proposals", description = "List pending/accepted/rejected proposals.")]
    async fn list_proposals(
        &self,
        Parameters(input): Parameters<ListProposalsInput>,
    ) -> Result<Json<Vec<ProposalInfoOutput>>, McpError> {
        let listed = pkb_tools::list_proposals(&self.ctx, input.status_filter)
            .await
            .map_err(pkb_error_to_mcp)?;
        Ok(Json(listed))
    }

    #[tool(name = "withdraw_proposal", description = "Remove a proposal file without applying it.")]
    async fn withdraw_proposal(
        &self,
        Parameters(input): Parameters<WithdrawProposalInput>,
    ) -> Result<Json<Value>, McpError> {
        pkb_tools::withdraw_proposal(&self.ctx, &input.proposal_path)
            .await
            .map_err(pkb_error_to_mcp)?;
        Ok(Json(json!({ "withdrawn": true })))
    }

    #[tool(name = "install_library", description = "Install a bundled meta-library into the space (admin only).")]
    async fn install_library(
        &self,
        Parameters(input): Parameters<pkb_tools::InstallLibraryInput>,
    ) -> Result<Json<pkb_tools::InstallLibraryOutput>, McpError> {
        let result = pkb_tools::install_library(&self.ctx, input)
            .await
            .map_err(pkb_error_to_mcp)?;
        Ok(Json(result))
    }

    #[tool(name = "update_library", description = "Update an installed meta-library, skipping locally edited files (admin only).")]
    async fn update_library(
        &self,
        Parameters(input): Parameters<pkb_tools::UpdateLibraryInput>,
    ) -> Result<Json<pkb_tools::UpdateLibraryOutput>, McpError> {
        let result = pkb_tools::update_library(&self.ctx, input)
            .await
            .map_err(pkb_error_to_mcp)?;
        Ok(Json(result))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for PkbMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Query, search, and propose changes to a personal knowledge base over graph, \
                 keyword, and semantic tools."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub fn build_mcp_service(ctx: Arc<ToolContext>) -> StreamableHttpService<PkbMcpServer, LocalSessionManager> {
    let session_manager = Arc::new(LocalSessionManager::default());

    StreamableHttpService::new(
        move || Ok(PkbMcpServer::new(ctx.clone())),
        session_manager,
        StreamableHttpServerConfig {
            stateful_mode: true,
            sse_keep_alive: None,
            sse_retry: None,
            ..Default::default()
        },
    )
}

fn pkb_error_to_mcp(error: PkbError) -> McpError {
    let kind = error.kind();
    let message = error.to_string();
    let data = Some(json!({ "code": error.code() }));

    match kind {
        PkbErrorKind::NotFound => McpError::resource_not_found(message, data),
        PkbErrorKind::InvalidQuery | PkbErrorKind::PathTraversal | PkbErrorKind::LibraryNotInstalled => {
            McpError::invalid_params(message, data)
        }
        PkbErrorKind::Timeout => McpError::internal_error(message, data),
        _ => McpError::internal_error(message, data),
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CypherQueryInput {
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct KeywordSearchInput {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SemanticSearchInput {
    pub query: String,
    #[serde(default)]
    pub options: SearchOptions,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadPageInput {
    pub page_name: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReadPageOutput {
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetProjectContextInput {
    pub github_remote: Option<String>,
    pub folder_path: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
pub struct ListProposalsInput {
    #[serde(default)]
    pub status_filter: StatusFilterInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WithdrawProposalInput {
    pub proposal_path: String,
}
