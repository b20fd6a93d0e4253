//! Binary RPC tool transport (§4.8 transport B): a length-delimited framed
//! TCP socket carrying `bincode`-encoded envelopes, the same framing idiom
//! used across the example pack for custom binary protocols — no gRPC/tonic
//! stack appears anywhere in the five example repos (see DESIGN.md Open
//! Question 4). Carries the same tool set as the HTTP transport in `mcp.rs`,
//! just a different envelope: JSON-encoded tool input/output, framed and
//! `bincode`-wrapped rather than HTTP+SSE.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use pkb_errors::PkbError;
use pkb_tools::ToolContext;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

#[derive(Debug, Serialize, Deserialize)]
struct RpcRequest {
    tool: String,
    input_json: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RpcResponse {
    ok: bool,
    results_json: String,
}

pub async fn serve(ctx: Arc<ToolContext>, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    tracing::info!(port, "binary rpc transport listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_connection(ctx, socket).await {
                tracing::warn!(%peer, %error, "rpc connection ended with error");
            }
        });
    }
}

async fn handle_connection(ctx: Arc<ToolContext>, socket: TcpStream) -> anyhow::Result<()> {
    let mut framed = Framed::new(socket, LengthDelimitedCodec::new());

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let request: RpcRequest = bincode::deserialize(&frame)?;
        let response = dispatch(&ctx, request).await;
        let encoded = bincode::serialize(&response)?;
        framed.send(encoded.into()).await?;
    }
    Ok(())
}

async fn dispatch(ctx: &ToolContext, request: RpcRequest) -> RpcResponse {
    match run_tool(ctx, &request.tool, &request.input_json).await {
        Ok(results_json) => RpcResponse {
            ok: true,
            results_json,
        },
        Err(error) => RpcResponse {
            ok: false,
            results_json: serde_json::json!({ "error": error.to_string(), "code": error.code() })
                .to_string(),
        },
    }
}

async fn run_tool(ctx: &ToolContext, tool: &str, input_json: &str) -> Result<String, PkbError> {
    match tool {
        "cypher_query" => {
            #[derive(Deserialize)]
            struct In {
                query: String,
            }
            let input: In = parse_input(input_json)?;
            let rows = pkb_tools::cypher_query(ctx, &input.query).await?;
            to_json(&rows)
        }
        "keyword_search" => {
            #[derive(Deserialize)]
            struct In {
                query: String,
                limit: Option<usize>,
            }
            let input: In = parse_input(input_json)?;
            let rows = pkb_tools::keyword_search(ctx, &input.query, input.limit).await?;
            to_json(&rows)
        }
        "semantic_search" => {
            #[derive(Deserialize)]
            struct In {
                query: String,
                #[serde(default)]
                options: pkb_types::SearchOptions,
            }
            let input: In = parse_input(input_json)?;
            let rows = pkb_tools::semantic_search(ctx, &input.query, &input.options).await?;
            to_json(&rows)
        }
        "hybrid_search" => {
            #[derive(Deserialize)]
            struct In {
                query: String,
                #[serde(default)]
                options: pkb_types::SearchOptions,
            }
            let input: In = parse_input(input_json)?;
            let rows = pkb_tools::hybrid_search(ctx, &input.query, &input.options).await?;
            to_json(&rows)
        }
        "get_graph_schema" => to_json(&pkb_tools::get_graph_schema()),
        "read_page" => {
            #[derive(Deserialize)]
            struct In {
                page_name: String,
            }
            let input: In = parse_input(input_json)?;
            let content = pkb_tools::read_page(ctx, &input.page_name).await?;
            to_json(&serde_json::json!({ "content": content }))
        }
        "get_project_context" => {
            #[derive(Deserialize)]
            struct In {
                github_remote: Option<String>,
                folder_path: Option<String>,
            }
            let input: In = parse_input(input_json)?;
            let context = pkb_tools::get_project_context(
                ctx,
                input.github_remote.as_deref(),
                input.folder_path.as_deref(),
            )
            .await?;
            to_json(&context)
        }
        "propose_change" => {
            let input: pkb_tools::ProposeChangeInput = parse_input(input_json)?;
            let result = pkb_tools::propose_change(ctx, input).await?;
            to_json(&result)
        }
        "list_proposals" => {
            #[derive(Deserialize, Default)]
            struct In {
                #[serde(default)]
                status_filter: pkb_tools::StatusFilterInput,
            }
            let input: In = parse_input(input_json)?;
            let listed = pkb_tools::list_proposals(ctx, input.status_filter).await?;
            to_json(&listed)
        }
        "withdraw_proposal" => {
            #[derive(Deserialize)]
            struct In {
                proposal_path: String,
            }
            let input: In = parse_input(input_json)?;
            pkb_tools::withdraw_proposal(ctx, &input.proposal_path).await?;
            to_json(&serde_json::json!({ "withdrawn": true }))
        }
        "install_library" => {
            let input: pkb_tools::InstallLibraryInput = parse_input(input_json)?;
            let result = pkb_tools::install_library(ctx, input).await?;
            to_json(&result)
        }
        "update_library" => {
            let input: pkb_tools::UpdateLibraryInput = parse_input(input_json)?;
            let result = pkb_tools::update_library(ctx, input).await?;
            to_json(&result)
        }
        other => Err(PkbError::InvalidQuery(format!("unknown tool: {other}"))),
    }
}

fn parse_input<T: for<'de> Deserialize<'de>>(input_json: &str) -> Result<T, PkbError> {
    serde_json::from_str(input_json)
        .map_err(|error| PkbError::InvalidQuery(format!("invalid tool input: {error}")))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, PkbError> {
    serde_json::to_string(value).map_err(|error| PkbError::Internal(error.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkb_proposals::ProposalManager;
    use pkb_store::GraphStore;

    #[tokio::test]
    async fn given_get_graph_schema_call_when_dispatched_then_edges_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("db.sqlite"), false, false, true).unwrap();
        let ctx = ToolContext::new(store, None, dir.path(), ProposalManager::new(dir.path(), None), false);

        let response = dispatch(
            &ctx,
            RpcRequest {
                tool: "get_graph_schema".to_string(),
                input_json: "{}".to_string(),
            },
        )
        .await;
        assert!(response.ok);
        assert!(response.results_json.contains("FOLDER_CONTAINS_PAGE"));
    }

    #[tokio::test]
    async fn given_unknown_tool_when_dispatched_then_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("db.sqlite"), false, false, true).unwrap();
        let ctx = ToolContext::new(store, None, dir.path(), ProposalManager::new(dir.path(), None), false);

        let response = dispatch(
            &ctx,
            RpcRequest {
                tool: "not_a_real_tool".to_string(),
                input_json: "{}".to_string(),
            },
        )
        .await;
        assert!(!response.ok);
        assert!(response.results_json.contains("INVALID_QUERY"));
    }
}
