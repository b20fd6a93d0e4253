//! `pkb-server`: the runnable entry point wiring `GraphStore`,
//! `EmbeddingService`, the filesystem watcher/indexer, `ConfigReader`,
//! `ProposalManager`, and `ToolContext` into one process exposing both tool
//! transports (§4.8, §5, §6). CLI parsing and process layout are explicitly
//! out of the "core" per spec.md §1, but a runnable system needs one ambient
//! entry point — this binary is it.

mod cli;
mod health;
mod mcp;
mod rpc;
mod watch_task;

use std::sync::Arc;

use clap::Parser;
use cli::{Args, EmbeddingProviderArg};
use pkb_embeddings::{EmbeddingProvider, EmbeddingService, LocalProvider, ProviderKind, RemoteProvider};
use pkb_proposals::ProposalManager;
use pkb_store::GraphStore;
use pkb_tools::ToolContext;
use pkb_watch::Indexer;
use watch_task::WatchTask;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if let Err(error) = run(args).await {
        tracing::error!(%error, "fatal startup or runtime error");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let db_path = args.resolved_db_path();
    let db_dir = db_path
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(|| args.space_path.clone());

    let embeddings = if args.enable_embeddings {
        Some(Arc::new(build_embedding_service(&args)?))
    } else {
        None
    };

    let writer_store = GraphStore::open(&db_path, false, args.enable_embeddings, true)?;
    let reader_store = GraphStore::open(&db_path, true, args.enable_embeddings, false)?;

    let config_reader = pkb_config::ConfigReader::new(None);
    let config_value = config_reader.evaluate(&args.space_path).await?;
    pkb_config::ConfigReader::persist(&config_value, &db_dir)?;
    let proposals_path_prefix = config_value
        .get("proposals")
        .and_then(|v| v.get("pathPrefix"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let proposals = ProposalManager::new(&args.space_path, proposals_path_prefix);
    let ctx = Arc::new(ToolContext::new(
        reader_store,
        embeddings.clone(),
        &args.space_path,
        proposals,
        args.admin,
    ));

    let mut indexer = Indexer::new(writer_store, &args.space_path, embeddings.clone());
    let config_snapshot_dir = db_dir.clone();
    indexer = indexer.on_config_change(move |source| {
        let reader = pkb_config::ConfigReader::new(None);
        match futures::executor::block_on(reader.evaluate_source(source)) {
            Ok(value) => {
                if let Err(error) = pkb_config::ConfigReader::persist(&value, &config_snapshot_dir) {
                    tracing::warn!(%error, "failed to persist updated space_config.json");
                }
            }
            Err(error) => tracing::warn!(%error, "failed to evaluate updated CONFIG.md"),
        }
    });

    tracing::info!(space_path = %args.space_path.display(), rebuild = args.rebuild, "running initial scan");
    indexer.initial_scan(args.rebuild).await?;

    let watch_task = WatchTask::start(&args.space_path, indexer)?;

    let mcp_service = mcp::build_mcp_service(ctx.clone());
    let mcp_router = axum::Router::new().nest_service("/mcp", mcp_service);
    let mcp_listener = tokio::net::TcpListener::bind(("127.0.0.1", args.mcp_port)).await?;
    tracing::info!(port = args.mcp_port, "http tool surface listening");
    let mcp_server = tokio::spawn(async move {
        if let Err(error) = axum::serve(mcp_listener, mcp_router).await {
            tracing::error!(%error, "http tool surface exited");
        }
    });

    let rpc_ctx = ctx.clone();
    let rpc_port = args.grpc_port;
    let rpc_server = tokio::spawn(async move {
        if let Err(error) = rpc::serve(rpc_ctx, rpc_port).await {
            tracing::error!(%error, "binary rpc tool surface exited");
        }
    });

    let health_server = tokio::spawn(health::serve(args.health_port));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, stopping");

    mcp_server.abort();
    rpc_server.abort();
    health_server.abort();
    watch_task.stop();

    Ok(())
}

fn build_embedding_service(args: &Args) -> anyhow::Result<EmbeddingService> {
    let model = args
        .embedding_model
        .clone()
        .unwrap_or_else(|| args.default_embedding_model());

    let (provider, kind): (Arc<dyn EmbeddingProvider>, ProviderKind) = match args.embedding_provider {
        EmbeddingProviderArg::Remote => (
            Arc::new(RemoteProvider::new(None, None, model)?),
            ProviderKind::Remote,
        ),
        EmbeddingProviderArg::Local => (Arc::new(LocalProvider::new(model)), ProviderKind::Local),
    };

    Ok(EmbeddingService::new(provider, kind))
}
