//! CLI flags (§4.8 AMBIENT "Configuration"): `clap` derive API, mirrored by
//! environment variables per §6. `OPENAI_API_KEY` is read directly by the
//! remote embedding provider rather than threaded through here.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
pub enum EmbeddingProviderArg {
    Remote,
    Local,
}

#[derive(Debug, Parser)]
#[command(name = "pkb-server", about = "Personal knowledge base retrieval engine")]
pub struct Args {
    /// Root directory of the Markdown space to index and serve.
    #[arg(long, env = "PKB_SPACE_PATH")]
    pub space_path: PathBuf,

    /// SQLite database path; defaults to `<space_path>/.pkb/db.sqlite`.
    #[arg(long, env = "PKB_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Port for the HTTP (rmcp) tool surface.
    #[arg(long, env = "PKB_MCP_PORT", default_value_t = 7420)]
    pub mcp_port: u16,

    /// Port for the binary RPC tool surface.
    #[arg(long, env = "PKB_GRPC_PORT", default_value_t = 7421)]
    pub grpc_port: u16,

    /// Port for the liveness/readiness health endpoint.
    #[arg(long, env = "PKB_HEALTH_PORT", default_value_t = 7422)]
    pub health_port: u16,

    /// Embedding provider backend.
    #[arg(long, env = "PKB_EMBEDDING_PROVIDER", value_enum, default_value_t = EmbeddingProviderArg::Local)]
    pub embedding_provider: EmbeddingProviderArg,

    /// Embedding model name, passed to the selected provider.
    #[arg(long, env = "PKB_EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    /// Enables embedding generation and the `chunk_vec` vector table.
    #[arg(long, env = "PKB_ENABLE_EMBEDDINGS")]
    pub enable_embeddings: bool,

    /// Drops and rebuilds the store from a full parse of the space before serving.
    #[arg(long, env = "PKB_REBUILD")]
    pub rebuild: bool,

    /// Permits `install_library`/`update_library` tool calls.
    #[arg(long, env = "PKB_ADMIN")]
    pub admin: bool,
}

impl Args {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.space_path.join(".pkb").join("db.sqlite"))
    }

    pub fn default_embedding_model(&self) -> String {
        match self.embedding_provider {
            EmbeddingProviderArg::Remote => "text-embedding-3-small".to_string(),
            EmbeddingProviderArg::Local => "nomic-embed-text".to_string(),
        }
    }
}
