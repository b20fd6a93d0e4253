//! Tool Surface (§4.8, C9) and Library Installer (§4.9, C10): a single
//! `ToolContext` and tool-function set, consumed identically by both
//! transports in `apps/pkb-server` (HTTP/rmcp and the binary RPC codec).

pub mod context;
pub mod library;
pub mod pages;
pub mod proposals;
pub mod schema;
pub mod search_tools;

pub use context::ToolContext;
pub use library::{
    install_library, update_library, InstallLibraryInput, InstallLibraryOutput, UpdateLibraryInput,
    UpdateLibraryOutput,
};
pub use pages::{get_project_context, read_page, ProjectContext, ProjectInfo};
pub use proposals::{
    list_proposals, propose_change, withdraw_proposal, ProposalInfoOutput, ProposeChangeInput,
    ProposeChangeOutput, StatusFilterInput,
};
pub use schema::{get_graph_schema, EdgeSchema, GraphSchema, NodeSchema};
pub use search_tools::{cypher_query, hybrid_search, keyword_search, semantic_search};
