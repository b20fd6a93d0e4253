//! Write mediation (§4.7): every mutation the tool surface accepts goes
//! through a `.proposal` side file instead of touching a real page directly.

pub mod manager;
pub mod path;
pub mod types;

pub use manager::ProposalManager;
pub use path::safe_join;
pub use types::{ProposalFrontmatter, ProposalInfo, ProposeResult, StatusFilter};
