use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Pending,
    Accepted,
    Rejected,
    All,
}

impl StatusFilter {
    pub fn matches(&self, status: &str) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == ProposalStatus::Pending.as_str(),
            StatusFilter::Accepted => status == ProposalStatus::Accepted.as_str(),
            StatusFilter::Rejected => status == ProposalStatus::Rejected.as_str(),
        }
    }
}

/// Front-matter written atop every `.proposal` file, in the exact key order
/// of §6's format block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalFrontmatter {
    #[serde(rename = "type")]
    pub kind: String,
    pub tags: Vec<String>,
    pub target_page: String,
    pub title: String,
    pub description: String,
    pub proposed_by: String,
    pub created_at: String,
    pub status: String,
    pub is_new_page: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposeResult {
    pub proposal_path: String,
    pub is_new_page: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposalInfo {
    pub proposal_path: String,
    pub target_page: String,
    pub title: String,
    pub description: String,
    pub proposed_by: String,
    pub created_at: String,
    pub status: String,
    pub is_new_page: bool,
}
