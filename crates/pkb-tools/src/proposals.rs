//! `propose_change`, `list_proposals`, `withdraw_proposal` (§4.8): thin tool
//! wrappers over `ProposalManager`, the write-mediation layer of §4.7.

use pkb_errors::PkbError;
use pkb_proposals::{ProposalInfo, ProposeResult, StatusFilter};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::ToolContext;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ProposeChangeInput {
    pub target_page: String,
    pub content: String,
    pub title: String,
    pub description: String,
    pub proposed_by: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProposeChangeOutput {
    pub proposal_path: String,
    pub is_new_page: bool,
}

impl From<ProposeResult> for ProposeChangeOutput {
    fn from(result: ProposeResult) -> Self {
        Self {
            proposal_path: result.proposal_path,
            is_new_page: result.is_new_page,
        }
    }
}

pub async fn propose_change(
    ctx: &ToolContext,
    input: ProposeChangeInput,
) -> Result<ProposeChangeOutput, PkbError> {
    ctx.proposals
        .propose(
            &input.target_page,
            &input.content,
            &input.title,
            &input.description,
            &input.proposed_by,
        )
        .map(Into::into)
}

#[derive(Debug, Clone, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilterInput {
    Pending,
    Accepted,
    Rejected,
    #[default]
    All,
}

impl From<StatusFilterInput> for StatusFilter {
    fn from(value: StatusFilterInput) -> Self {
        match value {
            StatusFilterInput::Pending => StatusFilter::Pending,
            StatusFilterInput::Accepted => StatusFilter::Accepted,
            StatusFilterInput::Rejected => StatusFilter::Rejected,
            StatusFilterInput::All => StatusFilter::All,
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProposalInfoOutput {
    pub proposal_path: String,
    pub target_page: String,
    pub title: String,
    pub description: String,
    pub proposed_by: String,
    pub created_at: String,
    pub status: String,
    pub is_new_page: bool,
}

impl From<ProposalInfo> for ProposalInfoOutput {
    fn from(info: ProposalInfo) -> Self {
        Self {
            proposal_path: info.proposal_path,
            target_page: info.target_page,
            title: info.title,
            description: info.description,
            proposed_by: info.proposed_by,
            created_at: info.created_at,
            status: info.status,
            is_new_page: info.is_new_page,
        }
    }
}

pub async fn list_proposals(
    ctx: &ToolContext,
    status_filter: StatusFilterInput,
) -> Result<Vec<ProposalInfoOutput>, PkbError> {
    ctx.proposals
        .list(status_filter.into())
        .map(|items| items.into_iter().map(Into::into).collect())
}

pub async fn withdraw_proposal(ctx: &ToolContext, proposal_path: &str) -> Result<(), PkbError> {
    ctx.proposals.withdraw(proposal_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkb_proposals::ProposalManager;
    use pkb_store::GraphStore;
    use std::fs;

    fn installed_ctx() -> (tempfile::TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Library")).unwrap();
        fs::write(dir.path().join("Library/Proposals.md"), "marker").unwrap();
        let store = GraphStore::open(&dir.path().join("db.sqlite"), false, false, true).unwrap();
        let ctx = ToolContext::new(
            store,
            None,
            dir.path(),
            ProposalManager::new(dir.path(), None),
            false,
        );
        (dir, ctx)
    }

    #[tokio::test]
    async fn given_installed_library_when_proposed_then_listed_as_pending() {
        let (_dir, ctx) = installed_ctx();

        let result = propose_change(
            &ctx,
            ProposeChangeInput {
                target_page: "New.md".to_string(),
                content: "# New".to_string(),
                title: "Add New".to_string(),
                description: "adds a page".to_string(),
                proposed_by: "agent-1".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(result.is_new_page);

        let listed = list_proposals(&ctx, StatusFilterInput::Pending).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].proposal_path, result.proposal_path);

        withdraw_proposal(&ctx, &result.proposal_path).await.unwrap();
        let listed = list_proposals(&ctx, StatusFilterInput::All).await.unwrap();
        assert!(listed.is_empty());
    }
}
