//! `ProposalManager` (§4.7): gates every mutation behind a marker file,
//! writes reviewable `.proposal` side files, lists and withdraws them.
//! Accept/reject write-back to the real page is out of scope (§4.7 note) —
//! this manager only guarantees proposal-file creation, listing, and removal.

use std::path::PathBuf;

use chrono::Utc;
use pkb_errors::PkbError;
use walkdir::WalkDir;

use crate::path::safe_join;
use crate::types::{ProposalFrontmatter, ProposalInfo, ProposeResult, StatusFilter};

const MARKER_REL_PATH: &str = "Library/Proposals.md";
const DEFAULT_PATH_PREFIX: &str = "_Proposals/";
const PROPOSAL_EXTENSION: &str = ".proposal";

pub struct ProposalManager {
    space_root: PathBuf,
    path_prefix: String,
}

impl ProposalManager {
    pub fn new(space_root: impl Into<PathBuf>, path_prefix: Option<String>) -> Self {
        Self {
            space_root: space_root.into(),
            path_prefix: path_prefix.unwrap_or_else(|| DEFAULT_PATH_PREFIX.to_string()),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.space_root.join(MARKER_REL_PATH).is_file()
    }

    fn require_installed(&self) -> Result<(), PkbError> {
        if self.is_installed() {
            Ok(())
        } else {
            Err(PkbError::LibraryNotInstalled)
        }
    }

    pub fn propose(
        &self,
        target_page: &str,
        content: &str,
        title: &str,
        description: &str,
        proposed_by: &str,
    ) -> Result<ProposeResult, PkbError> {
        self.require_installed()?;

        // Validate containment on both the target page and the computed
        // proposal path before any I/O.
        let target_abs = safe_join(&self.space_root, target_page)?;
        let is_new_page = !target_abs.is_file();

        let stripped = target_page.trim_end_matches(".md");
        let proposal_rel = format!("{}{}{}", self.path_prefix, stripped, PROPOSAL_EXTENSION);
        let proposal_abs = safe_join(&self.space_root, &proposal_rel)?;

        let frontmatter = ProposalFrontmatter {
            kind: "proposal".to_string(),
            tags: vec!["proposal".to_string()],
            target_page: target_page.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            proposed_by: proposed_by.to_string(),
            created_at: Utc::now().to_rfc3339(),
            status: "pending".to_string(),
            is_new_page,
        };

        if let Some(parent) = proposal_abs.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PkbError::Internal(e.into()))?;
        }

        let yaml = serde_yaml::to_string(&frontmatter).map_err(|e| PkbError::Internal(e.into()))?;
        let file_contents = format!("---\n{yaml}---\n{content}");
        std::fs::write(&proposal_abs, file_contents).map_err(|e| PkbError::Internal(e.into()))?;

        Ok(ProposeResult {
            proposal_path: proposal_rel,
            is_new_page,
        })
    }

    pub fn list(&self, status_filter: StatusFilter) -> Result<Vec<ProposalInfo>, PkbError> {
        self.require_installed()?;

        let prefix_abs = safe_join(&self.space_root, &self.path_prefix)?;
        if !prefix_abs.is_dir() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in WalkDir::new(&prefix_abs).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("proposal") {
                continue;
            }

            let contents = match std::fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "failed to read proposal file");
                    continue;
                }
            };
            let Some(frontmatter) = parse_frontmatter(&contents) else {
                tracing::warn!(path = %path.display(), "proposal file missing front-matter");
                continue;
            };

            if !status_filter.matches(&frontmatter.status) {
                continue;
            }

            let rel_path = path
                .strip_prefix(&self.space_root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            out.push(ProposalInfo {
                proposal_path: rel_path,
                target_page: frontmatter.target_page,
                title: frontmatter.title,
                description: frontmatter.description,
                proposed_by: frontmatter.proposed_by,
                created_at: frontmatter.created_at,
                status: frontmatter.status,
                is_new_page: frontmatter.is_new_page,
            });
        }

        Ok(out)
    }

    pub fn withdraw(&self, proposal_path: &str) -> Result<(), PkbError> {
        self.require_installed()?;

        if !proposal_path.ends_with(PROPOSAL_EXTENSION) {
            return Err(PkbError::InvalidQuery(
                "proposal path must end with .proposal".to_string(),
            ));
        }
        let abs = safe_join(&self.space_root, proposal_path)?;
        if !abs.is_file() {
            return Err(PkbError::NotFound(format!("proposal not found: {proposal_path}")));
        }
        std::fs::remove_file(&abs).map_err(|e| PkbError::Internal(e.into()))
    }
}

fn parse_frontmatter(contents: &str) -> Option<ProposalFrontmatter> {
    let rest = contents.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    let yaml = &rest[..end];
    serde_yaml::from_str(yaml).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn installed_space() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Library")).unwrap();
        fs::write(dir.path().join("Library/Proposals.md"), "marker").unwrap();
        dir
    }

    #[test]
    fn given_no_marker_when_proposed_then_library_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ProposalManager::new(dir.path(), None);
        let err = manager
            .propose("X.md", "body", "title", "desc", "agent")
            .unwrap_err();
        assert_eq!(err.kind(), pkb_errors::PkbErrorKind::LibraryNotInstalled);
        assert!(!dir.path().join("_Proposals/X.proposal").exists());
    }

    #[test]
    fn given_marker_present_when_proposed_then_file_written_and_listed_once() {
        let dir = installed_space();
        let manager = ProposalManager::new(dir.path(), None);

        let result = manager
            .propose("X.md", "# new page", "Add X", "adds a page", "agent-1")
            .unwrap();
        assert_eq!(result.proposal_path, "_Proposals/X.proposal");
        assert!(result.is_new_page);
        assert!(dir.path().join("_Proposals/X.proposal").is_file());

        let listed = manager.list(StatusFilter::Pending).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].proposal_path, "_Proposals/X.proposal");
    }

    #[test]
    fn given_traversal_attempt_when_proposed_then_path_traversal() {
        let dir = installed_space();
        let manager = ProposalManager::new(dir.path(), None);
        let err = manager
            .propose("../outside.md", "body", "t", "d", "agent")
            .unwrap_err();
        assert_eq!(err.kind(), pkb_errors::PkbErrorKind::PathTraversal);
    }

    #[test]
    fn given_proposal_when_withdrawn_then_file_removed() {
        let dir = installed_space();
        let manager = ProposalManager::new(dir.path(), None);
        manager.propose("X.md", "body", "t", "d", "agent").unwrap();

        manager.withdraw("_Proposals/X.proposal").unwrap();
        assert!(!dir.path().join("_Proposals/X.proposal").exists());
    }

    #[test]
    fn given_missing_proposal_when_withdrawn_then_not_found() {
        let dir = installed_space();
        let manager = ProposalManager::new(dir.path(), None);
        let err = manager.withdraw("_Proposals/Missing.proposal").unwrap_err();
        assert_eq!(err.kind(), pkb_errors::PkbErrorKind::NotFound);
    }
}
