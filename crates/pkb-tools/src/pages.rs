//! `read_page` and `get_project_context` (§4.8).

use std::collections::HashSet;
use std::path::Path;

use pkb_errors::PkbError;
use pkb_parser::files::collect_markdown_files;
use pkb_parser::frontmatter::{parse_frontmatter, split_frontmatter};
use pkb_proposals::safe_join;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::context::ToolContext;

pub async fn read_page(ctx: &ToolContext, page_name: &str) -> Result<String, PkbError> {
    let rel_path = if page_name.ends_with(".md") {
        page_name.to_string()
    } else {
        format!("{page_name}.md")
    };
    let abs_path = safe_join(ctx.space_root(), &rel_path)?;
    tokio::fs::read_to_string(&abs_path)
        .await
        .map_err(|_| PkbError::NotFound(format!("page not found: {page_name}")))
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProjectInfo {
    pub file: String,
    pub github: Option<String>,
    pub tags: Vec<String>,
    pub concerns: Vec<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProjectContext {
    pub project: ProjectInfo,
    pub related_pages: Vec<String>,
}

const MAX_RELATED_PAGES: usize = 20;

/// Mode A (`github_remote`) walks every `.md` file for the first whose
/// front-matter `github` field equals the argument. Mode B (`folder_path`)
/// tries `folder_path + ".md"` as a sibling index page, else the first `.md`
/// file inside that folder carrying any front-matter at all.
pub async fn get_project_context(
    ctx: &ToolContext,
    github_remote: Option<&str>,
    folder_path: Option<&str>,
) -> Result<ProjectContext, PkbError> {
    match (github_remote, folder_path) {
        (Some(_), Some(_)) | (None, None) => {
            return Err(PkbError::InvalidQuery(
                "exactly one of github_remote or folder_path must be given".to_string(),
            ));
        }
        _ => {}
    }

    if let Some(github_remote) = github_remote {
        find_by_github_remote(ctx.space_root(), github_remote).await
    } else {
        let folder_path = folder_path.expect("checked above");
        find_by_folder(ctx.space_root(), folder_path).await
    }
}

async fn find_by_github_remote(space_root: &Path, github_remote: &str) -> Result<ProjectContext, PkbError> {
    let files = collect_markdown_files(space_root).map_err(PkbError::Internal)?;
    for file in &files {
        let Ok(raw) = std::fs::read_to_string(&file.abs_path) else {
            continue;
        };
        let (yaml, _body) = split_frontmatter(&raw);
        let Some(yaml) = yaml else { continue };
        let frontmatter = parse_frontmatter(&yaml);
        let Some(github) = frontmatter.get("github").and_then(Value::as_str) else {
            continue;
        };
        if github == github_remote {
            let project = project_info_from(&file.rel_path, &frontmatter, &raw);
            let related = related_pages(space_root, &file.rel_path);
            return Ok(ProjectContext {
                project,
                related_pages: related,
            });
        }
    }
    Err(PkbError::NotFound(format!(
        "no page with github remote {github_remote}"
    )))
}

async fn find_by_folder(space_root: &Path, folder_path: &str) -> Result<ProjectContext, PkbError> {
    let folder_abs = safe_join(space_root, folder_path)?;

    let index_rel = format!("{folder_path}.md");
    let index_abs = safe_join(space_root, &index_rel)?;
    if let Ok(raw) = std::fs::read_to_string(&index_abs) {
        let (yaml, _body) = split_frontmatter(&raw);
        let frontmatter = yaml.map(|y| parse_frontmatter(&y)).unwrap_or_default();
        let project = project_info_from(&index_rel, &frontmatter, &raw);
        let related = related_pages(space_root, &index_rel);
        return Ok(ProjectContext {
            project,
            related_pages: related,
        });
    }

    if folder_abs.is_dir() {
        let files = collect_markdown_files(&folder_abs).map_err(PkbError::Internal)?;
        for file in &files {
            let Ok(raw) = std::fs::read_to_string(&file.abs_path) else {
                continue;
            };
            let (yaml, _body) = split_frontmatter(&raw);
            let Some(yaml) = yaml else { continue };
            let frontmatter = parse_frontmatter(&yaml);
            if !frontmatter.as_object().map(|o| !o.is_empty()).unwrap_or(false) {
                continue;
            }
            let rel_path = format!("{folder_path}/{}", file.rel_path);
            let project = project_info_from(&rel_path, &frontmatter, &raw);
            let related = related_pages(space_root, &rel_path);
            return Ok(ProjectContext {
                project,
                related_pages: related,
            });
        }
    }

    Err(PkbError::NotFound(format!("no project found under {folder_path}")))
}

fn project_info_from(rel_path: &str, frontmatter: &Value, raw: &str) -> ProjectInfo {
    let github = frontmatter.get("github").and_then(Value::as_str).map(String::from);
    let tags = frontmatter
        .get("tags")
        .map(string_list)
        .unwrap_or_default();
    let concerns = frontmatter
        .get("concerns")
        .map(string_list)
        .unwrap_or_default();
    let (_yaml, body) = split_frontmatter(raw);

    ProjectInfo {
        file: rel_path.to_string(),
        github,
        tags,
        concerns,
        content: body.to_string(),
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
        _ => Vec::new(),
    }
}

/// Sibling `.md` files plus every `.md` file under a same-named
/// subdirectory, capped at 20.
fn related_pages(space_root: &Path, rel_path: &str) -> Vec<String> {
    let path = Path::new(rel_path);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let parent = path.parent().map(|p| p.to_path_buf()).unwrap_or_default();

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    let parent_abs = space_root.join(&parent);
    if let Ok(entries) = std::fs::read_dir(&parent_abs) {
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if entry_path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let rel = parent.join(entry_path.file_name().unwrap_or_default());
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if rel_str == rel_path {
                continue;
            }
            if seen.insert(rel_str.clone()) {
                out.push(rel_str);
            }
            if out.len() >= MAX_RELATED_PAGES {
                return out;
            }
        }
    }

    let sibling_dir = parent.join(stem);
    let sibling_dir_abs = space_root.join(&sibling_dir);
    if sibling_dir_abs.is_dir() {
        if let Ok(files) = collect_markdown_files(&sibling_dir_abs) {
            for file in files {
                let rel_str = sibling_dir.join(&file.rel_path).to_string_lossy().replace('\\', "/");
                if seen.insert(rel_str.clone()) {
                    out.push(rel_str);
                }
                if out.len() >= MAX_RELATED_PAGES {
                    break;
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkb_proposals::ProposalManager;
    use pkb_store::GraphStore;
    use std::fs;

    fn new_ctx(dir: &Path) -> ToolContext {
        let store = GraphStore::open(&dir.join("db.sqlite"), false, false, true).unwrap();
        ToolContext::new(store, None, dir, ProposalManager::new(dir, None), false)
    }

    #[tokio::test]
    async fn given_plain_page_when_read_then_content_returned() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Home.md"), "# Home").unwrap();
        let ctx = new_ctx(dir.path());

        let content = read_page(&ctx, "Home").await.unwrap();
        assert_eq!(content, "# Home");
    }

    #[tokio::test]
    async fn given_traversal_attempt_when_read_then_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = new_ctx(dir.path());
        let err = read_page(&ctx, "../../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), pkb_errors::PkbErrorKind::PathTraversal);
    }

    #[tokio::test]
    async fn given_github_frontmatter_when_matched_then_project_context_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Proj.md"),
            "---\ngithub: org/repo\ntags:\n- rust\n---\nbody text\n",
        )
        .unwrap();
        let ctx = new_ctx(dir.path());

        let context = get_project_context(&ctx, Some("org/repo"), None).await.unwrap();
        assert_eq!(context.project.file, "Proj.md");
        assert_eq!(context.project.github.as_deref(), Some("org/repo"));
        assert_eq!(context.project.tags, vec!["rust".to_string()]);
    }
}
