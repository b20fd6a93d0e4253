//! Top-level `SpaceParser`: the two-pass cache-then-parse orchestrator of
//! §4.2, tying together front-matter parsing, transclusion expansion,
//! heading-boundary chunking, and link/tag/attribute extraction.

use std::collections::HashMap;
use std::path::Path;

use pkb_types::{page_name_from_rel_path, Chunk, Folder};

use crate::chunking::split_into_chunks;
use crate::files::{collect_markdown_files, folder_index_pages, folder_paths};
use crate::frontmatter::{frontmatter_tags, parse_frontmatter, split_frontmatter};
use crate::transclusion::expand;
use crate::wikilinks::{extract_inline_attributes, extract_links, extract_tags, extract_transclusions};

pub struct ParsedSpace {
    pub chunks: Vec<Chunk>,
    pub folders: Vec<Folder>,
}

struct CachedPage {
    rel_path: String,
    body: String,
    frontmatter: serde_json::Value,
}

/// Parses every non-excluded `.md` file under `root` into chunks and folders.
pub fn parse_space(root: &Path) -> anyhow::Result<ParsedSpace> {
    let (cache, bodies_by_page) = build_page_cache(root)?;

    // Pass 2: parse.
    let mut chunks = Vec::new();
    for (page_name, page) in &cache {
        match parse_page(page_name, page, &bodies_by_page) {
            Ok(mut page_chunks) => chunks.append(&mut page_chunks),
            Err(error) => {
                tracing::warn!(path = %page.rel_path, %error, "failed to parse page");
            }
        }
    }

    let folders = collect_folders(root)?;

    Ok(ParsedSpace { chunks, folders })
}

/// Re-parses a single page, given by its space-relative path. Transclusion
/// expansion still needs every other page's raw body, so this reads the
/// whole tree (pass 1) before parsing just the target page (pass 2) — the
/// watcher only writes this file's chunks back to the store, preserving the
/// per-file differential re-index the caller expects.
pub fn parse_file(root: &Path, rel_path: &str) -> anyhow::Result<Vec<Chunk>> {
    let (cache, bodies_by_page) = build_page_cache(root)?;
    let page_name = page_name_from_rel_path(rel_path);
    let Some(page) = cache.get(&page_name) else {
        return Ok(Vec::new());
    };
    parse_page(&page_name, page, &bodies_by_page)
}

fn build_page_cache(root: &Path) -> anyhow::Result<(HashMap<String, CachedPage>, HashMap<String, String>)> {
    let files = collect_markdown_files(root)?;

    let mut cache: HashMap<String, CachedPage> = HashMap::new();
    let mut bodies_by_page: HashMap<String, String> = HashMap::new();
    for file in &files {
        let raw = match std::fs::read_to_string(&file.abs_path) {
            Ok(contents) => contents,
            Err(error) => {
                tracing::warn!(path = %file.rel_path, %error, "failed to read file during space parse");
                continue;
            }
        };
        let (yaml, body) = split_frontmatter(&raw);
        let frontmatter = yaml.map(|y| parse_frontmatter(&y)).unwrap_or(serde_json::Value::Object(Default::default()));
        let page_name = page_name_from_rel_path(&file.rel_path);
        bodies_by_page.insert(page_name.clone(), body.to_string());
        cache.insert(
            page_name.clone(),
            CachedPage {
                rel_path: file.rel_path.clone(),
                body: body.to_string(),
                frontmatter,
            },
        );
    }

    Ok((cache, bodies_by_page))
}

fn parse_page(
    page_name: &str,
    page: &CachedPage,
    bodies_by_page: &HashMap<String, String>,
) -> anyhow::Result<Vec<Chunk>> {
    let expanded_body = expand(&page.body, bodies_by_page);
    let page_basename = page_basename(page_name);
    let folder_path = folder_of(&page.rel_path);

    let expanded_sections = split_into_chunks(&expanded_body, &page_basename, &page.rel_path);
    let raw_sections = split_into_chunks(&page.body, &page_basename, &page.rel_path);

    let frontmatter_tag_list = frontmatter_tags(&page.frontmatter);

    let mut chunks = Vec::new();
    let mut raw_cursor = 0usize;
    for section in expanded_sections.into_iter() {
        // A standalone transclusion line can inject its own `##` heading on
        // expansion, growing `expanded_sections` past `raw_sections` and
        // breaking positional correspondence. Advance the cursor only when
        // the expanded header still matches the next raw header; otherwise
        // this section is injected content and inherits the raw section
        // that contained the transclusion marker.
        let raw_content = match raw_sections.get(raw_cursor) {
            Some(raw) if raw.header == section.header => {
                let content = raw.content.as_str();
                raw_cursor += 1;
                content
            }
            _ => raw_sections
                .get(raw_cursor.saturating_sub(1))
                .map(|raw| raw.content.as_str())
                .unwrap_or(""),
        };

        let mut tags = extract_tags(&section.content);
        for tag in &frontmatter_tag_list {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        chunks.push(Chunk {
            file_path: page.rel_path.clone(),
            folder_path: folder_path.clone(),
            header: section.header,
            content: section.content.clone(),
            frontmatter: page.frontmatter.clone(),
            embedding: None,
            links: extract_links(&section.content),
            tags,
            transclusions: extract_transclusions(raw_content),
            inline_attributes: extract_inline_attributes(&section.content),
            data_blocks: section.data_blocks,
        });
    }

    Ok(chunks)
}

fn page_basename(page_name: &str) -> String {
    page_name
        .rsplit('/')
        .next()
        .unwrap_or(page_name)
        .to_string()
}

fn folder_of(rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

pub fn collect_folders(root: &Path) -> anyhow::Result<Vec<Folder>> {
    let index_pages = folder_index_pages(root)?;
    let paths = folder_paths(root)?;
    Ok(paths
        .into_iter()
        .map(|path| {
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            let has_index_page = index_pages.contains_key(&path);
            Folder {
                path,
                name,
                has_index_page,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn given_wikilink_graph_when_parsed_then_page_links_are_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.md"), "links to [[B]] and [[C]]").unwrap();
        fs::write(dir.path().join("B.md"), "links to [[A]]").unwrap();
        fs::write(dir.path().join("C.md"), "no links").unwrap();

        let parsed = parse_space(dir.path()).unwrap();
        let a_chunk = parsed
            .chunks
            .iter()
            .find(|c| c.file_path == "A.md")
            .unwrap();
        assert_eq!(a_chunk.links, vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn given_standalone_transclusion_shifts_sections_when_parsed_then_later_section_keeps_its_own_transclusion() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("P.md"), "## Beta\nbb").unwrap();
        fs::write(dir.path().join("R.md"), "## Zeta\nzz").unwrap();
        fs::write(
            dir.path().join("Q.md"),
            "intro\n![[P#Beta]]\ntail\n## Second\ncontent ![[R#Zeta]]",
        )
        .unwrap();

        let parsed = parse_space(dir.path()).unwrap();
        let q_chunks: Vec<_> = parsed.chunks.iter().filter(|c| c.file_path == "Q.md").collect();

        // The standalone `![[P#Beta]]` line injects its own heading on
        // expansion, growing Q.md from two raw sections ("Q", "Second") to
        // three expanded ones ("Q", "Beta", "Second").
        assert_eq!(q_chunks.len(), 3);

        let second_chunk = q_chunks.iter().find(|c| c.header == "Second").unwrap();
        assert_eq!(second_chunk.transclusions.len(), 1);
        assert_eq!(second_chunk.transclusions[0].target, "R");
        assert_eq!(second_chunk.transclusions[0].header.as_deref(), Some("Zeta"));

        // No chunk should inherit R's transclusion except the "Second"
        // section that actually contains the marker.
        for chunk in q_chunks.iter().filter(|c| c.header != "Second") {
            assert!(chunk.transclusions.iter().all(|t| t.target != "R"));
        }
    }

    #[test]
    fn given_data_block_page_when_parsed_then_chunk_carries_data_block() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("T.md"),
            "## Tasks\n```#task\ntitle: write docs\n```\n",
        )
        .unwrap();

        let parsed = parse_space(dir.path()).unwrap();
        let chunk = parsed.chunks.iter().find(|c| c.header == "Tasks").unwrap();
        assert_eq!(chunk.data_blocks.len(), 1);
        assert_eq!(chunk.data_blocks[0].tag, "task");
    }
}
