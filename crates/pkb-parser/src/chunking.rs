//! Splits a page body into chunks at `##` boundaries and extracts
//! [`DataBlock`]s (fenced code whose info string starts with `#`).
//!
//! Uses a fence-aware line scan rather than a pulldown-cmark offset-iteration
//! technique: heading-boundary splitting only needs fence-aware line
//! classification, not a full
//! event-stream walk, so the simpler scan is used here and documented as a
//! deliberate simplification in DESIGN.md.

use pkb_types::DataBlock;

pub struct RawChunk {
    pub header: String,
    pub content: String,
    pub data_blocks: Vec<DataBlock>,
}

pub fn split_into_chunks(body: &str, page_basename: &str, file_path: &str) -> Vec<RawChunk> {
    let sections = split_sections(body, page_basename);
    sections
        .into_iter()
        .map(|(header, raw_content)| {
            let (content, data_blocks) = extract_data_blocks(&raw_content, file_path);
            RawChunk {
                header,
                content,
                data_blocks,
            }
        })
        .collect()
}

/// Splits raw markdown into `(header, content)` pairs at top-level `##`
/// headings (not `###` or deeper), ignoring headings inside fenced code.
fn split_sections(body: &str, page_basename: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    let mut current_header = page_basename.to_string();
    let mut current_lines: Vec<&str> = Vec::new();
    let mut in_fence = false;
    let mut fence_marker = "";

    for line in body.lines() {
        let trimmed = line.trim_start();
        if !in_fence && (trimmed.starts_with("```") || trimmed.starts_with("~~~")) {
            in_fence = true;
            fence_marker = &trimmed[..3];
            current_lines.push(line);
            continue;
        }
        if in_fence {
            if trimmed.starts_with(fence_marker) {
                in_fence = false;
            }
            current_lines.push(line);
            continue;
        }

        if is_h2_heading(trimmed) {
            sections.push((current_header, std::mem::take(&mut current_lines)));
            current_header = trimmed.trim_start_matches('#').trim().to_string();
            continue;
        }

        current_lines.push(line);
    }
    sections.push((current_header, current_lines));

    let has_other_sections = sections.len() > 1;
    let mut out = Vec::new();
    for (index, (header, lines)) in sections.into_iter().enumerate() {
        let content = lines.join("\n");
        let is_empty_preamble = index == 0 && header == page_basename && content.trim().is_empty();
        if is_empty_preamble && has_other_sections {
            continue;
        }
        out.push((header, content));
    }
    out
}

fn is_h2_heading(trimmed: &str) -> bool {
    trimmed.starts_with("## ") && !trimmed.starts_with("### ")
}

fn extract_data_blocks(content: &str, file_path: &str) -> (String, Vec<DataBlock>) {
    let mut kept_lines: Vec<&str> = Vec::new();
    let mut blocks = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if let Some(info) = fence_info_tag(trimmed) {
            let mut body_lines = Vec::new();
            let marker = &trimmed[..3];
            let mut closed = false;
            for body_line in lines.by_ref() {
                if body_line.trim_start().starts_with(marker) {
                    closed = true;
                    break;
                }
                body_lines.push(body_line);
            }
            if closed {
                let data = serde_yaml::from_str::<serde_yaml::Value>(&body_lines.join("\n"))
                    .map(crate::frontmatter::yaml_to_json)
                    .unwrap_or(serde_json::Value::Null);
                blocks.push(DataBlock {
                    tag: info,
                    data,
                    file_path: file_path.to_string(),
                });
                continue;
            }
            // Unterminated fence: fall through and keep the line verbatim.
            kept_lines.push(line);
            kept_lines.extend(body_lines);
        } else {
            kept_lines.push(line);
        }
    }

    (kept_lines.join("\n"), blocks)
}

/// For a fence opener line, returns the `#tag` info string with the leading
/// `#` stripped, if the info string starts with `#`.
fn fence_info_tag(trimmed: &str) -> Option<String> {
    let rest = trimmed
        .strip_prefix("```")
        .or_else(|| trimmed.strip_prefix("~~~"))?;
    let info = rest.trim();
    info.strip_prefix('#').map(|tag| tag.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_three_h2_sections_when_split_then_order_and_headers_preserved() {
        let body = "prose\n## H1\nbody1\n## H2\nbody2\n## H3\nbody3";
        let chunks = split_into_chunks(body, "pagename", "p.md");
        let headers: Vec<_> = chunks.iter().map(|c| c.header.clone()).collect();
        assert_eq!(headers, vec!["pagename", "H1", "H2", "H3"]);
        assert_eq!(chunks[1].content.trim(), "body1");
    }

    #[test]
    fn given_hash_fence_when_split_then_datablock_extracted_and_elided() {
        let body = "## Tasks\nSome text\n```#task\ntitle: Buy milk\ndone: false\n```\nAfter";
        let chunks = split_into_chunks(body, "page", "p.md");
        let tasks = chunks.iter().find(|c| c.header == "Tasks").unwrap();
        assert_eq!(tasks.data_blocks.len(), 1);
        assert_eq!(tasks.data_blocks[0].tag, "task");
        assert_eq!(tasks.data_blocks[0].data["title"], "Buy milk");
        assert!(!tasks.content.contains("```#task"));
        assert!(tasks.content.contains("Some text"));
        assert!(tasks.content.contains("After"));
    }

    #[test]
    fn given_heading_inside_fence_when_split_then_not_a_boundary() {
        let body = "## Real\n```\n## not a heading\n```\ntail";
        let chunks = split_into_chunks(body, "page", "p.md");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("## not a heading"));
    }
}
