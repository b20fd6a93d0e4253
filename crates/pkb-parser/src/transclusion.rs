//! Transclusion expansion (`![[page]]` / `![[page#header]]`), recursive with
//! an explicit depth counter rather than a visited-set, per §9: this lets a
//! cyclic `A -> B -> A` expand repeatedly up to the depth limit instead of
//! stopping at the first repeat.

use std::collections::HashMap;

pub const MAX_DEPTH: usize = 5;

/// `pages` maps page name to its front-matter-stripped raw body.
pub fn expand(page_body: &str, pages: &HashMap<String, String>) -> String {
    expand_at_depth(page_body, pages, MAX_DEPTH)
}

fn expand_at_depth(text: &str, pages: &HashMap<String, String>, depth: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;

    for (line_index, line) in text.split_inclusive('\n').enumerate() {
        let trimmed = line.trim_start();
        if trimmed.trim_end_matches('\n').starts_with("```")
            || trimmed.trim_end_matches('\n').starts_with("~~~")
        {
            in_fence = !in_fence;
            out.push_str(line);
            continue;
        }
        if in_fence {
            out.push_str(line);
            continue;
        }
        let _ = line_index;
        out.push_str(&expand_line(line, pages, depth));
    }

    out
}

fn expand_line(line: &str, pages: &HashMap<String, String>, depth: usize) -> String {
    let mut out = String::with_capacity(line.len());
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'!'
            && i + 3 < bytes.len()
            && bytes[i + 1] == b'['
            && bytes[i + 2] == b'['
        {
            if let Some(rel_end) = line[i + 3..].find("]]") {
                let inner = &line[i + 3..i + 3 + rel_end];
                let marker_end = i + 3 + rel_end + 2;
                if depth == 0 {
                    out.push_str(&line[i..marker_end]);
                } else {
                    out.push_str(&resolve_transclusion(inner, pages, depth));
                }
                i = marker_end;
                continue;
            }
        }
        let ch_len = next_char_len(line, i);
        out.push_str(&line[i..i + ch_len]);
        i += ch_len;
    }
    out
}

fn next_char_len(s: &str, at: usize) -> usize {
    s[at..].chars().next().map(char::len_utf8).unwrap_or(1)
}

fn resolve_transclusion(inner: &str, pages: &HashMap<String, String>, depth: usize) -> String {
    let (target, header) = split_target_header(inner);
    let Some(body) = pages.get(&target) else {
        return format!("![[{inner}]]");
    };

    let section = match &header {
        Some(h) => extract_section(body, h).unwrap_or_else(|| body.clone()),
        None => body.clone(),
    };

    expand_at_depth(&section, pages, depth - 1)
}

fn split_target_header(inner: &str) -> (String, Option<String>) {
    let without_alias = inner.split('|').next().unwrap_or(inner);
    if let Some(hash) = without_alias.find('#') {
        (
            without_alias[..hash].trim().to_string(),
            Some(without_alias[hash + 1..].trim().to_string()),
        )
    } else {
        (without_alias.trim().to_string(), None)
    }
}

/// Returns the lines from the matching heading (case-insensitive) up to but
/// excluding the next heading of equal or lower level, including the heading
/// line itself.
fn extract_section(body: &str, header: &str) -> Option<String> {
    let mut lines = body.lines();
    let mut collected: Vec<&str> = Vec::new();
    let mut target_level = None;

    for line in &mut lines {
        if let Some((level, text)) = heading_level_and_text(line) {
            if text.eq_ignore_ascii_case(header) {
                target_level = Some(level);
                collected.push(line);
                break;
            }
        }
    }

    let target_level = target_level?;
    for line in lines {
        if let Some((level, _)) = heading_level_and_text(line) {
            if level <= target_level {
                break;
            }
        }
        collected.push(line);
    }

    Some(collected.join("\n"))
}

fn heading_level_and_text(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with(' ') {
        return None;
    }
    Some((level, rest.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn given_header_transclusion_when_expanded_then_only_matching_section_included() {
        let p = "## Alpha\naa\n## Beta\nbb\n## Gamma\ncc";
        let pages = pages(&[("P", p)]);
        let q = "X ![[P#Beta]] Y";
        let expanded = expand(q, &pages);
        assert!(expanded.contains("## Beta"));
        assert!(expanded.contains("bb"));
        assert!(!expanded.contains("aa"));
        assert!(!expanded.contains("cc"));
    }

    #[test]
    fn given_cycle_when_expanded_then_terminates_with_marker_surviving() {
        let pages = pages(&[("A", "![[B]]"), ("B", "![[A]]")]);
        let expanded = expand("![[A]]", &pages);
        assert!(expanded.contains("![[A]]") || expanded.contains("![[B]]"));
    }

    #[test]
    fn given_missing_target_when_expanded_then_marker_left_in_place() {
        let pages = pages(&[]);
        let expanded = expand("See ![[Nope]] here", &pages);
        assert_eq!(expanded, "See ![[Nope]] here");
    }
}
