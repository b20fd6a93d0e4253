//! Wikilink, transclusion, hashtag, and inline-attribute extraction.
//!
//! A byte-level, fence-aware scanner: candidates are only recognized outside
//! fenced code blocks.

use pkb_types::Transclusion;

/// `[[target|alias]]` and `![[target#header]]` links, stripped of `|alias`
/// and `#header`/`^block` suffixes. Only the non-`!`-prefixed form counts as
/// a link; the `!`-prefixed form is a transclusion (see
/// [`extract_transclusions`]).
pub fn extract_links(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for_each_non_fenced_line(text, |line| {
        for (bang, inner) in scan_double_bracket(line) {
            if bang {
                continue;
            }
            out.push(link_target(inner));
        }
    });
    out
}

/// `![[target]]` / `![[target#header]]` occurring in the (unexpanded) text.
pub fn extract_transclusions(text: &str) -> Vec<Transclusion> {
    let mut out = Vec::new();
    for_each_non_fenced_line(text, |line| {
        for (bang, inner) in scan_double_bracket(line) {
            if !bang {
                continue;
            }
            let (target, header) = split_target_header(inner);
            out.push(Transclusion { target, header });
        }
    });
    out
}

/// `#word` tokens not preceded by `` ` `` or `/`, in first-seen order, deduped.
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for_each_non_fenced_line(text, |line| {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'#' {
                let preceded_ok = i == 0 || !matches!(bytes[i - 1], b'`' | b'/');
                if preceded_ok {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && is_tag_char(bytes[end]) {
                        end += 1;
                    }
                    if end > start {
                        let word = &line[start..end];
                        if !out.iter().any(|existing: &String| existing == word) {
                            out.push(word.to_string());
                        }
                        i = end;
                        continue;
                    }
                }
            }
            i += 1;
        }
    });
    out
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'/'
}

/// `[name: value]` not preceded by `!` (which marks an image/transclusion
/// link instead). `name` must be an identifier (letters, digits, underscore,
/// starting with a letter or underscore).
pub fn extract_inline_attributes(text: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for_each_non_fenced_line(text, |line| {
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'[' {
                let preceded_by_bang = i > 0 && bytes[i - 1] == b'!';
                // Avoid matching inside a `[[...]]` wikilink.
                let is_wikilink = i + 1 < bytes.len() && bytes[i + 1] == b'[';
                if !preceded_by_bang && !is_wikilink {
                    if let Some(end) = line[i..].find(']') {
                        let inner = &line[i + 1..i + end];
                        if let Some((name, value)) = split_attribute(inner) {
                            out.push((name, value));
                            i += end + 1;
                            continue;
                        }
                    }
                }
            }
            i += 1;
        }
    });
    out
}

fn split_attribute(inner: &str) -> Option<(String, String)> {
    let colon = inner.find(':')?;
    let name = inner[..colon].trim();
    let value = inner[colon + 1..].trim();
    if name.is_empty() || !is_identifier(name) {
        return None;
    }
    Some((name.to_string(), value.to_string()))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn link_target(inner: &str) -> String {
    let (target, _) = split_target_header(inner);
    target
}

fn split_target_header(inner: &str) -> (String, Option<String>) {
    let without_alias = inner.split('|').next().unwrap_or(inner);
    if let Some(hash) = without_alias.find('#') {
        (
            without_alias[..hash].trim().to_string(),
            Some(without_alias[hash + 1..].trim().to_string()),
        )
    } else if let Some(caret) = without_alias.find('^') {
        (
            without_alias[..caret].trim().to_string(),
            Some(without_alias[caret + 1..].trim().to_string()),
        )
    } else {
        (without_alias.trim().to_string(), None)
    }
}

/// Returns `(is_transclusion, inner_text)` for each `[[...]]`/`![[...]]` on a line.
fn scan_double_bracket(line: &str) -> Vec<(bool, &str)> {
    let mut out = Vec::new();
    let bytes = line.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'[' && bytes[i + 1] == b'[' {
            let bang = i > 0 && bytes[i - 1] == b'!';
            if let Some(rel_end) = line[i + 2..].find("]]") {
                let inner = &line[i + 2..i + 2 + rel_end];
                out.push((bang, inner));
                i += 2 + rel_end + 2;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Calls `f` once per line of `text` that is not inside a fenced code block.
fn for_each_non_fenced_line<'a>(text: &'a str, mut f: impl FnMut(&'a str)) {
    let mut in_fence = false;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            f(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_alias_and_header_when_extracted_then_target_only() {
        let text = "See [[Target Page|alias text]] and [[Other#Section]].";
        assert_eq!(extract_links(text), vec!["Target Page", "Other"]);
    }

    #[test]
    fn given_transclusion_when_extracted_then_separate_from_links() {
        let text = "X ![[P#Beta]] Y";
        assert!(extract_links(text).is_empty());
        let transclusions = extract_transclusions(text);
        assert_eq!(transclusions.len(), 1);
        assert_eq!(transclusions[0].target, "P");
        assert_eq!(transclusions[0].header.as_deref(), Some("Beta"));
    }

    #[test]
    fn given_tag_preceded_by_backtick_or_slash_when_scanned_then_excluded() {
        let text = "Use `#literal` or https://x.test/#frag but #real counts";
        assert_eq!(extract_tags(text), vec!["real"]);
    }

    #[test]
    fn given_tag_inside_fence_when_scanned_then_ignored() {
        let text = "```\n#not_a_tag\n```\n#is_a_tag";
        assert_eq!(extract_tags(text), vec!["is_a_tag"]);
    }

    #[test]
    fn given_inline_attribute_when_extracted_then_name_and_value_trimmed() {
        let text = "Priority [priority: high] and not ![alt: text](img.png)";
        let attrs = extract_inline_attributes(text);
        assert_eq!(attrs, vec![("priority".to_string(), "high".to_string())]);
    }
}
