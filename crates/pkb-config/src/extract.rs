//! Extracts fenced code blocks tagged with the config language (`lua`) from
//! `CONFIG.md`, using the same fence-aware line scan as chunk splitting.

const CONFIG_LANGUAGE_TOKEN: &str = "lua";

/// Returns the body of every fenced block whose info string is exactly the
/// config language token, in source order.
pub fn extract_config_blocks(source: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut lines = source.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if let Some(marker) = fence_marker(trimmed) {
            let info = trimmed[marker.len()..].trim();
            if info.eq_ignore_ascii_case(CONFIG_LANGUAGE_TOKEN) {
                let mut body_lines = Vec::new();
                for body_line in lines.by_ref() {
                    if body_line.trim_start().starts_with(marker) {
                        break;
                    }
                    body_lines.push(body_line);
                }
                blocks.push(body_lines.join("\n"));
            } else {
                // Not a config block: skip to its closing fence so headings
                // or text inside it are not mistaken for top-level content.
                for body_line in lines.by_ref() {
                    if body_line.trim_start().starts_with(marker) {
                        break;
                    }
                }
            }
        }
    }

    blocks
}

fn fence_marker(trimmed: &str) -> Option<&'static str> {
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_two_lua_blocks_when_extracted_then_both_returned_in_order() {
        let source = "# Config\n```lua\nset(\"a\", 1)\n```\ntext\n```lua\nset(\"b\", 2)\n```\n";
        let blocks = extract_config_blocks(source);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("set(\"a\", 1)"));
        assert!(blocks[1].contains("set(\"b\", 2)"));
    }

    #[test]
    fn given_non_config_fence_when_extracted_then_ignored() {
        let source = "```rust\nfn main() {}\n```\n";
        assert!(extract_config_blocks(source).is_empty());
    }
}
