//! `ContentClean` (§4.1a): a pure preprocessing pass applied before embedding
//! to strip markup noise while preserving semantic words.

use regex::Regex;
use std::sync::OnceLock;

fn wikilink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").unwrap())
}

fn hash_mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#@](\w+)").unwrap())
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

fn space_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").unwrap())
}

pub fn clean(text: &str) -> String {
    let without_fences: String = text
        .lines()
        .filter(|line| line.trim() != "---")
        .collect::<Vec<_>>()
        .join("\n");

    let unwrapped_links = wikilink_re().replace_all(&without_fences, |caps: &regex::Captures| {
        caps.get(2)
            .or_else(|| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });

    let unwrapped_tags = hash_mention_re().replace_all(&unwrapped_links, "$1");

    let collapsed_blank = blank_run_re().replace_all(&unwrapped_tags, "\n\n");
    let collapsed_spaces = space_run_re().replace_all(&collapsed_blank, " ");

    collapsed_spaces.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_wikilink_with_alias_when_cleaned_then_alias_kept() {
        assert_eq!(clean("see [[Target|alias]] now"), "see alias now");
    }

    #[test]
    fn given_plain_wikilink_when_cleaned_then_target_kept() {
        assert_eq!(clean("see [[Target]] now"), "see Target now");
    }

    #[test]
    fn given_hashtag_and_mention_when_cleaned_then_sigils_stripped() {
        assert_eq!(clean("#project @alice"), "project alice");
    }

    #[test]
    fn given_frontmatter_fence_lines_when_cleaned_then_removed() {
        assert_eq!(clean("---\ntitle: x\n---\nbody"), "title: x\nbody");
    }

    #[test]
    fn given_excess_blank_lines_when_cleaned_then_collapsed_to_one() {
        let cleaned = clean("a\n\n\n\n\nb");
        assert_eq!(cleaned, "a\n\nb");
    }

    #[test]
    fn given_empty_input_when_cleaned_then_empty_output() {
        assert_eq!(clean("   \n \n "), "");
    }
}
