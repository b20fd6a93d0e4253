//! Front-matter extraction: a leading `---`-delimited YAML block, converted
//! to JSON, including a YAML-tag unwrap and best-effort non-string-key
//! stringification.

use serde_json::{Map, Value as JsonValue};
use serde_yaml::Value as YamlValue;

/// Splits `source` into `(frontmatter_yaml, body)`. `body` never contains the
/// leading `---\n…\n---\n` fence; it is absent entirely when there is no
/// front-matter.
pub fn split_frontmatter(source: &str) -> (Option<String>, &str) {
    let trimmed_start = source.trim_start_matches(['\u{FEFF}', '\u{200B}']);
    let leading_ws = source.len() - trimmed_start.len();

    if !trimmed_start.trim_start().starts_with("---") {
        return (None, source);
    }

    let mut offset = leading_ws;
    let mut lines = trimmed_start.split_inclusive('\n');
    let first = match lines.next() {
        Some(l) => l,
        None => return (None, source),
    };
    if !is_delimiter(first) {
        return (None, source);
    }
    offset += first.len();

    let mut yaml_lines = Vec::new();
    for line in lines {
        offset += line.len();
        if is_delimiter(line) {
            let yaml = yaml_lines.join("");
            let body = &source[offset..];
            return (Some(yaml), body);
        }
        yaml_lines.push(line);
    }

    (None, source)
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\n', '\r']).trim() == "---"
}

pub fn parse_frontmatter(yaml_source: &str) -> JsonValue {
    let parsed: YamlValue = match serde_yaml::from_str(yaml_source) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(%error, "failed to parse front-matter YAML");
            return JsonValue::Object(Map::new());
        }
    };

    match parsed {
        YamlValue::Mapping(_) => yaml_to_json(parsed),
        _ => JsonValue::Object(Map::new()),
    }
}

pub fn yaml_to_json(value: YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(v) => JsonValue::Bool(v),
        YamlValue::Number(num) => yaml_number_to_json(num),
        YamlValue::String(v) => JsonValue::String(v),
        YamlValue::Sequence(items) => {
            JsonValue::Array(items.into_iter().map(yaml_to_json).collect())
        }
        YamlValue::Mapping(map) => {
            let mut object = Map::new();
            for (key, val) in map {
                object.insert(yaml_key_to_string(key), yaml_to_json(val));
            }
            JsonValue::Object(object)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_number_to_json(num: serde_yaml::Number) -> JsonValue {
    if let Some(value) = num.as_i64() {
        return JsonValue::Number(value.into());
    }
    if let Some(value) = num.as_u64() {
        return JsonValue::Number(value.into());
    }
    if let Some(value) = num.as_f64() {
        if let Some(number) = serde_json::Number::from_f64(value) {
            return JsonValue::Number(number);
        }
    }
    JsonValue::Null
}

fn yaml_key_to_string(value: YamlValue) -> String {
    match value {
        YamlValue::String(v) => v,
        YamlValue::Bool(v) => v.to_string(),
        YamlValue::Number(v) => v.to_string(),
        YamlValue::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "<unserializable-key>".to_string()),
    }
}

/// `tags` front-matter value, accepting either a string or a list of strings.
pub fn frontmatter_tags(frontmatter: &JsonValue) -> Vec<String> {
    match frontmatter.get("tags") {
        Some(JsonValue::String(s)) => vec![s.clone()],
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_frontmatter_fence_when_split_then_yaml_and_body_separate() {
        let source = "---\ntitle: Hello\ntags:\n- a\n- b\n---\nBody text\n";
        let (yaml, body) = split_frontmatter(source);
        assert_eq!(body, "Body text\n");
        let fm = parse_frontmatter(&yaml.unwrap());
        assert_eq!(fm["title"], "Hello");
        assert_eq!(frontmatter_tags(&fm), vec!["a", "b"]);
    }

    #[test]
    fn given_no_frontmatter_when_split_then_body_is_whole_source() {
        let source = "# Just a heading\nbody\n";
        let (yaml, body) = split_frontmatter(source);
        assert!(yaml.is_none());
        assert_eq!(body, source);
    }

    #[test]
    fn given_string_tags_when_extracted_then_single_element_vec() {
        let fm = parse_frontmatter("tags: solo\n");
        assert_eq!(frontmatter_tags(&fm), vec!["solo"]);
    }
}
