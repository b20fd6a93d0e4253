//! Fallback static extractor (§4.6, tier 2): scans concatenated config
//! source for `set("dotted.key", literal)` calls without evaluating any
//! code. Used when no external interpreter is configured or it fails.

use serde_json::Value;

/// Flat `dotted.key -> value` pairs found via `set(...)` calls. Calls whose
/// value is not one of the supported literal forms are skipped entirely.
pub fn extract_literals(source: &str) -> Vec<(String, Value)> {
    let mut pairs = Vec::new();
    let bytes = source.as_bytes();
    let mut pos = 0usize;

    while let Some(offset) = source[pos..].find("set(") {
        let call_start = pos + offset + "set(".len();
        pos = call_start;

        let mut cursor = call_start;
        skip_ws(bytes, &mut cursor);
        let Some(key) = parse_quoted_string(source, &mut cursor) else {
            continue;
        };
        skip_ws(bytes, &mut cursor);
        if bytes.get(cursor) != Some(&b',') {
            continue;
        }
        cursor += 1;
        skip_ws(bytes, &mut cursor);

        let Some(value) = parse_literal(source, &mut cursor) else {
            continue;
        };
        skip_ws(bytes, &mut cursor);
        if bytes.get(cursor) != Some(&b')') {
            continue;
        }
        cursor += 1;

        pairs.push((key, value));
        pos = cursor;
    }

    pairs
}

fn skip_ws(bytes: &[u8], pos: &mut usize) {
    while let Some(&b) = bytes.get(*pos) {
        if b.is_ascii_whitespace() {
            *pos += 1;
        } else {
            break;
        }
    }
}

fn parse_quoted_string(source: &str, pos: &mut usize) -> Option<String> {
    let bytes = source.as_bytes();
    let quote = *bytes.get(*pos)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let start = *pos + 1;
    let mut i = start;
    loop {
        match bytes.get(i) {
            Some(&b) if b == quote => {
                let value = source[start..i].to_string();
                *pos = i + 1;
                return Some(value);
            }
            Some(&b'\\') => i += 2,
            Some(_) => i += 1,
            None => return None,
        }
    }
}

/// Parses a single literal: boolean, nil, string, decimal number, or a
/// brace-enclosed simple table (`{a = 1, b = "x"}`) of such literals.
fn parse_literal(source: &str, pos: &mut usize) -> Option<Value> {
    let bytes = source.as_bytes();
    skip_ws(bytes, pos);

    if source[*pos..].starts_with("true") {
        *pos += 4;
        return Some(Value::Bool(true));
    }
    if source[*pos..].starts_with("false") {
        *pos += 5;
        return Some(Value::Bool(false));
    }
    if source[*pos..].starts_with("nil") {
        *pos += 3;
        return Some(Value::Null);
    }
    if matches!(bytes.get(*pos), Some(&b'"') | Some(&b'\'')) {
        return parse_quoted_string(source, pos).map(Value::String);
    }
    if bytes.get(*pos) == Some(&b'{') {
        return parse_table(source, pos);
    }
    if matches!(bytes.get(*pos), Some(b) if b.is_ascii_digit() || *b == b'-') {
        return parse_number(source, pos);
    }

    None
}

fn parse_number(source: &str, pos: &mut usize) -> Option<Value> {
    let bytes = source.as_bytes();
    let start = *pos;
    let mut i = *pos;
    if bytes.get(i) == Some(&b'-') {
        i += 1;
    }
    let digits_start = i;
    while matches!(bytes.get(i), Some(b) if b.is_ascii_digit()) {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    let mut is_float = false;
    if bytes.get(i) == Some(&b'.') && matches!(bytes.get(i + 1), Some(b) if b.is_ascii_digit()) {
        is_float = true;
        i += 1;
        while matches!(bytes.get(i), Some(b) if b.is_ascii_digit()) {
            i += 1;
        }
    }
    let text = &source[start..i];
    *pos = i;
    if is_float {
        text.parse::<f64>().ok().and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
    } else {
        text.parse::<i64>().ok().map(|n| Value::Number(n.into()))
    }
}

fn parse_table(source: &str, pos: &mut usize) -> Option<Value> {
    let bytes = source.as_bytes();
    *pos += 1; // consume '{'
    let mut map = serde_json::Map::new();

    loop {
        skip_ws(bytes, pos);
        if bytes.get(*pos) == Some(&b'}') {
            *pos += 1;
            return Some(Value::Object(map));
        }

        let key_start = *pos;
        while matches!(bytes.get(*pos), Some(b) if b.is_ascii_alphanumeric() || *b == b'_') {
            *pos += 1;
        }
        if *pos == key_start {
            return None;
        }
        let key = source[key_start..*pos].to_string();
        skip_ws(bytes, pos);
        if bytes.get(*pos) != Some(&b'=') {
            return None;
        }
        *pos += 1;
        skip_ws(bytes, pos);

        let value = parse_literal(source, pos)?;
        map.insert(key, value);

        skip_ws(bytes, pos);
        if bytes.get(*pos) == Some(&b',') {
            *pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_mixed_literals_when_extracted_then_types_parsed() {
        let source = r#"
            set("search.limit", 25)
            set("search.weight", 0.5)
            set("proposals.pathPrefix", "_Proposals/")
            set("watch.recursive", true)
            set("watch.extra", nil)
        "#;
        let pairs = extract_literals(source);
        assert_eq!(pairs.len(), 5);
        assert_eq!(pairs[0], ("search.limit".to_string(), serde_json::json!(25)));
        assert_eq!(pairs[1], ("search.weight".to_string(), serde_json::json!(0.5)));
        assert_eq!(pairs[2], ("proposals.pathPrefix".to_string(), serde_json::json!("_Proposals/")));
        assert_eq!(pairs[3], ("watch.recursive".to_string(), serde_json::json!(true)));
        assert_eq!(pairs[4], ("watch.extra".to_string(), serde_json::Value::Null));
    }

    #[test]
    fn given_table_literal_when_extracted_then_parsed_as_object() {
        let source = r#"set("ui.colors", {bg = "black", fg = "white"})"#;
        let pairs = extract_literals(source);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, serde_json::json!({"bg": "black", "fg": "white"}));
    }

    #[test]
    fn given_non_literal_call_when_extracted_then_skipped() {
        let source = r#"set("dynamic.value", compute_something())"#;
        assert!(extract_literals(source).is_empty());
    }
}
