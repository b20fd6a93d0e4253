//! A small MATCH/RETURN subset against the relational schema (§4.3
//! `execute`). The real graph engine's Cypher dialect is an out-of-scope
//! driver abstraction (§9); this executor only has to support the single-
//! node and single-hop shapes the tool surface actually issues
//! (`cypher_query` passes arbitrary caller text through to here, so
//! unsupported constructs are rejected with `InvalidQuery` rather than
//! guessed at).

use std::collections::HashMap;

use pkb_errors::PkbError;
use regex::Regex;
use rusqlite::Connection;
use serde_json::{Map, Value};

const NODE_TABLES: &[(&str, &str, &str)] = &[
    ("Page", "node_page", "name"),
    ("Chunk", "node_chunk", "id"),
    ("Tag", "node_tag", "name"),
    ("Folder", "node_folder", "path"),
    ("Attribute", "node_attribute", "id"),
    ("DataBlock", "node_data_block", "id"),
];

fn table_for_label(label: &str) -> Option<(&'static str, &'static str)> {
    NODE_TABLES
        .iter()
        .find(|(l, _, _)| *l == label)
        .map(|(_, table, key)| (*table, *key))
}

/// Executes a query string against the store, returning one map per result
/// row. Supports:
/// `MATCH (n:Label) [WHERE n.prop = $param] RETURN n`
/// `MATCH (a:LabelA)-[:REL_LABEL]->(b:LabelB) RETURN a, b`
pub fn execute(
    conn: &Connection,
    query: &str,
    params: &HashMap<String, Value>,
) -> Result<Vec<Value>, PkbError> {
    let query = query.trim();

    if let Some(caps) = single_node_re().captures(query) {
        return execute_single_node(conn, &caps, params);
    }
    if let Some(caps) = single_hop_re().captures(query) {
        return execute_single_hop(conn, &caps);
    }

    Err(PkbError::InvalidQuery(format!(
        "unsupported query shape: {query}"
    )))
}

fn single_node_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)^MATCH\s*\(\s*(\w+)\s*:\s*(\w+)\s*\)\s*(?:WHERE\s+\w+\.(\w+)\s*=\s*\$(\w+)\s*)?RETURN\s+(\w+)$",
        )
        .unwrap()
    })
}

fn single_hop_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)^MATCH\s*\(\s*(\w+)\s*:\s*(\w+)\s*\)\s*-\[\s*:\s*(\w+)\s*\]->\s*\(\s*(\w+)\s*:\s*(\w+)\s*\)\s*RETURN\s+(\w+)\s*,\s*(\w+)$",
        )
        .unwrap()
    })
}

fn execute_single_node(
    conn: &Connection,
    caps: &regex::Captures,
    params: &HashMap<String, Value>,
) -> Result<Vec<Value>, PkbError> {
    let alias = &caps[1];
    let label = &caps[2];
    let (table, _key) = table_for_label(label)
        .ok_or_else(|| PkbError::InvalidQuery(format!("unknown label: {label}")))?;
    let returned_alias = &caps[5];
    if returned_alias != alias {
        return Err(PkbError::InvalidQuery("RETURN must reference the matched alias".into()));
    }

    let (sql, bind_value) = match (caps.get(3), caps.get(4)) {
        (Some(prop), Some(param_name)) => {
            let value = params
                .get(param_name.as_str())
                .ok_or_else(|| PkbError::InvalidQuery(format!("missing parameter ${}", param_name.as_str())))?;
            (
                format!("SELECT * FROM {table} WHERE {} = ?1", prop.as_str()),
                Some(json_to_sql(value)),
            )
        }
        _ => (format!("SELECT * FROM {table}"), None),
    };

    let mut stmt = conn.prepare(&sql)?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let rows = if let Some(value) = bind_value {
        stmt.query_map([value], |row| row_to_map(row, &column_names))?
            .collect::<Result<Vec<_>, _>>()?
    } else {
        stmt.query_map([], |row| row_to_map(row, &column_names))?
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(rows
        .into_iter()
        .map(|mut map| {
            map.insert("_label".to_string(), Value::String(label.to_string()));
            Value::Object(map)
        })
        .collect())
}

fn execute_single_hop(conn: &Connection, caps: &regex::Captures) -> Result<Vec<Value>, PkbError> {
    let (a_alias, a_label, rel_label, b_alias, b_label, ret_a, ret_b) = (
        &caps[1], &caps[2], &caps[3], &caps[4], &caps[5], &caps[6], &caps[7],
    );
    if (ret_a, ret_b) != (*a_alias, *b_alias) && (ret_a, ret_b) != (*b_alias, *a_alias) {
        return Err(PkbError::InvalidQuery("RETURN must reference both matched aliases".into()));
    }

    let (a_table, a_key) = table_for_label(a_label)
        .ok_or_else(|| PkbError::InvalidQuery(format!("unknown label: {a_label}")))?;
    let (b_table, b_key) = table_for_label(b_label)
        .ok_or_else(|| PkbError::InvalidQuery(format!("unknown label: {b_label}")))?;

    let sql = format!(
        "SELECT a.*, b.* FROM {a_table} a
         JOIN edge e ON e.label = ?1 AND e.src = a.{a_key}
         JOIN {b_table} b ON b.{b_key} = e.dst"
    );

    let mut stmt = conn.prepare(&sql)?;
    let a_cols = table_columns(conn, a_table)?;
    let b_cols = table_columns(conn, b_table)?;

    let rows = stmt.query_map([rel_label], |row| {
        let mut a_map = Map::new();
        for (i, col) in a_cols.iter().enumerate() {
            a_map.insert(col.clone(), sql_value_to_json(row, i)?);
        }
        a_map.insert("_label".to_string(), Value::String(a_label.to_string()));

        let mut b_map = Map::new();
        let offset = a_cols.len();
        for (i, col) in b_cols.iter().enumerate() {
            b_map.insert(col.clone(), sql_value_to_json(row, offset + i)?);
        }
        b_map.insert("_label".to_string(), Value::String(b_label.to_string()));

        Ok((Value::Object(a_map), Value::Object(b_map)))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (a_val, b_val) = row?;
        let mut record = Map::new();
        record.insert(a_alias.to_string(), a_val);
        record.insert(b_alias.to_string(), b_val);
        out.push(Value::Object(record));
    }
    Ok(out)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, PkbError> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {table} LIMIT 0"))?;
    stmt.query([])?;
    Ok(stmt.column_names().iter().map(|s| s.to_string()).collect())
}

fn row_to_map(row: &rusqlite::Row, columns: &[String]) -> rusqlite::Result<Map<String, Value>> {
    let mut map = Map::new();
    for (i, col) in columns.iter().enumerate() {
        map.insert(col.clone(), sql_value_to_json(row, i)?);
    }
    Ok(map)
}

fn sql_value_to_json(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    use rusqlite::types::ValueRef;
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(_) => Value::Null,
    })
}

fn json_to_sql(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Number(n) if n.is_i64() => rusqlite::types::Value::Integer(n.as_i64().unwrap()),
        Value::Number(n) => rusqlite::types::Value::Real(n.as_f64().unwrap_or_default()),
        Value::Bool(b) => rusqlite::types::Value::Integer(*b as i64),
        _ => rusqlite::types::Value::Null,
    }
}
