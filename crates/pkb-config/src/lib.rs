//! `ConfigReader` (§4.6): reads `CONFIG.md`, evaluates its fenced config
//! blocks through a two-tier evaluator (external interpreter preferred,
//! static `set(...)` literal extractor as fallback), dot-expands the result
//! into a nested tree, and persists it as `space_config.json` next to the
//! database so every consumer reads from one place.

pub mod extract;
pub mod fallback;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use pkb_errors::PkbError;
use serde_json::{json, Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

const CONFIG_PAGE_NAME: &str = "CONFIG.md";
const CONFIG_SNAPSHOT_NAME: &str = "space_config.json";
const EVAL_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, serde::Serialize)]
struct InterpreterEnvelope<'a> {
    code: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct InterpreterResult {
    success: bool,
    #[serde(default)]
    config: Option<Map<String, Value>>,
    #[serde(default)]
    error: Option<String>,
}

pub struct ConfigReader {
    /// Path to the external interpreter binary, if one is configured. When
    /// absent, evaluation goes straight to the fallback static extractor.
    interpreter: Option<PathBuf>,
}

impl ConfigReader {
    pub fn new(interpreter: Option<PathBuf>) -> Self {
        Self { interpreter }
    }

    /// Reads `CONFIG.md` under `space_root` (a missing file yields an empty
    /// tree, not an error) and evaluates its config blocks into a nested
    /// key/value tree.
    pub async fn evaluate(&self, space_root: &Path) -> Result<Value, PkbError> {
        let config_path = space_root.join(CONFIG_PAGE_NAME);
        let source = match tokio::fs::read_to_string(&config_path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(json!({})),
            Err(error) => return Err(PkbError::Config(error.to_string())),
        };
        self.evaluate_source(&source).await
    }

    pub async fn evaluate_source(&self, source: &str) -> Result<Value, PkbError> {
        let blocks = extract::extract_config_blocks(source);
        if blocks.is_empty() {
            return Ok(json!({}));
        }
        let concatenated = blocks.join("\n");

        if let Some(interpreter) = &self.interpreter {
            match run_external_interpreter(interpreter, &concatenated).await {
                Ok(flat) => return Ok(dot_expand(flat)),
                Err(error) => {
                    tracing::warn!(%error, "external config interpreter failed, falling back to static extractor");
                }
            }
        }

        let flat = fallback::extract_literals(&concatenated);
        Ok(dot_expand(flat))
    }

    /// Writes `value` as `space_config.json` next to `db_path`.
    pub fn persist(value: &Value, db_path: &Path) -> Result<(), PkbError> {
        let path = snapshot_path(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PkbError::Config(e.to_string()))?;
        }
        let contents = serde_json::to_string_pretty(value).map_err(|e| PkbError::Config(e.to_string()))?;
        std::fs::write(&path, contents).map_err(|e| PkbError::Config(e.to_string()))
    }

    /// Reads the persisted snapshot, or an empty tree if none exists yet.
    pub fn load_persisted(db_path: &Path) -> Result<Value, PkbError> {
        let path = snapshot_path(db_path);
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| PkbError::Config(e.to_string())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(json!({})),
            Err(error) => Err(PkbError::Config(error.to_string())),
        }
    }
}

fn snapshot_path(db_path: &Path) -> PathBuf {
    db_path.join(CONFIG_SNAPSHOT_NAME)
}

async fn run_external_interpreter(interpreter: &Path, code: &str) -> Result<Vec<(String, Value)>, PkbError> {
    let envelope = serde_json::to_vec(&InterpreterEnvelope { code })
        .map_err(|e| PkbError::Config(e.to_string()))?;

    let run = async {
        let mut child = Command::new(interpreter)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PkbError::Config(format!("failed to spawn config interpreter: {e}")))?;

        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| PkbError::Config("interpreter stdin unavailable".to_string()))?;
            stdin
                .write_all(&envelope)
                .await
                .map_err(|e| PkbError::Config(e.to_string()))?;
        }
        child.stdin.take();

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| PkbError::Config(e.to_string()))?;

        let result: InterpreterResult = serde_json::from_slice(&output.stdout)
            .map_err(|e| PkbError::Config(format!("malformed interpreter result: {e}")))?;

        if !result.success {
            return Err(PkbError::Config(
                result.error.unwrap_or_else(|| "config evaluation failed".to_string()),
            ));
        }

        Ok(result
            .config
            .unwrap_or_default()
            .into_iter()
            .collect::<Vec<_>>())
    };

    timeout(EVAL_DEADLINE, run)
        .await
        .map_err(|_| PkbError::Timeout)?
}

/// Expands flat `"a.b.c" -> value` pairs into a nested JSON object tree,
/// applied identically by both evaluator tiers.
fn dot_expand(pairs: Vec<(String, Value)>) -> Value {
    let mut root = Map::new();
    for (key, value) in pairs {
        let mut cursor = &mut root;
        let segments: Vec<&str> = key.split('.').collect();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            cursor = cursor
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .expect("dot-expand path segment collided with a non-object value");
        }
        if let Some(last) = segments.last() {
            cursor.insert(last.to_string(), value);
        }
    }
    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn given_no_interpreter_when_evaluated_then_fallback_literals_are_dot_expanded() {
        let reader = ConfigReader::new(None);
        let source = "```lua\nset(\"proposals.pathPrefix\", \"_Proposals/\")\n```\n";
        let value = reader.evaluate_source(source).await.unwrap();
        assert_eq!(value["proposals"]["pathPrefix"], json!("_Proposals/"));
    }

    #[tokio::test]
    async fn given_no_config_blocks_when_evaluated_then_empty_tree() {
        let reader = ConfigReader::new(None);
        let value = reader.evaluate_source("# just prose, no fences").await.unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn given_flat_pairs_when_dot_expanded_then_nested_tree() {
        let pairs = vec![
            ("a.b".to_string(), json!(1)),
            ("a.c".to_string(), json!(2)),
            ("top".to_string(), json!("x")),
        ];
        let value = dot_expand(pairs);
        assert_eq!(value["a"]["b"], json!(1));
        assert_eq!(value["a"]["c"], json!(2));
        assert_eq!(value["top"], json!("x"));
    }

    #[test]
    fn given_missing_snapshot_when_loaded_then_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let value = ConfigReader::load_persisted(dir.path()).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn given_value_when_persisted_then_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let value = json!({"proposals": {"pathPrefix": "_Proposals/"}});
        ConfigReader::persist(&value, dir.path()).unwrap();
        let loaded = ConfigReader::load_persisted(dir.path()).unwrap();
        assert_eq!(loaded, value);
    }
}
