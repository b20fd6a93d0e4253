//! Static model -> dimension lookup (§4.1: implementations must not probe
//! dimensionality at runtime with a live test call). See DESIGN.md Open
//! Question 2.

pub const DEFAULT_REMOTE_DIM: i32 = 1536;
pub const DEFAULT_LOCAL_DIM: i32 = 384;

const KNOWN_MODELS: &[(&str, i32)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
    ("nomic-embed-text", 768),
    ("mxbai-embed-large", 1024),
    ("all-minilm", 384),
];

pub fn dimension_for(model: &str, is_remote: bool) -> i32 {
    KNOWN_MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dim)| *dim)
        .unwrap_or(if is_remote {
            DEFAULT_REMOTE_DIM
        } else {
            DEFAULT_LOCAL_DIM
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_known_model_when_looked_up_then_returns_declared_dimension() {
        assert_eq!(dimension_for("nomic-embed-text", false), 768);
    }

    #[test]
    fn given_unknown_model_when_looked_up_then_returns_family_default() {
        assert_eq!(dimension_for("mystery-model", true), DEFAULT_REMOTE_DIM);
        assert_eq!(dimension_for("mystery-model", false), DEFAULT_LOCAL_DIM);
    }
}
