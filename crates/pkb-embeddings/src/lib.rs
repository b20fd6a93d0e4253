//! Embedding generation: provider abstraction, content cleaning, and the
//! static dimension table (§4.1, §4.1a).

pub mod clean;
pub mod dimension;
pub mod provider;
pub mod service;

pub use clean::clean as content_clean;
pub use provider::{EmbeddingProvider, LocalProvider, RemoteProvider};
pub use service::{EmbeddingService, ProviderKind};
