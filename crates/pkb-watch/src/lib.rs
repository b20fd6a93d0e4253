//! Filesystem watcher and differential indexer (§4.5): a `notify`-backed
//! debounce engine (`engine`/`worker`/`normalize`/`path`) feeding an
//! `Indexer` that re-parses and re-stores only the paths that actually
//! changed.

mod engine;
mod indexer;
mod normalize;
mod path;
mod types;
mod worker;

pub use engine::{start_space_watch, SpaceWatcherHandle};
pub use indexer::Indexer;
pub use types::{EventBatch, RenamePair, SpaceWatchError, WatchConfig};
