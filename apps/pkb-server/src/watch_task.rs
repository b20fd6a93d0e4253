//! Bridges `pkb_watch::start_space_watch`'s synchronous `FnMut(EventBatch)`
//! callback onto the async `Indexer` (§4.5, §4.7 AMBIENT "single-threaded
//! cooperative loop"): a dedicated OS thread owns a current-thread Tokio
//! runtime and the `Indexer`, draining a `std::sync::mpsc` channel that the
//! watcher's own debounce worker feeds batches into.

use std::path::Path;
use std::sync::mpsc;
use std::thread::JoinHandle;

use pkb_watch::{start_space_watch, EventBatch, Indexer, SpaceWatchError, SpaceWatcherHandle, WatchConfig};

pub struct WatchTask {
    watcher: SpaceWatcherHandle,
    worker: Option<JoinHandle<()>>,
}

impl WatchTask {
    pub fn start(space_root: &Path, mut indexer: Indexer) -> Result<Self, SpaceWatchError> {
        let (tx, rx) = mpsc::channel::<EventBatch>();

        let worker = std::thread::Builder::new()
            .name("pkb-indexer".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build indexer runtime");

                for batch in rx {
                    if let Err(error) = runtime.block_on(indexer.handle_batch(&batch)) {
                        tracing::error!(%error, "failed to apply watch batch");
                    }
                }
            })
            .expect("failed to spawn indexer worker thread");

        let watcher = start_space_watch(space_root, WatchConfig::default(), move |batch| {
            let _ = tx.send(batch);
        })?;

        Ok(Self {
            watcher,
            worker: Some(worker),
        })
    }

    pub fn stop(mut self) {
        if let Err(error) = self.watcher.stop() {
            tracing::warn!(%error, "failed to stop space watcher cleanly");
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
