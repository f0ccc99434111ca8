use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use alexandria_types::{AlexandriaError, EntityKey};

/// Batch-scoped keyed table of pending find-or-create operations.
///
/// When a batch processes many editions concurrently, several of them may
/// reference the same previously-unknown author or work. The first caller
/// for a key runs the lookup-then-insert; every other caller awaits the
/// same cell and reuses the resulting key, so exactly one insert happens
/// per key per batch. The table is scoped to one request or one queue
/// batch; cross-process collisions are handled by store uniqueness, which
/// callers treat as success by re-reading.
#[derive(Default)]
pub struct PendingCreations {
    cells: Mutex<HashMap<String, Arc<OnceCell<EntityKey>>>>,
}

impl PendingCreations {
    /// Create an empty table for one batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `create` at most once for `key` within this batch, returning
    /// the created (or concurrently-created) entity key to every caller.
    ///
    /// If `create` fails, the failure propagates to the caller that ran it
    /// and the cell stays empty, so a later caller retries.
    pub async fn get_or_create<F, Fut>(
        &self,
        key: &str,
        create: F,
    ) -> Result<EntityKey, AlexandriaError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EntityKey, AlexandriaError>>,
    {
        let cell = {
            let mut cells = self.cells.lock().await;
            cells.entry(key.to_string()).or_default().clone()
        };
        cell.get_or_try_init(create).await.copied()
    }
}
