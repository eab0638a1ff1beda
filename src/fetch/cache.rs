// src/fetch/cache.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use super::DataSource;
use crate::error::IngestError;
use crate::process::{self, Dataset};

/// Loads and normalizes once, then serves the same [`Dataset`] until it
/// goes stale.
///
/// `ttl = None` keeps the first successful load for the loader's lifetime.
/// Failed loads are never cached.
pub struct CachedLoader<S: DataSource> {
    source: S,
    ttl: Option<Duration>,
    slot: Mutex<Option<(Instant, Arc<Dataset>)>>,
}

impl<S: DataSource> CachedLoader<S> {
    pub fn new(source: S, ttl: Option<Duration>) -> Self {
        Self {
            source,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn is_fresh(&self, loaded_at: Instant) -> bool {
        match self.ttl {
            None => true,
            Some(ttl) => loaded_at.elapsed() < ttl,
        }
    }

    /// The cached dataset, reloading from the source when missing or stale.
    #[instrument(level = "debug", skip(self))]
    pub async fn dataset(&self) -> Result<Arc<Dataset>, IngestError> {
        let mut slot = self.slot.lock().await;
        if let Some((loaded_at, ds)) = slot.as_ref() {
            if self.is_fresh(*loaded_at) {
                debug!("serving cached dataset");
                return Ok(Arc::clone(ds));
            }
        }

        info!(source = %self.source.describe(), "loading dataset");
        let batches = self.source.load().await?;
        let ds = Arc::new(process::normalize_all(&batches));
        *slot = Some((Instant::now(), Arc::clone(&ds)));
        Ok(ds)
    }

    /// Drop the cached dataset so the next call reloads.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
