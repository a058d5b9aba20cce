//! Load-once shared values with explicit invalidation.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

/// A value loaded on first access and cached until [`invalidate`](Self::invalidate).
///
/// Concurrent first accesses share one load. A failed load is not
/// cached; the next access tries again.
pub struct InitOnce<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> Default for InitOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InitOnce<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value, running `load` if there is none.
    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(load().await?);
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }

    /// The cached value, without loading.
    pub async fn get(&self) -> Option<Arc<T>> {
        self.slot.lock().await.clone()
    }

    /// Drop the cached value; the next access reloads.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }
}
