//! Fan-in collection of handles produced by concurrent tasks.

use parking_lot::Mutex;
use permload_core::{Error, Result};

/// Append-only collector, frozen once after every producer has finished.
///
/// Pushing after [`freeze`](Self::freeze) is rejected rather than silently
/// dropped.
pub struct HandleCollector<T> {
    inner: Mutex<Option<Vec<T>>>,
}

impl<T> HandleCollector<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn push(&self, item: T) -> Result<()> {
        match self.inner.lock().as_mut() {
            Some(items) => {
                items.push(item);
                Ok(())
            }
            None => Err(Error::CollectorFrozen),
        }
    }

    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        match self.inner.lock().as_mut() {
            Some(existing) => {
                existing.extend(items);
                Ok(())
            }
            None => Err(Error::CollectorFrozen),
        }
    }

    /// Take the collected items. Only the first call succeeds.
    pub fn freeze(&self) -> Result<Vec<T>> {
        self.inner.lock().take().ok_or(Error::CollectorFrozen)
    }

    /// Items collected so far; 0 once frozen.
    pub fn len(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for HandleCollector<T> {
    fn default() -> Self {
        Self::new()
    }
}
