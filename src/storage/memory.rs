use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::Store;
use crate::error::Result;

/// In-memory [`Store`] for tests and dry runs.
#[derive(Debug)]
pub struct MemoryStore<T> {
    document: Mutex<Option<T>>,
    saves: AtomicUsize,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            document: Mutex::new(None),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn with(document: T) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default> Store<T> for MemoryStore<T> {
    fn load(&self) -> Result<T> {
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(document.clone().unwrap_or_default())
    }

    fn save(&self, document: &T) -> Result<()> {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn location(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(":memory:"))
    }
}
