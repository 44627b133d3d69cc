//! In-memory [`ByteStore`] implementation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{ProxyCacheError, Result};
use crate::store::ByteStore;

/// Memory-backed store; useful for small resources and tests.
///
/// Bytes live in a `Vec<u8>` behind a read-write lock, so appends are atomic
/// with respect to concurrent reads. Addressable range is capped by `usize`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Vec<u8>>,
    completed: AtomicBool,
    max_read_position: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `data`, not yet completed.
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            completed: AtomicBool::new(false),
            max_read_position: AtomicU64::new(0),
        }
    }
}

impl ByteStore for MemoryStore {
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let data = self.data.read();
        if offset >= data.len() as u64 {
            return Ok(0);
        }
        let start = usize::try_from(offset).map_err(|_| ProxyCacheError::InvalidOffset(offset))?;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        drop(data);
        if n > 0 {
            self.max_read_position
                .fetch_max(offset + n as u64, Ordering::AcqRel);
        }
        Ok(n)
    }

    fn available(&self) -> u64 {
        self.data.read().len() as u64
    }

    fn append(&self, data: &[u8]) -> Result<()> {
        if self.is_completed() {
            return Err(ProxyCacheError::StoreCompleted);
        }
        self.data.write().extend_from_slice(data);
        Ok(())
    }

    fn complete(&self) -> Result<()> {
        self.completed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    fn max_read_position(&self) -> u64 {
        self.max_read_position.load(Ordering::Acquire)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
