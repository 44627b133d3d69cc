//! # Byte Stores
//!
//! A [`ByteStore`] is an append-only, randomly-readable byte container with a
//! completion flag and a high-water mark of bytes ever delivered to a reader.
//! One fetch worker appends while arbitrarily many consumer threads read, so
//! every method takes `&self` and implementations synchronize internally:
//! readers observe either the pre- or post-append state, never a torn one.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;

/// Append-only byte container backing a [`ProxyCache`](crate::ProxyCache).
pub trait ByteStore {
    /// Copy up to `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Returns `Ok(0)` when `offset` is at or past [`available`](Self::available)
    /// (end of data, not an error). A successful non-empty read raises the
    /// high-water mark to `offset + n`. Offsets the backing container cannot
    /// address fail with [`InvalidOffset`](crate::ProxyCacheError::InvalidOffset).
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Total bytes currently stored. Never decreases, and never changes again
    /// once the store is completed.
    fn available(&self) -> u64;

    /// Append `data` to the store.
    ///
    /// The single mutator of stored bytes; fails with
    /// [`StoreCompleted`](crate::ProxyCacheError::StoreCompleted) once the
    /// store has been completed.
    fn append(&self, data: &[u8]) -> Result<()>;

    /// Idempotently mark the store as holding the entire resource.
    fn complete(&self) -> Result<()>;

    fn is_completed(&self) -> bool;

    /// High-water mark: the furthest offset ever delivered to a caller of
    /// [`read`](Self::read). Always `<=` [`available`](Self::available);
    /// drives fetch backpressure, distinct from total bytes stored.
    fn max_read_position(&self) -> u64;

    /// Release underlying resources.
    fn close(&self) -> Result<()>;
}
