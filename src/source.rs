//! # Source Contract
//!
//! A [`Source`] is the external producer of the original byte stream, e.g. a
//! network resource. The fetch worker owns it exclusively: it opens one
//! session per activation, pulls bytes sequentially and closes the session
//! when the transfer ends, fails or is stopped.

use crate::error::Result;

/// A readable byte stream that can be opened at an arbitrary offset.
///
/// Implementations must support resuming: `open(offset)` positions the next
/// `read` at `offset` bytes into the resource. The resource is assumed
/// immutable for the lifetime of a cache entry.
pub trait Source: Send {
    /// Open a session starting at `offset` bytes into the resource.
    fn open(&mut self, offset: u64) -> Result<()>;

    /// Total length of the resource in bytes, or `None` when unknown.
    ///
    /// Only meaningful after a successful [`open`](Self::open).
    fn length(&self) -> Option<u64>;

    /// Read the next bytes of the open session into `buf`.
    ///
    /// Returns `Ok(0)` at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Close the open session, releasing any underlying resources.
    fn close(&mut self) -> Result<()>;
}
