//! # Mediacache
//!
//! A blocking proxy-cache engine for streaming media playback. A consumer
//! (e.g. a media player) reads a remote byte stream as if it were a
//! fully-buffered local file while a single background worker fetches the
//! stream once, appends it to a persistent byte store and throttles its own
//! fetch rate.
//!
//! ## Features
//!
//! - Blocking [`ProxyCache::read`] that waits for bytes a concurrent fetch is
//!   still producing
//! - Append-only [`ByteStore`] contract with in-memory and file-backed
//!   implementations
//! - Self-throttling fetch worker: configurable rate cap (size-scaled for big
//!   resources) and look-ahead backpressure
//! - Progress and error callbacks
//! - HTTP(S) source with range-based resume (cargo feature `http`, default)
//!
//! Only suitable for sources with persistent data that does not change with
//! time, e.g. streaming video or audio with caching.

pub mod config;
pub mod error;
pub mod events;
#[cfg(feature = "http")]
pub mod http;
pub mod proxy_cache;
pub mod source;
pub mod store;

pub use config::{ProxyCacheConfig, ProxyCacheConfigBuilder};
pub use error::{ProxyCacheError, Result};
pub use events::{CacheCallbacks, OnCacheError, OnPercentChanged};
#[cfg(feature = "http")]
pub use http::HttpSource;
pub use proxy_cache::ProxyCache;
pub use source::Source;
pub use store::{ByteStore, FileStore, MemoryStore};
