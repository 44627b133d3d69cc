//! # Proxy Cache Configuration
//!
//! Immutable tunables for the fetch worker: the baseline download-rate cap,
//! the big-file scaling rule, the source retry budget and the look-ahead
//! bound used for backpressure.

/// Default download-rate cap in bytes per second (100 KiB/s).
pub const DEFAULT_DOWNLOAD_RATE: u64 = 100 * 1024;

/// Default size above which a resource counts as "big" (6 MiB).
pub const DEFAULT_BIG_FILE_SIZE: u64 = 6 * 1024 * 1024;

/// Default minimum number of seconds a big-file transfer is allowed to take.
pub const DEFAULT_BIG_FILE_MIN_TRANSFER_SECS: u64 = 120;

/// Default number of bytes the worker may fetch ahead of the furthest
/// consumer read before pausing (500 KiB).
pub const DEFAULT_MAX_PREFETCH_GAP: u64 = 500 * 1024;

/// Default chunk size for source reads (8 KiB).
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Configurable options for a [`ProxyCache`](crate::ProxyCache).
#[derive(Debug, Clone)]
pub struct ProxyCacheConfig {
    /// Baseline download-rate cap in bytes per second. Zero falls back to
    /// [`DEFAULT_DOWNLOAD_RATE`].
    pub normal_download_rate: u64,

    /// Resources longer than this many bytes are allowed to exceed the
    /// baseline rate cap so they still finish within
    /// [`big_file_min_transfer_secs`](Self::big_file_min_transfer_secs).
    pub big_file_size: u64,

    /// Minimum number of seconds a big-file transfer must take.
    pub big_file_min_transfer_secs: u64,

    /// Consecutive source failures tolerated before a blocked read fails.
    /// Must be at least 1; the default of 1 means no silent retry.
    pub max_source_read_attempts: usize,

    /// Size of the buffer used for each source read.
    pub read_chunk_size: usize,

    /// How far the fetch may run ahead of the furthest consumer read before
    /// it pauses for backpressure.
    pub max_prefetch_gap: u64,
}

impl Default for ProxyCacheConfig {
    fn default() -> Self {
        Self {
            normal_download_rate: DEFAULT_DOWNLOAD_RATE,
            big_file_size: DEFAULT_BIG_FILE_SIZE,
            big_file_min_transfer_secs: DEFAULT_BIG_FILE_MIN_TRANSFER_SECS,
            max_source_read_attempts: 1,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_prefetch_gap: DEFAULT_MAX_PREFETCH_GAP,
        }
    }
}

impl ProxyCacheConfig {
    pub fn builder() -> ProxyCacheConfigBuilder {
        ProxyCacheConfigBuilder::default()
    }

    /// Effective rate cap for a resource of the given length.
    ///
    /// Starts from the baseline cap; a resource known to be bigger than
    /// [`big_file_size`](Self::big_file_size) raises the cap to whatever rate
    /// finishes the whole transfer in
    /// [`big_file_min_transfer_secs`](Self::big_file_min_transfer_secs), if
    /// that is higher. Small resources stay deliberately throttled since the
    /// consumer may abandon them early.
    pub fn rate_cap_for(&self, source_length: Option<u64>) -> u64 {
        let mut cap = if self.normal_download_rate > 0 {
            self.normal_download_rate
        } else {
            DEFAULT_DOWNLOAD_RATE
        };
        if let Some(length) = source_length
            && self.big_file_size > 0
            && self.big_file_min_transfer_secs > 0
            && length > self.big_file_size
        {
            cap = cap.max(length / self.big_file_min_transfer_secs);
        }
        cap
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProxyCacheConfigBuilder {
    config: ProxyCacheConfig,
}

impl ProxyCacheConfigBuilder {
    pub fn normal_download_rate(mut self, bytes_per_second: u64) -> Self {
        self.config.normal_download_rate = bytes_per_second;
        self
    }

    pub fn big_file_size(mut self, bytes: u64) -> Self {
        self.config.big_file_size = bytes;
        self
    }

    pub fn big_file_min_transfer_secs(mut self, seconds: u64) -> Self {
        self.config.big_file_min_transfer_secs = seconds;
        self
    }

    pub fn max_source_read_attempts(mut self, attempts: usize) -> Self {
        self.config.max_source_read_attempts = attempts.max(1);
        self
    }

    pub fn read_chunk_size(mut self, bytes: usize) -> Self {
        self.config.read_chunk_size = bytes.max(1);
        self
    }

    pub fn max_prefetch_gap(mut self, bytes: u64) -> Self {
        self.config.max_prefetch_gap = bytes;
        self
    }

    pub fn build(self) -> ProxyCacheConfig {
        self.config
    }
}
