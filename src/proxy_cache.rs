//! # Proxy-Cache Coordinator
//!
//! [`ProxyCache`] lets a consumer read a remote byte stream as if it were a
//! fully-buffered local file. A blocking [`read`](ProxyCache::read) serves
//! bytes out of a [`ByteStore`] while a single background worker pulls the
//! stream from a [`Source`] once, appends it to the store and paces itself:
//! it caps its own download rate (size-scaled for big resources) and pauses
//! when it runs too far ahead of what any consumer has actually read.
//!
//! Only usable for sources with persistent data that does not change with
//! time; there is no revalidation once bytes are cached.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace, warn};

use crate::config::ProxyCacheConfig;
use crate::error::{ProxyCacheError, Result};
use crate::events::CacheCallbacks;
use crate::source::Source;
use crate::store::ByteStore;

/// How long a blocked read waits before re-checking stop and error state.
const DATA_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Rate-shaping sleeps shorter than this are skipped to avoid needless
/// context switches.
const MIN_SHAPING_SLEEP: Duration = Duration::from_millis(60);

/// Observable lifecycle of the fetch worker.
///
/// Tracked explicitly instead of inspecting a thread handle so a worker that
/// has finished running is treated as absent even while its handle is still
/// referenced somewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Idle,
    Running,
    Finished,
}

/// A wait/notify pair. Notifications are safe no-ops when nobody is waiting.
struct Gate {
    lock: Mutex<()>,
    cond: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    fn notify_all(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }

    /// Wait until notified or `timeout` elapses.
    fn wait_for(&self, timeout: Duration) {
        let mut guard = self.lock.lock();
        self.cond.wait_for(&mut guard, timeout);
    }

    /// Wait untimed until notified. Returns `false` without waiting when
    /// `cancelled` already holds, and `false` after waking when it holds.
    fn wait_unless(&self, cancelled: impl Fn() -> bool) -> bool {
        let mut guard = self.lock.lock();
        if cancelled() {
            return false;
        }
        self.cond.wait(&mut guard);
        !cancelled()
    }
}

/// Proxy between one [`Source`] and one [`ByteStore`] with blocking reads.
///
/// Reads block while the background fetch catches up and may be issued from
/// arbitrarily many threads. Dropping the proxy shuts it down.
pub struct ProxyCache<S, C>
where
    S: Source + 'static,
    C: ByteStore + Send + Sync + 'static,
{
    inner: Arc<Inner<S, C>>,
}

struct Inner<S, C> {
    /// Owned exclusively by the active fetch worker; the lock is held for a
    /// whole fetch session.
    source: Mutex<S>,
    store: C,
    config: ProxyCacheConfig,
    callbacks: CacheCallbacks,
    /// Monotonic false -> true, set by shutdown.
    stopped: AtomicBool,
    /// Serializes shutdown against the worker's stop-check + append pair.
    stop_lock: Mutex<()>,
    worker_state: Mutex<WorkerState>,
    /// Woken whenever the store grows (or a fetch attempt ends).
    data_available: Gate,
    /// Woken when a consumer needs bytes the worker paused on.
    need_data: Gate,
    read_source_errors: AtomicUsize,
    /// The fetch reached end of stream without being able to complete the
    /// store (unknown or mismatched length); nothing more will ever arrive.
    source_exhausted: AtomicBool,
    /// Last percentage published to the progress callback; -1 before the
    /// first report.
    percents_available: AtomicI64,
}

impl<S, C> ProxyCache<S, C>
where
    S: Source + 'static,
    C: ByteStore + Send + Sync + 'static,
{
    pub fn new(source: S, store: C, config: ProxyCacheConfig) -> Self {
        Self::with_callbacks(source, store, config, CacheCallbacks::default())
    }

    pub fn with_callbacks(
        source: S,
        store: C,
        config: ProxyCacheConfig,
        callbacks: CacheCallbacks,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source: Mutex::new(source),
                store,
                config,
                callbacks,
                stopped: AtomicBool::new(false),
                stop_lock: Mutex::new(()),
                worker_state: Mutex::new(WorkerState::Idle),
                data_available: Gate::new(),
                need_data: Gate::new(),
                read_source_errors: AtomicUsize::new(0),
                source_exhausted: AtomicBool::new(false),
                percents_available: AtomicI64::new(-1),
            }),
        }
    }

    /// Copy up to `buf.len()` bytes starting at `offset` of the resource into
    /// `buf`, blocking until the background fetch has produced them.
    ///
    /// Returns `Ok(0)` at end of data; a stream that ends before reaching
    /// `offset + buf.len()` yields a short read once the fetch has drained
    /// it. Fails with
    /// [`SourceAttemptsExhausted`](ProxyCacheError::SourceAttemptsExhausted)
    /// once the fetch has failed the configured number of consecutive times.
    pub fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let inner = &self.inner;
        let end = offset.checked_add(buf.len() as u64).ok_or_else(|| {
            ProxyCacheError::InvalidArgument(format!(
                "offset {offset} + length {} overflows",
                buf.len()
            ))
        })?;

        while !inner.store.is_completed()
            && inner.store.available() < end
            && !inner.is_stopped()
            && !inner.is_source_exhausted()
        {
            inner.ensure_fetching()?;
            inner.data_available.wait_for(DATA_WAIT_TIMEOUT);
            inner.check_read_source_errors()?;
        }

        let read = inner.store.read(buf, offset)?;
        if inner.store.is_completed() && inner.percents_available.load(Ordering::SeqCst) != 100 {
            inner.percents_available.store(100, Ordering::SeqCst);
            inner.callbacks.percent_changed(100);
        }
        Ok(read)
    }

    /// Total bytes fetched so far.
    pub fn available(&self) -> u64 {
        self.inner.store.available()
    }

    /// Whether the whole resource has been fetched.
    pub fn is_completed(&self) -> bool {
        self.inner.store.is_completed()
    }

    /// Stop fetching and close the store.
    ///
    /// Idempotent and safe to call while reads or a fetch iteration are in
    /// flight: the worker stops at its next loop boundary and any blocked
    /// read is released within the wait timeout. Store-close errors are
    /// reported through the error callback, never returned.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        {
            let _guard = inner.stop_lock.lock();
            if !inner.stopped.swap(true, Ordering::SeqCst) {
                debug!("shutting down proxy cache");
                if let Err(err) = inner.store.close() {
                    inner.report_error(&err);
                }
            }
        }
        // Release the worker's backpressure wait and any blocked readers.
        inner.need_data.notify_all();
        inner.data_available.notify_all();
    }
}

impl<S, C> Drop for ProxyCache<S, C>
where
    S: Source + 'static,
    C: ByteStore + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<S, C> Inner<S, C>
where
    S: Source + 'static,
    C: ByteStore + Send + Sync + 'static,
{
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn is_source_exhausted(&self) -> bool {
        self.source_exhausted.load(Ordering::SeqCst)
    }

    /// Make sure bytes are on their way: start the single fetch worker if
    /// none is active, otherwise wake one paused for backpressure. The
    /// decision is made under one lock so two workers can never run against
    /// the same source/store pair.
    fn ensure_fetching(self: &Arc<Self>) -> Result<()> {
        let mut state = self.worker_state.lock();
        if self.is_stopped() || self.store.is_completed() || self.is_source_exhausted() {
            return Ok(());
        }
        if *state == WorkerState::Running {
            // Harmless no-op if the worker is actively fetching.
            self.need_data.notify_all();
            return Ok(());
        }
        *state = WorkerState::Running;
        let worker = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("mediacache-fetch".into())
            .spawn(move || {
                worker.run_fetch();
                *worker.worker_state.lock() = WorkerState::Finished;
            });
        if let Err(err) = spawned {
            *state = WorkerState::Finished;
            return Err(err.into());
        }
        Ok(())
    }

    /// Surface accumulated fetch failures to a blocked reader, resetting the
    /// counter once they are reported.
    fn check_read_source_errors(&self) -> Result<()> {
        let errors = self.read_source_errors.load(Ordering::SeqCst);
        if errors >= self.config.max_source_read_attempts {
            self.read_source_errors.store(0, Ordering::SeqCst);
            return Err(ProxyCacheError::SourceAttemptsExhausted(errors));
        }
        Ok(())
    }

    /// One fetch activation: resume where the store left off and transfer
    /// until end of stream, failure or stop.
    fn run_fetch(&self) {
        let mut progress = FetchProgress::default();
        if let Err(err) = self.fetch(&mut progress) {
            self.read_source_errors.fetch_add(1, Ordering::SeqCst);
            self.report_error(&err);
        }
        if let Err(err) = self.source.lock().close() {
            self.report_error(&err);
        }
        // Wake blocked readers even on failure so they re-evaluate the error
        // counter instead of hanging.
        self.notify_new_data_available(progress.offset, progress.source_length);
    }

    fn fetch(&self, progress: &mut FetchProgress) -> Result<()> {
        let mut source = self.source.lock();

        let mut offset = self.store.available();
        source.open(offset)?;
        let source_length = source.length();
        progress.offset = offset;
        progress.source_length = source_length;

        let max_rate = self.config.rate_cap_for(source_length);
        let started = Instant::now();
        let mut total_read: u64 = 0;
        let mut chunk = vec![0u8; self.config.read_chunk_size];
        debug!(offset, length = ?source_length, max_rate, "fetch started");

        loop {
            let read = source.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            {
                // Same lock shutdown takes: an in-flight append can never
                // race store closure.
                let _guard = self.stop_lock.lock();
                if self.is_stopped() {
                    debug!(offset, "fetch stopped");
                    return Ok(());
                }
                self.store.append(&chunk[..read])?;
            }
            offset += read as u64;
            total_read += read as u64;
            progress.offset = offset;
            trace!(offset, read, "fetched chunk");
            self.notify_new_data_available(offset, source_length);

            self.shape_rate(total_read, started, max_rate);

            if let Some(length) = source_length {
                let remaining = length.saturating_sub(offset);
                let lead = offset.saturating_sub(self.store.max_read_position());
                if remaining > self.config.max_prefetch_gap && lead > self.config.max_prefetch_gap
                {
                    trace!(offset, lead, remaining, "fetch ahead of readers, pausing");
                    self.wait_for_store_consumed()?;
                }
            }
        }

        drop(source);
        self.try_complete(source_length)?;
        if !self.store.is_completed() {
            // End of stream with the store still open: readers waiting past
            // the final size would otherwise respawn instantly-EOF fetches.
            debug!(offset, length = ?source_length, "source exhausted without completing store");
            self.source_exhausted.store(true, Ordering::SeqCst);
        }
        self.on_source_read();
        Ok(())
    }

    /// Sleep long enough to bring the average transfer rate back under
    /// `max_rate` bytes per second.
    fn shape_rate(&self, total_read: u64, started: Instant, max_rate: u64) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if elapsed_ms == 0 {
            return;
        }
        let rate = total_read * 1000 / elapsed_ms;
        if rate > max_rate {
            let sleep = Duration::from_millis((total_read * 1000 / max_rate) - elapsed_ms);
            if sleep > MIN_SHAPING_SLEEP {
                trace!(rate, max_rate, sleep_ms = sleep.as_millis() as u64, "rate shaping");
                thread::sleep(sleep);
            }
        }
    }

    /// Block until a consumer read asks for more data.
    fn wait_for_store_consumed(&self) -> Result<()> {
        if self.need_data.wait_unless(|| self.is_stopped()) {
            Ok(())
        } else {
            Err(ProxyCacheError::Interrupted)
        }
    }

    fn try_complete(&self, source_length: Option<u64>) -> Result<()> {
        let _guard = self.stop_lock.lock();
        if !self.is_stopped() && source_length == Some(self.store.available()) {
            self.store.complete()?;
            debug!(length = self.store.available(), "fetch completed");
        }
        Ok(())
    }

    /// Publish the progress percentage (when it changed) and wake readers
    /// waiting for bytes.
    fn notify_new_data_available(&self, cache_available: u64, source_length: Option<u64>) {
        self.publish_percent(cache_available, source_length);
        self.data_available.notify_all();
    }

    fn publish_percent(&self, cache_available: u64, source_length: Option<u64>) {
        // Unknown length: no percentage to report.
        let Some(length) = source_length else { return };
        let percent = if length == 0 {
            100
        } else {
            (cache_available.saturating_mul(100) / length).min(100) as i64
        };
        let previous = self.percents_available.swap(percent, Ordering::SeqCst);
        if percent != previous {
            self.callbacks.percent_changed(percent as u8);
        }
    }

    /// Guaranteed final notification once the source is fully read.
    fn on_source_read(&self) {
        self.percents_available.store(100, Ordering::SeqCst);
        self.callbacks.percent_changed(100);
    }

    fn report_error(&self, err: &ProxyCacheError) {
        if err.is_interruption() {
            debug!("fetch interrupted by shutdown");
        } else if matches!(err, ProxyCacheError::SourceClose(_)) {
            warn!(error = %err, "error closing source");
        } else {
            error!(error = %err, "proxy cache error");
        }
        self.callbacks.error(err);
    }
}

#[derive(Debug, Default)]
struct FetchProgress {
    offset: u64,
    source_length: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use parking_lot::Mutex as PlMutex;
    use rand::RngCore;
    use std::sync::atomic::AtomicUsize;

    #[inline]
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    /// Scriptable in-memory source for driving the coordinator.
    #[derive(Debug)]
    struct TestSource {
        data: Arc<Vec<u8>>,
        position: usize,
        chunk: usize,
        /// Report `None` as the length even though data is finite.
        unknown_length: bool,
        /// Fail every read attempt.
        fail_reads: bool,
        opens: Arc<AtomicUsize>,
        read_delay: Duration,
    }

    impl TestSource {
        fn new(data: Vec<u8>) -> Self {
            Self {
                data: Arc::new(data),
                position: 0,
                chunk: 64,
                unknown_length: false,
                fail_reads: false,
                opens: Arc::new(AtomicUsize::new(0)),
                read_delay: Duration::ZERO,
            }
        }

        fn open_counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.opens)
        }
    }

    impl Source for TestSource {
        fn open(&mut self, offset: u64) -> Result<()> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if offset > self.data.len() as u64 {
                return Err(ProxyCacheError::SourceOpen(
                    format!("offset {offset} beyond resource").into(),
                ));
            }
            self.position = offset as usize;
            Ok(())
        }

        fn length(&self) -> Option<u64> {
            if self.unknown_length {
                None
            } else {
                Some(self.data.len() as u64)
            }
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.fail_reads {
                return Err(ProxyCacheError::SourceRead("scripted failure".into()));
            }
            if !self.read_delay.is_zero() {
                thread::sleep(self.read_delay);
            }
            let n = buf
                .len()
                .min(self.chunk)
                .min(self.data.len() - self.position);
            buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
            self.position += n;
            Ok(n)
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn fast_config() -> ProxyCacheConfig {
        // High rate cap so tests never sit in shaping sleeps.
        ProxyCacheConfig::builder()
            .normal_download_rate(u64::MAX / 2000)
            .build()
    }

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        rand::rng().fill_bytes(&mut data);
        data
    }

    /// The last bytes of a read can be served a moment before the worker
    /// marks the store completed; poll briefly instead of racing it.
    fn wait_completed<S, C>(proxy: &ProxyCache<S, C>) -> bool
    where
        S: Source + 'static,
        C: ByteStore + Send + Sync + 'static,
    {
        for _ in 0..200 {
            if proxy.is_completed() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_full_read_round_trip_and_completion() {
        init_tracing();
        let data = random_bytes(1000);
        let proxy = ProxyCache::new(
            TestSource::new(data.clone()),
            MemoryStore::new(),
            fast_config(),
        );

        let mut buf = vec![0u8; 1000];
        let n = proxy.read(&mut buf, 0).unwrap();
        assert_eq!(n, 1000);
        assert_eq!(buf, data);
        assert!(wait_completed(&proxy));
    }

    #[test]
    fn test_arbitrary_ranges_match_source_bytes() {
        init_tracing();
        let data = random_bytes(4096);
        let proxy = ProxyCache::new(
            TestSource::new(data.clone()),
            MemoryStore::new(),
            fast_config(),
        );

        for (offset, len) in [(0usize, 1usize), (1, 511), (1024, 2048), (4000, 96)] {
            let mut buf = vec![0u8; len];
            let n = proxy.read(&mut buf, offset as u64).unwrap();
            assert_eq!(n, len);
            assert_eq!(&buf, &data[offset..offset + len]);
        }
    }

    #[test]
    fn test_read_past_end_returns_end_of_data() {
        let data = random_bytes(100);
        let proxy = ProxyCache::new(TestSource::new(data), MemoryStore::new(), fast_config());

        let mut buf = vec![0u8; 100];
        proxy.read(&mut buf, 0).unwrap();
        assert_eq!(proxy.read(&mut buf, 100).unwrap(), 0);
        assert_eq!(proxy.read(&mut buf, 5000).unwrap(), 0);
    }

    #[test]
    fn test_offset_overflow_is_invalid_argument() {
        let proxy = ProxyCache::new(
            TestSource::new(vec![0; 16]),
            MemoryStore::new(),
            fast_config(),
        );
        let mut buf = [0u8; 8];
        assert!(matches!(
            proxy.read(&mut buf, u64::MAX - 2),
            Err(ProxyCacheError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_concurrent_readers_share_one_fetch_worker() {
        init_tracing();
        let data = random_bytes(2048);
        let source = TestSource::new(data.clone());
        let opens = source.open_counter();
        let proxy = Arc::new(ProxyCache::new(source, MemoryStore::new(), fast_config()));

        let mut handles = Vec::new();
        for (offset, len) in [(0u64, 100usize), (500, 100), (1500, 548), (2000, 48)] {
            let proxy = Arc::clone(&proxy);
            handles.push(thread::spawn(move || {
                let mut buf = vec![0u8; len];
                let n = proxy.read(&mut buf, offset).unwrap();
                (offset, buf, n)
            }));
        }
        for handle in handles {
            let (offset, buf, n) = handle.join().unwrap();
            assert_eq!(n, buf.len());
            assert_eq!(&buf, &data[offset as usize..offset as usize + n]);
        }
        // A single fetch session served every reader.
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_source_fails_blocked_reader_and_resets_counter() {
        init_tracing();
        let mut source = TestSource::new(random_bytes(512));
        source.fail_reads = true;
        let errors = Arc::new(PlMutex::new(Vec::new()));
        let callbacks = {
            let errors = Arc::clone(&errors);
            CacheCallbacks::new().with_error(move |e| errors.lock().push(e.to_string()))
        };
        let proxy =
            ProxyCache::with_callbacks(source, MemoryStore::new(), fast_config(), callbacks);

        let mut buf = [0u8; 64];
        match proxy.read(&mut buf, 0) {
            Err(ProxyCacheError::SourceAttemptsExhausted(attempts)) => assert!(attempts >= 1),
            other => panic!("expected SourceAttemptsExhausted, got {other:?}"),
        }
        assert_eq!(proxy.inner.read_source_errors.load(Ordering::SeqCst), 0);
        assert!(!errors.lock().is_empty());
    }

    #[test]
    fn test_shutdown_releases_blocked_reader() {
        init_tracing();
        // A source that reports data but trickles it out very slowly keeps
        // the reader blocked.
        let mut source = TestSource::new(random_bytes(1 << 20));
        source.chunk = 1;
        source.read_delay = Duration::from_millis(50);
        let proxy = Arc::new(ProxyCache::new(source, MemoryStore::new(), fast_config()));

        let reader = {
            let proxy = Arc::clone(&proxy);
            thread::spawn(move || {
                let mut buf = vec![0u8; 1 << 20];
                proxy.read(&mut buf, 0)
            })
        };

        thread::sleep(Duration::from_millis(100));
        proxy.shutdown();

        // The reader must come back (bytes read so far, end-of-data or a
        // surfaced fetch failure), not hang.
        let outcome = reader.join().unwrap();
        match outcome {
            Ok(_) => {}
            Err(err) => assert!(
                matches!(err, ProxyCacheError::SourceAttemptsExhausted(_)),
                "unexpected error after shutdown: {err:?}"
            ),
        }
    }

    #[test]
    fn test_no_append_after_shutdown() {
        let mut source = TestSource::new(random_bytes(1 << 20));
        source.chunk = 256;
        source.read_delay = Duration::from_millis(5);
        let proxy = Arc::new(ProxyCache::new(source, MemoryStore::new(), fast_config()));

        let reader = {
            let proxy = Arc::clone(&proxy);
            thread::spawn(move || {
                let mut buf = vec![0u8; 4096];
                let _ = proxy.read(&mut buf, 0);
            })
        };
        thread::sleep(Duration::from_millis(40));
        proxy.shutdown();
        reader.join().unwrap();

        let frozen = proxy.available();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(proxy.available(), frozen, "store grew after shutdown");
    }

    #[test]
    fn test_progress_is_monotonic_and_ends_at_one_hundred() {
        init_tracing();
        let reported = Arc::new(PlMutex::new(Vec::new()));
        let callbacks = {
            let reported = Arc::clone(&reported);
            CacheCallbacks::new().with_percent_changed(move |p| reported.lock().push(p))
        };
        let mut source = TestSource::new(random_bytes(1000));
        source.chunk = 100;
        let proxy =
            ProxyCache::with_callbacks(source, MemoryStore::new(), fast_config(), callbacks);

        let mut buf = vec![0u8; 1000];
        proxy.read(&mut buf, 0).unwrap();

        let reported = reported.lock();
        assert!(!reported.is_empty());
        assert_eq!(*reported.last().unwrap(), 100);
        assert!(reported.windows(2).all(|w| w[0] <= w[1]), "{reported:?}");
        assert!(reported.iter().all(|p| *p <= 100));
    }

    #[test]
    fn test_unknown_length_source_still_serves_reads() {
        init_tracing();
        let data = random_bytes(300);
        let mut source = TestSource::new(data.clone());
        source.unknown_length = true;
        let proxy = ProxyCache::new(source, MemoryStore::new(), fast_config());

        let mut buf = vec![0u8; 300];
        let n = proxy.read(&mut buf, 0).unwrap();
        assert_eq!(n, 300);
        assert_eq!(buf, data);
        // Completion requires a known length to compare against.
        assert!(!proxy.is_completed());
    }

    #[test]
    fn test_unknown_length_read_past_end_returns_short() {
        init_tracing();
        let data = random_bytes(300);
        let mut source = TestSource::new(data.clone());
        source.unknown_length = true;
        let proxy = ProxyCache::new(source, MemoryStore::new(), fast_config());

        // Ask for more than the resource holds; once the stream is drained
        // the read must come back short instead of blocking forever.
        let mut buf = vec![0u8; 400];
        let n = proxy.read(&mut buf, 100).unwrap();
        assert_eq!(n, 200);
        assert_eq!(&buf[..n], &data[100..]);
        assert_eq!(proxy.read(&mut buf, 300).unwrap(), 0);
        assert!(!proxy.is_completed());
    }

    #[test]
    fn test_backpressure_pauses_far_ahead_fetch() {
        init_tracing();
        let data = random_bytes(64 * 1024);
        let mut source = TestSource::new(data);
        source.chunk = 8 * 1024;
        let config = ProxyCacheConfig::builder()
            .normal_download_rate(u64::MAX / 2000)
            .max_prefetch_gap(16 * 1024)
            .build();
        let proxy = Arc::new(ProxyCache::new(source, MemoryStore::new(), config));

        // Ask for the first byte only; the fetch should park after running
        // one gap past the high-water mark rather than slurp the resource.
        let mut buf = [0u8; 1];
        proxy.read(&mut buf, 0).unwrap();
        thread::sleep(Duration::from_millis(200));
        let fetched = proxy.available();
        assert!(
            fetched < 64 * 1024,
            "fetch never paused: {fetched} bytes fetched"
        );

        // Reading further wakes the worker again and the remainder arrives.
        let mut rest = vec![0u8; 64 * 1024];
        let n = proxy.read(&mut rest, 0).unwrap();
        assert_eq!(n, 64 * 1024);
        assert!(wait_completed(&*proxy));
    }

    #[test]
    fn test_fetch_resumes_from_store_available() {
        init_tracing();
        let data = random_bytes(512);
        let source = TestSource::new(data.clone());
        let opens = source.open_counter();
        // Store already holds the first half; the fetch must open at 256.
        let store = MemoryStore::with_data(data[..256].to_vec());
        let proxy = ProxyCache::new(source, store, fast_config());

        let mut buf = vec![0u8; 512];
        let n = proxy.read(&mut buf, 0).unwrap();
        assert_eq!(n, 512);
        assert_eq!(buf, data);
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(wait_completed(&proxy));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let proxy = ProxyCache::new(
            TestSource::new(vec![1, 2, 3]),
            MemoryStore::new(),
            fast_config(),
        );
        proxy.shutdown();
        proxy.shutdown();
        let mut buf = [0u8; 3];
        // A stopped proxy serves whatever the store holds: nothing.
        assert_eq!(proxy.read(&mut buf, 0).unwrap(), 0);
    }
}
