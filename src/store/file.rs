//! File-backed [`ByteStore`] implementation.
//!
//! Bytes are written to a partial file next to the final path
//! (`<name>.download`). Completing the store syncs the partial file and
//! renames it to the final path, so a file at the final path always holds the
//! whole resource. Opening a store over an existing partial file resumes the
//! fetch from its current length; opening over an existing final file yields
//! an already-completed store.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ProxyCacheError, Result};
use crate::store::ByteStore;

/// Extension appended to the final path while the fetch is in flight.
const PARTIAL_EXTENSION: &str = "download";

/// Durable store persisting fetched bytes to disk.
#[derive(Debug)]
pub struct FileStore {
    file: Mutex<File>,
    /// Final path of the fully-fetched resource.
    path: PathBuf,
    /// Path bytes are appended to until completion.
    partial_path: PathBuf,
    length: AtomicU64,
    completed: AtomicBool,
    max_read_position: AtomicU64,
}

impl FileStore {
    /// Open a store whose completed bytes live at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let partial_path = partial_path_for(&path);

        if path.exists() {
            let file = File::open(&path)?;
            let length = file.metadata()?.len();
            debug!(path = %path.display(), length, "opened completed cache file");
            return Ok(Self {
                file: Mutex::new(file),
                path,
                partial_path,
                length: AtomicU64::new(length),
                completed: AtomicBool::new(true),
                max_read_position: AtomicU64::new(0),
            });
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&partial_path)?;
        let length = file.metadata()?.len();
        debug!(
            path = %partial_path.display(),
            resumed_bytes = length,
            "opened partial cache file"
        );
        Ok(Self {
            file: Mutex::new(file),
            path,
            partial_path,
            length: AtomicU64::new(length),
            completed: AtomicBool::new(false),
            max_read_position: AtomicU64::new(0),
        })
    }

    /// Final path of the cached resource.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteStore for FileStore {
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let available = self.available();
        if offset >= available {
            return Ok(0);
        }
        let n = (buf.len() as u64).min(available - offset) as usize;
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf[..n])?;
        }
        self.max_read_position
            .fetch_max(offset + n as u64, Ordering::AcqRel);
        Ok(n)
    }

    fn available(&self) -> u64 {
        self.length.load(Ordering::Acquire)
    }

    fn append(&self, data: &[u8]) -> Result<()> {
        if self.is_completed() {
            return Err(ProxyCacheError::StoreCompleted);
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        self.length.fetch_add(data.len() as u64, Ordering::AcqRel);
        Ok(())
    }

    fn complete(&self) -> Result<()> {
        if self.completed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut file = self.file.lock();
        file.sync_all()?;
        fs::rename(&self.partial_path, &self.path)?;
        // Reopen read-only at the final path; the old handle points at the
        // renamed inode.
        *file = File::open(&self.path)?;
        debug!(path = %self.path.display(), length = self.available(), "cache file completed");
        Ok(())
    }

    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    fn max_read_position(&self) -> u64 {
        self.max_read_position.load(Ordering::Acquire)
    }

    fn close(&self) -> Result<()> {
        if !self.is_completed() {
            self.file.lock().sync_all()?;
        }
        Ok(())
    }
}

fn partial_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_EXTENSION);
    path.with_file_name(name)
}
