//! Counter table in a shared file mapping.
//!
//! File layout: a 64-byte header (`magic`, `capacity`) followed by
//! `capacity` slots. The server-owning process creates the file once at
//! startup; worker processes attach with [`MappedCounterTable::open`]. All
//! mutation goes through atomics inside the mapping, so every process sees
//! every increment.

use std::fs::{self, File, OpenOptions};
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::MmapMut;

use super::slots::{self, Slot};
use super::CounterTable;
use crate::error::{Result, StatsError};

const MAGIC: u64 = 0x5353_5441_5442_4c31; // "SSTATBL1"
const HEADER_LEN: usize = 64;
const MAX_CAPACITY: usize = 1 << 20;

#[repr(C)]
struct Header {
    magic: AtomicU64,
    capacity: AtomicU64,
}

const _: () = assert!(size_of::<Header>() <= HEADER_LEN);
const _: () = assert!(HEADER_LEN % std::mem::align_of::<Slot>() == 0);

fn file_len(capacity: usize) -> u64 {
    (HEADER_LEN + capacity * size_of::<Slot>()) as u64
}

fn io_err(path: &Path, what: &str, e: std::io::Error) -> StatsError {
    StatsError::Internal(format!("{what} {}: {e}", path.display()))
}

/// Fixed-capacity counter table shared across processes through a file mapping.
pub struct MappedCounterTable {
    // Keeps the mapping alive; all access goes through `base`.
    _map: MmapMut,
    base: NonNull<u8>,
    capacity: usize,
    path: PathBuf,
    owner: bool,
}

// SAFETY: the mapping is only touched through atomics and slot publication
// rules; `base` stays valid as long as `_map` is alive.
unsafe impl Send for MappedCounterTable {}
unsafe impl Sync for MappedCounterTable {}

impl MappedCounterTable {
    /// Create a fresh, zeroed table at `path`, replacing a stale file.
    ///
    /// The returned handle owns the file and removes it on drop.
    pub fn create(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(StatsError::BadRequest(format!(
                "counter table capacity must be between 1 and {MAX_CAPACITY}"
            )));
        }

        // Unlink instead of truncating: processes still mapping an old file
        // keep their inode and do not fault.
        match fs::remove_file(path) {
            Ok(()) => tracing::warn!(path = %path.display(), "replaced stale counter table"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(path, "remove", e)),
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| io_err(path, "create", e))?;
        file.set_len(file_len(capacity))
            .map_err(|e| io_err(path, "size", e))?;

        let table = Self::map(file, path, capacity, true)?;
        let header = table.header();
        header.capacity.store(capacity as u64, Ordering::Relaxed);
        header.magic.store(MAGIC, Ordering::Release);

        tracing::info!(path = %path.display(), capacity, "counter table created");
        Ok(table)
    }

    /// Attach to a table created by another process.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| io_err(path, "open", e))?;
        let len = file.metadata().map_err(|e| io_err(path, "stat", e))?.len();
        if len < HEADER_LEN as u64 {
            return Err(StatsError::Internal(format!(
                "counter table {} is not initialized",
                path.display()
            )));
        }

        let mut table = Self::map(file, path, 0, false)?;
        if table.header().magic.load(Ordering::Acquire) != MAGIC {
            return Err(StatsError::Internal(format!(
                "counter table {} is not initialized",
                path.display()
            )));
        }
        let capacity = table.header().capacity.load(Ordering::Relaxed) as usize;
        if capacity == 0 || capacity > MAX_CAPACITY || file_len(capacity) != len {
            return Err(StatsError::Internal(format!(
                "counter table {} has an inconsistent size",
                path.display()
            )));
        }
        table.capacity = capacity;
        Ok(table)
    }

    fn map(file: File, path: &Path, capacity: usize, owner: bool) -> Result<Self> {
        // SAFETY: the file is only resized by `create` before any other
        // process can attach, and contents are accessed through atomics.
        let mut map = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| io_err(path, "mmap", e))?;
        let base = NonNull::new(map.as_mut_ptr())
            .ok_or_else(|| StatsError::Internal("mmap returned a null pointer".into()))?;
        Ok(Self {
            _map: map,
            base,
            capacity,
            path: path.to_path_buf(),
            owner,
        })
    }

    fn header(&self) -> &Header {
        // SAFETY: the mapping is page aligned and at least HEADER_LEN long.
        unsafe { &*(self.base.as_ptr() as *const Header) }
    }

    fn slots(&self) -> &[Slot] {
        // SAFETY: length was validated against `capacity` when mapping, the
        // slot area starts at an aligned offset and all-zero slots are valid.
        unsafe {
            std::slice::from_raw_parts(
                self.base.as_ptr().add(HEADER_LEN) as *const Slot,
                self.capacity,
            )
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CounterTable for MappedCounterTable {
    fn increment(&self, key: &str) -> Result<u64> {
        slots::increment(self.slots(), key)
    }

    fn get(&self, key: &str) -> u64 {
        slots::get(self.slots(), key)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        slots::occupied(self.slots())
    }
}

impl Drop for MappedCounterTable {
    fn drop(&mut self) {
        if self.owner {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %e,
                    "counter table cleanup failed"
                );
            }
        }
    }
}
