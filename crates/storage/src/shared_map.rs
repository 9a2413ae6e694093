// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-capacity key/value table in a memory-mapped file
//!
//! Every process that opens the same path maps the same pages, so a write by
//! one is visible to all others without reopening. Access is serialized
//! across processes with an advisory lock on the backing file (shared for
//! reads, exclusive for writes) and across threads of one process with a
//! mutex, since the file lock is held per descriptor.
//!
//! ## Durability
//!
//! - A new record is written in full before its state byte flips to
//!   occupied, so a crash mid-insert leaves the slot free
//! - Each record carries a CRC32; a payload torn by a crash mid-overwrite is
//!   skipped on read and its slot freed by the next snapshot, or by a write
//!   that finds the table full
//! - With `sync_writes` (the default) touched slots are `msync`ed before a
//!   write returns

use crate::layout::{self, Geometry, Header, HeaderRead, SlotState, FORMAT_VERSION, HEADER_LEN};
use duramen_core::{DatastoreError, EventId};
use fs2::FileExt;
use memmap2::{MmapMut, MmapOptions};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors that can occur in shared map operations
#[derive(Debug, Error)]
pub enum MapError {
    #[error("invalid store file {path}: {reason}")]
    Config { path: PathBuf, reason: String },
    #[error("store is full: all {capacity} slots are occupied")]
    CapacityExceeded { capacity: u32 },
    #[error("payload of {len} bytes exceeds entry size of {entry_size} bytes")]
    PayloadTooLarge { len: usize, entry_size: u32 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("store is closed")]
    Closed,
}

impl MapError {
    fn config(path: &Path, reason: impl Into<String>) -> Self {
        Self::Config {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl From<MapError> for DatastoreError {
    fn from(err: MapError) -> Self {
        match err {
            MapError::Config { .. } => DatastoreError::Config(err.to_string()),
            MapError::CapacityExceeded { capacity } => {
                DatastoreError::CapacityExceeded { capacity }
            }
            MapError::PayloadTooLarge { len, entry_size } => {
                DatastoreError::PayloadTooLarge { len, entry_size }
            }
            MapError::Io(e) => DatastoreError::Io(e),
            MapError::Closed => DatastoreError::Closed,
        }
    }
}

/// Where a key lives, or where it would go
enum Probe {
    Found(u32),
    Vacant(u32),
    Full,
}

enum Stored {
    Inserted,
    Replaced,
    Exists,
}

struct Region {
    file: File,
    mmap: MmapMut,
}

/// Durable table of `entries` slots, each holding one key and up to
/// `entry_size` payload bytes
pub struct SharedMap {
    path: PathBuf,
    geometry: Geometry,
    sync_writes: bool,
    // None once closed
    region: Mutex<Option<Region>>,
}

impl SharedMap {
    /// Open the table at `path`, creating it if the file does not exist
    ///
    /// An existing file must have been created with the same `entries` and
    /// `entry_size`. The parent directory is not created.
    pub fn open(path: impl AsRef<Path>, entries: u32, entry_size: u32) -> Result<Self, MapError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(MapError::config(path, "path must not be empty"));
        }
        if entries == 0 || entry_size == 0 {
            return Err(MapError::config(
                path,
                "entries and entry_size must be positive",
            ));
        }

        let geometry = Geometry::new(entries, entry_size);
        let len = usize::try_from(geometry.file_len())
            .map_err(|_| MapError::config(path, "table does not fit in the address space"))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let (mmap, created) = prepare(path, &file, geometry, len)?;

        tracing::info!(
            path = %path.display(),
            entries,
            entry_size,
            created,
            "shared map opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            geometry,
            sync_writes: true,
            region: Mutex::new(Some(Region { file, mmap })),
        })
    }

    /// Whether writes are flushed to disk before returning
    pub fn sync_writes(mut self, enabled: bool) -> Self {
        self.sync_writes = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maximum number of live entries
    pub fn capacity(&self) -> u32 {
        self.geometry.entries()
    }

    /// Maximum payload size in bytes
    pub fn entry_size(&self) -> u32 {
        self.geometry.entry_size()
    }

    /// Insert or overwrite the value for `key`
    ///
    /// Returns `true` if a live value was replaced.
    pub fn put(&self, key: EventId, value: &[u8]) -> Result<bool, MapError> {
        let replaced = matches!(self.store(key, value, true)?, Stored::Replaced);
        tracing::debug!(key, len = value.len(), replaced, "put");
        Ok(replaced)
    }

    /// Insert only if `key` is not live
    ///
    /// Returns `false`, leaving the existing value untouched, if it is.
    pub fn insert_new(&self, key: EventId, value: &[u8]) -> Result<bool, MapError> {
        let inserted = matches!(self.store(key, value, false)?, Stored::Inserted);
        tracing::debug!(key, len = value.len(), inserted, "insert_new");
        Ok(inserted)
    }

    /// Delete `key` if present
    ///
    /// Returns whether a value was removed; an absent key is not an error.
    pub fn remove(&self, key: EventId) -> Result<bool, MapError> {
        let removed = self.with_exclusive(|mmap| {
            let Probe::Found(index) = self.probe(mmap, key) else {
                return Ok(false);
            };
            let touched = self.release(mmap, index);
            self.flush_slots(mmap, &touched)?;
            Ok(true)
        })?;
        tracing::debug!(key, removed, "remove");
        Ok(removed)
    }

    /// Copy of the value stored under `key`
    pub fn get(&self, key: EventId) -> Result<Option<Vec<u8>>, MapError> {
        self.with_shared(|table| match self.probe(table, key) {
            Probe::Found(index) => Ok(self.read_slot(table, index).map(<[u8]>::to_vec)),
            Probe::Vacant(_) | Probe::Full => Ok(None),
        })
    }

    /// Copy of every live entry
    ///
    /// Taken under one shared lock, so it reflects a single moment across
    /// all processes. Records that fail their checksum are skipped, then
    /// freed under the exclusive lock.
    pub fn snapshot(&self) -> Result<HashMap<EventId, Vec<u8>>, MapError> {
        let (entries, damaged) = self.with_shared(|table| {
            let mut entries = HashMap::new();
            let mut damaged = false;
            for index in 0..self.geometry.entries() {
                let slot = self.geometry.slot(table, index);
                if SlotState::from_byte(layout::state_byte(slot)) != Some(SlotState::Occupied) {
                    continue;
                }
                match self.read_slot(table, index) {
                    Some(payload) => {
                        entries.insert(layout::slot_key(slot), payload.to_vec());
                    }
                    None => damaged = true,
                }
            }
            Ok((entries, damaged))
        })?;

        if damaged {
            self.with_exclusive(|mmap| {
                let touched = self.purge_damaged(mmap);
                self.flush_slots(mmap, &touched)
            })?;
        }
        Ok(entries)
    }

    /// Number of live entries whose records pass their checks
    pub fn len(&self) -> Result<usize, MapError> {
        let entry_size = self.geometry.entry_size();
        self.with_shared(|table| {
            Ok((0..self.geometry.entries())
                .filter(|&index| {
                    let slot = self.geometry.slot(table, index);
                    SlotState::from_byte(layout::state_byte(slot)) == Some(SlotState::Occupied)
                        && layout::read_payload(slot, entry_size).is_some()
                })
                .count())
        })
    }

    pub fn is_empty(&self) -> Result<bool, MapError> {
        Ok(self.len()? == 0)
    }

    /// Flush and unmap. Every later call, including `close`, fails with
    /// [`MapError::Closed`].
    pub fn close(&self) -> Result<(), MapError> {
        let region = self.lock_region().take().ok_or(MapError::Closed)?;
        region.mmap.flush()?;
        drop(region);
        tracing::info!(path = %self.path.display(), "shared map closed");
        Ok(())
    }

    fn store(&self, key: EventId, value: &[u8], overwrite: bool) -> Result<Stored, MapError> {
        if value.len() > self.geometry.entry_size() as usize {
            return Err(MapError::PayloadTooLarge {
                len: value.len(),
                entry_size: self.geometry.entry_size(),
            });
        }

        self.with_exclusive(|mmap| {
            let probe = match self.probe(mmap, key) {
                Probe::Full => self.reclaim(mmap, key)?,
                probe => probe,
            };
            let (index, outcome) = match probe {
                Probe::Found(_) if !overwrite => return Ok(Stored::Exists),
                Probe::Found(index) => (index, Stored::Replaced),
                Probe::Vacant(index) => (index, Stored::Inserted),
                Probe::Full => {
                    return Err(MapError::CapacityExceeded {
                        capacity: self.geometry.entries(),
                    })
                }
            };

            let slot = self.geometry.slot_mut(mmap, index);
            layout::write_record(slot, key, value);
            layout::set_state(slot, SlotState::Occupied);
            self.flush_slots(mmap, &[index])?;
            Ok(outcome)
        })
    }

    /// Linear probe from the key's home slot
    ///
    /// Stops at the first empty slot. The first reusable slot seen on the
    /// way is where a new key would be placed.
    fn probe(&self, table: &[u8], key: EventId) -> Probe {
        let mut index = self.geometry.home(key);
        let mut vacant = None;

        for _ in 0..self.geometry.entries() {
            let slot = self.geometry.slot(table, index);
            match SlotState::from_byte(layout::state_byte(slot)) {
                Some(SlotState::Empty) => return Probe::Vacant(vacant.unwrap_or(index)),
                Some(SlotState::Tombstone) => {
                    vacant.get_or_insert(index);
                }
                Some(SlotState::Occupied) => {
                    if layout::slot_key(slot) == key {
                        return Probe::Found(index);
                    }
                }
                None => {
                    tracing::warn!(
                        path = %self.path.display(),
                        index,
                        state = layout::state_byte(slot),
                        "unknown slot state, treating as deleted"
                    );
                    vacant.get_or_insert(index);
                }
            }
            index = self.geometry.next_index(index);
        }

        vacant.map_or(Probe::Full, Probe::Vacant)
    }

    /// Free damaged records and probe again; the table was full for `key`
    fn reclaim(&self, mmap: &mut MmapMut, key: EventId) -> Result<Probe, MapError> {
        let touched = self.purge_damaged(mmap);
        if touched.is_empty() {
            return Ok(Probe::Full);
        }
        self.flush_slots(mmap, &touched)?;
        Ok(self.probe(mmap, key))
    }

    /// Free every occupied slot whose record fails its length or checksum
    /// check, returning every slot index that changed
    fn purge_damaged(&self, table: &mut [u8]) -> Vec<u32> {
        let mut touched = Vec::new();
        for index in 0..self.geometry.entries() {
            let slot = self.geometry.slot(&*table, index);
            if SlotState::from_byte(layout::state_byte(slot)) != Some(SlotState::Occupied)
                || layout::read_payload(slot, self.geometry.entry_size()).is_some()
            {
                continue;
            }
            tracing::warn!(
                path = %self.path.display(),
                index,
                key = layout::slot_key(slot),
                "freeing damaged record"
            );
            touched.extend(self.release(table, index));
        }
        touched
    }

    /// Free an occupied slot, returning every slot index that changed
    ///
    /// If nothing can probe past the slot (the next one is empty) it becomes
    /// empty, along with the run of tombstones directly before it.
    /// Otherwise it becomes a tombstone to keep later keys reachable.
    fn release(&self, table: &mut [u8], index: u32) -> Vec<u32> {
        let geometry = self.geometry;
        let state_at = |table: &[u8], i: u32| {
            SlotState::from_byte(layout::state_byte(geometry.slot(table, i)))
        };

        let next = geometry.next_index(index);
        if next != index && state_at(&*table, next) != Some(SlotState::Empty) {
            layout::set_state(geometry.slot_mut(table, index), SlotState::Tombstone);
            return vec![index];
        }

        layout::set_state(geometry.slot_mut(table, index), SlotState::Empty);
        let mut touched = vec![index];
        let mut prev = geometry.prev_index(index);
        while prev != index && state_at(&*table, prev) == Some(SlotState::Tombstone) {
            layout::set_state(geometry.slot_mut(table, prev), SlotState::Empty);
            touched.push(prev);
            prev = geometry.prev_index(prev);
        }
        touched
    }

    fn read_slot<'a>(&self, table: &'a [u8], index: u32) -> Option<&'a [u8]> {
        let slot = self.geometry.slot(table, index);
        let payload = layout::read_payload(slot, self.geometry.entry_size());
        if payload.is_none() {
            tracing::warn!(
                path = %self.path.display(),
                index,
                key = layout::slot_key(slot),
                "skipping record with bad length or checksum"
            );
        }
        payload
    }

    fn flush_slots(&self, mmap: &MmapMut, indices: &[u32]) -> Result<(), MapError> {
        if self.sync_writes {
            for &index in indices {
                mmap.flush_range(self.geometry.slot_offset(index), self.geometry.stride())?;
            }
        }
        Ok(())
    }

    fn lock_region(&self) -> MutexGuard<'_, Option<Region>> {
        self.region.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_shared<T>(
        &self,
        f: impl FnOnce(&[u8]) -> Result<T, MapError>,
    ) -> Result<T, MapError> {
        let guard = self.lock_region();
        let region = guard.as_ref().ok_or(MapError::Closed)?;
        let _lock = FileLock::shared(&region.file)?;
        f(&region.mmap[..])
    }

    fn with_exclusive<T>(
        &self,
        f: impl FnOnce(&mut MmapMut) -> Result<T, MapError>,
    ) -> Result<T, MapError> {
        let mut guard = self.lock_region();
        let Region { file, mmap } = guard.as_mut().ok_or(MapError::Closed)?;
        let _lock = FileLock::exclusive(file)?;
        f(mmap)
    }
}

/// Validate or initialize the file under an exclusive lock, then map it
fn prepare(
    path: &Path,
    file: &File,
    geometry: Geometry,
    len: usize,
) -> Result<(MmapMut, bool), MapError> {
    let _lock = FileLock::exclusive(file)?;

    let current = file.metadata()?.len();
    let fresh = if current == 0 {
        true
    } else if current < HEADER_LEN as u64 {
        return Err(MapError::config(path, "file is shorter than its header"));
    } else {
        let mut buf = [0u8; HEADER_LEN];
        let mut reader = file;
        reader.read_exact(&mut buf)?;
        match Header::decode(&buf) {
            // Only the leftover of an interrupted create may be initialized
            HeaderRead::Blank => {
                if current > geometry.file_len()
                    || buf.iter().any(|&b| b != 0)
                    || !is_zeroed(reader)?
                {
                    return Err(MapError::config(path, "not a duramen store"));
                }
                true
            }
            HeaderRead::Foreign => {
                return Err(MapError::config(path, "not a duramen store"));
            }
            HeaderRead::Valid(header) => {
                check_header(path, &header, geometry)?;
                if current < geometry.file_len() {
                    return Err(MapError::config(
                        path,
                        format!(
                            "file is truncated: {} bytes, expected {}",
                            current,
                            geometry.file_len()
                        ),
                    ));
                }
                false
            }
        }
    };

    if fresh {
        // Reserve the whole table now so a full disk fails here, not on put
        FileExt::allocate(file, geometry.file_len())?;
    }

    let mut mmap = map_region(file, len)?;

    if fresh {
        Header::new(geometry.entries(), geometry.entry_size()).encode(&mut mmap[..]);
        mmap.flush_range(0, HEADER_LEN)?;
        file.sync_all()?;
    }

    Ok((mmap, fresh))
}

/// Whether everything from the reader's position to its end is zero
fn is_zeroed(mut reader: impl Read) -> io::Result<bool> {
    let mut buf = [0u8; 8192];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(true),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf[..n].iter().any(|&b| b != 0) {
            return Ok(false);
        }
    }
}

fn check_header(path: &Path, header: &Header, geometry: Geometry) -> Result<(), MapError> {
    if header.version != FORMAT_VERSION {
        return Err(MapError::config(
            path,
            format!("unsupported format version {}", header.version),
        ));
    }
    if header.entries != geometry.entries() || header.entry_size != geometry.entry_size() {
        return Err(MapError::config(
            path,
            format!(
                "created with entries={} entry_size={}, opened with entries={} entry_size={}",
                header.entries,
                header.entry_size,
                geometry.entries(),
                geometry.entry_size()
            ),
        ));
    }
    Ok(())
}

#[allow(unsafe_code)]
fn map_region(file: &File, len: usize) -> io::Result<MmapMut> {
    // SAFETY: the mapping is shared with other processes that write to it.
    // Every access goes through `FileLock`, and the file is never shrunk
    // while mapped.
    unsafe { MmapOptions::new().len(len).map_mut(file) }
}

/// Advisory lock on the whole backing file, released on drop
struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    fn shared(file: &'a File) -> io::Result<Self> {
        FileExt::lock_shared(file)?;
        Ok(Self { file })
    }

    fn exclusive(file: &'a File) -> io::Result<Self> {
        FileExt::lock_exclusive(file)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock too
        let _ = FileExt::unlock(self.file);
    }
}

#[cfg(test)]
#[path = "shared_map_tests.rs"]
mod tests;
