// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout of the shared event table
//!
//! ```text
//! +----------------------+  0
//! | header (64 bytes)    |  magic, version, entries, entry_size
//! +----------------------+  64
//! | slot 0               |  state | len | key | crc32 | payload...
//! | slot 1               |
//! | ...                  |
//! | slot entries-1       |
//! +----------------------+
//! ```
//!
//! All integers are little-endian. Every slot is `align8(24 + entry_size)`
//! bytes. Keys are placed by hashing into a home slot and probing linearly.

pub const MAGIC: [u8; 8] = *b"DURAMEN\0";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 64;
pub const SLOT_HEADER_LEN: usize = 24;

const STATE_AT: usize = 0;
const LEN_AT: usize = 4;
const KEY_AT: usize = 8;
const CRC_AT: usize = 16;

/// Occupancy of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotState {
    Empty = 0,
    Occupied = 1,
    /// Deleted, but may sit inside another key's probe chain
    Tombstone = 2,
}

impl SlotState {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Empty),
            1 => Some(Self::Occupied),
            2 => Some(Self::Tombstone),
            _ => None,
        }
    }
}

/// Result of decoding the file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRead {
    /// All-zero magic: space was reserved but never initialized
    Blank,
    /// Magic does not match; not a store file
    Foreign,
    Valid(Header),
}

/// Fixed parameters recorded at the start of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub entries: u32,
    pub entry_size: u32,
}

impl Header {
    pub fn new(entries: u32, entry_size: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            entries,
            entry_size,
        }
    }

    /// Write the header into the first [`HEADER_LEN`] bytes of `buf`
    pub fn encode(&self, buf: &mut [u8]) {
        let buf = &mut buf[..HEADER_LEN];
        buf.fill(0);
        buf[..8].copy_from_slice(&MAGIC);
        write_u32(buf, 8, self.version);
        write_u32(buf, 12, self.entries);
        write_u32(buf, 16, self.entry_size);
    }

    pub fn decode(buf: &[u8]) -> HeaderRead {
        let magic = &buf[..8];
        if magic.iter().all(|&b| b == 0) {
            return HeaderRead::Blank;
        }
        if magic != MAGIC {
            return HeaderRead::Foreign;
        }
        HeaderRead::Valid(Self {
            version: read_u32(buf, 8),
            entries: read_u32(buf, 12),
            entry_size: read_u32(buf, 16),
        })
    }
}

/// Slot addressing for a table of `entries` slots of `entry_size` payload bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    entries: u32,
    entry_size: u32,
    stride: usize,
}

impl Geometry {
    pub fn new(entries: u32, entry_size: u32) -> Self {
        let stride = (SLOT_HEADER_LEN + entry_size as usize + 7) & !7;
        Self {
            entries,
            entry_size,
            stride,
        }
    }

    pub fn entries(&self) -> u32 {
        self.entries
    }

    pub fn entry_size(&self) -> u32 {
        self.entry_size
    }

    /// Bytes per slot, header included
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Total file length
    pub fn file_len(&self) -> u64 {
        HEADER_LEN as u64 + u64::from(self.entries) * self.stride as u64
    }

    pub fn slot_offset(&self, index: u32) -> usize {
        HEADER_LEN + index as usize * self.stride
    }

    pub fn slot<'a>(&self, table: &'a [u8], index: u32) -> &'a [u8] {
        let start = self.slot_offset(index);
        &table[start..start + self.stride]
    }

    pub fn slot_mut<'a>(&self, table: &'a mut [u8], index: u32) -> &'a mut [u8] {
        let start = self.slot_offset(index);
        &mut table[start..start + self.stride]
    }

    /// Slot where probing for `key` starts
    pub fn home(&self, key: i64) -> u32 {
        (mix(key as u64) % u64::from(self.entries)) as u32
    }

    pub fn next_index(&self, index: u32) -> u32 {
        if index + 1 == self.entries {
            0
        } else {
            index + 1
        }
    }

    pub fn prev_index(&self, index: u32) -> u32 {
        if index == 0 {
            self.entries - 1
        } else {
            index - 1
        }
    }
}

/// Raw state byte of a slot
pub fn state_byte(slot: &[u8]) -> u8 {
    slot[STATE_AT]
}

pub fn set_state(slot: &mut [u8], state: SlotState) {
    slot[STATE_AT] = state as u8;
}

pub fn slot_key(slot: &[u8]) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&slot[KEY_AT..KEY_AT + 8]);
    i64::from_le_bytes(bytes)
}

/// Write key, length, checksum and payload. The state byte is left as is so
/// the caller decides when the record becomes visible.
pub fn write_record(slot: &mut [u8], key: i64, payload: &[u8]) {
    write_u32(slot, LEN_AT, payload.len() as u32);
    slot[KEY_AT..KEY_AT + 8].copy_from_slice(&key.to_le_bytes());
    write_u32(slot, CRC_AT, crc32fast::hash(payload));
    let body = &mut slot[SLOT_HEADER_LEN..];
    body[..payload.len()].copy_from_slice(payload);
    body[payload.len()..].fill(0);
}

/// Payload of an occupied slot, or `None` if its length or checksum is bad
pub fn read_payload(slot: &[u8], entry_size: u32) -> Option<&[u8]> {
    let len = read_u32(slot, LEN_AT);
    if len > entry_size {
        return None;
    }
    let payload = &slot[SLOT_HEADER_LEN..SLOT_HEADER_LEN + len as usize];
    if crc32fast::hash(payload) != read_u32(slot, CRC_AT) {
        return None;
    }
    Some(payload)
}

// splitmix64 finalizer
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn write_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
