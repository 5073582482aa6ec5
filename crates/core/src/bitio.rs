//! Bit-addressable byte buffer.
//!
//! `BitBuffer` is a growable byte sequence that accepts sub-byte appends and
//! random-access bit reads. Bits are packed MSB-first: the first bit appended
//! lands in bit 7 of byte 0.
//!
//! # Padding Rules
//! - Appends never leave garbage: unused trailing bits of the last byte are zero
//! - The cursor remembers how many bits of the last byte are occupied, so
//!   `bit_len()` is exact for buffers built by appending. A buffer replaced by
//!   `load` or `from_bytes` counts every bit of every byte.
//!
//! # Statistics
//! Frequency statistics are memoized against a content version. Every
//! mutating call bumps the version, including `byte_mut`, so the cache can
//! never silently describe old content. Queries on a stale cache fail with
//! `Error::StaleStatistics` until `refresh_statistics` runs.
//!
//! # Example
//! ```
//! use tiercode_core::bitio::BitBuffer;
//!
//! let mut buf = BitBuffer::new();
//! buf.append(0b101, 3).unwrap();  // 101
//! buf.append(0b11, 2).unwrap();   // 10111
//! assert_eq!(buf.as_bytes(), &[0b1011_1000]);
//! assert_eq!(buf.bit_len(), 5);
//! assert_eq!(buf.read_bits(0, 3).unwrap(), 0b101);
//! assert_eq!(buf.read_bits(3, 2).unwrap(), 0b11);
//! ```

use std::path::Path;

use log::debug;

use crate::error::{BitIoError, Error, Result};
use crate::stats::Statistics;

/// Growable MSB-first bit buffer with cached byte statistics.
///
/// # Invariants
/// - `next_free_bit` is in 0..8; 0 means the last byte is full (or there is none)
/// - when `next_free_bit > 0` the buffer holds at least one byte
#[derive(Debug, Default)]
pub struct BitBuffer {
    /// Packed content
    bytes: Vec<u8>,
    /// Occupied bits in the last byte (0 = byte aligned)
    next_free_bit: u8,
    /// Bumped on every mutation
    version: u64,
    /// Statistics and the version they were computed at
    cache: Option<(u64, Statistics)>,
}

impl BitBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a byte-aligned buffer owning `bytes`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            ..Self::default()
        }
    }

    /// Append the low `bit_count` bits of `value`, MSB-first.
    ///
    /// Bits fill the free room of the current last byte first; whatever does
    /// not fit goes into one freshly pushed byte.
    ///
    /// # Errors
    /// `BitIoError::InvalidBitCount` unless `0 < bit_count <= 8`.
    pub fn append(&mut self, value: u8, bit_count: usize) -> Result<()> {
        if bit_count == 0 || bit_count > 8 {
            return Err(BitIoError::InvalidBitCount(bit_count).into());
        }

        let value = value as u16 & low_mask(bit_count);
        let mut remaining = bit_count;

        // At most two rounds: the tail of the current byte, then a new byte.
        while remaining > 0 {
            if self.next_free_bit == 0 {
                self.bytes.push(0);
            }

            let room = 8 - self.next_free_bit as usize;
            let take = remaining.min(room);
            let shift = remaining - take;
            let bits = ((value >> shift) & low_mask(take)) as u8;

            let last = self.bytes.len() - 1;
            self.bytes[last] |= bits << (room - take);
            self.next_free_bit = ((self.next_free_bit as usize + take) % 8) as u8;

            remaining = shift;
        }

        self.touch();
        Ok(())
    }

    /// Append a whole byte.
    pub fn push_byte(&mut self, byte: u8) -> Result<()> {
        self.append(byte, 8)
    }

    /// Append up to 16 bits as at most two `append` calls (high part, then low 8).
    ///
    /// # Errors
    /// `BitIoError::InvalidBitCount` unless `0 < bit_count <= 16`.
    pub fn append_wide(&mut self, value: u16, bit_count: usize) -> Result<()> {
        match bit_count {
            1..=8 => self.append(value as u8, bit_count),
            9..=16 => {
                self.append((value >> 8) as u8, bit_count - 8)?;
                self.append(value as u8, 8)
            }
            _ => Err(BitIoError::InvalidBitCount(bit_count).into()),
        }
    }

    /// Read `bit_count` bits (at most 8) starting at absolute bit `first_bit`.
    ///
    /// The result is right-justified. A read may straddle two bytes.
    ///
    /// # Errors
    /// - `BitIoError::InvalidBitCount` if `bit_count > 8`
    /// - `BitIoError::OutOfRange` if any addressed bit lies beyond the data
    pub fn read_bits(&self, first_bit: usize, bit_count: usize) -> Result<u8> {
        if bit_count > 8 {
            return Err(BitIoError::InvalidBitCount(bit_count).into());
        }
        if bit_count == 0 {
            return Ok(0);
        }
        self.check_range(first_bit, bit_count)?;

        let byte_index = first_bit / 8;
        let offset = first_bit % 8;

        let mut window = (self.bytes[byte_index] as u16) << 8;
        if offset + bit_count > 8 {
            window |= self.bytes[byte_index + 1] as u16;
        }

        Ok(((window >> (16 - offset - bit_count)) & low_mask(bit_count)) as u8)
    }

    /// Read up to 16 bits as two `read_bits` calls (high part, then low 8).
    pub fn read_wide(&self, first_bit: usize, bit_count: usize) -> Result<u16> {
        match bit_count {
            0..=8 => Ok(self.read_bits(first_bit, bit_count)? as u16),
            9..=16 => {
                let high = self.read_bits(first_bit, bit_count - 8)? as u16;
                let low = self.read_bits(first_bit + bit_count - 8, 8)? as u16;
                Ok((high << 8) | low)
            }
            _ => Err(BitIoError::InvalidBitCount(bit_count).into()),
        }
    }

    fn check_range(&self, first_bit: usize, bit_count: usize) -> Result<()> {
        let available = self.bytes.len() * 8;
        match first_bit.checked_add(bit_count) {
            Some(end) if end <= available => Ok(()),
            _ => Err(BitIoError::OutOfRange {
                bit_index: first_bit,
                bit_count,
                available,
            }
            .into()),
        }
    }

    /// Remove all content and reset the cursor.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.next_free_bit = 0;
        self.touch();
    }

    /// Number of bytes (including a partially filled last byte).
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of meaningful bits: trailing pad bits of an appended buffer are excluded.
    pub fn bit_len(&self) -> usize {
        match self.next_free_bit {
            0 => self.bytes.len() * 8,
            used => (self.bytes.len() - 1) * 8 + used as usize,
        }
    }

    /// Occupied bits of the last byte (0 when byte aligned).
    pub fn next_free_bit(&self) -> u8 {
        self.next_free_bit
    }

    /// Raw bytes, including zero pad bits of a partial last byte.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the buffer and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Iterate over the raw bytes.
    pub fn iter(&self) -> std::slice::Iter<'_, u8> {
        self.bytes.iter()
    }

    /// Byte at `index`.
    pub fn byte(&self, index: usize) -> Result<u8> {
        self.bytes.get(index).copied().ok_or_else(|| {
            BitIoError::ByteOutOfRange {
                index,
                len: self.bytes.len(),
            }
            .into()
        })
    }

    /// Mutable access to the byte at `index`.
    ///
    /// Handing out the reference counts as a mutation: cached statistics
    /// become stale whether or not the caller writes through it.
    pub fn byte_mut(&mut self, index: usize) -> Result<&mut u8> {
        let len = self.bytes.len();
        if index >= len {
            return Err(BitIoError::ByteOutOfRange { index, len }.into());
        }
        self.touch();
        Ok(&mut self.bytes[index])
    }

    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    // === Statistics ===

    /// Recompute statistics over the current content and cache them.
    pub fn refresh_statistics(&mut self) -> &Statistics {
        let stats = Statistics::from_bytes(&self.bytes);
        &self.cache.insert((self.version, stats)).1
    }

    /// Invalidate cached statistics, optionally recomputing them right away.
    pub fn mark_dirty(&mut self, force_refresh: bool) {
        self.touch();
        if force_refresh {
            self.refresh_statistics();
        }
    }

    /// True if cached statistics describe the current content.
    pub fn statistics_fresh(&self) -> bool {
        matches!(&self.cache, Some((version, _)) if *version == self.version)
    }

    /// Cached statistics.
    ///
    /// # Errors
    /// `Error::StaleStatistics` if the content changed since the last refresh.
    pub fn statistics(&self) -> Result<&Statistics> {
        match &self.cache {
            Some((version, stats)) if *version == self.version => Ok(stats),
            _ => Err(Error::StaleStatistics),
        }
    }

    pub fn byte_entropy(&self) -> Result<f64> {
        Ok(self.statistics()?.byte_entropy())
    }

    pub fn bit_entropy(&self) -> Result<f64> {
        Ok(self.statistics()?.bit_entropy())
    }

    pub fn byte_frequency(&self, byte: u8) -> Result<u64> {
        Ok(self.statistics()?.frequency(byte))
    }

    pub fn byte_probability(&self, byte: u8) -> Result<f64> {
        Ok(self.statistics()?.probability(byte))
    }

    pub fn byte_information_content(&self, byte: u8) -> Result<f64> {
        Ok(self.statistics()?.information_content(byte))
    }

    // === File I/O ===

    /// Replace the content with the bytes of the file at `path`.
    ///
    /// On failure the buffer is left untouched.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        debug!("loaded {} bytes from {}", bytes.len(), path.display());

        self.bytes = bytes;
        self.next_free_bit = 0;
        self.touch();
        Ok(())
    }

    /// Write the raw bytes to the file at `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes)?;
        debug!("saved {} bytes to {}", self.bytes.len(), path.display());
        Ok(())
    }
}

/// Copies share no storage and always start with stale statistics.
impl Clone for BitBuffer {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
            next_free_bit: self.next_free_bit,
            version: 0,
            cache: None,
        }
    }
}

/// Equality is over content and cursor; cached statistics are ignored.
impl PartialEq for BitBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes && self.next_free_bit == other.next_free_bit
    }
}

impl Eq for BitBuffer {}

impl From<Vec<u8>> for BitBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<&[u8]> for BitBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes.to_vec())
    }
}

impl<'a> IntoIterator for &'a BitBuffer {
    type Item = &'a u8;
    type IntoIter = std::slice::Iter<'a, u8>;

    fn into_iter(self) -> Self::IntoIter {
        self.bytes.iter()
    }
}

/// Sequential reader over a `BitBuffer`.
///
/// Reads stop at `limit`, which defaults to the buffer's `bit_len()` so pad
/// bits of an appended buffer are never handed out.
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    buffer: &'a BitBuffer,
    position: usize,
    limit: usize,
}

impl<'a> BitCursor<'a> {
    /// Cursor at bit 0, bounded by `buffer.bit_len()`.
    pub fn new(buffer: &'a BitBuffer) -> Self {
        Self {
            buffer,
            position: 0,
            limit: buffer.bit_len(),
        }
    }

    /// Cursor starting at `position`.
    pub fn at(buffer: &'a BitBuffer, position: usize) -> Self {
        Self {
            position,
            ..Self::new(buffer)
        }
    }

    /// Read up to 16 bits and advance.
    ///
    /// # Errors
    /// `BitIoError::OutOfRange` if fewer than `count` bits remain before the limit.
    pub fn read(&mut self, count: usize) -> Result<u16> {
        if count > self.bits_remaining() {
            return Err(BitIoError::OutOfRange {
                bit_index: self.position,
                bit_count: count,
                available: self.limit,
            }
            .into());
        }
        let value = self.buffer.read_wide(self.position, count)?;
        self.position += count;
        Ok(value)
    }

    /// Bits left before the limit.
    pub fn bits_remaining(&self) -> usize {
        self.limit.saturating_sub(self.position)
    }

    /// Current absolute bit position.
    pub fn position(&self) -> usize {
        self.position
    }
}

fn low_mask(bits: usize) -> u16 {
    ((1u32 << bits) - 1) as u16
}
