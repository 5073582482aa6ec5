//! Two-tier codebook construction and the binary key format.
//!
//! Frequent byte values get `bits_short`-bit codewords. Everything else gets a
//! `bits_long`-bit codeword whose first `bits_short` bits are the all-ones
//! escape pattern, followed by an index into the long tier.
//!
//! # Tier Allocation
//!
//! 1. Order present byte values by descending frequency, ascending value on ties
//! 2. Take values until their cumulative probability reaches the target fraction
//! 3. `bits_short = max(2, ceil(log2(K + 1)))`; the `+ 1` reserves the escape
//! 4. Pad the short tier up to `2^bits_short - 1` values
//! 5. A single leftover value joins the short tier instead of opening a long tier
//! 6. The rest form the long tier: `bits_long = bits_short + ceil(log2(R))`
//!
//! # Key Format
//!
//! ```text
//! +------------------+
//! | M (1 byte)       |  distinct byte values (0 encodes 256)
//! +------------------+
//! | K (1 byte)       |  short-tier entries (0 encodes 256)
//! +------------------+
//! | bits_short (1)   |
//! +------------------+
//! | bits_long (1)    |  0 when there is no long tier
//! +------------------+
//! | K short entries  |  8-bit value, bits_short-bit index
//! +------------------+
//! | M-K long entries |  8-bit value, escape, (bits_long-bits_short)-bit index
//! +------------------+
//! ```
//!
//! Entries are bit-packed MSB-first from byte 4 on with no padding in between.

use std::collections::HashMap;

use log::{debug, warn};

use crate::bitio::{BitBuffer, BitCursor};
use crate::error::{CodebookError, KeyError, Result};
use crate::stats::Statistics;

/// Cumulative probability covered by the short tier unless configured otherwise.
pub const DEFAULT_TARGET_FRACTION: f64 = 0.8;

/// Narrowest short codeword; one bit would leave no room beside the escape.
pub const MIN_SHORT_BITS: u8 = 2;

/// Widest codeword the bit-append path supports (two appends of up to 8 bits).
pub const MAX_CODEWORD_BITS: u8 = 16;

/// Size of the key header in bytes.
pub const KEY_HEADER_LEN: usize = 4;

/// One codebook assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodebookEntry {
    /// Byte value being encoded
    pub symbol: u8,
    /// Codeword, right-justified
    pub codeword: u16,
    /// Number of significant bits in `codeword`
    pub bit_length: u8,
}

/// Byte value to codeword mapping with two codeword widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codebook {
    /// Short tier first, each tier in allocation order
    entries: Vec<CodebookEntry>,
    short_count: usize,
    bits_short: u8,
    bits_long: u8,
    by_symbol: [Option<CodebookEntry>; 256],
    by_codeword: HashMap<(u16, u8), u8>,
}

impl Codebook {
    /// Assign codewords to `ordering`: the first `short_count` values get
    /// short indices, the rest escape-prefixed long indices.
    fn assign(ordering: &[u8], short_count: usize, bits_short: u8, bits_long: u8) -> Self {
        let escape = escape_pattern(bits_short);
        let suffix_bits = bits_long.saturating_sub(bits_short);

        let entries = ordering
            .iter()
            .enumerate()
            .map(|(i, &symbol)| {
                if i < short_count {
                    CodebookEntry {
                        symbol,
                        codeword: i as u16,
                        bit_length: bits_short,
                    }
                } else {
                    CodebookEntry {
                        symbol,
                        codeword: (escape << suffix_bits) | (i - short_count) as u16,
                        bit_length: bits_long,
                    }
                }
            })
            .collect();

        Self::from_entries(entries, short_count, bits_short, bits_long)
    }

    fn from_entries(
        entries: Vec<CodebookEntry>,
        short_count: usize,
        bits_short: u8,
        bits_long: u8,
    ) -> Self {
        let mut by_symbol = [None; 256];
        let mut by_codeword = HashMap::with_capacity(entries.len());
        for entry in &entries {
            by_symbol[entry.symbol as usize] = Some(*entry);
            by_codeword.insert((entry.codeword, entry.bit_length), entry.symbol);
        }

        Self {
            entries,
            short_count,
            bits_short,
            bits_long,
            by_symbol,
            by_codeword,
        }
    }

    /// Parse a key buffer.
    ///
    /// # Errors
    /// `Error::InvalidKey` if the key is shorter than its header, declares
    /// more entries than it holds, or describes an inconsistent codebook.
    pub fn from_key(key: &BitBuffer) -> Result<Self> {
        Self::parse_key(key).map_err(|e| {
            warn!("rejecting key of {} bytes: {}", key.len(), e);
            e.into()
        })
    }

    fn parse_key(key: &BitBuffer) -> std::result::Result<Self, KeyError> {
        let header = key.as_bytes();
        if header.len() < KEY_HEADER_LEN {
            return Err(KeyError::TooShort {
                required: KEY_HEADER_LEN,
                actual: header.len(),
            });
        }

        let total = count_from_header(header[0]);
        let short = count_from_header(header[1]);
        let bits_short = header[2];
        let bits_long = header[3];

        if bits_short < MIN_SHORT_BITS
            || bits_short > MAX_CODEWORD_BITS
            || (bits_long != 0 && (bits_long <= bits_short || bits_long > MAX_CODEWORD_BITS))
        {
            return Err(KeyError::InvalidWidths {
                bits_short,
                bits_long,
            });
        }

        let long = total.checked_sub(short).ok_or(KeyError::InvalidCounts { total, short })?;
        let short_capacity = if bits_long == 0 {
            1usize << bits_short
        } else {
            (1usize << bits_short) - 1
        };
        let long_capacity = if bits_long == 0 {
            0
        } else {
            1usize << (bits_long - bits_short)
        };
        if short > short_capacity || long > long_capacity {
            return Err(KeyError::InvalidCounts { total, short });
        }

        let required_bits = KEY_HEADER_LEN * 8
            + short * (8 + bits_short as usize)
            + long * (8 + bits_long as usize);
        if required_bits > key.bit_len() {
            return Err(KeyError::Truncated {
                required_bits,
                available_bits: key.bit_len(),
            });
        }

        let escape = escape_pattern(bits_short);
        let suffix_bits = (bits_long.saturating_sub(bits_short)) as usize;
        let mut cursor = BitCursor::at(key, KEY_HEADER_LEN * 8);
        let mut seen = [false; 256];
        let mut codewords = HashMap::with_capacity(total);
        let mut entries = Vec::with_capacity(total);

        for i in 0..total {
            // Lengths were checked above, so reads cannot run off the end.
            let symbol = read_key_field(&mut cursor, 8)? as u8;
            let entry = if i < short {
                let codeword = read_key_field(&mut cursor, bits_short as usize)?;
                if bits_long != 0 && codeword == escape {
                    return Err(KeyError::DuplicateCodeword {
                        codeword,
                        bit_length: bits_short,
                    });
                }
                CodebookEntry {
                    symbol,
                    codeword,
                    bit_length: bits_short,
                }
            } else {
                let prefix = read_key_field(&mut cursor, bits_short as usize)?;
                let suffix = read_key_field(&mut cursor, suffix_bits)?;
                let codeword = (prefix << suffix_bits) | suffix;
                if prefix != escape {
                    return Err(KeyError::MissingEscapePrefix { symbol, codeword });
                }
                CodebookEntry {
                    symbol,
                    codeword,
                    bit_length: bits_long,
                }
            };

            if std::mem::replace(&mut seen[symbol as usize], true) {
                return Err(KeyError::DuplicateSymbol(symbol));
            }
            if codewords
                .insert((entry.codeword, entry.bit_length), symbol)
                .is_some()
            {
                return Err(KeyError::DuplicateCodeword {
                    codeword: entry.codeword,
                    bit_length: entry.bit_length,
                });
            }
            entries.push(entry);
        }

        Ok(Self::from_entries(entries, short, bits_short, bits_long))
    }

    /// Serialize into a fresh key buffer.
    pub fn to_key(&self) -> Result<BitBuffer> {
        let mut key = BitBuffer::new();
        key.push_byte(count_to_header(self.entries.len()))?;
        key.push_byte(count_to_header(self.short_count))?;
        key.push_byte(self.bits_short)?;
        key.push_byte(self.bits_long)?;

        let suffix_bits = self.bits_long.saturating_sub(self.bits_short) as usize;
        for entry in &self.entries {
            key.push_byte(entry.symbol)?;
            if entry.bit_length == self.bits_short {
                key.append_wide(entry.codeword, self.bits_short as usize)?;
            } else {
                key.append_wide(self.escape_pattern(), self.bits_short as usize)?;
                key.append_wide(entry.codeword & low_bits(suffix_bits), suffix_bits)?;
            }
        }

        key.mark_dirty(true);
        Ok(key)
    }

    /// Codeword for `symbol`, if the codebook covers it.
    pub fn lookup(&self, symbol: u8) -> Option<CodebookEntry> {
        self.by_symbol[symbol as usize]
    }

    /// Byte value for a complete codeword of the given width.
    pub fn decode_symbol(&self, codeword: u16, bit_length: u8) -> Option<u8> {
        self.by_codeword.get(&(codeword, bit_length)).copied()
    }

    /// All entries, short tier first.
    pub fn entries(&self) -> &[CodebookEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn short_count(&self) -> usize {
        self.short_count
    }

    pub fn long_count(&self) -> usize {
        self.entries.len() - self.short_count
    }

    pub fn bits_short(&self) -> u8 {
        self.bits_short
    }

    /// Width of long codewords; 0 when there is no long tier.
    pub fn bits_long(&self) -> u8 {
        self.bits_long
    }

    pub fn has_long_tier(&self) -> bool {
        self.bits_long != 0
    }

    /// All-ones prefix announcing a long codeword.
    pub fn escape_pattern(&self) -> u16 {
        escape_pattern(self.bits_short)
    }

    /// Expected codeword length in bits per byte of a source with `stats`.
    ///
    /// Bytes the codebook does not cover are ignored.
    pub fn average_code_length(&self, stats: &Statistics) -> f64 {
        self.entries
            .iter()
            .map(|e| stats.probability(e.symbol) * e.bit_length as f64)
            .sum()
    }
}

/// Computes tier sizes and widths from byte statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodebookBuilder {
    target_fraction: f64,
}

impl CodebookBuilder {
    /// Builder with the default target fraction of 0.8.
    pub fn new() -> Self {
        Self {
            target_fraction: DEFAULT_TARGET_FRACTION,
        }
    }

    /// Builder covering `target_fraction` of the input with short codewords.
    ///
    /// # Errors
    /// `CodebookError::InvalidTargetFraction` unless `0 < target_fraction < 1`.
    pub fn with_target_fraction(target_fraction: f64) -> Result<Self> {
        if !(target_fraction > 0.0 && target_fraction < 1.0) {
            return Err(CodebookError::InvalidTargetFraction(target_fraction).into());
        }
        Ok(Self { target_fraction })
    }

    pub fn target_fraction(&self) -> f64 {
        self.target_fraction
    }

    /// Build a codebook from the buffer's cached statistics.
    ///
    /// # Errors
    /// - `Error::StaleStatistics` if the buffer changed since its last refresh
    /// - `CodebookError::EmptyInput` if the buffer is empty
    pub fn build_from_buffer(&self, input: &BitBuffer) -> Result<Codebook> {
        self.build(input.statistics()?)
    }

    /// Build a codebook and serialize it as a key buffer.
    pub fn generate_key(&self, input: &BitBuffer) -> Result<BitBuffer> {
        self.build_from_buffer(input)?.to_key()
    }

    /// Build a codebook covering every byte value present in `stats`.
    pub fn build(&self, stats: &Statistics) -> Result<Codebook> {
        let frequency = stats.frequencies();
        let mut ordering: Vec<u8> = (0..=255u8).filter(|&b| frequency[b as usize] > 0).collect();
        if ordering.is_empty() {
            return Err(CodebookError::EmptyInput.into());
        }
        ordering.sort_by(|&a, &b| {
            frequency[b as usize]
                .cmp(&frequency[a as usize])
                .then(a.cmp(&b))
        });

        let unique = ordering.len();

        // Values needed to reach the target
        let mut short_count = 0;
        let mut covered = 0.0;
        while short_count < unique && covered < self.target_fraction {
            covered += stats.probability(ordering[short_count]);
            short_count += 1;
        }

        let bits_short = ceil_log2(short_count + 1).max(MIN_SHORT_BITS);

        // Fill the remaining non-escape codewords
        let capacity = (1usize << bits_short) - 1;
        while short_count < unique && short_count < capacity {
            covered += stats.probability(ordering[short_count]);
            short_count += 1;
        }

        // An escape for a single value costs more than it saves
        if unique - short_count == 1 {
            covered += stats.probability(ordering[short_count]);
            short_count += 1;
        }

        let remaining = unique - short_count;
        let bits_long = if remaining > 0 {
            bits_short + ceil_log2(remaining)
        } else {
            0
        };

        let constant_bits = ceil_log2(unique);
        debug!(
            "unique bytes: {}, constant width: {} bits ({:.2}% of input), redundancy {:.2}%",
            unique,
            constant_bits,
            constant_bits as f64 / 8.0 * 100.0,
            (1.0 - unique as f64 / (1u64 << constant_bits) as f64) * 100.0
        );
        debug!(
            "target {:.2}%, covered {:.2}%: {} short ({} bits), {} long ({} bits)",
            self.target_fraction * 100.0,
            covered * 100.0,
            short_count,
            bits_short,
            remaining,
            bits_long
        );

        let codebook = Codebook::assign(&ordering, short_count, bits_short, bits_long);
        debug!(
            "average code length {:.3} bits/byte, entropy {:.3} bits/byte",
            codebook.average_code_length(stats),
            stats.byte_entropy()
        );
        Ok(codebook)
    }
}

impl Default for CodebookBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn read_key_field(cursor: &mut BitCursor<'_>, bits: usize) -> std::result::Result<u16, KeyError> {
    let available_bits = cursor.position() + cursor.bits_remaining();
    cursor.read(bits).map_err(|_| KeyError::Truncated {
        required_bits: cursor.position() + bits,
        available_bits,
    })
}

fn escape_pattern(bits_short: u8) -> u16 {
    low_bits(bits_short as usize)
}

fn low_bits(bits: usize) -> u16 {
    ((1u32 << bits) - 1) as u16
}

/// Smallest `b` with `2^b >= n`.
fn ceil_log2(n: usize) -> u8 {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as u8
    }
}

/// Header counts are single bytes; 256 wraps to 0.
fn count_to_header(count: usize) -> u8 {
    (count % 256) as u8
}

/// A codebook always has at least one entry, so 0 can only mean 256.
fn count_from_header(byte: u8) -> usize {
    if byte == 0 {
        256
    } else {
        byte as usize
    }
}
