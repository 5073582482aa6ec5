//! Error types for the tiercode library.
//!
//! Every precondition the codec relies on is reported as a structured error
//! instead of an assertion, so a bad key or a stale statistics cache never
//! aborts the caller.

use thiserror::Error;

/// Top-level error type for all operations in the library.
///
/// Each variant corresponds to a specific failure domain:
/// - Bit I/O: reading bits or bytes outside the buffer
/// - Statistics: querying a cache that no longer matches the content
/// - Key: parsing a serialized codebook
/// - Decode: bit patterns the codebook does not know about
/// - Framing: packed container parsing
/// - I/O: file system operations
#[derive(Debug, Error)]
pub enum Error {
    /// Bit I/O operation failed (e.g., reading past end of buffer)
    #[error("bit I/O error: {0}")]
    BitIo(#[from] BitIoError),

    /// Frequency/probability query issued before statistics were refreshed
    #[error("statistics are stale: call refresh_statistics() after mutating the buffer")]
    StaleStatistics,

    /// Key buffer is missing, truncated or internally inconsistent
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Codebook construction failed
    #[error("codebook error: {0}")]
    Codebook(#[from] CodebookError),

    /// Decoder met a codeword that the key does not define
    #[error("unknown {bit_length}-bit codeword {codeword:#x} at bit {bit_position}")]
    UnknownCodeword {
        codeword: u16,
        bit_length: u8,
        bit_position: usize,
    },

    /// Encoder met a byte value the key does not cover
    #[error("byte {symbol:#04x} at offset {position} is not covered by the key")]
    UnknownSymbol { symbol: u8, position: usize },

    /// Escape prefix at the end of the data without its continuation bits
    #[error("truncated long codeword at bit {bit_position}: need {required} bits, {available} left")]
    TruncatedCodeword {
        bit_position: usize,
        required: usize,
        available: usize,
    },

    /// Decoded symbol count differs from the recorded original length
    #[error("decoded length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Packed container error (e.g., invalid header, length mismatch)
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// CRC validation failed, indicating data corruption
    #[error("CRC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    Crc { expected: u32, actual: u32 },

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Bit-level I/O errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitIoError {
    /// Addressed bits lie (partly) beyond the end of the buffer
    #[error("bit range out of range: {bit_count} bits at bit {bit_index}, buffer holds {available} bits")]
    OutOfRange {
        bit_index: usize,
        bit_count: usize,
        available: usize,
    },

    /// Byte index beyond the end of the buffer
    #[error("byte index {index} out of range for buffer of {len} bytes")]
    ByteOutOfRange { index: usize, len: usize },

    /// Invalid bit count (e.g., appending 0 bits or reading more than 8)
    #[error("invalid bit count: {0}")]
    InvalidBitCount(usize),
}

/// Key buffer parsing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// Key is shorter than its 4-byte header
    #[error("key too short: need at least {required} bytes, got {actual}")]
    TooShort { required: usize, actual: usize },

    /// Header declares more entries than the key contains
    #[error("key truncated: entries need {required_bits} bits, key holds {available_bits}")]
    Truncated {
        required_bits: usize,
        available_bits: usize,
    },

    /// Codeword widths are out of the supported range
    #[error("invalid codeword widths: short={bits_short}, long={bits_long}")]
    InvalidWidths { bits_short: u8, bits_long: u8 },

    /// Entry counts do not fit the codeword widths
    #[error("invalid entry counts: total={total}, short={short}")]
    InvalidCounts { total: usize, short: usize },

    /// The same byte value appears twice
    #[error("byte {0:#04x} listed more than once")]
    DuplicateSymbol(u8),

    /// Two entries of the same width share a codeword
    #[error("{bit_length}-bit codeword {codeword:#x} assigned twice")]
    DuplicateCodeword { codeword: u16, bit_length: u8 },

    /// A long-tier entry does not start with the escape pattern
    #[error("long codeword {codeword:#x} for byte {symbol:#04x} lacks the escape prefix")]
    MissingEscapePrefix { symbol: u8, codeword: u16 },
}

/// Codebook construction errors.
#[derive(Debug, Error, PartialEq)]
pub enum CodebookError {
    /// No symbols with non-zero frequency (cannot build codebook)
    #[error("empty input: cannot build codebook")]
    EmptyInput,

    /// Target fraction outside the open interval (0, 1)
    #[error("target fraction {0} must lie strictly between 0 and 1")]
    InvalidTargetFraction(f64),
}

/// Packed container errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Invalid magic number in header
    #[error("invalid magic number: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    /// Frame is too short to contain a valid header
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    FrameTooShort { required: usize, actual: usize },

    /// Frame length doesn't match header specification
    #[error("frame length mismatch: header says {expected}, got {actual}")]
    FrameLengthMismatch { expected: usize, actual: usize },

    /// A section is too large for its header field
    #[error("{section} of {len} bytes exceeds the container limit of {max}")]
    SectionTooLarge {
        section: &'static str,
        len: usize,
        max: usize,
    },
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
