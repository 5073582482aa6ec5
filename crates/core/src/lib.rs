//! tiercode-core: bit-addressable buffers and a two-tier escape-prefixed byte compressor
//!
//! This library provides the components of a small, key-driven compressor:
//! - A byte buffer that accepts sub-byte appends and random bit reads
//! - Frequency statistics and entropy measures over that buffer
//! - A codebook builder assigning short codewords to the most frequent bytes
//!   and escape-prefixed long codewords to the rest
//! - A portable key format carrying the codebook between encoder and decoder
//!
//! # Architecture
//!
//! - `bitio`: BitBuffer and a sequential bit cursor
//! - `stats`: byte frequency, probability and entropy
//! - `codebook`: tier allocation and key serialization
//! - `codec`: encode/decode transforms behind the `ByteCodec` trait
//! - `framing`: self-describing container bundling key, payload and length
//! - `metrics`: observable results of a run
//!
//! # Example
//! ```
//! use tiercode_core::{BitBuffer, ByteCodec, TwoTierCodec};
//!
//! let mut input = BitBuffer::from_bytes(b"abracadabra".to_vec());
//! input.refresh_statistics();
//!
//! let codec = TwoTierCodec::default();
//! let key = codec.generate_key(&input).unwrap();
//! let encoded = codec.encode(&input, &key).unwrap();
//! let decoded = codec.decode(&encoded, &key).unwrap();
//! assert_eq!(decoded.as_bytes(), input.as_bytes());
//! ```

pub mod bitio;
pub mod codebook;
pub mod codec;
pub mod error;
pub mod framing;
pub mod metrics;
pub mod stats;

// Re-export commonly used types
pub use bitio::BitBuffer;
pub use codebook::{Codebook, CodebookBuilder};
pub use codec::{ByteCodec, Codec, Passthrough, TwoTierCodec};
pub use error::{Error, Result};
pub use stats::Statistics;
