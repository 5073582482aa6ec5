//! Packed container: key, payload and original length in one frame.
//!
//! A raw encoded buffer cannot tell its trailing pad bits from data once its
//! bit cursor is lost (e.g. after a save/load). The packed frame records the
//! original byte count so decoding stops at exactly the right symbol, and a
//! CRC catches corruption of the key or payload.
//!
//! # Frame Format
//!
//! ```text
//! +------------------+
//! | Magic (4 bytes)  |  0x54 0x54 0x4B 0x43 ("TTKC")
//! +------------------+
//! | raw_len (4)      |  u32 little-endian, original byte count
//! +------------------+
//! | key_len (2)      |  u16 length of the key buffer
//! +------------------+
//! | payload_len (4)  |  u32 length of the encoded buffer
//! +------------------+
//! | crc32 (4)        |  u32 checksum of everything
//! +------------------+
//! | key              |  serialized codebook (key_len bytes)
//! | (variable)       |
//! +------------------+
//! | payload          |  bit-packed codewords (payload_len bytes)
//! | (variable)       |
//! +------------------+
//! ```
//!
//! # CRC Coverage
//!
//! The CRC32 covers raw_len, key_len, payload_len, the key and the payload.

use log::debug;

use crate::bitio::BitBuffer;
use crate::codec::{ByteCodec, TwoTierCodec};
use crate::error::{Error, FramingError, Result};

/// Magic number for packed frames: "TTKC"
const MAGIC: [u8; 4] = [0x54, 0x54, 0x4B, 0x43];

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 18;

/// A parsed packed frame.
#[derive(Debug, Clone)]
pub struct PackedFrame {
    /// Original uncompressed length
    pub raw_len: u32,

    /// Key buffer needed to decode the payload
    pub key: BitBuffer,

    /// Encoded payload
    pub payload: BitBuffer,

    /// CRC32 checksum (for validation)
    pub crc32: u32,
}

/// Serialize a key and payload into a packed frame.
///
/// # Errors
/// `FramingError::SectionTooLarge` if a section overflows its length field.
pub fn serialize_packed(raw_len: usize, key: &BitBuffer, payload: &BitBuffer) -> Result<Vec<u8>> {
    let raw_len = u32::try_from(raw_len).map_err(|_| FramingError::SectionTooLarge {
        section: "input",
        len: raw_len,
        max: u32::MAX as usize,
    })?;
    let key_len = u16::try_from(key.len()).map_err(|_| FramingError::SectionTooLarge {
        section: "key",
        len: key.len(),
        max: u16::MAX as usize,
    })?;
    let payload_len = u32::try_from(payload.len()).map_err(|_| FramingError::SectionTooLarge {
        section: "payload",
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let crc32 = compute_crc(raw_len, key_len, payload_len, key.as_bytes(), payload.as_bytes());

    let mut frame = Vec::with_capacity(HEADER_SIZE + key.len() + payload.len());
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&raw_len.to_le_bytes());
    frame.extend_from_slice(&key_len.to_le_bytes());
    frame.extend_from_slice(&payload_len.to_le_bytes());
    frame.extend_from_slice(&crc32.to_le_bytes());
    frame.extend_from_slice(key.as_bytes());
    frame.extend_from_slice(payload.as_bytes());

    Ok(frame)
}

/// Parse a packed frame from bytes.
///
/// # Errors
/// - `FramingError::FrameTooShort` if the buffer cannot hold a header
/// - `FramingError::InvalidMagic` if magic number doesn't match
/// - `FramingError::FrameLengthMismatch` if section lengths disagree with the buffer
/// - `Error::Crc` if CRC validation fails
pub fn parse_packed(bytes: &[u8]) -> Result<PackedFrame> {
    if bytes.len() < HEADER_SIZE {
        return Err(FramingError::FrameTooShort {
            required: HEADER_SIZE,
            actual: bytes.len(),
        }
        .into());
    }

    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if magic != MAGIC {
        return Err(FramingError::InvalidMagic {
            expected: MAGIC,
            actual: magic,
        }
        .into());
    }

    let raw_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let key_len = u16::from_le_bytes([bytes[8], bytes[9]]);
    let payload_len = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);
    let crc32 = u32::from_le_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]);

    let expected_size = HEADER_SIZE + key_len as usize + payload_len as usize;
    if bytes.len() != expected_size {
        return Err(FramingError::FrameLengthMismatch {
            expected: expected_size,
            actual: bytes.len(),
        }
        .into());
    }

    let key_end = HEADER_SIZE + key_len as usize;
    let key = &bytes[HEADER_SIZE..key_end];
    let payload = &bytes[key_end..];

    let computed_crc = compute_crc(raw_len, key_len, payload_len, key, payload);
    if computed_crc != crc32 {
        return Err(Error::Crc {
            expected: crc32,
            actual: computed_crc,
        });
    }

    Ok(PackedFrame {
        raw_len,
        key: BitBuffer::from(key),
        payload: BitBuffer::from(payload),
        crc32,
    })
}

fn compute_crc(raw_len: u32, key_len: u16, payload_len: u32, key: &[u8], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();

    hasher.update(&raw_len.to_le_bytes());
    hasher.update(&key_len.to_le_bytes());
    hasher.update(&payload_len.to_le_bytes());

    hasher.update(key);
    hasher.update(payload);

    hasher.finalize()
}

/// Generate a key for `input`, encode it and pack both into a frame.
///
/// The input's statistics must be fresh.
pub fn compress_and_pack(codec: &TwoTierCodec, input: &BitBuffer) -> Result<Vec<u8>> {
    let key = codec.generate_key(input)?;
    pack_with_key(codec, input, &key)
}

/// Encode `input` with an existing key and pack both into a frame.
pub fn pack_with_key(codec: &TwoTierCodec, input: &BitBuffer, key: &BitBuffer) -> Result<Vec<u8>> {
    let payload = codec.encode(input, key)?;
    let frame = serialize_packed(input.len(), key, &payload)?;
    debug!(
        "packed {} bytes into {} (key {}, payload {})",
        input.len(),
        frame.len(),
        key.len(),
        payload.len()
    );
    Ok(frame)
}

/// Decode a parsed frame back to exactly `raw_len` bytes.
pub fn unpack_frame(frame: &PackedFrame) -> Result<BitBuffer> {
    TwoTierCodec::default().decode_exact(&frame.payload, &frame.key, frame.raw_len as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeyError;

    fn fresh(bytes: &[u8]) -> BitBuffer {
        let mut buf = BitBuffer::from_bytes(bytes.to_vec());
        buf.refresh_statistics();
        buf
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let raw = b"hello world! this is a test.";
        let frame_bytes = compress_and_pack(&TwoTierCodec::default(), &fresh(raw)).unwrap();

        let frame = parse_packed(&frame_bytes).unwrap();
        assert_eq!(frame.raw_len, raw.len() as u32);

        let decoded = unpack_frame(&frame).unwrap();
        assert_eq!(decoded.as_bytes(), raw);
    }

    #[test]
    fn test_pad_bits_not_decoded() {
        // 3 two-bit codewords leave two zero pad bits that would decode as 0x41
        let raw = [0x41, 0x42, 0x43];
        let codec = TwoTierCodec::with_target_fraction(0.5).unwrap();
        let frame_bytes = compress_and_pack(&codec, &fresh(&raw)).unwrap();

        let decoded = unpack_frame(&parse_packed(&frame_bytes).unwrap()).unwrap();
        assert_eq!(decoded.as_bytes(), &raw);
    }

    #[test]
    fn test_invalid_magic() {
        let mut frame_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        frame_bytes.extend_from_slice(&[0u8; 14]);

        assert!(matches!(
            parse_packed(&frame_bytes),
            Err(Error::Framing(FramingError::InvalidMagic { .. }))
        ));
    }

    #[test]
    fn test_frame_too_short() {
        assert!(matches!(
            parse_packed(&[0u8; 10]),
            Err(Error::Framing(FramingError::FrameTooShort { .. }))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let mut frame_bytes =
            compress_and_pack(&TwoTierCodec::default(), &fresh(b"length")).unwrap();
        frame_bytes.push(0);

        assert!(matches!(
            parse_packed(&frame_bytes),
            Err(Error::Framing(FramingError::FrameLengthMismatch { .. }))
        ));
    }

    #[test]
    fn test_crc_mismatch() {
        let mut frame_bytes =
            compress_and_pack(&TwoTierCodec::default(), &fresh(b"test data")).unwrap();

        let len = frame_bytes.len();
        frame_bytes[len - 1] ^= 0x01;

        assert!(matches!(parse_packed(&frame_bytes), Err(Error::Crc { .. })));
    }

    #[test]
    fn test_raw_len_beyond_payload() {
        let codec = TwoTierCodec::default();
        let input = fresh(b"abcabc");
        let key = codec.generate_key(&input).unwrap();
        let payload = codec.encode(&input, &key).unwrap();

        let frame_bytes = serialize_packed(100, &key, &payload).unwrap();
        let frame = parse_packed(&frame_bytes).unwrap();
        assert!(matches!(
            unpack_frame(&frame),
            Err(Error::LengthMismatch { expected: 100, .. })
        ));
    }

    #[test]
    fn test_corrupt_key_section() {
        let frame_bytes = serialize_packed(
            1,
            &BitBuffer::from_bytes(vec![1, 1]),
            &BitBuffer::from_bytes(vec![0]),
        )
        .unwrap();
        let frame = parse_packed(&frame_bytes).unwrap();
        assert!(matches!(
            unpack_frame(&frame),
            Err(Error::InvalidKey(KeyError::TooShort { .. }))
        ));
    }

    #[test]
    fn test_empty_data() {
        // Empty data has no symbols to build a key from
        let result = compress_and_pack(&TwoTierCodec::default(), &fresh(b""));
        assert!(result.is_err());
    }

    #[test]
    fn test_single_byte() {
        let frame_bytes = compress_and_pack(&TwoTierCodec::default(), &fresh(b"A")).unwrap();
        let decoded = unpack_frame(&parse_packed(&frame_bytes).unwrap()).unwrap();
        assert_eq!(decoded.as_bytes(), b"A");
    }

    #[test]
    fn test_large_data() {
        let raw = vec![b'X'; 65536];
        let frame_bytes = compress_and_pack(&TwoTierCodec::default(), &fresh(&raw)).unwrap();

        // One symbol at two bits per byte
        assert!(frame_bytes.len() < raw.len() / 3);

        let decoded = unpack_frame(&parse_packed(&frame_bytes).unwrap()).unwrap();
        assert_eq!(decoded.as_bytes(), &raw[..]);
    }
}
