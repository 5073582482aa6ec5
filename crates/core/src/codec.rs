//! Byte codecs driven by a key buffer.
//!
//! `ByteCodec` is the capability set every codec offers. `TwoTierCodec` is the
//! escape-prefixed compressor; `Passthrough` copies bytes unchanged and needs
//! no key. `Codec` picks one of them by value.
//!
//! Encoding and decoding are one-shot: the key is parsed at the start of every
//! call and nothing is retained between calls.

use log::trace;

use crate::bitio::{BitBuffer, BitCursor};
use crate::codebook::{Codebook, CodebookBuilder};
use crate::error::{Error, Result};

/// Operations shared by all codecs.
pub trait ByteCodec {
    /// Human-readable codec name.
    fn name(&self) -> &'static str;

    /// Whether `encode`/`decode` read the key buffer.
    fn uses_key(&self) -> bool;

    /// Derive a key from the input's statistics.
    fn generate_key(&self, input: &BitBuffer) -> Result<BitBuffer>;

    /// Transform `input` into a new encoded buffer.
    fn encode(&self, input: &BitBuffer, key: &BitBuffer) -> Result<BitBuffer>;

    /// Recover the original bytes from an encoded buffer.
    fn decode(&self, input: &BitBuffer, key: &BitBuffer) -> Result<BitBuffer>;
}

/// Frequency-adaptive two-tier compressor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TwoTierCodec {
    builder: CodebookBuilder,
}

impl TwoTierCodec {
    pub fn new(builder: CodebookBuilder) -> Self {
        Self { builder }
    }

    /// Codec whose generated keys cover `target_fraction` with short codewords.
    pub fn with_target_fraction(target_fraction: f64) -> Result<Self> {
        Ok(Self::new(CodebookBuilder::with_target_fraction(
            target_fraction,
        )?))
    }

    pub fn builder(&self) -> &CodebookBuilder {
        &self.builder
    }

    /// Decode exactly `expected_len` symbols, ignoring anything after them.
    ///
    /// # Errors
    /// `Error::LengthMismatch` if the input ends before `expected_len` symbols.
    pub fn decode_exact(
        &self,
        input: &BitBuffer,
        key: &BitBuffer,
        expected_len: usize,
    ) -> Result<BitBuffer> {
        let codebook = Codebook::from_key(key)?;
        let output = decode_symbols(input, &codebook, Some(expected_len))?;
        if output.len() != expected_len {
            return Err(Error::LengthMismatch {
                expected: expected_len,
                actual: output.len(),
            });
        }
        Ok(output)
    }
}

impl ByteCodec for TwoTierCodec {
    fn name(&self) -> &'static str {
        "Two-tier escape code"
    }

    fn uses_key(&self) -> bool {
        true
    }

    /// # Errors
    /// `Error::StaleStatistics` unless the input's statistics were refreshed.
    fn generate_key(&self, input: &BitBuffer) -> Result<BitBuffer> {
        self.builder.generate_key(input)
    }

    /// # Errors
    /// - `Error::InvalidKey` if the key does not parse
    /// - `Error::UnknownSymbol` if the input holds a byte the key lacks
    fn encode(&self, input: &BitBuffer, key: &BitBuffer) -> Result<BitBuffer> {
        let codebook = Codebook::from_key(key)?;
        let mut output = BitBuffer::new();

        for (position, &symbol) in input.iter().enumerate() {
            let entry = codebook
                .lookup(symbol)
                .ok_or(Error::UnknownSymbol { symbol, position })?;
            // Codewords wider than 8 bits go out as high part, then low byte
            output.append_wide(entry.codeword, entry.bit_length as usize)?;
        }

        output.mark_dirty(true);
        trace!(
            "encoded {} bytes into {} bits",
            input.len(),
            output.bit_len()
        );
        Ok(output)
    }

    /// Decoding stops when fewer than `bits_short` bits remain.
    ///
    /// # Errors
    /// - `Error::InvalidKey` if the key does not parse
    /// - `Error::UnknownCodeword` if the input holds a codeword the key lacks
    /// - `Error::TruncatedCodeword` if an escape prefix ends the input
    fn decode(&self, input: &BitBuffer, key: &BitBuffer) -> Result<BitBuffer> {
        let codebook = Codebook::from_key(key)?;
        decode_symbols(input, &codebook, None)
    }
}

fn decode_symbols(
    input: &BitBuffer,
    codebook: &Codebook,
    limit: Option<usize>,
) -> Result<BitBuffer> {
    let bits_short = codebook.bits_short();
    let bits_long = codebook.bits_long();
    let escape = codebook.escape_pattern();
    let suffix_bits = bits_long.saturating_sub(bits_short) as usize;

    let mut cursor = BitCursor::new(input);
    let mut output = BitBuffer::new();
    let mut decoded = 0usize;

    while cursor.bits_remaining() >= bits_short as usize && limit.map_or(true, |n| decoded < n) {
        let bit_position = cursor.position();
        let mut codeword = cursor.read(bits_short as usize)?;
        let mut bit_length = bits_short;

        if codeword == escape && codebook.has_long_tier() {
            if cursor.bits_remaining() < suffix_bits {
                return Err(Error::TruncatedCodeword {
                    bit_position,
                    required: suffix_bits,
                    available: cursor.bits_remaining(),
                });
            }
            codeword = (codeword << suffix_bits) | cursor.read(suffix_bits)?;
            bit_length = bits_long;
        }

        let symbol = codebook
            .decode_symbol(codeword, bit_length)
            .ok_or(Error::UnknownCodeword {
                codeword,
                bit_length,
                bit_position,
            })?;
        output.push_byte(symbol)?;
        decoded += 1;
    }

    output.mark_dirty(true);
    trace!(
        "decoded {} bits into {} bytes",
        cursor.position(),
        output.len()
    );
    Ok(output)
}

/// Identity codec; keys are empty and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Passthrough;

impl ByteCodec for Passthrough {
    fn name(&self) -> &'static str {
        "Passthrough"
    }

    fn uses_key(&self) -> bool {
        false
    }

    fn generate_key(&self, _input: &BitBuffer) -> Result<BitBuffer> {
        Ok(BitBuffer::new())
    }

    fn encode(&self, input: &BitBuffer, _key: &BitBuffer) -> Result<BitBuffer> {
        let mut output = input.clone();
        output.mark_dirty(true);
        Ok(output)
    }

    fn decode(&self, input: &BitBuffer, key: &BitBuffer) -> Result<BitBuffer> {
        self.encode(input, key)
    }
}

/// Codec selected by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Codec {
    TwoTier(TwoTierCodec),
    Passthrough(Passthrough),
}

impl Codec {
    /// Two-tier codec with the given target fraction.
    pub fn two_tier(target_fraction: f64) -> Result<Self> {
        Ok(Self::TwoTier(TwoTierCodec::with_target_fraction(
            target_fraction,
        )?))
    }

    fn inner(&self) -> &dyn ByteCodec {
        match self {
            Self::TwoTier(codec) => codec,
            Self::Passthrough(codec) => codec,
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::TwoTier(TwoTierCodec::default())
    }
}

impl ByteCodec for Codec {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn uses_key(&self) -> bool {
        self.inner().uses_key()
    }

    fn generate_key(&self, input: &BitBuffer) -> Result<BitBuffer> {
        self.inner().generate_key(input)
    }

    fn encode(&self, input: &BitBuffer, key: &BitBuffer) -> Result<BitBuffer> {
        self.inner().encode(input, key)
    }

    fn decode(&self, input: &BitBuffer, key: &BitBuffer) -> Result<BitBuffer> {
        self.inner().decode(input, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KeyError;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn fresh(bytes: &[u8]) -> BitBuffer {
        let mut buf = BitBuffer::from_bytes(bytes.to_vec());
        buf.refresh_statistics();
        buf
    }

    fn round_trip(data: &[u8], fraction: f64) -> BitBuffer {
        let codec = TwoTierCodec::with_target_fraction(fraction).unwrap();
        let input = fresh(data);
        let key = codec.generate_key(&input).unwrap();
        let encoded = codec.encode(&input, &key).unwrap();
        let decoded = codec.decode(&encoded, &key).unwrap();
        assert_eq!(decoded.as_bytes(), data, "fraction {fraction}");
        encoded
    }

    #[test]
    fn test_three_symbol_stream() {
        let encoded = round_trip(&[0x41, 0x41, 0x42, 0x43], 0.5);
        // 00 00 01 10
        assert_eq!(encoded.as_bytes(), &[0b0000_0110]);
        assert_eq!(encoded.bit_len(), 8);
    }

    #[test]
    fn test_escape_codes() {
        let mut data = vec![b'a'; 90];
        data.extend(b"bcdefghijk");
        let encoded = round_trip(&data, 0.8);
        // 92 short symbols at 2 bits, 8 long at 5 bits
        assert_eq!(encoded.bit_len(), 92 * 2 + 8 * 5);
    }

    #[test]
    fn test_partial_last_byte_is_not_decoded() {
        // 3 symbols at 2 bits: 2 pad bits in the last byte
        let data = [0x41, 0x42, 0x43];
        let encoded = round_trip(&data, 0.5);
        assert_eq!(encoded.bit_len(), 6);
        assert_eq!(encoded.len(), 1);
    }

    #[test]
    fn test_wide_codewords() {
        // 256 values, low target: 2-bit short codes, 10-bit long codes
        let data: Vec<u8> = (0..=255u8).chain(std::iter::repeat(0).take(100)).collect();
        let codec = TwoTierCodec::with_target_fraction(0.3).unwrap();
        let input = fresh(&data);
        let codebook = codec.builder().build_from_buffer(&input).unwrap();
        assert!(codebook.bits_long() > 8);

        round_trip(&data, 0.3);
    }

    #[test]
    fn test_nine_bit_short_codes() {
        let data: Vec<u8> = (0..=255u8).collect();
        round_trip(&data, 0.999_999);
    }

    #[test]
    fn test_random_round_trips() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..100 {
            let len = rng.gen_range(1..3000);
            let skew = rng.gen_range(1.0..6.0);
            let data: Vec<u8> = (0..len)
                .map(|_| {
                    let r: f64 = rng.gen();
                    (r.powf(skew) * 256.0) as u8
                })
                .collect();
            round_trip(&data, rng.gen_range(0.01..0.99));
        }
    }

    #[test]
    fn test_empty_input_with_valid_key() {
        let codec = TwoTierCodec::default();
        let key = codec.generate_key(&fresh(b"abc")).unwrap();

        let encoded = codec.encode(&BitBuffer::new(), &key).unwrap();
        assert!(encoded.is_empty());
        let decoded = codec.decode(&BitBuffer::new(), &key).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_output_statistics_are_fresh() {
        let codec = TwoTierCodec::default();
        let input = fresh(b"mississippi");
        let key = codec.generate_key(&input).unwrap();
        let encoded = codec.encode(&input, &key).unwrap();
        assert!(encoded.byte_entropy().is_ok());
        let decoded = codec.decode(&encoded, &key).unwrap();
        assert_eq!(decoded.byte_frequency(b's').unwrap(), 4);
    }

    #[test]
    fn test_invalid_key() {
        let codec = TwoTierCodec::default();
        let input = fresh(b"abc");
        let short_key = BitBuffer::from_bytes(vec![3, 3]);

        assert!(matches!(
            codec.encode(&input, &short_key),
            Err(Error::InvalidKey(KeyError::TooShort { .. }))
        ));
        assert!(matches!(
            codec.decode(&input, &short_key),
            Err(Error::InvalidKey(KeyError::TooShort { .. }))
        ));
    }

    #[test]
    fn test_symbol_missing_from_key() {
        let codec = TwoTierCodec::default();
        let key = codec.generate_key(&fresh(b"aab")).unwrap();
        assert!(matches!(
            codec.encode(&fresh(b"abz"), &key),
            Err(Error::UnknownSymbol { symbol: b'z', position: 2 })
        ));
    }

    #[test]
    fn test_unknown_codeword() {
        let codec = TwoTierCodec::default();
        // Two symbols: codewords 00 and 01 only
        let key = codec.generate_key(&fresh(b"aab")).unwrap();
        let garbage = BitBuffer::from_bytes(vec![0b0001_1000]);
        assert!(matches!(
            codec.decode(&garbage, &key),
            Err(Error::UnknownCodeword { codeword: 0b10, bit_length: 2, bit_position: 4 })
        ));
    }

    #[test]
    fn test_truncated_long_codeword() {
        let mut data = vec![b'a'; 90];
        data.extend(b"bcdefghijk");
        let codec = TwoTierCodec::default();
        let key = codec.generate_key(&fresh(&data)).unwrap();

        let mut encoded = BitBuffer::new();
        encoded.append(0b11, 2).unwrap();
        encoded.append(0b0, 1).unwrap();
        assert!(matches!(
            codec.decode(&encoded, &key),
            Err(Error::TruncatedCodeword { bit_position: 0, required: 3, available: 1 })
        ));
    }

    #[test]
    fn test_decode_exact_ignores_pad_of_loaded_payload() {
        // 3 symbols at 2 bits, then the cursor is forgotten as after a file load
        let data = [0x41, 0x42, 0x43];
        let codec = TwoTierCodec::with_target_fraction(0.5).unwrap();
        let input = fresh(&data);
        let key = codec.generate_key(&input).unwrap();
        let encoded = codec.encode(&input, &key).unwrap();
        let loaded = BitBuffer::from_bytes(encoded.into_bytes());

        // The two zero pad bits read back as one more 0x41
        let naive = codec.decode(&loaded, &key).unwrap();
        assert_eq!(naive.as_bytes(), &[0x41, 0x42, 0x43, 0x41]);

        let exact = codec.decode_exact(&loaded, &key, 3).unwrap();
        assert_eq!(exact.as_bytes(), &data);

        assert!(matches!(
            codec.decode_exact(&loaded, &key, 5),
            Err(Error::LengthMismatch { expected: 5, actual: 4 })
        ));
    }

    #[test]
    fn test_passthrough() {
        let codec = Codec::Passthrough(Passthrough);
        assert!(!codec.uses_key());
        let input = fresh(b"anything");
        let key = codec.generate_key(&input).unwrap();
        assert!(key.is_empty());

        let encoded = codec.encode(&input, &key).unwrap();
        assert_eq!(encoded, input);
        assert_eq!(codec.decode(&encoded, &key).unwrap(), input);
    }

    #[test]
    fn test_codec_dispatch() {
        let codec = Codec::two_tier(0.5).unwrap();
        assert!(codec.uses_key());
        assert_eq!(codec.name(), "Two-tier escape code");
        assert!(Codec::two_tier(1.0).is_err());

        let input = fresh(b"dispatch by value");
        let key = codec.generate_key(&input).unwrap();
        let encoded = codec.encode(&input, &key).unwrap();
        assert_eq!(codec.decode(&encoded, &key).unwrap(), input);
        assert_eq!(Codec::default().name(), codec.name());
    }
}
