//! Byte-level frequency statistics and entropy measures.
//!
//! `Statistics` is a plain value computed from a byte slice. `BitBuffer`
//! memoizes one and ties it to a content version, but the value itself knows
//! nothing about buffers and can be built from any slice.

/// Frequency table and derived probabilities of one byte sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    frequency: [u64; 256],
    probability: [f64; 256],
    total_bytes: u64,
    set_bits: u64,
}

impl Statistics {
    /// Count byte values and set bits in `bytes`.
    ///
    /// Probabilities of an empty slice are all zero.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut frequency = [0u64; 256];
        let mut set_bits = 0u64;
        for &byte in bytes {
            frequency[byte as usize] += 1;
            set_bits += byte.count_ones() as u64;
        }

        let total_bytes = bytes.len() as u64;
        let mut probability = [0f64; 256];
        if total_bytes > 0 {
            for (p, &f) in probability.iter_mut().zip(frequency.iter()) {
                *p = f as f64 / total_bytes as f64;
            }
        }

        Self {
            frequency,
            probability,
            total_bytes,
            set_bits,
        }
    }

    /// Number of bytes the statistics were computed over.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Number of times `byte` occurs.
    pub fn frequency(&self, byte: u8) -> u64 {
        self.frequency[byte as usize]
    }

    /// Fraction of bytes equal to `byte`.
    pub fn probability(&self, byte: u8) -> f64 {
        self.probability[byte as usize]
    }

    /// Full frequency table indexed by byte value.
    pub fn frequencies(&self) -> &[u64; 256] {
        &self.frequency
    }

    /// Number of distinct byte values present.
    pub fn distinct_symbols(&self) -> usize {
        self.frequency.iter().filter(|&&f| f > 0).count()
    }

    /// Shannon entropy in bits per byte.
    pub fn byte_entropy(&self) -> f64 {
        self.probability
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.log2())
            .sum()
    }

    /// Binary entropy of the stream viewed as a sequence of independent bits.
    ///
    /// Returns 0.0 for an empty stream or one made of a single bit value.
    pub fn bit_entropy(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let one = self.set_bits as f64 / (self.total_bytes as f64 * 8.0);
        let zero = 1.0 - one;
        [one, zero]
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.log2())
            .sum()
    }

    /// Self-information of `byte` in bits (`-log2 p`); infinite when absent.
    pub fn information_content(&self, byte: u8) -> f64 {
        -self.probability(byte).log2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_frequencies() {
        let stats = Statistics::from_bytes(b"AABC");
        assert_eq!(stats.frequency(b'A'), 2);
        assert_eq!(stats.frequency(b'B'), 1);
        assert_eq!(stats.frequency(b'Z'), 0);
        assert_eq!(stats.total_bytes(), 4);
        assert_eq!(stats.distinct_symbols(), 3);
        assert!((stats.probability(b'A') - 0.5).abs() < EPS);
    }

    #[test]
    fn test_probability_sums_to_one() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let stats = Statistics::from_bytes(&data);
        let sum: f64 = (0..=255u8).map(|b| stats.probability(b)).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_byte_entropy() {
        // Two equiprobable symbols: exactly one bit
        assert!((Statistics::from_bytes(b"ABAB").byte_entropy() - 1.0).abs() < EPS);
        // A:1/2 B:1/4 C:1/4 -> 1.5 bits
        assert!((Statistics::from_bytes(b"AABC").byte_entropy() - 1.5).abs() < EPS);
        assert_eq!(Statistics::from_bytes(b"ZZZZ").byte_entropy(), 0.0);
    }

    #[test]
    fn test_bit_entropy() {
        // 0x0F: half the bits set
        assert!((Statistics::from_bytes(&[0x0F, 0xF0]).bit_entropy() - 1.0).abs() < EPS);
        assert_eq!(Statistics::from_bytes(&[0x00, 0x00]).bit_entropy(), 0.0);
        assert_eq!(Statistics::from_bytes(&[0xFF]).bit_entropy(), 0.0);
    }

    #[test]
    fn test_information_content() {
        let stats = Statistics::from_bytes(b"AABC");
        assert!((stats.information_content(b'A') - 1.0).abs() < EPS);
        assert!((stats.information_content(b'B') - 2.0).abs() < EPS);
        assert!(stats.information_content(b'Q').is_infinite());
    }

    #[test]
    fn test_empty() {
        let stats = Statistics::from_bytes(&[]);
        assert_eq!(stats.total_bytes(), 0);
        assert_eq!(stats.byte_entropy(), 0.0);
        assert_eq!(stats.bit_entropy(), 0.0);
        assert_eq!(stats.probability(0), 0.0);
    }
}
