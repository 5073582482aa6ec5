//! Sample input generation.
//!
//! When no input file is specified, we generate data whose byte distribution
//! is skewed enough for the short tier to pay off, with a sprinkling of rare
//! values that land in the long tier.
//!
//! # Design
//!
//! Generated data has:
//! - Text-like sections drawn from a small, frequency-weighted alphabet
//! - Runs of a single byte
//! - Occasional random bytes from the whole range
//!
//! This makes both codeword tiers visible in the metrics.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Letters in rough English frequency order; earlier entries are drawn more often.
const ALPHABET: &[u8] = b" etaoinshrdlcumwfgypbvkjxqz.,\n";

/// Generate sample data with a skewed byte distribution.
///
/// # Arguments
/// - `seed`: random seed for determinism
/// - `size_bytes`: exact size of generated data
pub fn generate_sample_data(seed: u64, size_bytes: usize) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(size_bytes);

    while data.len() < size_bytes {
        let chunk_size = (size_bytes - data.len()).min(4096);

        match rng.gen_range(0..10u8) {
            // 70% text-like
            0..=6 => {
                for _ in 0..chunk_size {
                    // Squaring biases towards the front of the alphabet
                    let r: f64 = rng.gen();
                    let idx = ((r * r) * ALPHABET.len() as f64) as usize;
                    data.push(ALPHABET[idx.min(ALPHABET.len() - 1)]);
                }
            }

            // 20% runs
            7..=8 => {
                let byte = ALPHABET[rng.gen_range(0..ALPHABET.len())];
                data.extend(std::iter::repeat(byte).take(chunk_size));
            }

            // 10% text with rare bytes mixed in
            _ => {
                for _ in 0..chunk_size {
                    if rng.gen_bool(0.05) {
                        data.push(rng.gen());
                    } else {
                        data.push(ALPHABET[rng.gen_range(0..8)]);
                    }
                }
            }
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sample_data() {
        let data = generate_sample_data(42, 1000);
        assert_eq!(data.len(), 1000);
    }

    #[test]
    fn test_determinism() {
        let data1 = generate_sample_data(12345, 5000);
        let data2 = generate_sample_data(12345, 5000);

        assert_eq!(data1, data2);
    }

    #[test]
    fn test_different_seeds() {
        let data1 = generate_sample_data(1, 1000);
        let data2 = generate_sample_data(2, 1000);

        assert_ne!(data1, data2);
    }

    #[test]
    fn test_various_sizes() {
        for size in [0, 1, 100, 1000, 10000, 100000] {
            let data = generate_sample_data(999, size);
            assert_eq!(data.len(), size);
        }
    }
}
