//! Metrics collection and reporting for an encode/decode run.
//!
//! Captures sizes, compression ratio, entropy of the input and the encoded
//! stream, and whether the decoded output matched the input.
//!
//! # Thread Safety
//!
//! The `Metrics` struct is NOT thread-safe. For multi-threaded use, wrap in
//! `Arc<Mutex<Metrics>>` or keep one per thread.

use std::time::{Duration, Instant};

use crate::bitio::BitBuffer;
use crate::codebook::Codebook;
use crate::error::Result;

/// Observations from one run of the driver.
#[derive(Debug, Clone)]
pub struct Metrics {
    // === Timing ===
    /// When the run started
    pub start_time: Instant,

    /// When the run ended (set on completion)
    pub end_time: Option<Instant>,

    /// Time spent encoding
    pub encode_time: Duration,

    /// Time spent decoding
    pub decode_time: Duration,

    // === Sizes ===
    /// Bytes read from the input
    pub input_bytes: u64,

    /// Bytes in the encoded buffer
    pub encoded_bytes: u64,

    /// Bits in the encoded buffer, pad excluded
    pub encoded_bits: u64,

    /// Bytes in the decoded buffer
    pub decoded_bytes: u64,

    /// Bytes in the key buffer
    pub key_bytes: u64,

    // === Codebook ===
    /// Distinct byte values in the key
    pub distinct_symbols: u64,

    /// Short-tier entries
    pub short_symbols: u64,

    /// Short codeword width
    pub bits_short: u8,

    /// Long codeword width (0 = no long tier)
    pub bits_long: u8,

    // === Entropy ===
    /// Input entropy in bits per byte
    pub input_byte_entropy: f64,

    /// Input entropy in bits per bit
    pub input_bit_entropy: f64,

    /// Encoded entropy in bits per byte
    pub encoded_byte_entropy: f64,

    /// Encoded entropy in bits per bit
    pub encoded_bit_entropy: f64,

    // === Verification ===
    /// Decoded output equals the input
    pub verified: bool,
}

impl Metrics {
    /// Create new metrics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            encode_time: Duration::ZERO,
            decode_time: Duration::ZERO,
            input_bytes: 0,
            encoded_bytes: 0,
            encoded_bits: 0,
            decoded_bytes: 0,
            key_bytes: 0,
            distinct_symbols: 0,
            short_symbols: 0,
            bits_short: 0,
            bits_long: 0,
            input_byte_entropy: 0.0,
            input_bit_entropy: 0.0,
            encoded_byte_entropy: 0.0,
            encoded_bit_entropy: 0.0,
            verified: false,
        }
    }

    /// Record input size and entropy; statistics must be fresh.
    pub fn record_input(&mut self, input: &BitBuffer) -> Result<()> {
        self.input_bytes = input.len() as u64;
        self.input_byte_entropy = input.byte_entropy()?;
        self.input_bit_entropy = input.bit_entropy()?;
        Ok(())
    }

    /// Record the key size and tier layout.
    pub fn record_key(&mut self, key: &BitBuffer, codebook: &Codebook) {
        self.key_bytes = key.len() as u64;
        self.distinct_symbols = codebook.len() as u64;
        self.short_symbols = codebook.short_count() as u64;
        self.bits_short = codebook.bits_short();
        self.bits_long = codebook.bits_long();
    }

    /// Record encoded size and entropy; statistics must be fresh.
    pub fn record_encoded(&mut self, encoded: &BitBuffer, elapsed: Duration) -> Result<()> {
        self.encoded_bytes = encoded.len() as u64;
        self.encoded_bits = encoded.bit_len() as u64;
        self.encoded_byte_entropy = encoded.byte_entropy()?;
        self.encoded_bit_entropy = encoded.bit_entropy()?;
        self.encode_time = elapsed;
        Ok(())
    }

    /// Record the decoded output and compare it with the input.
    pub fn record_decoded(&mut self, input: &BitBuffer, decoded: &BitBuffer, elapsed: Duration) {
        self.decoded_bytes = decoded.len() as u64;
        self.verified = input.as_bytes() == decoded.as_bytes();
        self.decode_time = elapsed;
    }

    /// Mark the run as complete.
    pub fn complete(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Get total duration (or current elapsed if not complete).
    pub fn duration(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Compute compression ratio (encoded / input).
    ///
    /// Returns 0.0 if there was no input.
    pub fn compression_ratio(&self) -> f64 {
        if self.input_bytes == 0 {
            0.0
        } else {
            self.encoded_bytes as f64 / self.input_bytes as f64
        }
    }

    /// Size reduction in percent.
    pub fn size_reduction(&self) -> f64 {
        if self.input_bytes == 0 {
            0.0
        } else {
            100.0 - self.compression_ratio() * 100.0
        }
    }

    /// Encoded bits spent per input byte.
    pub fn bits_per_byte(&self) -> f64 {
        if self.input_bytes == 0 {
            0.0
        } else {
            self.encoded_bits as f64 / self.input_bytes as f64
        }
    }

    /// Compute encode throughput in bytes/second.
    pub fn throughput_bps(&self) -> f64 {
        let secs = self.encode_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.input_bytes as f64 / secs
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self, codec_name: &str) {
        println!("\n=== Input ===");
        println!("Size: {} bytes", self.input_bytes);
        println!("Entropy (bytes): {:.4} bits", self.input_byte_entropy);
        println!("Entropy (bits): {:.4} bits", self.input_bit_entropy);
        println!();

        println!("=== Key ===");
        println!("Size: {} bytes", self.key_bytes);
        println!(
            "Symbols: {} ({} short at {} bits, {} long at {} bits)",
            self.distinct_symbols,
            self.short_symbols,
            self.bits_short,
            self.distinct_symbols - self.short_symbols,
            self.bits_long
        );
        println!();

        println!("=== Encoded ===");
        println!("Algorithm: {}", codec_name);
        println!("Size: {} bytes ({} bits)", self.encoded_bytes, self.encoded_bits);
        println!("Compression ratio: {:.4}", self.compression_ratio());
        println!("Size reduction: {:.2}%", self.size_reduction());
        println!("Bits per byte: {:.3}", self.bits_per_byte());
        println!("Entropy (bytes): {:.4} bits", self.encoded_byte_entropy);
        println!("Entropy (bits): {:.4} bits", self.encoded_bit_entropy);
        println!();

        println!("=== Decoded ===");
        println!("Size: {} bytes", self.decoded_bytes);
        if self.verified {
            println!("Verification: PASSED ✓");
        } else {
            println!("Verification: FAILED ✗");
        }
        println!();

        println!("=== Performance ===");
        println!("Encode: {} ms", self.encode_time.as_millis());
        println!("Decode: {} ms", self.decode_time.as_millis());
        println!("Throughput: {:.2} MB/s", self.throughput_bps() / 1_000_000.0);
        println!("Total: {} ms", self.duration().as_millis());
        println!();
    }

    /// Print just the final result (pass/fail).
    pub fn print_result(&self) {
        if self.verified {
            println!("✓ Round trip completed successfully");
            println!(
                "  {} bytes -> {} bytes ({:.1}%)",
                self.input_bytes,
                self.encoded_bytes,
                self.compression_ratio() * 100.0
            );
        } else {
            println!(
                "✗ Round trip failed: {} bytes in, {} bytes out",
                self.input_bytes, self.decoded_bytes
            );
        }
    }

    /// Export metrics as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "duration_ms={}\n\
             input_bytes={}\n\
             encoded_bytes={}\n\
             encoded_bits={}\n\
             decoded_bytes={}\n\
             key_bytes={}\n\
             compression_ratio={:.4}\n\
             bits_short={}\n\
             bits_long={}\n\
             input_byte_entropy={:.4}\n\
             encoded_byte_entropy={:.4}\n\
             verified={}\n",
            self.duration().as_millis(),
            self.input_bytes,
            self.encoded_bytes,
            self.encoded_bits,
            self.decoded_bytes,
            self.key_bytes,
            self.compression_ratio(),
            self.bits_short,
            self.bits_long,
            self.input_byte_entropy,
            self.encoded_byte_entropy,
            self.verified,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::CodebookBuilder;

    fn fresh(bytes: &[u8]) -> BitBuffer {
        let mut buf = BitBuffer::from_bytes(bytes.to_vec());
        buf.refresh_statistics();
        buf
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert!(metrics.end_time.is_none());
        assert!(!metrics.verified);
        assert_eq!(metrics.compression_ratio(), 0.0);
    }

    #[test]
    fn test_compression_ratio() {
        let mut metrics = Metrics::new();
        metrics.input_bytes = 1000;
        metrics.encoded_bytes = 750;
        metrics.encoded_bits = 6000;

        assert_eq!(metrics.compression_ratio(), 0.75);
        assert_eq!(metrics.size_reduction(), 25.0);
        assert_eq!(metrics.bits_per_byte(), 6.0);
    }

    #[test]
    fn test_record_requires_fresh_statistics() {
        let mut metrics = Metrics::new();
        let stale = BitBuffer::from_bytes(b"abc".to_vec());
        assert!(metrics.record_input(&stale).is_err());

        metrics.record_input(&fresh(b"abab")).unwrap();
        assert_eq!(metrics.input_bytes, 4);
        assert!((metrics.input_byte_entropy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_record_key_and_decoded() {
        let input = fresh(b"aaaabbc");
        let codebook = CodebookBuilder::new().build_from_buffer(&input).unwrap();
        let key = codebook.to_key().unwrap();

        let mut metrics = Metrics::new();
        metrics.record_key(&key, &codebook);
        assert_eq!(metrics.distinct_symbols, 3);
        assert_eq!(metrics.bits_short, 2);
        assert_eq!(metrics.key_bytes, key.len() as u64);

        metrics.record_decoded(&input, &input.clone(), Duration::from_millis(1));
        assert!(metrics.verified);
        metrics.record_decoded(&input, &fresh(b"aaaabb"), Duration::from_millis(1));
        assert!(!metrics.verified);
    }

    #[test]
    fn test_duration_after_complete() {
        let mut metrics = Metrics::new();
        std::thread::sleep(Duration::from_millis(10));
        metrics.complete();

        let first = metrics.duration();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(metrics.duration(), first);
    }

    #[test]
    fn test_export_text() {
        let mut metrics = Metrics::new();
        metrics.input_bytes = 1000;
        metrics.encoded_bytes = 400;
        metrics.verified = true;

        let text = metrics.export_text();
        assert!(text.contains("input_bytes=1000"));
        assert!(text.contains("encoded_bytes=400"));
        assert!(text.contains("compression_ratio=0.4000"));
        assert!(text.contains("verified=true"));
    }
}
