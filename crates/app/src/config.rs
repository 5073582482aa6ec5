//! Configuration for the tiercode driver.
//!
//! Command-line arguments are parsed with clap and resolved into a `Config`
//! with every default filled in, so a run can be reproduced from the printed
//! configuration.
//!
//! # Philosophy
//!
//! The tool should work with ZERO arguments: without an input file it
//! generates seeded sample data and round-trips that.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tiercode_core::{codebook::DEFAULT_TARGET_FRACTION, Codec, Error, Passthrough, Result};

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(
    name = "tiercode",
    about = "Two-tier escape-code compressor: generate or load a key, encode, decode, verify"
)]
pub struct Cli {
    /// Input file (default: generate sample data)
    #[arg(long = "in", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Where to write the encoded buffer
    #[arg(long, value_name = "PATH", default_value = "./out.encoded")]
    pub encoded: PathBuf,

    /// Where to write the decoded buffer
    #[arg(long, value_name = "PATH", default_value = "./out.decoded")]
    pub decoded: PathBuf,

    /// Key file: written when generating, read with --load-key
    #[arg(long, value_name = "PATH", default_value = "./encoding_map.key")]
    pub key: PathBuf,

    /// Load an existing key instead of generating one from the input
    #[arg(long)]
    pub load_key: bool,

    /// Also write a packed container (key + payload + length + CRC)
    #[arg(long, value_name = "PATH")]
    pub packed: Option<PathBuf>,

    /// Cumulative probability covered by short codewords, in (0, 1)
    #[arg(long, value_name = "F", default_value_t = DEFAULT_TARGET_FRACTION)]
    pub target_fraction: f64,

    /// Codec to run
    #[arg(long, value_enum, default_value_t = CodecChoice::TwoTier)]
    pub codec: CodecChoice,

    /// Random seed for generated sample data
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Size of generated sample data in bytes
    #[arg(long, value_name = "N", default_value_t = 65536)]
    pub sample_bytes: usize,

    /// Print resolved configuration
    #[arg(long)]
    pub print_config: bool,

    /// Don't print metrics summary
    #[arg(long)]
    pub no_metrics: bool,

    /// Log key-generation analysis and per-step details
    #[arg(short, long)]
    pub verbose: bool,
}

/// Codec selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CodecChoice {
    TwoTier,
    Passthrough,
}

/// Complete configuration for a run.
#[derive(Debug, Clone)]
pub struct Config {
    // === Files ===
    /// Input file path (None = generate sample)
    pub input_file: Option<PathBuf>,

    /// Encoded output path
    pub encoded_file: PathBuf,

    /// Decoded output path
    pub decoded_file: PathBuf,

    /// Key path
    pub key_file: PathBuf,

    /// Optional packed container path
    pub packed_file: Option<PathBuf>,

    // === Codec ===
    /// Load the key instead of generating it
    pub load_key: bool,

    /// Codec variant and its parameters
    pub codec: Codec,

    // === Sample data ===
    /// Seed for sample generation
    pub seed: u64,

    /// Sample size in bytes
    pub sample_bytes: usize,

    // === Behavior ===
    /// Whether to print detailed config
    pub print_config: bool,

    /// Whether to print detailed metrics summary
    pub print_metrics: bool,
}

impl Config {
    /// Resolve parsed arguments into a configuration.
    ///
    /// # Errors
    /// `Error::Config` if the target fraction is outside (0, 1) or a key is
    /// to be loaded for a codec that does not use one.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let codec = match cli.codec {
            CodecChoice::TwoTier => Codec::two_tier(cli.target_fraction)
                .map_err(|e| Error::Config(format!("--target-fraction: {e}")))?,
            CodecChoice::Passthrough => Codec::Passthrough(Passthrough),
        };

        if cli.load_key && cli.codec == CodecChoice::Passthrough {
            return Err(Error::Config(
                "--load-key has no effect with the passthrough codec".to_string(),
            ));
        }

        // Time-based seed unless given explicitly
        let seed = cli.seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default()
        });

        Ok(Config {
            input_file: cli.input,
            encoded_file: cli.encoded,
            decoded_file: cli.decoded,
            key_file: cli.key,
            packed_file: cli.packed,
            load_key: cli.load_key,
            codec,
            seed,
            sample_bytes: cli.sample_bytes,
            print_config: cli.print_config,
            print_metrics: !cli.no_metrics,
        })
    }

    /// Target fraction of the two-tier codec, if selected.
    pub fn target_fraction(&self) -> Option<f64> {
        match &self.codec {
            Codec::TwoTier(codec) => Some(codec.builder().target_fraction()),
            Codec::Passthrough(_) => None,
        }
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        match &self.input_file {
            Some(path) => println!("Input file:   {}", path.display()),
            None => println!(
                "Input file:   (generate {} bytes, seed {})",
                self.sample_bytes, self.seed
            ),
        }
        println!("Encoded file: {}", self.encoded_file.display());
        println!("Decoded file: {}", self.decoded_file.display());
        println!(
            "Key file:     {} ({})",
            self.key_file.display(),
            if self.load_key { "load" } else { "generate" }
        );
        if let Some(path) = &self.packed_file {
            println!("Packed file:  {}", path.display());
        }
        println!();
        println!("=== Codec ===");
        match self.target_fraction() {
            Some(fraction) => println!("Two-tier, target fraction {:.3}", fraction),
            None => println!("Passthrough"),
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        let cli = Cli::try_parse_from(std::iter::once("tiercode").chain(args.iter().copied()))
            .map_err(|e| Error::Config(e.to_string()))?;
        Config::from_cli(cli)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert!(config.input_file.is_none());
        assert!(!config.load_key);
        assert!(config.print_metrics);
        assert_eq!(config.sample_bytes, 65536);
        assert_eq!(config.target_fraction(), Some(DEFAULT_TARGET_FRACTION));
    }

    #[test]
    fn test_explicit_options() {
        let config = parse(&[
            "--in",
            "data.txt",
            "--key",
            "k.key",
            "--load-key",
            "--target-fraction",
            "0.6",
            "--seed",
            "42",
            "--no-metrics",
            "--packed",
            "data.ttkc",
        ])
        .unwrap();

        assert_eq!(config.input_file, Some(PathBuf::from("data.txt")));
        assert_eq!(config.key_file, PathBuf::from("k.key"));
        assert!(config.load_key);
        assert_eq!(config.target_fraction(), Some(0.6));
        assert_eq!(config.seed, 42);
        assert!(!config.print_metrics);
        assert_eq!(config.packed_file, Some(PathBuf::from("data.ttkc")));
    }

    #[test]
    fn test_invalid_target_fraction() {
        assert!(matches!(
            parse(&["--target-fraction", "1.5"]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_passthrough_rejects_load_key() {
        assert!(parse(&["--codec", "passthrough"]).is_ok());
        assert!(matches!(
            parse(&["--codec", "passthrough", "--load-key"]),
            Err(Error::Config(_))
        ));
    }
}
