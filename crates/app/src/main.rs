//! tiercode: command-line driver.
//!
//! Pipeline: load input (or generate a sample) -> refresh statistics ->
//! generate or load a key -> encode -> decode -> verify -> save outputs.

mod config;
mod input_gen;

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{error, info, warn};
use tiercode_core::{
    framing::pack_with_key, metrics::Metrics, BitBuffer, ByteCodec, Codebook, Codec, Error,
    Result,
};

use crate::config::{Cli, Config};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    if config.print_config {
        config.print();
    }

    match run(&config) {
        Ok(metrics) => {
            if config.print_metrics {
                metrics.print_summary(config.codec.name());
            }
            metrics.print_result();
            if metrics.verified {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<Metrics> {
    let mut metrics = Metrics::new();
    let codec = &config.codec;

    let mut input = load_input(config)?;
    if input.is_empty() {
        return Err(Error::Config("no bytes read from input".to_string()));
    }
    input.refresh_statistics();
    metrics.record_input(&input)?;

    let key = obtain_key(config, &input)?;
    if codec.uses_key() {
        let codebook = Codebook::from_key(&key)?;
        metrics.record_key(&key, &codebook);
    }

    let started = Instant::now();
    let encoded = codec.encode(&input, &key)?;
    metrics.record_encoded(&encoded, started.elapsed())?;
    encoded.save(&config.encoded_file)?;
    info!(
        "encoded {} bytes into {} bytes -> {}",
        input.len(),
        encoded.len(),
        config.encoded_file.display()
    );

    let started = Instant::now();
    let decoded = codec.decode(&encoded, &key)?;
    metrics.record_decoded(&input, &decoded, started.elapsed());
    decoded.save(&config.decoded_file)?;
    info!(
        "decoded {} bytes -> {}",
        decoded.len(),
        config.decoded_file.display()
    );

    if let Some(path) = &config.packed_file {
        match codec {
            Codec::TwoTier(two_tier) => {
                let frame = pack_with_key(two_tier, &input, &key)?;
                std::fs::write(path, &frame)?;
                info!("packed {} bytes -> {}", frame.len(), path.display());
            }
            Codec::Passthrough(_) => warn!("packed output needs a keyed codec; skipping"),
        }
    }

    metrics.complete();
    Ok(metrics)
}

fn load_input(config: &Config) -> Result<BitBuffer> {
    match &config.input_file {
        Some(path) => {
            let mut input = BitBuffer::new();
            input.load(path)?;
            info!("loaded {} bytes from {}", input.len(), path.display());
            Ok(input)
        }
        None => {
            let data = input_gen::generate_sample_data(config.seed, config.sample_bytes);
            info!(
                "generated {} sample bytes (seed {})",
                data.len(),
                config.seed
            );
            Ok(BitBuffer::from_bytes(data))
        }
    }
}

fn obtain_key(config: &Config, input: &BitBuffer) -> Result<BitBuffer> {
    let codec = &config.codec;
    if !codec.uses_key() {
        return codec.generate_key(input);
    }

    if config.load_key {
        let mut key = BitBuffer::new();
        key.load(&config.key_file)?;
        info!("loaded key {}", config.key_file.display());
        Ok(key)
    } else {
        let key = codec.generate_key(input)?;
        key.save(&config.key_file)?;
        info!(
            "generated key of {} bytes -> {}",
            key.len(),
            config.key_file.display()
        );
        Ok(key)
    }
}
