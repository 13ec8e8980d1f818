//! Run the engine against raw PCM on stdin
//!
//! Expects interleaved little-endian f32 samples at the configured sample
//! rate, e.g. from a capture tool:
//!
//! ```text
//! parec --format=float32le --rate=48000 --channels=2 | notedancer-engine
//! ```
//!
//! Channel count comes from the first CLI argument (default 2). Feature
//! frames go to 127.0.0.1:5005, parameter updates are accepted on
//! 127.0.0.1:5006.

use notedancer_engine::io::capture::PcmReader;
use notedancer_engine::{EngineConfig, EngineRunner};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let channels: u16 = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(2);

    let config = EngineConfig::default();
    log::info!(
        "reading {}ch f32le PCM from stdin, features to {}, commands on {}",
        channels,
        config.feature_addr,
        config.command_addr
    );

    let capture = PcmReader::new(std::io::stdin(), channels)?;
    let runner = EngineRunner::start(config, capture)?;
    runner.wait();

    Ok(())
}
