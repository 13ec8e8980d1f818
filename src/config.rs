//! Engine configuration parameters

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::features::autogain::AutoGainConfig;
use crate::features::onset::tempo::TempoConfig;
use crate::features::onset::OnsetConfig;

/// Engine configuration, immutable after construction
///
/// All values have documented defaults tuned for electronic music at
/// 48 kHz. Construction-time validation (`validate`) is the only place
/// configuration problems are fatal; see the error taxonomy in
/// [`crate::error::EngineError`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sample rate in Hz (default: 48000)
    pub sample_rate: u32,

    /// Samples per capture chunk; one feature frame is emitted per chunk
    /// (default: 1024, ~21.3 ms at 48 kHz)
    pub chunk_size: usize,

    /// Analysis window length in chunks (default: 6)
    pub window_chunks: usize,

    /// FFT size for spectral analysis (default: 2048)
    pub fft_size: usize,

    /// Low band upper cutoff in Hz (default: 150.0)
    pub low_cutoff_hz: f32,

    /// High band lower cutoff in Hz; the mid band spans the two cutoffs
    /// (default: 4000.0)
    pub high_cutoff_hz: f32,

    /// Amplitude below which a frame is treated as silent
    /// (default: 0.01, i.e. -40 dBFS)
    pub silence_threshold: f32,

    /// Destination for outbound feature datagrams (default: 127.0.0.1:5005)
    pub feature_addr: SocketAddr,

    /// Bind address for inbound parameter datagrams (default: 127.0.0.1:5006)
    pub command_addr: SocketAddr,

    /// AutoGain profile for the note (chroma) trackers
    pub note_autogain: AutoGainConfig,

    /// AutoGain profile for the low band
    ///
    /// Bass is spikier than the rest of the spectrum, so the default uses
    /// a higher percentile (0.95) and a shorter decay (10 s).
    pub low_autogain: AutoGainConfig,

    /// AutoGain profile for the mid band
    pub mid_autogain: AutoGainConfig,

    /// AutoGain profile for the high band
    pub high_autogain: AutoGainConfig,

    /// Onset detector settings
    pub onset: OnsetConfig,

    /// Tempo tracker settings
    pub tempo: TempoConfig,

    /// Number of recent raw flux values used for scale-invariant flux
    /// (default: 20)
    pub flux_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            chunk_size: 1024,
            window_chunks: 6,
            fft_size: 2048,
            low_cutoff_hz: 150.0,
            high_cutoff_hz: 4000.0,
            silence_threshold: 0.01,
            feature_addr: "127.0.0.1:5005".parse().expect("static addr"),
            command_addr: "127.0.0.1:5006".parse().expect("static addr"),
            note_autogain: AutoGainConfig::default(),
            low_autogain: AutoGainConfig {
                percentile: 0.95,
                decay_secs: 10.0,
                ..AutoGainConfig::default()
            },
            mid_autogain: AutoGainConfig::default(),
            high_autogain: AutoGainConfig::default(),
            onset: OnsetConfig::default(),
            tempo: TempoConfig::default(),
            flux_history: 20,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidConfig` describing the first problem
    /// found. A configuration that fails validation must not start the
    /// engine.
    pub fn validate(&self) -> Result<(), crate::error::EngineError> {
        use crate::error::EngineError;

        if self.sample_rate == 0 {
            return Err(EngineError::InvalidConfig("Sample rate must be > 0".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(EngineError::InvalidConfig("Chunk size must be > 0".to_string()));
        }
        if self.window_chunks == 0 {
            return Err(EngineError::InvalidConfig("Window chunk count must be > 0".to_string()));
        }
        if self.fft_size < self.chunk_size {
            return Err(EngineError::InvalidConfig(format!(
                "FFT size ({}) must be >= chunk size ({})",
                self.fft_size, self.chunk_size
            )));
        }
        if self.fft_size > self.chunk_size * self.window_chunks {
            return Err(EngineError::InvalidConfig(format!(
                "FFT size ({}) exceeds the analysis window ({} samples)",
                self.fft_size,
                self.chunk_size * self.window_chunks
            )));
        }

        let nyquist = self.sample_rate as f32 / 2.0;
        if self.low_cutoff_hz <= 0.0 || self.high_cutoff_hz <= self.low_cutoff_hz {
            return Err(EngineError::InvalidConfig(format!(
                "Band cutoffs must satisfy 0 < low ({}) < high ({})",
                self.low_cutoff_hz, self.high_cutoff_hz
            )));
        }
        if self.high_cutoff_hz >= nyquist {
            return Err(EngineError::InvalidConfig(format!(
                "High cutoff ({} Hz) must be below Nyquist ({} Hz)",
                self.high_cutoff_hz, nyquist
            )));
        }

        if self.silence_threshold <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "Silence threshold must be > 0".to_string(),
            ));
        }
        if self.flux_history == 0 {
            return Err(EngineError::InvalidConfig(
                "Flux history length must be > 0".to_string(),
            ));
        }

        for (name, ag) in [
            ("note", &self.note_autogain),
            ("low", &self.low_autogain),
            ("mid", &self.mid_autogain),
            ("high", &self.high_autogain),
        ] {
            ag.validate()
                .map_err(|msg| EngineError::InvalidConfig(format!("{} AutoGain: {}", name, msg)))?;
        }

        self.onset
            .validate()
            .map_err(|msg| EngineError::InvalidConfig(format!("Onset: {}", msg)))?;
        self.tempo
            .validate()
            .map_err(|msg| EngineError::InvalidConfig(format!("Tempo: {}", msg)))?;

        Ok(())
    }

    /// Analysis window length in samples
    pub fn window_len(&self) -> usize {
        self.chunk_size * self.window_chunks
    }

    /// Seconds of audio covered by one chunk, which is also the frame period
    pub fn frame_period(&self) -> f32 {
        self.chunk_size as f32 / self.sample_rate as f32
    }

    /// Analysis frames per second (sample_rate / chunk_size)
    pub fn frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.chunk_size as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_len(), 6144);
        assert!((config.frame_period() - 1024.0 / 48000.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        let config = EngineConfig {
            sample_rate: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_cutoff_above_nyquist() {
        let config = EngineConfig {
            sample_rate: 8000,
            high_cutoff_hz: 4000.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_cutoffs() {
        let config = EngineConfig {
            low_cutoff_hz: 5000.0,
            high_cutoff_hz: 150.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_fft_larger_than_window() {
        let config = EngineConfig {
            fft_size: 8192,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
