//! Three-band energy chain
//!
//! Splits the latest chunk into low / mid / high bands, tracks each band's
//! RMS against its own AutoGain ceiling and shapes the result with user
//! gain and asymmetric attack/decay smoothing. The chain works on the
//! newest chunk only (not the full analysis window) so band energies react
//! with minimal latency; filter memory carries between chunks.

pub mod butterworth;

use crate::config::EngineConfig;
use crate::features::autogain::AutoGain;
use crate::params::Parameters;

use butterworth::ButterworthFilter;

/// Normalized band energies for one frame, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandEnergies {
    /// Low band (below the low cutoff)
    pub low: f32,
    /// Mid band (between the cutoffs)
    pub mid: f32,
    /// High band (above the high cutoff)
    pub high: f32,
}

/// Per-band filter, envelope and normalization state
#[derive(Debug)]
struct BandChain {
    filter: ButterworthFilter,
    autogain: AutoGain,
    envelope: f32,
}

impl BandChain {
    /// Run one chunk through the band: filter, RMS, normalize, shape.
    ///
    /// `gain`, `attack` and `decay` come from the per-frame parameter
    /// snapshot. A pre-gain RMS below `silence_threshold` emits 0.0 and
    /// leaves the AutoGain history untouched so silence cannot drag the
    /// ceiling down.
    fn process(
        &mut self,
        chunk: &[f32],
        scratch: &mut [f32],
        silence_threshold: f32,
        gain: f32,
        attack: f32,
        decay: f32,
    ) -> f32 {
        self.filter.process_block(chunk, scratch);

        let sum_sq: f32 = scratch.iter().map(|&x| x * x).sum();
        let rms = (sum_sq / scratch.len() as f32).sqrt();

        if !rms.is_finite() || rms < silence_threshold {
            // Silence gate: hard zero, envelope cleared, no AutoGain update
            self.envelope = 0.0;
            return 0.0;
        }

        let ceiling = self.autogain.update(rms);
        // Normalize and clip before the user gain is applied: during a
        // transient the ratio legitimately exceeds 1 (the percentile
        // ceiling lags spikes), and a fractional gain must scale the
        // clipped value, not the overshoot.
        let normalized = (rms / ceiling).clamp(0.0, 1.0);
        let target = (normalized * gain).clamp(0.0, 1.0);

        if target == 0.0 {
            // A muted band clears the envelope immediately
            self.envelope = 0.0;
            return 0.0;
        }

        let alpha = if target >= self.envelope { attack } else { decay };
        self.envelope += (target - self.envelope) * alpha.clamp(0.0, 1.0);
        self.envelope = self.envelope.clamp(0.0, 1.0);
        self.envelope
    }
}

/// The three-band analyzer driven once per chunk
#[derive(Debug)]
pub struct BandAnalyzer {
    low: BandChain,
    mid: BandChain,
    high: BandChain,
    silence_threshold: f32,
    scratch: Vec<f32>,
}

impl BandAnalyzer {
    /// Build the three band chains from the engine configuration
    pub fn new(config: &EngineConfig) -> Self {
        let sample_rate = config.sample_rate as f32;
        let frame_rate = config.frame_rate();

        Self {
            low: BandChain {
                filter: ButterworthFilter::lowpass4(sample_rate, config.low_cutoff_hz),
                autogain: AutoGain::new(&config.low_autogain, frame_rate),
                envelope: 0.0,
            },
            mid: BandChain {
                filter: ButterworthFilter::bandpass4(
                    sample_rate,
                    config.low_cutoff_hz,
                    config.high_cutoff_hz,
                ),
                autogain: AutoGain::new(&config.mid_autogain, frame_rate),
                envelope: 0.0,
            },
            high: BandChain {
                filter: ButterworthFilter::highpass4(sample_rate, config.high_cutoff_hz),
                autogain: AutoGain::new(&config.high_autogain, frame_rate),
                envelope: 0.0,
            },
            silence_threshold: config.silence_threshold,
            scratch: vec![0.0; config.chunk_size],
        }
    }

    /// Process the newest chunk and return the three shaped band energies
    pub fn process(&mut self, chunk: &[f32], params: &Parameters) -> BandEnergies {
        if self.scratch.len() != chunk.len() {
            self.scratch.resize(chunk.len(), 0.0);
        }

        let low = self.low.process(
            chunk,
            &mut self.scratch,
            self.silence_threshold,
            params.low_gain,
            params.low_attack,
            params.low_decay,
        );
        let mid = self.mid.process(
            chunk,
            &mut self.scratch,
            self.silence_threshold,
            params.mid_gain,
            params.mid_attack,
            params.mid_decay,
        );
        let high = self.high.process(
            chunk,
            &mut self.scratch,
            self.silence_threshold,
            params.high_gain,
            params.high_attack,
            params.high_decay,
        );

        BandEnergies { low, mid, high }
    }
}
