//! Transient onset detection
//!
//! Consumes the unclipped percussive flux stream and declares an onset
//! when the current value clears an adaptive threshold (mean + k * stddev
//! over roughly the last second of flux) and the refractory interval since
//! the previous onset has elapsed. Onsets fire from percussive energy
//! only; chord changes without transients do not beat.

pub mod tempo;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Onset detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnsetConfig {
    /// Standard-deviation multiplier for the adaptive threshold
    /// (default: 1.5)
    pub threshold_k: f32,

    /// Minimum time between declared onsets in seconds (default: 0.06)
    pub refractory_secs: f32,

    /// Seconds of flux history behind the adaptive threshold
    /// (default: 1.0)
    pub history_secs: f32,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            threshold_k: 1.5,
            refractory_secs: 0.06,
            history_secs: 1.0,
        }
    }
}

impl OnsetConfig {
    /// Check parameter ranges, returning a description of the first problem
    pub fn validate(&self) -> Result<(), String> {
        if self.threshold_k <= 0.0 {
            return Err("threshold_k must be > 0".to_string());
        }
        if self.refractory_secs <= 0.0 {
            return Err("refractory_secs must be > 0".to_string());
        }
        if self.history_secs <= 0.0 {
            return Err("history_secs must be > 0".to_string());
        }
        Ok(())
    }
}

/// Adaptive-threshold onset detector
#[derive(Debug)]
pub struct OnsetDetector {
    history: VecDeque<f32>,
    capacity: usize,
    threshold_k: f32,
    refractory_frames: u64,
    frames_since_onset: u64,
}

impl OnsetDetector {
    /// Build the detector for a stream updated `frame_rate` times per second
    pub fn new(config: &OnsetConfig, frame_rate: f32) -> Self {
        let capacity = ((config.history_secs * frame_rate).round() as usize).max(2);
        let refractory_frames = (config.refractory_secs * frame_rate).ceil() as u64;

        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            threshold_k: config.threshold_k,
            refractory_frames: refractory_frames.max(1),
            frames_since_onset: u64::MAX,
        }
    }

    /// Feed one frame of unclipped flux; returns true when an onset fires
    ///
    /// The threshold is computed over the history *before* the current
    /// value is added, so a lone spike is judged against the quiet past.
    pub fn update(&mut self, flux: f32) -> bool {
        let flux = if flux.is_finite() { flux.max(0.0) } else { 0.0 };
        self.frames_since_onset = self.frames_since_onset.saturating_add(1);

        let fired = !self.history.is_empty()
            && self.frames_since_onset >= self.refractory_frames
            && flux > 0.0
            && flux > self.adaptive_threshold();

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(flux);

        if fired {
            self.frames_since_onset = 0;
            log::trace!("onset fired, flux {:.3}", flux);
        }
        fired
    }

    fn adaptive_threshold(&self) -> f32 {
        let n = self.history.len() as f32;
        let mean: f32 = self.history.iter().sum::<f32>() / n;
        let variance: f32 = self
            .history
            .iter()
            .map(|&x| (x - mean) * (x - mean))
            .sum::<f32>()
            / n;
        mean + self.threshold_k * variance.sqrt()
    }
}
