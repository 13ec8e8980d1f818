//! Tempo estimation from inter-onset intervals
//!
//! Keeps a short history of intervals between declared onsets, reads the
//! dominant interval from a 5 ms-bin histogram and inverts it to BPM. The
//! raw estimate is hedged into the [90, 180] range by octave doubling or
//! halving (electronic music rarely leaves it, and visualizers want a
//! usable pulse either way), then smoothed with a single-pole filter so
//! the displayed tempo does not flicker between neighboring estimates.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Tempo tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoConfig {
    /// Lower edge of the hedged BPM range (default: 90.0)
    pub min_bpm: f32,

    /// Upper edge of the hedged BPM range (default: 180.0)
    pub max_bpm: f32,

    /// Number of inter-onset intervals kept for the histogram
    /// (default: 30)
    pub interval_history: usize,

    /// Histogram bin width in milliseconds (default: 5.0)
    pub histogram_bin_ms: f32,

    /// Single-pole smoothing time constant in seconds (default: 2.0)
    pub smooth_secs: f32,

    /// Intervals longer than this carry no tempo information and are
    /// discarded (default: 4.0)
    pub max_interval_secs: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: 90.0,
            max_bpm: 180.0,
            interval_history: 30,
            histogram_bin_ms: 5.0,
            smooth_secs: 2.0,
            max_interval_secs: 4.0,
        }
    }
}

impl TempoConfig {
    /// Check parameter ranges, returning a description of the first problem
    pub fn validate(&self) -> Result<(), String> {
        if self.min_bpm <= 0.0 {
            return Err("min_bpm must be > 0".to_string());
        }
        if self.max_bpm < self.min_bpm * 2.0 {
            // Octave hedging only terminates inside a range spanning at
            // least one doubling.
            return Err(format!(
                "max_bpm ({}) must be at least twice min_bpm ({})",
                self.max_bpm, self.min_bpm
            ));
        }
        if self.interval_history == 0 {
            return Err("interval_history must be > 0".to_string());
        }
        if self.histogram_bin_ms <= 0.0 {
            return Err("histogram_bin_ms must be > 0".to_string());
        }
        if self.smooth_secs <= 0.0 || self.max_interval_secs <= 0.0 {
            return Err("time constants must be > 0".to_string());
        }
        Ok(())
    }
}

/// Streaming tempo tracker fed one frame at a time
#[derive(Debug)]
pub struct TempoTracker {
    frame_period: f32,
    bin_secs: f32,
    min_bpm: f32,
    max_bpm: f32,
    max_interval: f32,
    smooth_coeff: f32,
    intervals: VecDeque<f32>,
    capacity: usize,
    frame_index: u64,
    last_onset_frame: Option<u64>,
    bpm_raw: f32,
    bpm_smoothed: f32,
}

impl TempoTracker {
    /// Build the tracker for a stream advanced once per frame
    pub fn new(config: &TempoConfig, frame_rate: f32) -> Self {
        let frame_period = 1.0 / frame_rate;
        Self {
            frame_period,
            bin_secs: config.histogram_bin_ms / 1000.0,
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
            max_interval: config.max_interval_secs,
            smooth_coeff: 1.0 - (-frame_period / config.smooth_secs).exp(),
            intervals: VecDeque::with_capacity(config.interval_history),
            capacity: config.interval_history,
            frame_index: 0,
            last_onset_frame: None,
            bpm_raw: 0.0,
            bpm_smoothed: 0.0,
        }
    }

    /// Advance one frame, recording an onset if one fired
    pub fn advance(&mut self, onset: bool) {
        self.frame_index += 1;

        if onset {
            if let Some(last) = self.last_onset_frame {
                let interval = (self.frame_index - last) as f32 * self.frame_period;
                if interval > 0.0 && interval <= self.max_interval {
                    if self.intervals.len() == self.capacity {
                        self.intervals.pop_front();
                    }
                    self.intervals.push_back(interval);
                    self.bpm_raw = self.histogram_mode_bpm();
                    log::trace!(
                        "onset interval {:.3} s, raw bpm {:.1}",
                        interval,
                        self.bpm_raw
                    );
                }
            }
            self.last_onset_frame = Some(self.frame_index);
        }

        if self.bpm_raw > 0.0 {
            let hedged = hedge_bpm(self.bpm_raw, self.min_bpm, self.max_bpm);
            if self.bpm_smoothed == 0.0 {
                self.bpm_smoothed = hedged;
            } else {
                self.bpm_smoothed += (hedged - self.bpm_smoothed) * self.smooth_coeff;
            }
        }
    }

    /// Smoothed, hedged tempo; 0.0 before any interval has been observed
    pub fn bpm(&self) -> f32 {
        self.bpm_smoothed
    }

    /// Unhedged histogram estimate; 0.0 before any interval
    pub fn bpm_raw(&self) -> f32 {
        self.bpm_raw
    }

    /// Dominant interval from the histogram, inverted to BPM
    ///
    /// Ties go to the shorter interval (faster tempo), which hedging then
    /// folds into range anyway.
    fn histogram_mode_bpm(&self) -> f32 {
        let mut best_bin: i64 = 0;
        let mut best_count = 0usize;

        for &interval in &self.intervals {
            let bin = (interval / self.bin_secs).round() as i64;
            if bin <= 0 {
                continue;
            }
            let count = self
                .intervals
                .iter()
                .filter(|&&other| (other / self.bin_secs).round() as i64 == bin)
                .count();
            if count > best_count || (count == best_count && (best_bin == 0 || bin < best_bin)) {
                best_count = count;
                best_bin = bin;
            }
        }

        if best_bin <= 0 {
            return 0.0;
        }
        60.0 / (best_bin as f32 * self.bin_secs)
    }
}

/// Fold a raw tempo into [min_bpm, max_bpm] by octave doubling/halving
pub fn hedge_bpm(bpm: f32, min_bpm: f32, max_bpm: f32) -> f32 {
    if bpm <= 0.0 || !bpm.is_finite() {
        return 0.0;
    }
    let mut hedged = bpm;
    while hedged < min_bpm {
        hedged *= 2.0;
    }
    while hedged > max_bpm {
        hedged /= 2.0;
    }
    hedged
}
