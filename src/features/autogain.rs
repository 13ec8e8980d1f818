//! Adaptive loudness tracking (AutoGain)
//!
//! Maintains a slowly-drifting "ceiling" that follows the loudness of the
//! incoming material, so features stay visually consistent across quiet
//! intros, full drops and everything between. The ceiling is driven by a
//! percentile over recent frame maxima rather than the raw maximum, so a
//! single spike cannot hijack the scale, and it moves asymmetrically: a
//! fast attack toward louder material and a slow decay back down through
//! breakdowns.

use std::collections::VecDeque;

/// AutoGain tuning parameters
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AutoGainConfig {
    /// Seconds of frame maxima kept for the percentile query (default: 15.0)
    pub history_secs: f32,

    /// Percentile of recent maxima used as the ceiling target, in (0, 1)
    /// (default: 0.90)
    pub percentile: f32,

    /// Attack time constant in seconds; how quickly the ceiling rises to
    /// meet louder material (default: 0.1)
    pub attack_secs: f32,

    /// Decay time constant in seconds; how quickly the ceiling falls when
    /// the material gets quieter. 10-20 s survives a standard 16-bar
    /// breakdown without the ceiling collapsing (default: 15.0)
    pub decay_secs: f32,

    /// Hard lower bound on the ceiling (default: 1e-4)
    pub floor: f32,
}

impl Default for AutoGainConfig {
    fn default() -> Self {
        Self {
            history_secs: 15.0,
            percentile: 0.90,
            attack_secs: 0.1,
            decay_secs: 15.0,
            floor: 1e-4,
        }
    }
}

impl AutoGainConfig {
    /// Check parameter ranges, returning a description of the first problem
    pub fn validate(&self) -> Result<(), String> {
        if self.history_secs <= 0.0 {
            return Err("history_secs must be > 0".to_string());
        }
        if !(self.percentile > 0.0 && self.percentile < 1.0) {
            return Err(format!("percentile must be in (0, 1), got {}", self.percentile));
        }
        if self.attack_secs <= 0.0 || self.decay_secs <= 0.0 {
            return Err("time constants must be > 0".to_string());
        }
        if self.floor <= 0.0 {
            return Err("floor must be > 0".to_string());
        }
        Ok(())
    }
}

/// Percentile-based soft-ceiling tracker
///
/// One instance per independently-normalized stream (each band, each of the
/// twelve chroma classes in statistical mode). The ceiling `C` is bounded
/// below by the configured floor and decays monotonically in the absence of
/// above-target input; normalized output is `clip(x / C, 0, 1)`.
#[derive(Debug, Clone)]
pub struct AutoGain {
    ceiling: f32,
    floor: f32,
    attack_coeff: f32,
    decay_coeff: f32,
    percentile: f32,
    history: VecDeque<f32>,
    capacity: usize,
    scratch: Vec<f32>,
}

impl AutoGain {
    /// Create a tracker for a stream updated `frame_rate` times per second
    pub fn new(config: &AutoGainConfig, frame_rate: f32) -> Self {
        let capacity = ((config.history_secs * frame_rate).round() as usize).max(1);
        let dt = 1.0 / frame_rate;
        // One-pole step: c = 1 - exp(-dt / tau)
        let attack_coeff = (1.0 - (-dt / config.attack_secs).exp()).min(1.0);
        let decay_coeff = (1.0 - (-dt / config.decay_secs).exp()).min(1.0);

        let mut history = VecDeque::with_capacity(capacity);
        history.push_back(config.floor);

        Self {
            ceiling: config.floor,
            floor: config.floor,
            attack_coeff,
            decay_coeff,
            percentile: config.percentile,
            history,
            capacity,
            scratch: Vec::with_capacity(capacity),
        }
    }

    /// Feed one frame maximum and return the updated ceiling
    ///
    /// Non-finite input is treated as silence so a single NaN upstream
    /// cannot poison the tracker.
    pub fn update(&mut self, x: f32) -> f32 {
        let x = if x.is_finite() { x.max(0.0) } else { 0.0 };

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(x);

        let target = self.percentile_target().max(self.floor);

        if target > self.ceiling {
            self.ceiling += (target - self.ceiling) * self.attack_coeff;
        } else {
            self.ceiling += (target - self.ceiling) * self.decay_coeff;
            self.ceiling = self.ceiling.max(self.floor);
        }

        self.ceiling
    }

    /// Current ceiling without updating the history
    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Normalize a value against the current ceiling, clipped to [0, 1]
    pub fn normalize(&self, x: f32) -> f32 {
        if !x.is_finite() {
            return 0.0;
        }
        (x / self.ceiling).clamp(0.0, 1.0)
    }

    fn percentile_target(&mut self) -> f32 {
        self.scratch.clear();
        self.scratch.extend(self.history.iter().copied());
        self.scratch
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let idx = ((self.scratch.len() as f32) * self.percentile) as usize;
        self.scratch[idx.min(self.scratch.len() - 1)]
    }
}
