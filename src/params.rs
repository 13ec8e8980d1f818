//! Live-tunable analysis parameters
//!
//! The one piece of cross-thread mutable state in the engine. The control
//! listener applies inbound datagram updates field by field under a single
//! mutex; the analysis thread copies a consistent snapshot at the top of
//! each frame and reads only the snapshot for the rest of the frame, so an
//! update received before the snapshot is visible no later than the next
//! frame and parameters never change mid-frame.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Note normalization strategy (see [`crate::features::chroma::normalization`])
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormMode {
    /// Fixed dB gauge, context-free
    Fixed,
    /// Per-frame spotlight on the loudest pitch class
    Competitive,
    /// Per-class adaptive ceilings
    Statistical,
}

/// The tunable parameter set, snapshotted once per frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Low band user gain (accepted range 0-100)
    pub low_gain: f32,
    /// Mid band user gain (accepted range 0-100)
    pub mid_gain: f32,
    /// High band user gain (accepted range 0-100)
    pub high_gain: f32,
    /// Flux sensitivity multiplier (accepted range 0-10)
    pub flux_sens: f32,
    /// Note normalization mode
    pub norm_mode: NormMode,
    /// Contrast control for the competitive/statistical note curves
    /// (accepted range 0.5-0.98)
    pub note_sensitivity: f32,
    /// Low band attack smoothing factor, 1.0 = instantaneous
    pub low_attack: f32,
    /// Low band decay smoothing factor
    pub low_decay: f32,
    /// Mid band attack smoothing factor
    pub mid_attack: f32,
    /// Mid band decay smoothing factor
    pub mid_decay: f32,
    /// High band attack smoothing factor
    pub high_attack: f32,
    /// High band decay smoothing factor
    pub high_decay: f32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            low_gain: 1.0,
            mid_gain: 1.0,
            high_gain: 1.0,
            flux_sens: 1.0,
            norm_mode: NormMode::Statistical,
            note_sensitivity: 0.7,
            // Band envelope defaults: heavy lows, balanced mids, snappy highs
            low_attack: 0.85,
            low_decay: 0.05,
            mid_attack: 0.6,
            mid_decay: 0.2,
            high_attack: 0.9,
            high_decay: 0.4,
        }
    }
}

/// Shared parameter store guarded by a single mutex
///
/// The guard is held only for the duration of a field assignment or a
/// snapshot copy.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    inner: Arc<Mutex<Parameters>>,
}

impl ParamStore {
    /// Create a store holding the default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current parameters
    pub fn snapshot(&self) -> Parameters {
        *self.inner.lock().expect("parameter mutex poisoned")
    }

    /// Overwrite the whole parameter set (used by tests and local control)
    pub fn set(&self, params: Parameters) {
        *self.inner.lock().expect("parameter mutex poisoned") = params;
    }

    /// Apply a keyed JSON datagram, returning how many fields were accepted
    ///
    /// Each field is validated against its allowed range and applied
    /// individually; invalid or unknown fields are skipped without
    /// affecting the rest of the datagram. A payload that is not a JSON
    /// object is dropped whole.
    pub fn apply_datagram(&self, payload: &[u8]) -> usize {
        let value: serde_json::Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(err) => {
                log::debug!("dropping malformed parameter datagram: {}", err);
                return 0;
            }
        };
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => {
                log::debug!("dropping non-object parameter datagram");
                return 0;
            }
        };

        let mut guard = self.inner.lock().expect("parameter mutex poisoned");
        let mut applied = 0;

        for (key, raw) in obj {
            if apply_field(&mut guard, key, raw) {
                applied += 1;
            } else {
                log::debug!("ignoring parameter field {}={}", key, raw);
            }
        }

        if applied > 0 {
            log::debug!("applied {} parameter field(s)", applied);
        }
        applied
    }
}

/// Apply a single validated field; returns false for unknown keys,
/// out-of-range values, or wrong types
fn apply_field(params: &mut Parameters, key: &str, raw: &serde_json::Value) -> bool {
    if key == "norm_mode" {
        return match raw.as_str() {
            Some("fixed") => {
                params.norm_mode = NormMode::Fixed;
                true
            }
            Some("competitive") => {
                params.norm_mode = NormMode::Competitive;
                true
            }
            Some("statistical") => {
                params.norm_mode = NormMode::Statistical;
                true
            }
            _ => false,
        };
    }

    let value = match raw.as_f64() {
        Some(v) if v.is_finite() => v as f32,
        _ => return false,
    };

    let (slot, range): (&mut f32, std::ops::RangeInclusive<f32>) = match key {
        "low_gain" => (&mut params.low_gain, 0.0..=100.0),
        "mid_gain" => (&mut params.mid_gain, 0.0..=100.0),
        "high_gain" => (&mut params.high_gain, 0.0..=100.0),
        "flux_sens" => (&mut params.flux_sens, 0.0..=10.0),
        "note_sensitivity" => (&mut params.note_sensitivity, 0.5..=0.98),
        "low_attack" => (&mut params.low_attack, 0.0..=1.0),
        "low_decay" => (&mut params.low_decay, 0.0..=1.0),
        "mid_attack" => (&mut params.mid_attack, 0.0..=1.0),
        "mid_decay" => (&mut params.mid_decay, 0.0..=1.0),
        "high_attack" => (&mut params.high_attack, 0.0..=1.0),
        "high_decay" => (&mut params.high_decay, 0.0..=1.0),
        _ => return false,
    };

    if range.contains(&value) {
        *slot = value;
        true
    } else {
        false
    }
}
