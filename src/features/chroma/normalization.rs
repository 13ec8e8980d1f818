//! Note normalization modes
//!
//! The raw chroma fold produces summed harmonic magnitudes with an
//! arbitrary scale. Three selectable strategies turn them into the
//! [0, 1] note energies on the wire, each with a different feel:
//!
//! - **fixed**: a dB gauge against full scale. Ignores context; if the DJ
//!   cuts the fader the notes die. Stable across songs.
//! - **competitive**: per-frame spotlight relative to the loudest class.
//!   The strongest note is always 1.0.
//! - **statistical**: per-class AutoGain ceilings with the competitive
//!   contrast curve on top. Adapts to the song and recovers gracefully
//!   from breakdowns.
//!
//! All modes share a final noise-floor gate at -30 dB.

use crate::config::EngineConfig;
use crate::features::autogain::AutoGain;
use crate::features::chroma::NUM_CLASSES;
use crate::params::{NormMode, Parameters};

/// Numerical stability epsilon
const EPSILON: f32 = 1e-6;

/// Bottom of the fixed mode's dB gauge
const FIXED_DB_MIN: f32 = -40.0;

/// Post-normalization gate: anything below -30 dB collapses to zero
const NOISE_FLOOR: f32 = 0.031_622_777; // 10^(-30/20)

/// Stateful note normalizer covering all three modes
///
/// The statistical mode's twelve AutoGain trackers live here so mode
/// switches at runtime keep their adapted ceilings.
#[derive(Debug)]
pub struct NoteNormalizer {
    trackers: Vec<AutoGain>,
    silence_threshold: f32,
    /// Full-scale FFT magnitude for the fixed gauge: a unit sine under a
    /// Hann window peaks near fft_size / 4.
    fixed_ref: f32,
}

impl NoteNormalizer {
    /// Build the normalizer from the engine configuration
    pub fn new(config: &EngineConfig) -> Self {
        let frame_rate = config.frame_rate();
        Self {
            trackers: (0..NUM_CLASSES)
                .map(|_| AutoGain::new(&config.note_autogain, frame_rate))
                .collect(),
            silence_threshold: config.silence_threshold,
            fixed_ref: config.fft_size as f32 / 4.0,
        }
    }

    /// Transform raw chroma energies into emitted note values
    ///
    /// `silent` is the window-level silence gate: a silent frame emits the
    /// zero vector in every mode and leaves the statistical trackers
    /// untouched.
    pub fn apply(
        &mut self,
        chroma: &[f32; NUM_CLASSES],
        params: &Parameters,
        silent: bool,
    ) -> [f32; NUM_CLASSES] {
        if silent {
            return [0.0; NUM_CLASSES];
        }

        // Per-class clean: bins at the silence floor carry no note.
        let mut clean = [0.0f32; NUM_CLASSES];
        for (slot, &c) in clean.iter_mut().zip(chroma) {
            *slot = if c.is_finite() && c >= self.silence_threshold {
                c
            } else {
                0.0
            };
        }

        let mut notes = match params.norm_mode {
            NormMode::Fixed => self.fixed_gauge(&clean),
            NormMode::Competitive => competitive_spotlight(&clean, params.note_sensitivity),
            NormMode::Statistical => self.statistical(&clean, params.note_sensitivity),
        };

        for n in &mut notes {
            if !n.is_finite() || *n < NOISE_FLOOR {
                *n = 0.0;
            }
        }
        notes
    }

    /// Fixed-scale decibel gauge: [-40 dB, 0 dB] maps linearly onto [0, 1]
    fn fixed_gauge(&self, chroma: &[f32; NUM_CLASSES]) -> [f32; NUM_CLASSES] {
        let mut notes = [0.0f32; NUM_CLASSES];
        for (slot, &c) in notes.iter_mut().zip(chroma) {
            let db = 20.0 * (c / self.fixed_ref).max(EPSILON).log10();
            *slot = ((db - FIXED_DB_MIN) / -FIXED_DB_MIN).clamp(0.0, 1.0);
        }
        notes
    }

    /// Per-class adaptive ceilings, then the shared contrast curve
    fn statistical(
        &mut self,
        chroma: &[f32; NUM_CLASSES],
        sensitivity: f32,
    ) -> [f32; NUM_CLASSES] {
        let gamma = contrast_gamma(sensitivity);
        let mut notes = [0.0f32; NUM_CLASSES];
        for ((slot, &c), tracker) in notes.iter_mut().zip(chroma).zip(&mut self.trackers) {
            let ceiling = tracker.update(c);
            *slot = (c / ceiling).clamp(0.0, 1.0).powf(gamma);
        }
        notes
    }
}

/// Per-frame spotlight: everything scales against the loudest class
///
/// Guarantees the winner is exactly 1.0 whenever any class is above the
/// silence floor.
fn competitive_spotlight(
    chroma: &[f32; NUM_CLASSES],
    sensitivity: f32,
) -> [f32; NUM_CLASSES] {
    let max = chroma.iter().cloned().fold(0.0f32, f32::max);
    if max < EPSILON {
        return [0.0; NUM_CLASSES];
    }

    let gamma = contrast_gamma(sensitivity);
    let mut notes = [0.0f32; NUM_CLASSES];
    for (slot, &c) in notes.iter_mut().zip(chroma) {
        *slot = (c / max).clamp(0.0, 1.0).powf(gamma);
    }
    notes
}

/// Contrast exponent from the note sensitivity parameter
///
/// gamma = 1 / (1 - s): s = 0.5 squares the ratios, s -> 0.98 approaches a
/// winner-takes-all spotlight.
fn contrast_gamma(sensitivity: f32) -> f32 {
    let s = sensitivity.clamp(0.5, 0.98);
    1.0 / (1.0 - s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::params::Parameters;

    fn normalizer() -> NoteNormalizer {
        NoteNormalizer::new(&EngineConfig::default())
    }

    fn params(mode: NormMode) -> Parameters {
        Parameters {
            norm_mode: mode,
            ..Parameters::default()
        }
    }

    #[test]
    fn test_silent_frame_is_zero_vector_in_all_modes() {
        let mut norm = normalizer();
        let chroma = [5.0f32; NUM_CLASSES];
        for mode in [NormMode::Fixed, NormMode::Competitive, NormMode::Statistical] {
            let notes = norm.apply(&chroma, &params(mode), true);
            assert_eq!(notes, [0.0; NUM_CLASSES]);
        }
    }

    #[test]
    fn test_competitive_winner_is_one() {
        let mut norm = normalizer();
        let mut chroma = [0.0f32; NUM_CLASSES];
        chroma[9] = 40.0;
        chroma[4] = 10.0;

        let notes = norm.apply(&chroma, &params(NormMode::Competitive), false);
        assert_eq!(notes[9], 1.0);
        assert!(notes[4] < notes[9]);
    }

    #[test]
    fn test_competitive_sensitivity_sharpens_contrast() {
        let mut norm = normalizer();
        let mut chroma = [0.0f32; NUM_CLASSES];
        chroma[0] = 100.0;
        chroma[1] = 60.0;

        let mut soft = params(NormMode::Competitive);
        soft.note_sensitivity = 0.5;
        let soft_notes = norm.apply(&chroma, &soft, false);

        let mut sharp = params(NormMode::Competitive);
        sharp.note_sensitivity = 0.9;
        let sharp_notes = norm.apply(&chroma, &sharp, false);

        // Higher sensitivity pushes the runner-up further down.
        assert!(sharp_notes[1] < soft_notes[1]);
        assert_eq!(sharp_notes[0], 1.0);
    }

    #[test]
    fn test_competitive_all_silent_bins_zero() {
        let mut norm = normalizer();
        let chroma = [0.001f32; NUM_CLASSES]; // below the silence floor
        let notes = norm.apply(&chroma, &params(NormMode::Competitive), false);
        assert_eq!(notes, [0.0; NUM_CLASSES]);
    }

    #[test]
    fn test_fixed_gauge_endpoints() {
        let norm = normalizer();
        let mut chroma = [0.0f32; NUM_CLASSES];
        // Full scale -> 0 dB -> 1.0
        chroma[0] = norm.fixed_ref;
        // -40 dB of full scale -> 0.0
        chroma[1] = norm.fixed_ref * 0.01;
        // -20 dB -> 0.5
        chroma[2] = norm.fixed_ref * 0.1;

        let notes = norm.fixed_gauge(&chroma);
        assert!((notes[0] - 1.0).abs() < 1e-3);
        assert!(notes[1] < 1e-3);
        assert!((notes[2] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_statistical_adapts_to_level() {
        let mut norm = normalizer();
        let mut chroma = [0.0f32; NUM_CLASSES];
        chroma[5] = 2.0;

        // After sustained input the per-class ceiling converges to the
        // input level and the winner saturates.
        let p = params(NormMode::Statistical);
        let mut last = [0.0f32; NUM_CLASSES];
        for _ in 0..2000 {
            last = norm.apply(&chroma, &p, false);
        }
        assert!(last[5] > 0.9, "notes[5] = {}", last[5]);
        assert_eq!(last[0], 0.0);
    }

    #[test]
    fn test_noise_floor_gate() {
        let mut norm = normalizer();
        let mut chroma = [0.0f32; NUM_CLASSES];
        chroma[0] = 100.0;
        chroma[1] = 0.02; // above the per-bin clean? no: below silence_threshold * fold scale

        let notes = norm.apply(&chroma, &params(NormMode::Competitive), false);
        // Ratio (0.02/100)^gamma is far below the -30 dB floor even before
        // the per-class clean zeroes it.
        assert_eq!(notes[1], 0.0);
    }

    #[test]
    fn test_all_outputs_in_unit_range() {
        let mut norm = normalizer();
        let chroma = [123.0f32, 0.5, 7.0, 99.0, 0.0, 3.0, 8.0, 1.0, 2.0, 400.0, 0.2, 60.0];
        for mode in [NormMode::Fixed, NormMode::Competitive, NormMode::Statistical] {
            let notes = norm.apply(&chroma, &params(mode), false);
            for v in notes {
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }
}
