//! Chroma (pitch-class) extraction
//!
//! Folds the harmonic magnitude spectrum into 12 pitch classes by octave
//! equivalence: bin frequency f maps to class `round(12 * log2(f / 440))
//! mod 12`, with A4 = 440 Hz anchoring class 9 (A). Bins below 80 Hz are
//! excluded to keep sub-bass rumble out of the fold, bins above 5 kHz to
//! keep cymbal noise out.
//!
//! The fold emits raw summed energies; scaling to [0, 1] is the note
//! normalizer's job (see [`normalization`]).

pub mod normalization;

/// Reference frequency for pitch-class calculation (A4)
const A4_FREQ: f32 = 440.0;

/// Lowest frequency folded into chroma
const MIN_FREQ: f32 = 80.0;

/// Highest frequency folded into chroma
const MAX_FREQ: f32 = 5000.0;

/// Pitch classes per octave
pub const NUM_CLASSES: usize = 12;

/// Spectrum-to-chroma fold with a precomputed bin mapping
#[derive(Debug)]
pub struct ChromaExtractor {
    /// Pitch class per FFT bin; `None` for bins outside the folded range
    bin_class: Vec<Option<u8>>,
}

impl ChromaExtractor {
    /// Precompute the bin mapping for the given FFT layout
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        let bin_hz = sample_rate as f32 / fft_size as f32;
        let n_bins = fft_size / 2 + 1;

        let bin_class = (0..n_bins)
            .map(|bin| {
                let freq = bin as f32 * bin_hz;
                if !(MIN_FREQ..=MAX_FREQ).contains(&freq) {
                    return None;
                }
                let semitone = (NUM_CLASSES as f32 * (freq / A4_FREQ).log2()).round() as i32;
                // A is class 9 in C-based ordering; wrap negative offsets
                let class = (semitone + 9).rem_euclid(NUM_CLASSES as i32);
                Some(class as u8)
            })
            .collect();

        Self { bin_class }
    }

    /// Sum harmonic magnitudes per pitch class into `out`
    ///
    /// `out` is in pitch-class order C, C#, ..., B.
    pub fn fold(&self, harmonic: &[f32], out: &mut [f32; NUM_CLASSES]) {
        out.fill(0.0);
        for (&mag, class) in harmonic.iter().zip(&self.bin_class) {
            if let Some(class) = class {
                if mag.is_finite() {
                    out[*class as usize] += mag;
                }
            }
        }
    }
}
