//! Spectral feature extraction
//!
//! One Hann-windowed FFT per frame over the newest `fft_size` samples of
//! the rolling window, split into harmonic and percussive parts, then
//! reduced to the spectral descriptors: centroid ("brightness") from the
//! full spectrum and transient flux from the percussive part. The harmonic
//! part feeds the chroma fold downstream.

pub mod hpss;

use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::EngineConfig;
use hpss::HpssSplitter;

/// Numerical stability epsilon
const EPSILON: f32 = 1e-9;

/// Raw flux below this fraction of the total spectral magnitude is
/// residual jitter, not a transient
///
/// A stationary spectrum still shows a little frame-to-frame percussive
/// wobble from phase interference (well under 1% of the full magnitude),
/// while a genuine broadband onset moves several percent of it at once.
const FLUX_GATE: f32 = 0.02;

/// Spectral descriptors for one frame
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralFeatures {
    /// Spectral centroid normalized by Nyquist, in [0, 1]
    pub brightness: f32,

    /// Scale-invariant percussive flux, clipped to [0, 1] for emission
    pub flux: f32,

    /// The same flux before clipping; feeds the onset detector
    pub flux_unclipped: f32,
}

/// Per-frame spectral analysis state
///
/// All buffers are sized at construction and reused every frame.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    fft_buf: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    magnitude: Vec<f32>,
    hpss: HpssSplitter,
    prev_percussive: Vec<f32>,
    has_prev: bool,
    flux_history: VecDeque<f32>,
    flux_capacity: usize,
    bin_hz: f32,
    nyquist: f32,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("fft_size", &self.hann.len())
            .field("has_prev", &self.has_prev)
            .finish()
    }
}

impl SpectralAnalyzer {
    /// Build the analyzer for the configured FFT size and sample rate
    pub fn new(config: &EngineConfig) -> Self {
        let fft_size = config.fft_size;
        let n_bins = fft_size / 2 + 1;

        let hann: Vec<f32> = (0..fft_size)
            .map(|i| {
                let x = 2.0 * std::f32::consts::PI * i as f32 / (fft_size - 1) as f32;
                0.5 * (1.0 - x.cos())
            })
            .collect();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            fft,
            hann,
            fft_buf: vec![Complex::new(0.0, 0.0); fft_size],
            fft_scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitude: vec![0.0; n_bins],
            hpss: HpssSplitter::new(n_bins),
            prev_percussive: vec![0.0; n_bins],
            has_prev: false,
            flux_history: VecDeque::with_capacity(config.flux_history),
            flux_capacity: config.flux_history,
            bin_hz: config.sample_rate as f32 / fft_size as f32,
            nyquist: config.sample_rate as f32 / 2.0,
        }
    }

    /// Analyze the rolling window and return the frame's descriptors
    ///
    /// `window` must be at least `fft_size` samples long; only the newest
    /// `fft_size` samples are transformed. `flux_sens` is the user's flux
    /// sensitivity from the parameter snapshot.
    pub fn analyze(&mut self, window: &[f32], flux_sens: f32) -> SpectralFeatures {
        let fft_size = self.hann.len();
        let tail = &window[window.len() - fft_size..];

        for ((slot, &sample), &w) in self.fft_buf.iter_mut().zip(tail).zip(&self.hann) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.fft_buf, &mut self.fft_scratch);

        for (bin, slot) in self.magnitude.iter_mut().enumerate() {
            let c = self.fft_buf[bin];
            let mag = (c.re * c.re + c.im * c.im).sqrt();
            *slot = if mag.is_finite() { mag } else { 0.0 };
        }

        self.hpss.split(&self.magnitude);

        let brightness = self.centroid();
        let (flux, flux_unclipped) = self.percussive_flux(flux_sens);

        SpectralFeatures {
            brightness,
            flux,
            flux_unclipped,
        }
    }

    /// Harmonic magnitudes of the most recent frame (chroma input)
    pub fn harmonic(&self) -> &[f32] {
        self.hpss.harmonic()
    }

    /// Magnitude-weighted mean frequency over the full spectrum,
    /// normalized to [0, 1] by Nyquist
    fn centroid(&self) -> f32 {
        let mut weighted = 0.0f32;
        let mut total = 0.0f32;
        for (bin, &mag) in self.magnitude.iter().enumerate() {
            weighted += bin as f32 * self.bin_hz * mag;
            total += mag;
        }
        if total < EPSILON {
            return 0.0;
        }
        (weighted / total / self.nyquist).clamp(0.0, 1.0)
    }

    /// Half-wave-rectified percussive difference, scaled by the mean of
    /// recent raw flux so the value is invariant to absolute level
    fn percussive_flux(&mut self, flux_sens: f32) -> (f32, f32) {
        let percussive = self.hpss.percussive();

        let result = if self.has_prev {
            let raw: f32 = percussive
                .iter()
                .zip(&self.prev_percussive)
                .map(|(&cur, &prev)| (cur - prev).max(0.0))
                .sum();
            let raw = if raw.is_finite() { raw } else { 0.0 };

            // The ratio-to-recent-mean below is scale invariant, so the
            // phase jitter of a perfectly steady spectrum would otherwise
            // read as flux 1.0 forever.
            let total: f32 = self.magnitude.iter().sum();
            let raw = if raw < FLUX_GATE * total { 0.0 } else { raw };

            if self.flux_history.len() == self.flux_capacity {
                self.flux_history.pop_front();
            }
            self.flux_history.push_back(raw);

            let mean: f32 =
                self.flux_history.iter().sum::<f32>() / self.flux_history.len() as f32;
            let scaled = (raw / (mean + EPSILON)) * flux_sens;
            let scaled = if scaled.is_finite() { scaled } else { 0.0 };
            (scaled.clamp(0.0, 1.0), scaled)
        } else {
            (0.0, 0.0)
        };

        self.prev_percussive.copy_from_slice(percussive);
        self.has_prev = true;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn analyzer() -> (SpectralAnalyzer, EngineConfig) {
        let config = EngineConfig::default();
        (SpectralAnalyzer::new(&config), config)
    }

    fn sine_window(freq: f32, config: &EngineConfig, offset: usize) -> Vec<f32> {
        (0..config.window_len())
            .map(|i| {
                let t = (i + offset) as f32 / config.sample_rate as f32;
                (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5
            })
            .collect()
    }

    #[test]
    fn test_silence_has_zero_features() {
        let (mut spectral, config) = analyzer();
        let window = vec![0.0f32; config.window_len()];
        for _ in 0..10 {
            let out = spectral.analyze(&window, 1.0);
            assert_eq!(out.brightness, 0.0);
            assert_eq!(out.flux, 0.0);
        }
    }

    #[test]
    fn test_sine_centroid_near_its_frequency() {
        let (mut spectral, config) = analyzer();
        let window = sine_window(440.0, &config, 0);
        let out = spectral.analyze(&window, 1.0);

        // 440 Hz / 24 kHz Nyquist ~= 0.018; spectral leakage pushes the
        // centroid slightly up.
        assert!(out.brightness > 0.005 && out.brightness < 0.1,
            "brightness {}", out.brightness);
    }

    #[test]
    fn test_steady_sine_flux_settles_to_zero() {
        let (mut spectral, config) = analyzer();
        let mut last = SpectralFeatures::default();
        for frame in 0..40 {
            let window = sine_window(440.0, &config, frame * config.chunk_size);
            last = spectral.analyze(&window, 1.0);
        }
        // A sustained tone has no percussive change left.
        assert!(last.flux < 0.2, "flux {}", last.flux);
    }

    #[test]
    fn test_harmonic_spectrum_peaks_at_tone() {
        let (mut spectral, config) = analyzer();
        for frame in 0..10 {
            let window = sine_window(440.0, &config, frame * config.chunk_size);
            spectral.analyze(&window, 1.0);
        }
        let harmonic = spectral.harmonic();
        let peak_bin = (440.0 * config.fft_size as f32 / config.sample_rate as f32).round() as usize;
        let peak_region: f32 = harmonic[peak_bin - 1..=peak_bin + 1].iter().sum();
        let total: f32 = harmonic.iter().sum();
        assert!(peak_region > total * 0.5, "tone energy should dominate the harmonic part");
    }

    #[test]
    fn test_flux_clipped_to_unit_range() {
        let (mut spectral, config) = analyzer();
        // Alternate silence and bursts to generate large flux ratios.
        let silence = vec![0.0f32; config.window_len()];
        let noise: Vec<f32> = (0..config.window_len())
            .map(|i| if i % 7 == 0 { 0.9 } else { -0.4 })
            .collect();
        for frame in 0..20 {
            let window = if frame % 2 == 0 { &silence } else { &noise };
            let out = spectral.analyze(window, 10.0);
            assert!((0.0..=1.0).contains(&out.flux));
            assert!(out.flux_unclipped >= 0.0);
        }
    }
}
