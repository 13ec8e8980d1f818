//! Butterworth filters as cascaded biquad sections
//!
//! 4th-order responses are built from two second-order sections with the
//! Butterworth pole Q values, using the RBJ cookbook coefficient formulas.
//! Sections carry their own state so filter memory persists across chunks.
//!
//! # Reference
//!
//! Bristow-Johnson, R. Cookbook formulae for audio equalizer biquad filter
//! coefficients. (The "Audio EQ Cookbook".)

/// Butterworth pole quality factors for a 4th-order response
///
/// Q_k = 1 / (2 cos((2k + 1) * pi / 2n)) for n = 4.
const BUTTERWORTH4_Q: [f32; 2] = [0.541_196_1, 1.306_563_0];

/// One second-order IIR section (Direct Form II transposed)
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    s1: f32,
    s2: f32,
}

impl Biquad {
    /// Lowpass section at `cutoff_hz` with quality factor `q`
    pub fn lowpass(sample_rate: f32, cutoff_hz: f32, q: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;

        Self {
            b0: ((1.0 - cos_w0) / 2.0) / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: ((1.0 - cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
            s1: 0.0,
            s2: 0.0,
        }
    }

    /// Highpass section at `cutoff_hz` with quality factor `q`
    pub fn highpass(sample_rate: f32, cutoff_hz: f32, q: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;

        Self {
            b0: ((1.0 + cos_w0) / 2.0) / a0,
            b1: (-(1.0 + cos_w0)) / a0,
            b2: ((1.0 + cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
            s1: 0.0,
            s2: 0.0,
        }
    }

    /// Process one sample through the section
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.s1;
        self.s1 = self.b1 * x - self.a1 * y + self.s2;
        self.s2 = self.b2 * x - self.a2 * y;
        y
    }

    /// Clear the section's memory
    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }
}

/// A cascade of biquad sections forming one band filter
#[derive(Debug, Clone)]
pub struct ButterworthFilter {
    sections: Vec<Biquad>,
}

impl ButterworthFilter {
    /// 4th-order Butterworth lowpass
    pub fn lowpass4(sample_rate: f32, cutoff_hz: f32) -> Self {
        Self {
            sections: BUTTERWORTH4_Q
                .iter()
                .map(|&q| Biquad::lowpass(sample_rate, cutoff_hz, q))
                .collect(),
        }
    }

    /// 4th-order Butterworth highpass
    pub fn highpass4(sample_rate: f32, cutoff_hz: f32) -> Self {
        Self {
            sections: BUTTERWORTH4_Q
                .iter()
                .map(|&q| Biquad::highpass(sample_rate, cutoff_hz, q))
                .collect(),
        }
    }

    /// Bandpass as a 4th-order highpass at `low_hz` cascaded with a
    /// 4th-order lowpass at `high_hz`
    pub fn bandpass4(sample_rate: f32, low_hz: f32, high_hz: f32) -> Self {
        let mut sections: Vec<Biquad> = BUTTERWORTH4_Q
            .iter()
            .map(|&q| Biquad::highpass(sample_rate, low_hz, q))
            .collect();
        sections.extend(
            BUTTERWORTH4_Q
                .iter()
                .map(|&q| Biquad::lowpass(sample_rate, high_hz, q)),
        );
        Self { sections }
    }

    /// Filter a block of samples into `out`, carrying state across calls
    pub fn process_block(&mut self, input: &[f32], out: &mut [f32]) {
        debug_assert_eq!(input.len(), out.len());
        for (x, y) in input.iter().zip(out.iter_mut()) {
            let mut v = *x;
            for section in &mut self.sections {
                v = section.process(v);
            }
            *y = v;
        }
    }

    /// Clear all section memory
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|&x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = ButterworthFilter::lowpass4(48000.0, 150.0);
        let input = vec![1.0f32; 48000];
        let mut out = vec![0.0f32; 48000];
        filter.process_block(&input, &mut out);
        // After settling, a constant input should come through at unity gain
        assert!((out[47999] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_lowpass_rejects_high_frequency() {
        let mut filter = ButterworthFilter::lowpass4(48000.0, 150.0);
        let input = sine(4000.0, 48000.0, 48000);
        let mut out = vec![0.0f32; 48000];
        filter.process_block(&input, &mut out);
        // 4000 Hz is well into the stop band of a 150 Hz lowpass
        assert!(rms(&out[24000..]) < 0.01);
    }

    #[test]
    fn test_highpass_rejects_dc() {
        let mut filter = ButterworthFilter::highpass4(48000.0, 4000.0);
        let input = vec![1.0f32; 48000];
        let mut out = vec![0.0f32; 48000];
        filter.process_block(&input, &mut out);
        assert!(out[47999].abs() < 0.001);
    }

    #[test]
    fn test_highpass_passes_high_frequency() {
        let mut filter = ButterworthFilter::highpass4(48000.0, 4000.0);
        let input = sine(12000.0, 48000.0, 48000);
        let mut out = vec![0.0f32; 48000];
        filter.process_block(&input, &mut out);
        let passband_rms = rms(&out[24000..]);
        // Unity passband within a small tolerance
        assert!((passband_rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.05);
    }

    #[test]
    fn test_bandpass_selects_mid_band() {
        let sample_rate = 48000.0;
        let len = 48000;
        let mut mid = ButterworthFilter::bandpass4(sample_rate, 150.0, 4000.0);
        let mut out = vec![0.0f32; len];

        let in_band = sine(1000.0, sample_rate, len);
        mid.process_block(&in_band, &mut out);
        let in_band_rms = rms(&out[len / 2..]);

        mid.reset();
        let below = sine(40.0, sample_rate, len);
        mid.process_block(&below, &mut out);
        let below_rms = rms(&out[len / 2..]);

        mid.reset();
        let above = sine(12000.0, sample_rate, len);
        mid.process_block(&above, &mut out);
        let above_rms = rms(&out[len / 2..]);

        assert!(in_band_rms > 0.6);
        assert!(below_rms < 0.05);
        assert!(above_rms < 0.05);
    }

    #[test]
    fn test_state_carries_across_blocks() {
        // Filtering a signal in two blocks must equal filtering it whole.
        let input = sine(500.0, 48000.0, 2048);
        let mut whole = ButterworthFilter::lowpass4(48000.0, 1000.0);
        let mut out_whole = vec![0.0f32; 2048];
        whole.process_block(&input, &mut out_whole);

        let mut split = ButterworthFilter::lowpass4(48000.0, 1000.0);
        let mut out_split = vec![0.0f32; 2048];
        split.process_block(&input[..1024], &mut out_split[..1024]);
        split.process_block(&input[1024..], &mut out_split[1024..]);

        for (a, b) in out_whole.iter().zip(out_split.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
