//! Channel mixing utilities (stereo to mono conversion)

/// Downmix an interleaved stereo buffer to mono by arithmetic mean
///
/// Writes `(L + R) / 2` for each frame into `out`. `out` must hold
/// `interleaved.len() / 2` samples; a trailing unpaired sample is ignored.
///
/// # Arguments
///
/// * `interleaved` - Interleaved stereo samples (L, R, L, R, ...)
/// * `out` - Destination mono buffer
pub fn downmix_interleaved(interleaved: &[f32], out: &mut [f32]) {
    let frames = (interleaved.len() / 2).min(out.len());
    for (i, slot) in out.iter_mut().enumerate().take(frames) {
        *slot = (interleaved[2 * i] + interleaved[2 * i + 1]) * 0.5;
    }
}
