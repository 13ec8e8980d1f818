//! Rolling analysis window
//!
//! Assembles fixed-size capture chunks into an overlap-capable window of
//! `window_chunks * chunk_size` samples. The window advances by exactly one
//! chunk per frame (hop = chunk); spectral analysis reads the whole window
//! while the band chain reads only the newest chunk.

use crate::error::EngineError;

/// Fixed-length sample window advanced one chunk at a time
///
/// Mutated only by the frame scheduler; shared read-only with the spectral
/// stage via [`RollingWindow::view`]. No allocation after construction.
#[derive(Debug)]
pub struct RollingWindow {
    samples: Vec<f32>,
    chunk_size: usize,
}

impl RollingWindow {
    /// Create a zero-filled window of `window_chunks * chunk_size` samples
    pub fn new(chunk_size: usize, window_chunks: usize) -> Self {
        Self {
            samples: vec![0.0; chunk_size * window_chunks],
            chunk_size,
        }
    }

    /// Advance the window by one full chunk
    ///
    /// # Errors
    ///
    /// Returns `EngineError::BadChunkLength` when `chunk` is not exactly one
    /// chunk long. Callers recovering from short reads should use
    /// [`RollingWindow::push_padded`] instead.
    pub fn push(&mut self, chunk: &[f32]) -> Result<(), EngineError> {
        if chunk.len() != self.chunk_size {
            return Err(EngineError::BadChunkLength {
                expected: self.chunk_size,
                got: chunk.len(),
            });
        }
        let keep = self.samples.len() - self.chunk_size;
        self.samples.copy_within(self.chunk_size.., 0);
        self.samples[keep..].copy_from_slice(chunk);
        Ok(())
    }

    /// Advance the window by one chunk, zero-padding a short read
    ///
    /// Returns `true` when the chunk was not exactly one chunk long, which
    /// marks the frame as degraded. Oversized chunks are truncated.
    pub fn push_padded(&mut self, chunk: &[f32]) -> bool {
        let keep = self.samples.len() - self.chunk_size;
        self.samples.copy_within(self.chunk_size.., 0);
        let tail = &mut self.samples[keep..];
        let n = chunk.len().min(tail.len());
        tail[..n].copy_from_slice(&chunk[..n]);
        tail[n..].fill(0.0);
        chunk.len() != self.chunk_size
    }

    /// The full window, oldest sample first
    pub fn view(&self) -> &[f32] {
        &self.samples
    }

    /// The most recent chunk
    pub fn latest_chunk(&self) -> &[f32] {
        &self.samples[self.samples.len() - self.chunk_size..]
    }

    /// RMS amplitude of the whole window
    ///
    /// Used by the silence gate that zeroes the note vector.
    pub fn rms(&self) -> f32 {
        let sum_sq: f32 = self.samples.iter().map(|&x| x * x).sum();
        (sum_sq / self.samples.len() as f32).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_rolls_one_chunk() {
        let mut window = RollingWindow::new(4, 2);
        window.push(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        window.push(&[5.0, 6.0, 7.0, 8.0]).unwrap();
        assert_eq!(window.view(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);

        window.push(&[9.0, 10.0, 11.0, 12.0]).unwrap();
        assert_eq!(window.view(), &[5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        assert_eq!(window.latest_chunk(), &[9.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_push_rejects_wrong_length() {
        let mut window = RollingWindow::new(4, 2);
        let result = window.push(&[1.0, 2.0]);
        assert!(matches!(
            result,
            Err(EngineError::BadChunkLength { expected: 4, got: 2 })
        ));
    }

    #[test]
    fn test_push_padded_zero_fills_short_read() {
        let mut window = RollingWindow::new(4, 2);
        window.push(&[1.0; 4]).unwrap();
        let degraded = window.push_padded(&[2.0, 3.0]);
        assert!(degraded);
        assert_eq!(window.latest_chunk(), &[2.0, 3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_push_padded_full_chunk_not_degraded() {
        let mut window = RollingWindow::new(4, 2);
        assert!(!window.push_padded(&[1.0; 4]));
    }

    #[test]
    fn test_window_rms() {
        let mut window = RollingWindow::new(2, 2);
        window.push(&[0.5, -0.5]).unwrap();
        window.push(&[0.5, -0.5]).unwrap();
        assert!((window.rms() - 0.5).abs() < 1e-6);
    }
}
