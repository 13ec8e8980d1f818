//! Capture-side plumbing
//!
//! The engine does not enumerate or open audio devices; an external
//! provider feeds it mono float chunks through [`CaptureSource`].
//! [`PcmReader`] adapts any byte stream of little-endian f32 PCM (the
//! engine binary points it at stdin), and [`chunk_queue`] provides the
//! bounded single-producer/single-consumer hop between the capture thread
//! and the analysis thread. The queue holds two chunks and overwrites the
//! oldest when full: a dropped frame is better than a delayed frame.

use std::io::Read;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::error::EngineError;
use crate::preprocessing::channel_mixer::downmix_interleaved;

/// A provider of mono sample chunks
///
/// Implementations block until a chunk is available. A return of fewer
/// samples than requested marks end-of-stream or a short read; the engine
/// zero-pads and counts the frame degraded.
pub trait CaptureSource: Send {
    /// Fill `buf` with mono samples in [-1, 1]; returns how many were read
    fn read_chunk(&mut self, buf: &mut [f32]) -> Result<usize, EngineError>;
}

/// Capture adapter for raw little-endian f32 PCM byte streams
pub struct PcmReader<R: Read> {
    reader: R,
    channels: u16,
    byte_buf: Vec<u8>,
    stereo_buf: Vec<f32>,
}

impl<R: Read> PcmReader<R> {
    /// Wrap `reader` producing interleaved PCM with `channels` channels
    /// (1 or 2; stereo is downmixed to mono)
    pub fn new(reader: R, channels: u16) -> Result<Self, EngineError> {
        if !(1..=2).contains(&channels) {
            return Err(EngineError::InvalidConfig(format!(
                "PcmReader supports 1 or 2 channels, got {}",
                channels
            )));
        }
        Ok(Self {
            reader,
            channels,
            byte_buf: Vec::new(),
            stereo_buf: Vec::new(),
        })
    }

    /// Read as many bytes as possible into `buf`, tolerating partial reads
    fn read_bytes(&mut self, len: usize) -> Result<usize, EngineError> {
        self.byte_buf.resize(len, 0);
        let mut filled = 0;
        while filled < len {
            match self.reader.read(&mut self.byte_buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(EngineError::Io(err)),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Send> CaptureSource for PcmReader<R> {
    fn read_chunk(&mut self, buf: &mut [f32]) -> Result<usize, EngineError> {
        let frames = buf.len();
        let samples = frames * self.channels as usize;
        let filled = self.read_bytes(samples * 4)?;
        let whole_samples = filled / 4;

        if self.channels == 1 {
            for (slot, b) in buf
                .iter_mut()
                .zip(self.byte_buf.chunks_exact(4))
                .take(whole_samples)
            {
                *slot = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            }
            Ok(whole_samples)
        } else {
            self.stereo_buf.clear();
            self.stereo_buf.extend(
                self.byte_buf
                    .chunks_exact(4)
                    .take(whole_samples)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            );
            let mono_frames = whole_samples / 2;
            downmix_interleaved(&self.stereo_buf[..mono_frames * 2], &mut buf[..mono_frames]);
            Ok(mono_frames)
        }
    }
}

/// Sending half of the capture queue
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: Sender<Vec<f32>>,
    rx: Receiver<Vec<f32>>,
}

/// Receiving half of the capture queue
#[derive(Debug)]
pub struct ChunkReceiver {
    rx: Receiver<Vec<f32>>,
}

/// Create the bounded capture queue (overwrite-on-full, depth `capacity`)
pub fn chunk_queue(capacity: usize) -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = bounded(capacity);
    (
        ChunkSender { tx, rx: rx.clone() },
        ChunkReceiver { rx },
    )
}

impl ChunkSender {
    /// Enqueue a chunk, dropping the oldest one when the queue is full
    ///
    /// Returns `true` when an old chunk was dropped so the producer can
    /// account for it. Bounded depth keeps staleness at no more than
    /// `capacity` chunks without ever back-pressuring the capture
    /// provider.
    pub fn send_latest(&self, chunk: Vec<f32>) -> bool {
        match self.tx.try_send(chunk) {
            Ok(()) => false,
            Err(TrySendError::Full(chunk)) => {
                let dropped = self.rx.try_recv().is_ok();
                // A racing consumer may have drained the queue; either way
                // there is room now or the stream is shutting down.
                let _ = self.tx.try_send(chunk);
                dropped
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl ChunkReceiver {
    /// Wait up to `timeout` for the next chunk
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<f32>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_mono_reader_reads_chunks() {
        let samples: Vec<f32> = (0..8).map(|i| i as f32 / 10.0).collect();
        let bytes = pcm_bytes(&samples);
        let mut reader = PcmReader::new(bytes.as_slice(), 1).unwrap();

        let mut chunk = [0.0f32; 4];
        assert_eq!(reader.read_chunk(&mut chunk).unwrap(), 4);
        assert_eq!(chunk, [0.0, 0.1, 0.2, 0.3]);
        assert_eq!(reader.read_chunk(&mut chunk).unwrap(), 4);
        assert_eq!(chunk, [0.4, 0.5, 0.6, 0.7]);
        assert_eq!(reader.read_chunk(&mut chunk).unwrap(), 0);
    }

    #[test]
    fn test_stereo_reader_downmixes() {
        let interleaved = [1.0f32, 0.0, 0.5, 0.5, -0.4, 0.4, 0.2, 0.6];
        let bytes = pcm_bytes(&interleaved);
        let mut reader = PcmReader::new(bytes.as_slice(), 2).unwrap();

        let mut chunk = [0.0f32; 4];
        assert_eq!(reader.read_chunk(&mut chunk).unwrap(), 4);
        assert_eq!(chunk, [0.5, 0.5, 0.0, 0.4]);
    }

    #[test]
    fn test_short_read_reports_partial_chunk() {
        let samples = [0.1f32, 0.2, 0.3];
        let bytes = pcm_bytes(&samples);
        let mut reader = PcmReader::new(bytes.as_slice(), 1).unwrap();

        let mut chunk = [0.0f32; 8];
        assert_eq!(reader.read_chunk(&mut chunk).unwrap(), 3);
    }

    #[test]
    fn test_reader_rejects_bad_channel_count() {
        assert!(PcmReader::new(&[][..], 0).is_err());
        assert!(PcmReader::new(&[][..], 6).is_err());
    }

    #[test]
    fn test_queue_drops_oldest_when_full() {
        let (tx, rx) = chunk_queue(2);
        assert!(!tx.send_latest(vec![1.0]));
        assert!(!tx.send_latest(vec![2.0]));
        // Queue is full; the oldest chunk gives way to the newest.
        assert!(tx.send_latest(vec![3.0]));

        let first = rx.recv_timeout(Duration::from_millis(10)).unwrap();
        let second = rx.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(first, vec![2.0]);
        assert_eq!(second, vec![3.0]);
        assert!(rx.recv_timeout(Duration::from_millis(10)).is_err());
    }
}
