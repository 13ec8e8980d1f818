//! The analysis engine and its thread fabric
//!
//! [`Engine`] is the synchronous per-frame pipeline: one call to
//! [`Engine::process_chunk`] per captured chunk produces exactly one
//! [`FeatureFrame`]. [`EngineRunner`] wraps it in the three long-lived
//! threads (capture producer, analysis loop, command listener) connected
//! by the bounded capture queue and the shared parameter store.
//!
//! ```no_run
//! use notedancer_engine::{Engine, EngineConfig, Parameters};
//!
//! let config = EngineConfig::default();
//! let mut engine = Engine::new(config.clone())?;
//! let params = Parameters::default();
//!
//! let chunk = vec![0.0f32; config.chunk_size];
//! let frame = engine.process_chunk(&chunk, &params);
//! assert_eq!(frame.bpm, 0.0);
//! # Ok::<(), notedancer_engine::EngineError>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::features::bands::BandAnalyzer;
use crate::features::chroma::normalization::NoteNormalizer;
use crate::features::chroma::{ChromaExtractor, NUM_CLASSES};
use crate::features::onset::tempo::TempoTracker;
use crate::features::onset::OnsetDetector;
use crate::features::spectral::SpectralAnalyzer;
use crate::io::capture::{chunk_queue, CaptureSource, ChunkSender};
use crate::io::listener::spawn_listener;
use crate::io::transmitter::FeatureTransmitter;
use crate::params::{ParamStore, Parameters};
use crate::preprocessing::window::RollingWindow;
use crate::protocol::FeatureFrame;

/// Degraded-rate reporting window in frames
const DEGRADED_WINDOW: u64 = 256;

/// Consecutive over-budget frames before a performance warning
const OVER_BUDGET_LIMIT: u32 = 8;

/// The per-frame feature extraction pipeline
///
/// Owns every piece of per-stream state; the only data it shares with
/// other threads is the parameter snapshot passed into each call. All
/// buffers are allocated at construction and reused.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    window: RollingWindow,
    bands: BandAnalyzer,
    spectral: SpectralAnalyzer,
    chroma: ChromaExtractor,
    notes: NoteNormalizer,
    onset: OnsetDetector,
    tempo: TempoTracker,
    chroma_buf: [f32; NUM_CLASSES],
    total_frames: u64,
    degraded_frames: u64,
    degraded_in_window: u64,
}

impl Engine {
    /// Validate the configuration and build all pipeline state
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidConfig` when the configuration fails
    /// validation; the engine must not start.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let frame_rate = config.frame_rate();
        log::info!(
            "engine: {} Hz, chunk {} ({:.1} fps), window {} chunks, fft {}",
            config.sample_rate,
            config.chunk_size,
            frame_rate,
            config.window_chunks,
            config.fft_size
        );

        Ok(Self {
            window: RollingWindow::new(config.chunk_size, config.window_chunks),
            bands: BandAnalyzer::new(&config),
            spectral: SpectralAnalyzer::new(&config),
            chroma: ChromaExtractor::new(config.sample_rate, config.fft_size),
            notes: NoteNormalizer::new(&config),
            onset: OnsetDetector::new(&config.onset, frame_rate),
            tempo: TempoTracker::new(&config.tempo, frame_rate),
            chroma_buf: [0.0; NUM_CLASSES],
            total_frames: 0,
            degraded_frames: 0,
            degraded_in_window: 0,
            config,
        })
    }

    /// Run one chunk through the full pipeline and assemble its frame
    ///
    /// A short chunk is zero-padded and counted degraded; the frame is
    /// still emitted. Never fails: every numerical edge case inside the
    /// stages clamps to a safe default.
    pub fn process_chunk(&mut self, chunk: &[f32], params: &Parameters) -> FeatureFrame {
        if self.window.push_padded(chunk) {
            self.mark_degraded();
        }
        self.total_frames += 1;
        self.report_degraded_rate();

        let bands = self.bands.process(self.window.latest_chunk(), params);
        let spectral = self.spectral.analyze(self.window.view(), params.flux_sens);

        let is_beat = self.onset.update(spectral.flux_unclipped);
        self.tempo.advance(is_beat);

        let silent = self.window.rms() < self.config.silence_threshold;
        self.chroma.fold(self.spectral.harmonic(), &mut self.chroma_buf);
        let notes = self.notes.apply(&self.chroma_buf, params, silent);

        FeatureFrame {
            brightness: spectral.brightness,
            flux: spectral.flux,
            low: bands.low,
            mid: bands.mid,
            high: bands.high,
            bpm: self.tempo.bpm(),
            is_beat,
            notes,
        }
    }

    /// Count an input defect (short read or dropped queue entry)
    pub fn mark_degraded(&mut self) {
        self.degraded_frames += 1;
        self.degraded_in_window += 1;
    }

    /// Total frames produced from padded or late input
    pub fn degraded_frames(&self) -> u64 {
        self.degraded_frames
    }

    /// The configuration this engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn report_degraded_rate(&mut self) {
        if self.total_frames % DEGRADED_WINDOW != 0 {
            return;
        }
        if self.degraded_in_window * 10 > DEGRADED_WINDOW {
            log::warn!(
                "degraded input rate: {}/{} recent frames",
                self.degraded_in_window,
                DEGRADED_WINDOW
            );
        }
        self.degraded_in_window = 0;
    }
}

/// The running engine: three threads plus the shared parameter store
///
/// Capture blocks only on its provider, analysis only on the capture
/// queue, the listener only on the command socket. Shutdown is
/// cooperative through a shared flag polled at 100 ms granularity.
pub struct EngineRunner {
    shutdown: Arc<AtomicBool>,
    params: ParamStore,
    capture_handle: Option<JoinHandle<()>>,
    analysis_handle: Option<JoinHandle<()>>,
    listener_handle: Option<JoinHandle<()>>,
}

impl EngineRunner {
    /// Bind the sockets, build the pipeline and start all threads
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or socket bind failure;
    /// both are fatal and nothing is left running.
    pub fn start<C: CaptureSource + 'static>(
        config: EngineConfig,
        capture: C,
    ) -> Result<Self, EngineError> {
        let engine = Engine::new(config.clone())?;
        let transmitter = FeatureTransmitter::new(config.feature_addr)?;

        let params = ParamStore::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        let listener_handle =
            spawn_listener(config.command_addr, params.clone(), shutdown.clone())?;

        let (tx, rx) = chunk_queue(2);

        let capture_handle = std::thread::Builder::new()
            .name("nd-capture".to_string())
            .spawn({
                let shutdown = shutdown.clone();
                let chunk_size = config.chunk_size;
                move || capture_loop(capture, tx, chunk_size, shutdown)
            })
            .map_err(EngineError::Io)?;

        let analysis_handle = std::thread::Builder::new()
            .name("nd-analysis".to_string())
            .spawn({
                let shutdown = shutdown.clone();
                let params = params.clone();
                move || analysis_loop(engine, rx, transmitter, params, shutdown)
            })
            .map_err(EngineError::Io)?;

        Ok(Self {
            shutdown,
            params,
            capture_handle: Some(capture_handle),
            analysis_handle: Some(analysis_handle),
            listener_handle: Some(listener_handle),
        })
    }

    /// Handle to the shared parameter store (for local control surfaces)
    pub fn params(&self) -> ParamStore {
        self.params.clone()
    }

    /// Block until the capture source ends, then shut everything down
    pub fn wait(mut self) {
        if let Some(handle) = self.analysis_handle.take() {
            let _ = handle.join();
        }
        self.shutdown_and_join();
    }

    /// Request shutdown and join all threads
    ///
    /// Every thread polls the shutdown flag at 100 ms granularity, so the
    /// join completes well inside the 1 s bound.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in [
            self.capture_handle.take(),
            self.analysis_handle.take(),
            self.listener_handle.take(),
        ]
        .into_iter()
        .flatten()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for EngineRunner {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

fn capture_loop<C: CaptureSource>(
    mut capture: C,
    tx: ChunkSender,
    chunk_size: usize,
    shutdown: Arc<AtomicBool>,
) {
    let mut dropped_total: u64 = 0;
    while !shutdown.load(Ordering::Relaxed) {
        let mut chunk = vec![0.0f32; chunk_size];
        match capture.read_chunk(&mut chunk) {
            Ok(0) => {
                log::info!("capture stream ended");
                break;
            }
            Ok(n) => {
                chunk.truncate(n);
                if tx.send_latest(chunk) {
                    dropped_total += 1;
                    if dropped_total.is_power_of_two() {
                        log::warn!("analysis lagging, {} chunk(s) dropped so far", dropped_total);
                    }
                }
            }
            Err(err) => {
                log::error!("capture error: {}", err);
                break;
            }
        }
    }
    // Dropping the sender disconnects the queue and ends the analysis loop.
}

fn analysis_loop(
    mut engine: Engine,
    rx: crate::io::capture::ChunkReceiver,
    transmitter: FeatureTransmitter,
    params: ParamStore,
    shutdown: Arc<AtomicBool>,
) {
    let budget = Duration::from_secs_f32(engine.config().frame_period());
    let mut over_budget_streak: u32 = 0;
    let mut warned_this_episode = false;

    while !shutdown.load(Ordering::Relaxed) {
        let chunk = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(chunk) => chunk,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };

        let started = Instant::now();
        let snapshot = params.snapshot();
        let frame = engine.process_chunk(&chunk, &snapshot);
        transmitter.send(&frame);

        if started.elapsed() > budget {
            over_budget_streak += 1;
            if over_budget_streak > OVER_BUDGET_LIMIT && !warned_this_episode {
                log::warn!(
                    "analysis over budget for {} consecutive frames",
                    over_budget_streak
                );
                warned_this_episode = true;
            }
        } else {
            over_budget_streak = 0;
            warned_this_episode = false;
        }
    }
    log::debug!(
        "analysis exiting after {} degraded frame(s)",
        engine.degraded_frames()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_rejects_bad_config() {
        let config = EngineConfig {
            sample_rate: 0,
            ..EngineConfig::default()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_one_frame_per_chunk() {
        let config = EngineConfig::default();
        let mut engine = Engine::new(config.clone()).unwrap();
        let params = Parameters::default();
        let chunk = vec![0.0f32; config.chunk_size];

        for _ in 0..10 {
            let frame = engine.process_chunk(&chunk, &params);
            assert_eq!(frame.pack().len(), crate::protocol::FRAME_BYTES);
        }
        assert_eq!(engine.degraded_frames(), 0);
    }

    #[test]
    fn test_short_chunk_is_degraded_but_emits() {
        let config = EngineConfig::default();
        let mut engine = Engine::new(config.clone()).unwrap();
        let params = Parameters::default();

        let short = vec![0.1f32; config.chunk_size / 2];
        let _frame = engine.process_chunk(&short, &params);
        assert_eq!(engine.degraded_frames(), 1);
    }
}
