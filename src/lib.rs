//! # Note Dancer Engine
//!
//! A real-time audio feature extraction engine for music visualization,
//! tuned for electronic music: heavily compressed, bass-dominant,
//! tempo-locked, with sharp percussive transients over sustained harmonic
//! content.
//!
//! ## Features
//!
//! - **Band energies**: three-band Butterworth split with per-band
//!   adaptive normalization and attack/decay shaping
//! - **Spectral descriptors**: centroid brightness and percussive
//!   transient flux from a median-filter harmonic/percussive split
//! - **Chroma**: 12-bin pitch-class profile with three selectable
//!   normalization modes (fixed, competitive, statistical)
//! - **Beat and tempo**: adaptive onset detection with octave-hedged,
//!   smoothed BPM
//!
//! ## Quick Start
//!
//! ```no_run
//! use notedancer_engine::{Engine, EngineConfig, Parameters};
//!
//! let config = EngineConfig::default();
//! let mut engine = Engine::new(config.clone())?;
//!
//! // One 1024-sample mono chunk in, one 19-float feature frame out.
//! let chunk = vec![0.0f32; config.chunk_size];
//! let frame = engine.process_chunk(&chunk, &Parameters::default());
//! println!("low {:.2} mid {:.2} high {:.2}", frame.low, frame.mid, frame.high);
//! # Ok::<(), notedancer_engine::EngineError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! capture -> ring window -> bands / spectral / onset -> assembler -> UDP
//!                                    ^
//!                       parameter snapshots (UDP commands)
//! ```
//!
//! [`EngineRunner`] hosts the pipeline on its own analysis thread, fed by
//! a bounded drop-oldest capture queue, with a command listener applying
//! live parameter updates between frames.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod io;
pub mod params;
pub mod preprocessing;
pub mod protocol;

// Re-export main types
pub use config::EngineConfig;
pub use engine::{Engine, EngineRunner};
pub use error::EngineError;
pub use params::{NormMode, ParamStore, Parameters};
pub use protocol::{FeatureFrame, FRAME_BYTES, FRAME_FLOATS};
