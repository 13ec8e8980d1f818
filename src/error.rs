//! Error types for the feature extraction engine

use std::fmt;

/// Errors that can occur while constructing or running the engine
///
/// Only initialization-time failures are fatal. Everything inside the
/// steady-state frame loop recovers in-line: short reads are zero-padded,
/// numerical degeneracies clamp to safe defaults, and transport send
/// failures are dropped silently.
#[derive(Debug)]
pub enum EngineError {
    /// Invalid configuration (bad sample rate, cutoffs above Nyquist, ...)
    InvalidConfig(String),

    /// Capture delivered a chunk of the wrong length
    BadChunkLength {
        /// Number of samples expected per chunk
        expected: usize,
        /// Number of samples actually delivered
        got: usize,
    },

    /// Socket bind or other I/O failure during startup
    Io(std::io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            EngineError::BadChunkLength { expected, got } => {
                write!(f, "Bad chunk length: expected {} samples, got {}", expected, got)
            }
            EngineError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err)
    }
}
