//! Feature extraction stages: band energies, spectral descriptors,
//! chroma, onset/tempo, and the shared AutoGain tracker

pub mod autogain;
pub mod bands;
pub mod chroma;
pub mod onset;
pub mod spectral;
