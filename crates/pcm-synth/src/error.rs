use thiserror::Error;

use crate::encoding::Encoding;

/// Errors reported by the synthesis/processing engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthError {
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("channel count must be positive")]
    NoChannels,

    #[error("sample rate must be positive")]
    BadRate,

    #[error("mixing matrix has {actual} entries, expected {expected}")]
    BadMatrix { expected: usize, actual: usize },

    #[error("bad wave pattern")]
    BadWave,

    #[error("bad sweep frequencies {f1} Hz -> {f2} Hz")]
    BadSweep { f1: f64, f2: f64 },

    #[error("sampling rates out of range for the resampler ({in_rate} Hz -> {out_rate} Hz)")]
    ResampleRange { in_rate: u32, out_rate: u32 },

    #[error("resampler is not set up")]
    NoResampler,

    #[error("{0} buffer cannot be dithered")]
    NotFloat(Encoding),

    #[error("resampler: {0}")]
    Resampler(String),
}
