use pcm_synth::SynthError;
use thiserror::Error;

/// Invalid settings detected while planning or configuring playback.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("need {expected} mixing matrix entries, got {actual}")]
    MixMatrixCount { expected: usize, actual: usize },

    #[error("bad value for clipping mode given: {0}")]
    ClipMode(String),

    #[error("unknown signal source: {0}")]
    SignalSource(String),

    #[error("bad sweep choice: {0}")]
    SweepType(String),

    #[error("bad wave pattern: {0}")]
    WavePattern(String),

    #[error("bad value for resampler type given: {0}")]
    Resampler(String),

    #[error("unknown encoding '{0}' given")]
    Encoding(String),

    #[error("unknown output driver: {0}")]
    Driver(String),

    #[error("sampling rates out of range for the resampler ({in_rate} Hz -> {out_rate} Hz)")]
    ResampleRange { in_rate: u32, out_rate: u32 },

    #[error("cannot compute resampler output count")]
    ResampleCount,

    #[error("{0} must be positive")]
    NotPositive(&'static str),

    #[error("block of {0} frames is too large")]
    BlockTooLarge(usize),
}

/// Every fatal condition of the player.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("out of memory allocating {bytes} bytes")]
    ResourceExhausted { bytes: usize },

    #[error("output error: {0}")]
    Device(String),

    #[error("synthesis error: {0}")]
    Synth(#[from] SynthError),

    #[error("input error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            PlayerError::Config(cfg) => match cfg {
                ConfigError::MixMatrixCount { .. }
                | ConfigError::Encoding(_)
                | ConfigError::NotPositive(_)
                | ConfigError::BlockTooLarge(_) => 1,
                ConfigError::SignalSource(_)
                | ConfigError::SweepType(_)
                | ConfigError::WavePattern(_)
                | ConfigError::Resampler(_) => 132,
                ConfigError::Driver(_) => 133,
                ConfigError::ResampleRange { .. } | ConfigError::ResampleCount => 134,
                ConfigError::ClipMode(_) => 135,
            },
            PlayerError::ResourceExhausted { .. } | PlayerError::Io(_) => 1,
            PlayerError::Synth(SynthError::ResampleRange { .. }) => 134,
            PlayerError::Synth(_) => 132,
            PlayerError::Device(_) => 133,
        }
    }
}
