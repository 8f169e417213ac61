//! Sample processing and synthesis engine for the `pcm-out` player.
//!
//! - [`encoding`]: sample encodings and their byte layout
//! - [`convert`]: conversion, mixing, amplification, clipping
//! - [`dither`]: TPDF noise ahead of integer conversion
//! - [`resample`]: Rubato-backed streaming resampler
//! - [`generator`] + [`synth`]: test-signal generators behind one handle

pub mod convert;
pub mod dither;
pub mod encoding;
pub mod error;
pub mod generator;
pub mod resample;
pub mod synth;

pub use dither::Dither;
pub use encoding::Encoding;
pub use error::SynthError;
pub use synth::Synth;
