//! Raw PCM player and test signal generator.
//!
//! The binary is a thin wrapper around [`runtime::run`]; everything else is
//! exposed so the pipeline can be driven without a device.

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod executor;
pub mod format;
pub mod input;
pub mod mixmat;
pub mod plan;
pub mod queue;
pub mod runtime;
pub mod sink;
pub mod tokenize;
pub mod wavegen;

pub use error::{ConfigError, PlayerError};
