//! Output sinks.
//!
//! The executor only ever talks to [`OutputSink`]. Drivers:
//! - `cpal`: the system audio device
//! - `raw`: headerless PCM to a file or stdout
//! - `wav`: a WAV file
//! - `test`: discards everything

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::config::OutputConfig;
use crate::error::{ConfigError, PlayerError};
use crate::format::AudioFormat;

pub mod file;
pub mod null;
pub mod playback;
pub mod wav;

pub use self::file::RawSink;
pub use self::null::NullSink;
pub use self::playback::CpalSink;
pub use self::wav::WavSink;

/// Destination for converted output blocks.
pub trait OutputSink {
    /// Driver name for logs.
    fn name(&self) -> &str;

    /// Request an output buffer of `bytes` (0 keeps the driver default).
    /// Must be called before [`start`](OutputSink::start).
    fn set_buffer(&mut self, _bytes: usize) {}

    /// Open the device or file for `format`.
    fn start(&mut self, format: &AudioFormat) -> Result<(), PlayerError>;

    /// Write one block, returning the bytes accepted.
    fn play(&mut self, buf: &[u8]) -> Result<usize, PlayerError>;

    /// Bytes accepted but not yet played.
    fn buffered(&self) -> usize {
        0
    }

    /// Discard buffered audio.
    fn drop_buffered(&mut self) {}

    /// Wait until buffered audio has played out or `interrupt` is set.
    fn drain(&mut self, _interrupt: &AtomicBool) -> Result<(), PlayerError> {
        Ok(())
    }

    /// Release the device or file.
    fn close(&mut self) -> Result<(), PlayerError>;
}

/// Output driver choice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputDriver {
    Cpal { device: Option<String> },
    Raw { path: Option<PathBuf> },
    Wav { path: PathBuf },
    Test,
}

impl OutputDriver {
    pub fn from_config(config: &OutputConfig) -> Result<OutputDriver, ConfigError> {
        match config.driver.to_ascii_lowercase().as_str() {
            "cpal" | "default" => Ok(OutputDriver::Cpal {
                device: config.device.clone(),
            }),
            "raw" => Ok(OutputDriver::Raw {
                path: config.path.clone(),
            }),
            "wav" => match &config.path {
                Some(path) => Ok(OutputDriver::Wav { path: path.clone() }),
                None => Err(ConfigError::Driver("wav needs an output file".to_string())),
            },
            "test" | "null" => Ok(OutputDriver::Test),
            other => Err(ConfigError::Driver(other.to_string())),
        }
    }
}

/// Create the sink for `config`. Nothing is opened until `start`.
pub fn open_sink(config: &OutputConfig) -> Result<Box<dyn OutputSink>, PlayerError> {
    let mut sink: Box<dyn OutputSink> = match OutputDriver::from_config(config)? {
        OutputDriver::Cpal { device } => Box::new(CpalSink::new(device)),
        OutputDriver::Raw { path } => Box::new(RawSink::new(path)),
        OutputDriver::Wav { path } => Box::new(WavSink::new(path)),
        OutputDriver::Test => Box::new(NullSink::default()),
    };
    sink.set_buffer(config.buffer_bytes);
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(driver: &str, path: Option<&str>) -> OutputConfig {
        OutputConfig {
            driver: driver.into(),
            path: path.map(PathBuf::from),
            ..OutputConfig::default()
        }
    }

    #[test]
    fn drivers_resolve_by_name() {
        assert_eq!(
            OutputDriver::from_config(&output("CPAL", None)).unwrap(),
            OutputDriver::Cpal { device: None }
        );
        assert_eq!(
            OutputDriver::from_config(&output("raw", None)).unwrap(),
            OutputDriver::Raw { path: None }
        );
        assert_eq!(
            OutputDriver::from_config(&output("wav", Some("out.wav"))).unwrap(),
            OutputDriver::Wav {
                path: PathBuf::from("out.wav")
            }
        );
        assert_eq!(
            OutputDriver::from_config(&output("test", None)).unwrap(),
            OutputDriver::Test
        );
    }

    #[test]
    fn wav_without_path_is_rejected() {
        let err = OutputDriver::from_config(&output("wav", None)).unwrap_err();
        assert_eq!(PlayerError::from(err).exit_code(), 133);
    }

    #[test]
    fn unknown_driver_is_rejected() {
        assert_eq!(
            OutputDriver::from_config(&output("pulse", None)),
            Err(ConfigError::Driver("pulse".into()))
        );
    }

    #[test]
    fn open_sink_names_driver() {
        let sink = open_sink(&output("test", None)).unwrap();
        assert_eq!(sink.name(), "test");
    }
}
