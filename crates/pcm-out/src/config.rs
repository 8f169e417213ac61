use std::path::PathBuf;

use pcm_synth::Encoding;

use crate::error::ConfigError;
use crate::format::AudioFormat;

pub const DEFAULT_RATE: u32 = 44_100;
pub const DEFAULT_CHANNELS: usize = 2;
/// Nominal frames per processing block.
pub const DEFAULT_BLOCK: usize = 1152;
/// Periodic table limit in samples.
pub const DEFAULT_TABLE_LIMIT: usize = 300_000;
pub const DEFAULT_GEIGER_ACTIVITY: f64 = 17.0;
/// Fixed generator seed so noise is reproducible.
pub const GENERATOR_SEED: u64 = 123_456;
/// Seed of the dither noise.
pub const DITHER_SEED: u64 = 2_463_534_242;
pub const SOFT_CLIP_LIMIT: f64 = 1.0;
pub const SOFT_CLIP_WIDTH: f64 = 0.0234;

/// Everything one player run needs.
#[derive(Clone, Debug, Default)]
pub struct PlayerConfig {
    pub format: FormatConfig,
    pub processing: ProcessingConfig,
    pub generator: GeneratorConfig,
    pub output: OutputConfig,
    pub time_limit: TimeLimit,
    /// Raw input file; `None` or `-` reads stdin.
    pub input: Option<PathBuf>,
}

/// Output format plus optional input overrides.
#[derive(Clone, Debug)]
pub struct FormatConfig {
    pub rate: u32,
    pub channels: usize,
    pub encoding: Option<String>,
    pub input_rate: Option<u32>,
    pub input_channels: Option<usize>,
    pub input_encoding: Option<String>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE,
            channels: DEFAULT_CHANNELS,
            encoding: None,
            input_rate: None,
            input_channels: None,
            input_encoding: None,
        }
    }
}

impl FormatConfig {
    /// Resolve `(input, output)` formats.
    ///
    /// Input values default to the output ones. A generator produces `f32` input
    /// (`f64` when the output is `f64`) unless an input encoding is given.
    pub fn resolve(&self, generating: bool) -> Result<(AudioFormat, AudioFormat), ConfigError> {
        if self.rate == 0 {
            return Err(ConfigError::NotPositive("output rate"));
        }
        if self.channels == 0 {
            return Err(ConfigError::NotPositive("output channel count"));
        }
        let out_enc = match &self.encoding {
            Some(name) => parse_encoding(name)?,
            None => Encoding::Signed16,
        };
        let in_enc = match &self.input_encoding {
            Some(name) => parse_encoding(name)?,
            None if generating && out_enc == Encoding::Float64 => Encoding::Float64,
            None if generating => Encoding::Float32,
            None => out_enc,
        };
        let in_rate = self.input_rate.unwrap_or(self.rate);
        let in_channels = self.input_channels.unwrap_or(self.channels);
        if in_rate == 0 {
            return Err(ConfigError::NotPositive("input rate"));
        }
        if in_channels == 0 {
            return Err(ConfigError::NotPositive("input channel count"));
        }
        Ok((
            AudioFormat::new(in_rate, in_channels, in_enc),
            AudioFormat::new(self.rate, self.channels, out_enc),
        ))
    }
}

pub fn parse_encoding(name: &str) -> Result<Encoding, ConfigError> {
    Encoding::by_name(name).ok_or_else(|| ConfigError::Encoding(name.to_string()))
}

/// Conversion stage settings.
#[derive(Clone, Debug)]
pub struct ProcessingConfig {
    /// Frames per processing block.
    pub block: usize,
    /// Explicit mixing matrix, comma separated and row-major.
    pub mix: Option<String>,
    pub preamp_db: f64,
    pub preamp_offset: f64,
    /// `implicit`, `hard` or `soft`.
    pub clip: String,
    /// `fine` or `dirty`.
    pub resampler: String,
    /// Dither conversions to integer encodings.
    pub dither: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            block: DEFAULT_BLOCK,
            mix: None,
            preamp_db: 0.0,
            preamp_offset: 0.0,
            clip: "implicit".to_string(),
            resampler: "fine".to_string(),
            dither: false,
        }
    }
}

/// Signal generator settings. Lists are comma separated.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// `file`, `wave`, `sweep`, `pink`, `white` or `geiger`.
    pub source: String,
    pub wave_freqs: Option<String>,
    pub wave_patterns: Option<String>,
    pub wave_phases: Option<String>,
    pub wave_directions: Option<String>,
    pub table_limit: usize,
    /// Pink noise rows, 0 for the generator default.
    pub pink_rows: usize,
    pub geiger_activity: f64,
    /// End frequency of a sweep.
    pub sweep_freq: f64,
    pub sweep_type: String,
    /// Sweep duration in seconds, 0 to derive it from the time limit.
    pub sweep_time: f64,
    pub sweep_hard: bool,
    /// Play this many sweep periods.
    pub sweep_count: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            source: "file".to_string(),
            wave_freqs: None,
            wave_patterns: None,
            wave_phases: None,
            wave_directions: None,
            table_limit: DEFAULT_TABLE_LIMIT,
            pink_rows: 0,
            geiger_activity: DEFAULT_GEIGER_ACTIVITY,
            sweep_freq: 0.0,
            sweep_type: "quad".to_string(),
            sweep_time: 0.0,
            sweep_hard: false,
            sweep_count: None,
        }
    }
}

impl GeneratorConfig {
    /// Whether audio comes from a generator rather than a stream.
    pub fn generates(&self) -> bool {
        !self.source.eq_ignore_ascii_case("file")
    }
}

/// Output driver selection.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// `cpal`, `raw`, `wav` or `test`.
    pub driver: String,
    /// Device substring for `cpal`.
    pub device: Option<String>,
    /// Destination file for `raw` (stdout when absent) and `wav`.
    pub path: Option<PathBuf>,
    /// Output buffer in bytes, 0 for the driver default.
    pub buffer_bytes: usize,
    /// Also copy every played block to stdout.
    pub also_stdout: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            driver: "cpal".to_string(),
            device: None,
            path: None,
            buffer_bytes: 0,
            also_stdout: false,
        }
    }
}

/// Playback limit, in input samples or seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeLimit {
    pub samples: Option<u64>,
    pub seconds: Option<f64>,
}

impl TimeLimit {
    /// Limit in input samples. A sample count wins over seconds.
    pub fn resolve(&self, input_rate: u32) -> Option<u64> {
        self.samples.or_else(|| {
            self.seconds
                .filter(|s| *s >= 0.0)
                .map(|s| (s * input_rate as f64) as u64)
        })
    }
}
