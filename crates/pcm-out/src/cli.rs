use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::{
    DEFAULT_BLOCK, DEFAULT_CHANNELS, DEFAULT_GEIGER_ACTIVITY, DEFAULT_RATE, DEFAULT_TABLE_LIMIT,
    FormatConfig, GeneratorConfig, OutputConfig, PlayerConfig, ProcessingConfig, TimeLimit,
};

#[derive(Parser, Debug)]
#[command(
    name = "pcm-out",
    version,
    about = "Play raw PCM or generated test signals",
    allow_negative_numbers = true
)]
pub struct Args {
    /// Raw PCM input file; stdin when absent or `-`
    pub input: Option<PathBuf>,

    /// Output sampling rate in Hz
    #[arg(short = 'r', long, default_value_t = DEFAULT_RATE)]
    pub rate: u32,

    /// Output channel count
    #[arg(short = 'c', long, default_value_t = DEFAULT_CHANNELS)]
    pub channels: usize,

    /// Shortcut for one output channel
    #[arg(short = 'm', long, conflicts_with_all = ["channels", "stereo"])]
    pub mono: bool,

    /// Shortcut for two output channels
    #[arg(long, conflicts_with = "channels")]
    pub stereo: bool,

    /// Output encoding (see --list-encodings)
    #[arg(short = 'e', long)]
    pub encoding: Option<String>,

    /// Input sampling rate, defaults to the output rate
    #[arg(long = "inputrate")]
    pub input_rate: Option<u32>,

    /// Input channel count, defaults to the output channels
    #[arg(long = "inputch")]
    pub input_channels: Option<usize>,

    /// Input encoding, defaults to the output encoding (f32 for generators)
    #[arg(long = "inputenc")]
    pub input_encoding: Option<String>,

    /// Frames per processing block
    #[arg(long, default_value_t = DEFAULT_BLOCK)]
    pub block: usize,

    /// Mixing matrix, row-major gains for each output channel
    #[arg(long, allow_hyphen_values = true)]
    pub mix: Option<String>,

    /// Amplification in dB
    #[arg(short = 'P', long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub preamp: f64,

    /// Constant added after amplification
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub offset: f64,

    /// Clipping mode: implicit, hard or soft
    #[arg(long, default_value = "implicit")]
    pub clip: String,

    /// Resampler quality: fine or dirty
    #[arg(long = "resample", default_value = "fine")]
    pub resampler: String,

    /// Dither when converting to integer encodings
    #[arg(long)]
    pub dither: bool,

    /// Signal source: file, wave, sweep, pink, white or geiger
    #[arg(long)]
    pub source: Option<String>,

    /// Wave frequencies in Hz, comma separated
    #[arg(long)]
    pub wave_freq: Option<String>,

    /// Wave patterns (sine, square, triangle, sawtooth, gauss, pulse, shot, ...)
    #[arg(long = "wave-pat")]
    pub wave_patterns: Option<String>,

    /// Wave phases in turns; negative runs the wave backwards
    #[arg(long, allow_hyphen_values = true)]
    pub wave_phase: Option<String>,

    /// Wave directions; the sign overrides the phase sign
    #[arg(long, allow_hyphen_values = true)]
    pub wave_direction: Option<String>,

    /// Limit for periodic signal tables in samples
    #[arg(long = "wave-limit", default_value_t = DEFAULT_TABLE_LIMIT)]
    pub table_limit: usize,

    /// Sweep from the first wave frequency to this frequency
    #[arg(long)]
    pub wave_sweep: Option<f64>,

    /// Sweep curve: lin, quad or exp
    #[arg(long, default_value = "quad")]
    pub sweep_type: String,

    /// Sweep duration in seconds
    #[arg(long, default_value_t = 0.0)]
    pub sweep_time: f64,

    /// Do not smooth the sweep period end
    #[arg(long)]
    pub sweep_hard: bool,

    /// Play this many sweep periods
    #[arg(long)]
    pub sweep_count: Option<u64>,

    /// Pink noise rows (0 for the default)
    #[arg(long)]
    pub pink_rows: Option<usize>,

    /// Geiger counter clicks per second
    #[arg(long)]
    pub geiger_activity: Option<f64>,

    /// Stop after this many input samples
    #[arg(short = 'n', long)]
    pub timelimit: Option<u64>,

    /// Stop after this many seconds of input
    #[arg(short = 'T', long)]
    pub seconds: Option<f64>,

    /// Output driver: cpal, raw, wav or test
    #[arg(short = 'o', long = "output")]
    pub driver: Option<String>,

    /// Output device by substring match
    #[arg(short = 'a', long = "audiodevice")]
    pub device: Option<String>,

    /// Discard output
    #[arg(short = 't', long)]
    pub test: bool,

    /// Write raw PCM to stdout
    #[arg(short = 's', long)]
    pub stdout: bool,

    /// Also copy the played PCM to stdout
    #[arg(short = 'S', long = "STDOUT")]
    pub also_stdout: bool,

    /// Write raw PCM to a file
    #[arg(short = 'O', long)]
    pub outfile: Option<PathBuf>,

    /// Write a WAV file
    #[arg(short = 'w', long)]
    pub wav: Option<PathBuf>,

    /// Output buffer in kilobytes
    #[arg(short = 'b', long, default_value_t = 0)]
    pub buffer: usize,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// List sample encodings and exit
    #[arg(long)]
    pub list_encodings: bool,

    /// More diagnostics (repeat for more)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// No diagnostics at all
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Default log filter for the verbosity flags.
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "off",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, _) => "debug",
        }
    }

    fn signal_source(&self) -> String {
        if let Some(source) = &self.source {
            return source.clone();
        }
        let implied = if self.wave_sweep.is_some() {
            "sweep"
        } else if self.geiger_activity.is_some() {
            "geiger"
        } else if self.pink_rows.is_some() {
            "pink"
        } else if self.wave_freq.is_some() {
            "wave"
        } else {
            "file"
        };
        implied.to_string()
    }

    fn output_config(&self) -> OutputConfig {
        let (driver, path) = if self.test {
            ("test".to_string(), None)
        } else if let Some(wav) = &self.wav {
            ("wav".to_string(), Some(wav.clone()))
        } else if let Some(file) = &self.outfile {
            ("raw".to_string(), Some(file.clone()))
        } else if self.stdout {
            ("raw".to_string(), None)
        } else {
            let driver = self.driver.clone().unwrap_or_else(|| "cpal".to_string());
            (driver, None)
        };
        OutputConfig {
            driver,
            device: self.device.clone().filter(|d| !d.trim().is_empty()),
            path,
            buffer_bytes: self.buffer.saturating_mul(1024),
            also_stdout: self.also_stdout,
        }
    }
}

impl From<Args> for PlayerConfig {
    fn from(args: Args) -> Self {
        let channels = if args.mono {
            1
        } else if args.stereo {
            2
        } else {
            args.channels
        };
        let generator = GeneratorConfig {
            source: args.signal_source(),
            wave_freqs: args.wave_freq.clone(),
            wave_patterns: args.wave_patterns.clone(),
            wave_phases: args.wave_phase.clone(),
            wave_directions: args.wave_direction.clone(),
            table_limit: args.table_limit,
            pink_rows: args.pink_rows.unwrap_or(0),
            geiger_activity: args.geiger_activity.unwrap_or(DEFAULT_GEIGER_ACTIVITY),
            sweep_freq: args.wave_sweep.unwrap_or(0.0),
            sweep_type: args.sweep_type.clone(),
            sweep_time: args.sweep_time,
            sweep_hard: args.sweep_hard,
            sweep_count: args.sweep_count,
        };
        let output = args.output_config();
        PlayerConfig {
            format: FormatConfig {
                rate: args.rate,
                channels,
                encoding: args.encoding,
                input_rate: args.input_rate,
                input_channels: args.input_channels,
                input_encoding: args.input_encoding,
            },
            processing: ProcessingConfig {
                block: args.block,
                mix: args.mix,
                preamp_db: args.preamp,
                preamp_offset: args.offset,
                clip: args.clip,
                resampler: args.resampler,
                dither: args.dither,
            },
            generator,
            output,
            time_limit: TimeLimit {
                samples: args.timelimit,
                seconds: args.seconds,
            },
            input: args.input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(argv: &[&str]) -> PlayerConfig {
        let mut full = vec!["pcm-out"];
        full.extend_from_slice(argv);
        Args::parse_from(full).into()
    }

    #[test]
    fn defaults_play_stdin_on_cpal() {
        let cfg = config(&[]);
        assert_eq!(cfg.format.rate, 44_100);
        assert_eq!(cfg.format.channels, 2);
        assert_eq!(cfg.processing.block, 1152);
        assert_eq!(cfg.processing.clip, "implicit");
        assert_eq!(cfg.generator.source, "file");
        assert_eq!(cfg.output.driver, "cpal");
        assert_eq!(cfg.input, None);
    }

    #[test]
    fn source_follows_generator_options() {
        assert_eq!(config(&["--wave-freq", "440"]).generator.source, "wave");
        assert_eq!(
            config(&["--wave-freq", "100", "--wave-sweep", "1000"]).generator.source,
            "sweep"
        );
        assert_eq!(config(&["--pink-rows", "12"]).generator.source, "pink");
        assert_eq!(config(&["--geiger-activity", "3"]).generator.source, "geiger");
        assert_eq!(
            config(&["--wave-freq", "440", "--source", "white"]).generator.source,
            "white"
        );
    }

    #[test]
    fn negative_values_are_accepted() {
        let cfg = config(&[
            "--preamp",
            "-6",
            "--offset",
            "-0.5",
            "--wave-freq",
            "440,220",
            "--wave-phase",
            "-0.25,0.5",
            "--mix",
            "-1,1",
            "-m",
            "--inputch",
            "2",
        ]);
        assert_eq!(cfg.processing.preamp_db, -6.0);
        assert_eq!(cfg.processing.preamp_offset, -0.5);
        assert_eq!(cfg.generator.wave_phases.as_deref(), Some("-0.25,0.5"));
        assert_eq!(cfg.processing.mix.as_deref(), Some("-1,1"));
        assert_eq!(cfg.format.channels, 1);
    }

    #[test]
    fn output_shortcuts_pick_driver() {
        assert_eq!(config(&["-t"]).output.driver, "test");
        let raw = config(&["-s"]);
        assert_eq!((raw.output.driver.as_str(), raw.output.path), ("raw", None));
        let file = config(&["-O", "out.raw"]);
        assert_eq!(file.output.path, Some(PathBuf::from("out.raw")));
        let wav = config(&["-w", "out.wav", "-b", "64"]);
        assert_eq!(wav.output.driver, "wav");
        assert_eq!(wav.output.buffer_bytes, 64 * 1024);
        assert_eq!(config(&["-o", "raw"]).output.driver, "raw");
    }

    #[test]
    fn stdout_copy_keeps_driver() {
        let cfg = config(&["-S", "-o", "test"]);
        assert!(cfg.output.also_stdout);
        assert_eq!(cfg.output.driver, "test");
        assert!(config(&["--STDOUT"]).output.also_stdout);
        assert!(!config(&["-s"]).output.also_stdout);
    }

    #[test]
    fn dither_flag_is_carried() {
        assert!(config(&["--dither"]).processing.dither);
        assert!(!config(&[]).processing.dither);
    }

    #[test]
    fn time_limit_options_are_carried() {
        let cfg = config(&["-n", "1000", "-T", "2.5"]);
        assert_eq!(cfg.time_limit.samples, Some(1000));
        assert_eq!(cfg.time_limit.seconds, Some(2.5));
    }

    #[test]
    fn verbosity_selects_filter() {
        assert_eq!(Args::parse_from(["pcm-out"]).log_filter(), "warn");
        assert_eq!(Args::parse_from(["pcm-out", "-v"]).log_filter(), "info");
        assert_eq!(Args::parse_from(["pcm-out", "-vv"]).log_filter(), "debug");
        assert_eq!(Args::parse_from(["pcm-out", "-q"]).log_filter(), "off");
    }
}
