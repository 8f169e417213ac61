//! Signal generator setup from player options.

use pcm_synth::Synth;
use pcm_synth::generator::{SweepKind, SweepSpec, WaveShape, WaveSpec};
use pcm_synth::resample::ResampleQuality;

use crate::config::{GENERATOR_SEED, GeneratorConfig};
use crate::error::{ConfigError, PlayerError};
use crate::plan::PipelinePlan;
use crate::tokenize::{Tokens, carry_forward, carry_forward_with, parse_number, token_count};

/// Signal sources the player can read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalSource {
    File,
    Wave,
    Sweep,
    Pink,
    White,
    Geiger,
}

impl SignalSource {
    pub fn by_name(name: &str) -> Result<SignalSource, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "file" => Ok(SignalSource::File),
            "wave" => Ok(SignalSource::Wave),
            "sweep" => Ok(SignalSource::Sweep),
            "pink" => Ok(SignalSource::Pink),
            "white" => Ok(SignalSource::White),
            "geiger" => Ok(SignalSource::Geiger),
            _ => Err(ConfigError::SignalSource(name.to_string())),
        }
    }
}

/// What generator setup decided beyond the handle itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorSetup {
    /// Periodic table length, 0 for live synthesis or no generator.
    pub common: usize,
    /// Time limit in input samples after the generator had its say.
    pub time_limit: Option<u64>,
}

/// Create the synthesis handle: resampler when the plan needs one, and the
/// configured generator unless the source is a file.
pub fn setup_wavegen(
    plan: &PipelinePlan,
    resampler: &str,
    generator: &GeneratorConfig,
    time_limit: Option<u64>,
) -> Result<(Synth, GeneratorSetup), PlayerError> {
    let source = SignalSource::by_name(&generator.source)?;
    let table_limit = match source {
        SignalSource::File => 0,
        _ => generator.table_limit,
    };
    let input = plan.input;
    let mut synth = Synth::new(input.rate, input.channels, input.encoding, table_limit)?;

    if let Some(rplan) = plan.resample {
        let quality = ResampleQuality::by_name(resampler)
            .ok_or_else(|| ConfigError::Resampler(resampler.to_string()))?;
        synth.setup_resample(
            input.rate,
            plan.output.rate,
            plan.output.channels,
            rplan.block,
            quality,
        )?;
    }

    let mut setup = GeneratorSetup {
        common: 0,
        time_limit,
    };
    match source {
        SignalSource::File => return Ok((synth, setup)),
        SignalSource::Wave => {
            let waves = parse_waves(generator)?;
            if waves.is_empty() {
                tracing::info!("wave: default sine");
            }
            for (i, w) in waves.iter().enumerate() {
                tracing::info!(
                    wave = i,
                    shape = w.shape.name(),
                    freq = w.freq,
                    phase = w.phase,
                    backwards = w.backwards,
                    "wave"
                );
            }
            setup.common = synth.setup_waves(&waves)?;
        }
        SignalSource::Sweep => {
            let spec = parse_sweep(generator, input.rate, time_limit)?;
            tracing::info!(
                shape = spec.shape.name(),
                kind = spec.kind.name(),
                f1 = spec.f1,
                f2 = spec.f2,
                duration = spec.duration,
                smooth = spec.smooth,
                "sweep"
            );
            let (info, common) = synth.setup_sweep(&spec)?;
            tracing::info!(period = info.period, end_phase = info.end_phase, "sweep period");
            if let Some(count) = generator.sweep_count {
                setup.time_limit = Some(count.saturating_mul(info.period as u64));
            }
            setup.common = common;
        }
        SignalSource::Pink => {
            setup.common = synth.setup_pink(generator.pink_rows, GENERATOR_SEED)?;
            tracing::info!(rows = generator.pink_rows, "pink noise");
        }
        SignalSource::White => {
            setup.common = synth.setup_white(GENERATOR_SEED)?;
            tracing::info!("white noise");
        }
        SignalSource::Geiger => {
            setup.common = synth.setup_geiger(generator.geiger_activity, GENERATOR_SEED)?;
            tracing::info!(activity = generator.geiger_activity, "geiger");
        }
    }

    if setup.common > 0 {
        tracing::info!(samples = setup.common, "periodic signal table");
    } else {
        tracing::info!("live signal generation");
    }
    Ok((synth, setup))
}

/// Wave list from the frequency, pattern, phase and direction options.
///
/// The frequency list sets the wave count; the other lists carry their last value
/// forward. A negative phase runs the wave backwards unless a direction list says
/// otherwise.
pub fn parse_waves(generator: &GeneratorConfig) -> Result<Vec<WaveSpec>, ConfigError> {
    let count = token_count(generator.wave_freqs.as_deref());
    let freqs = carry_forward(generator.wave_freqs.as_deref(), count, 0.0, parse_number);
    let shapes = carry_forward(
        generator.wave_patterns.as_deref(),
        count,
        Ok(WaveShape::Sine),
        parse_shape,
    );
    // (phase, backwards); a carried phase keeps its magnitude but not its sign.
    let phases = carry_forward_with(
        generator.wave_phases.as_deref(),
        count,
        (0.0, false),
        |t| {
            let phase = parse_number(t);
            (phase.abs(), phase < 0.0)
        },
        |&(phase, _)| (phase, false),
    );
    let directions = generator
        .wave_directions
        .as_deref()
        .map(|list| carry_forward(Some(list), count, false, |t| parse_number(t) < 0.0));

    let mut waves = Vec::with_capacity(count);
    for i in 0..count {
        let shape = shapes[i].clone().map_err(|name| {
            tracing::warn!("bad wave pattern: {name}");
            ConfigError::WavePattern(name)
        })?;
        let backwards = match &directions {
            Some(dirs) => dirs[i],
            None => phases[i].1,
        };
        waves.push(WaveSpec {
            shape,
            freq: freqs[i],
            phase: phases[i].0,
            backwards,
        });
    }
    Ok(waves)
}

/// Sweep parameters from the first token of each wave option.
///
/// Duration comes from the sweep time, else the time limit, else one second.
pub fn parse_sweep(
    generator: &GeneratorConfig,
    rate: u32,
    time_limit: Option<u64>,
) -> Result<SweepSpec, ConfigError> {
    let kind = SweepKind::by_name(&generator.sweep_type)
        .ok_or_else(|| ConfigError::SweepType(generator.sweep_type.clone()))?;
    let f1 = first_token(generator.wave_freqs.as_deref()).map_or(0.0, parse_number);
    let shape = match first_token(generator.wave_patterns.as_deref()) {
        Some(name) => parse_shape(name).map_err(|name| {
            tracing::warn!("bad wave pattern: {name}");
            ConfigError::WavePattern(name)
        })?,
        None => WaveShape::Sine,
    };
    let phase = first_token(generator.wave_phases.as_deref()).map_or(0.0, parse_number);
    let backwards = match first_token(generator.wave_directions.as_deref()) {
        Some(dir) => parse_number(dir) < 0.0,
        None => phase < 0.0,
    };

    let duration = if generator.sweep_time > 0.0 {
        (generator.sweep_time * rate as f64) as usize
    } else {
        time_limit.map_or(rate as usize, |limit| limit as usize)
    };

    Ok(SweepSpec {
        shape,
        phase: phase.abs(),
        backwards,
        kind,
        f1,
        f2: generator.sweep_freq,
        smooth: !generator.sweep_hard,
        duration,
    })
}

fn first_token(list: Option<&str>) -> Option<&str> {
    list.and_then(|s| Tokens::new(s).next())
        .filter(|t| !t.is_empty())
}

fn parse_shape(token: &str) -> Result<WaveShape, String> {
    WaveShape::by_name(token).ok_or_else(|| token.to_string())
}
