//! Processing pipeline planning.
//!
//! [`setup_processing`] decides once, before any audio flows, which stages run and
//! which buffers they need. The resulting [`PipelinePlan`] is immutable; the
//! executor only reads it.

use pcm_synth::Encoding;
use pcm_synth::convert::{db_to_linear, linear_to_db};
use pcm_synth::encoding::mix_encoding;
use pcm_synth::resample::{MAX_RESAMPLE_RATE, resample_count};

use crate::config::ProcessingConfig;
use crate::error::{ConfigError, PlayerError};
use crate::format::AudioFormat;
use crate::mixmat::MixMatrix;

/// Resampler output per block may not exceed this many nominal blocks.
pub const RESAMPLE_BUDGET_BLOCKS: usize = 10;
/// Smallest resampler input block in frames.
pub const MIN_RESAMPLE_BLOCK: usize = 128;

/// Resampler block sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResamplePlan {
    /// Input frames fed to the resampler per sub-block.
    pub block: usize,
    /// Worst-case output frames for one sub-block.
    pub out: usize,
}

/// Pick a resampler block so one block's output stays within the budget.
///
/// Starting from `block`, halve until the worst-case output fits into
/// [`RESAMPLE_BUDGET_BLOCKS`] nominal blocks, never going below [`MIN_RESAMPLE_BLOCK`].
pub fn plan_resample(in_rate: u32, out_rate: u32, block: usize) -> Result<ResamplePlan, ConfigError> {
    if in_rate > MAX_RESAMPLE_RATE || out_rate > MAX_RESAMPLE_RATE {
        return Err(ConfigError::ResampleRange { in_rate, out_rate });
    }
    let count = |frames: usize| {
        resample_count(in_rate, out_rate, frames).ok_or(ConfigError::ResampleCount)
    };
    let budget = block
        .checked_mul(RESAMPLE_BUDGET_BLOCKS)
        .ok_or(ConfigError::BlockTooLarge(block))?;
    let mut rblock = block;
    let mut out = count(rblock)?;
    while out > budget && rblock > MIN_RESAMPLE_BLOCK {
        rblock /= 2;
        out = count(rblock)?;
    }
    if rblock < MIN_RESAMPLE_BLOCK {
        rblock = MIN_RESAMPLE_BLOCK;
        out = count(rblock)?;
    }
    Ok(ResamplePlan { block: rblock, out })
}

/// How out-of-range samples are handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipMode {
    /// Leave it to the integer conversion.
    Implicit,
    Hard,
    Soft,
}

impl ClipMode {
    pub fn by_name(name: &str) -> Result<ClipMode, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "implicit" => Ok(ClipMode::Implicit),
            "hard" => Ok(ClipMode::Hard),
            "soft" => Ok(ClipMode::Soft),
            _ => Err(ConfigError::ClipMode(name.to_string())),
        }
    }
}

/// Explicit clipping stage run by the executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipStage {
    Hard,
    Soft,
}

/// Gain stage `y = factor * x + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Preamp {
    pub db: f64,
    pub factor: f64,
    pub offset: f64,
    /// The factor was folded into the mixing matrix; the stage is a no-op.
    pub folded: bool,
}

impl Preamp {
    /// Whether the executor still has to run this stage.
    pub fn is_active(&self) -> bool {
        !self.folded
    }
}

/// Where input samples are read to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferTopology {
    /// Input is read straight into the output buffer.
    SingleBuffer,
    /// Input has its own buffer in the input format.
    SplitBuffers,
}

/// Immutable description of the processing chain.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelinePlan {
    pub input: AudioFormat,
    pub output: AudioFormat,
    /// Nominal frames per block.
    pub block: usize,
    pub mix_matrix: Option<MixMatrix>,
    pub preamp: Option<Preamp>,
    pub clip: Option<ClipStage>,
    pub resample: Option<ResamplePlan>,
    pub topology: BufferTopology,
    /// Encoding of the intermediate buffer, if one is needed.
    pub intermediate: Option<Encoding>,
    /// Add TPDF noise before converting to an integer output encoding.
    pub dither: bool,
    /// Count of conversion, preamp, resample, clip and dither stages.
    pub op_count: usize,
}

/// Decide the processing chain from input to output format.
pub fn setup_processing(
    input: AudioFormat,
    output: AudioFormat,
    processing: &ProcessingConfig,
) -> Result<PipelinePlan, ConfigError> {
    if processing.block == 0 {
        return Err(ConfigError::NotPositive("block size"));
    }
    let block = processing.block;
    let mut op_count = 0;

    let resample = if input.rate != output.rate {
        op_count += 1;
        Some(plan_resample(input.rate, output.rate, block)?)
    } else {
        None
    };

    let mut mix_matrix = MixMatrix::build(input.channels, output.channels, processing.mix.as_deref())?;

    let topology = if input.encoding != output.encoding || mix_matrix.is_some() {
        op_count += 1;
        BufferTopology::SplitBuffers
    } else {
        BufferTopology::SingleBuffer
    };

    let preamp = if processing.preamp_db != 0.0 || processing.preamp_offset != 0.0 {
        op_count += 1;
        let factor = db_to_linear(processing.preamp_db);
        let mut preamp = Preamp {
            db: linear_to_db(factor),
            factor,
            offset: processing.preamp_offset,
            folded: false,
        };
        if let Some(matrix) = mix_matrix.as_mut().filter(|_| preamp.offset == 0.0) {
            matrix.scale(preamp.factor);
            preamp.factor = 1.0;
            preamp.folded = true;
        }
        Some(preamp)
    } else {
        None
    };

    let clip = match ClipMode::by_name(&processing.clip)? {
        ClipMode::Soft => Some(ClipStage::Soft),
        ClipMode::Hard if output.encoding.is_float() => Some(ClipStage::Hard),
        ClipMode::Hard | ClipMode::Implicit => None,
    };
    if clip.is_some() {
        op_count += 1;
    }

    let dither = processing.dither && !output.encoding.is_float();
    if dither {
        op_count += 1;
    }

    // Resampling and dithering both work on float samples.
    let intermediate = if resample.is_some() {
        Some(Encoding::Float32)
    } else if dither || op_count > 1 {
        Some(mix_encoding(input.encoding, output.encoding))
    } else {
        None
    };

    let plan = PipelinePlan {
        input,
        output,
        block,
        mix_matrix,
        preamp,
        clip,
        resample,
        topology,
        intermediate,
        dither,
        op_count,
    };
    if plan.buffer_sizes().is_none() {
        return Err(ConfigError::BlockTooLarge(block));
    }
    Ok(plan)
}

/// Working memory for one pipeline.
#[derive(Debug)]
pub struct PipelineBuffers {
    pub output: Vec<u8>,
    /// Present for [`BufferTopology::SplitBuffers`].
    pub input: Option<Vec<u8>>,
    pub intermediate: Option<IntermediateBuffers>,
}

/// Buffers of the intermediate path.
#[derive(Debug)]
pub struct IntermediateBuffers {
    pub encoding: Encoding,
    /// One block in output channels.
    pub mix: Vec<u8>,
    /// Resampler output, `f32`.
    pub resample: Option<Vec<u8>>,
}

/// Byte sizes behind [`PipelineBuffers`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BufferSizes {
    output: usize,
    input: Option<usize>,
    mix: Option<usize>,
    resample: Option<usize>,
}

impl PipelinePlan {
    /// Frames the output buffer must hold per push.
    pub fn output_frames(&self) -> usize {
        match self.resample {
            Some(r) => r.out.max(self.block),
            None => self.block,
        }
    }

    /// `None` when a size does not fit `usize`.
    fn buffer_sizes(&self) -> Option<BufferSizes> {
        let output = self.output.checked_bytes(self.output_frames())?;
        let input = match self.topology {
            BufferTopology::SplitBuffers => Some(self.input.checked_bytes(self.block)?),
            BufferTopology::SingleBuffer => None,
        };
        let mix = match self.intermediate {
            Some(encoding) => Some(
                self.block
                    .checked_mul(self.output.channels)?
                    .checked_mul(encoding.size())?,
            ),
            None => None,
        };
        let resample = match (self.intermediate, self.resample) {
            (Some(_), Some(r)) => Some(
                AudioFormat::new(self.output.rate, self.output.channels, Encoding::Float32)
                    .checked_bytes(r.out)?,
            ),
            _ => None,
        };
        Some(BufferSizes {
            output,
            input,
            mix,
            resample,
        })
    }

    /// Allocate every buffer the plan needs.
    pub fn allocate(&self) -> Result<PipelineBuffers, PlayerError> {
        let sizes = self
            .buffer_sizes()
            .ok_or(PlayerError::ResourceExhausted { bytes: usize::MAX })?;
        let output = alloc_bytes(sizes.output)?;
        let input = sizes.input.map(alloc_bytes).transpose()?;
        let intermediate = match (self.intermediate, sizes.mix) {
            (Some(encoding), Some(mix)) => {
                let mix = alloc_bytes(mix)?;
                let resample = sizes.resample.map(alloc_bytes).transpose()?;
                Some(IntermediateBuffers {
                    encoding,
                    mix,
                    resample,
                })
            }
            _ => None,
        };
        Ok(PipelineBuffers {
            output,
            input,
            intermediate,
        })
    }

    /// Log the chain at info level.
    pub fn log_summary(&self) {
        tracing::info!(input = %self.input, output = %self.output, block = self.block, "pipeline");
        if let Some(matrix) = &self.mix_matrix {
            for oc in 0..matrix.outputs() {
                tracing::info!(channel = oc, gains = ?matrix.row(oc), "mix");
            }
        }
        if let Some(p) = &self.preamp {
            tracing::info!(db = p.db, factor = p.factor, offset = p.offset, folded = p.folded, "preamp");
        }
        if let Some(r) = &self.resample {
            tracing::info!(block = r.block, out = r.out, "resampler");
        }
        if let Some(stage) = &self.clip {
            tracing::info!(?stage, "clip");
        }
        if self.dither {
            tracing::info!(encoding = %self.output.encoding, "dither");
        }
        tracing::info!(
            topology = ?self.topology,
            intermediate = ?self.intermediate.map(Encoding::name),
            ops = self.op_count,
            "buffers"
        );
    }
}

fn alloc_bytes(bytes: usize) -> Result<Vec<u8>, PlayerError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes)
        .map_err(|_| PlayerError::ResourceExhausted { bytes })?;
    buf.resize(bytes, 0);
    Ok(buf)
}
