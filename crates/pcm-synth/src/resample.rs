//! Streaming resample stage.
//!
//! Uses Rubato to convert interleaved 32-bit float audio from the input rate to the
//! output rate in fixed-size input chunks. The caller sizes its output buffer with
//! [`resample_count`] for the chunk size it configured; no call yields more.

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::error::SynthError;

/// Highest sampling rate the resampler accepts on either side.
pub const MAX_RESAMPLE_RATE: u32 = 8_388_608;

/// Extra output frames allowed per call on top of the exact ratio.
const RESAMPLE_HEADROOM: usize = 16;

/// Bytes per resampled sample (always 32-bit float).
const SAMPLE_BYTES: usize = 4;

/// Worst-case output frames for one call with `in_frames` input frames.
///
/// Returns `None` for zero rates or counts, or when the result does not fit `usize`.
pub fn resample_count(in_rate: u32, out_rate: u32, in_frames: usize) -> Option<usize> {
    if in_rate == 0 || out_rate == 0 || in_frames == 0 {
        return None;
    }
    let num = (in_frames as u128).checked_mul(out_rate as u128)?;
    let exact = num.div_ceil(in_rate as u128);
    usize::try_from(exact)
        .ok()?
        .checked_add(RESAMPLE_HEADROOM)
}

/// Quality/CPU trade-off of the resampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResampleQuality {
    /// Long sinc with cubic interpolation.
    Fine,
    /// Short sinc with linear interpolation.
    Dirty,
}

impl ResampleQuality {
    pub fn by_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("fine") {
            Some(ResampleQuality::Fine)
        } else if name.eq_ignore_ascii_case("dirty") {
            Some(ResampleQuality::Dirty)
        } else {
            None
        }
    }

    fn params(self) -> SincInterpolationParameters {
        let (sinc_len, oversampling_factor, interpolation) = match self {
            ResampleQuality::Fine => (128, 256, SincInterpolationType::Cubic),
            ResampleQuality::Dirty => (32, 64, SincInterpolationType::Linear),
        };
        let window = WindowFunction::BlackmanHarris2;
        SincInterpolationParameters {
            sinc_len,
            f_cutoff: calculate_cutoff(sinc_len, window),
            interpolation,
            oversampling_factor,
            window,
        }
    }
}

/// Fixed-input-chunk resampler over interleaved `f32` byte buffers.
///
/// Input is collected until a whole chunk is available, so each call resamples at
/// most one chunk. A short remainder only goes through the filter on [`flush`].
///
/// [`flush`]: StreamResampler::flush
pub struct StreamResampler {
    resampler: Box<dyn Resampler<f32>>,
    channels: usize,
    chunk_frames: usize,
    pending: Vec<f32>,
    output: Vec<f32>,
}

impl StreamResampler {
    /// Build a resampler converting `in_rate` to `out_rate` in chunks of `chunk_frames`.
    pub fn new(
        in_rate: u32,
        out_rate: u32,
        channels: usize,
        chunk_frames: usize,
        quality: ResampleQuality,
    ) -> Result<Self, SynthError> {
        if in_rate == 0 || out_rate == 0 {
            return Err(SynthError::BadRate);
        }
        if in_rate > MAX_RESAMPLE_RATE || out_rate > MAX_RESAMPLE_RATE {
            return Err(SynthError::ResampleRange { in_rate, out_rate });
        }
        if channels == 0 {
            return Err(SynthError::NoChannels);
        }
        let chunk_frames = chunk_frames.max(1);
        let f_ratio = out_rate as f64 / in_rate as f64;

        let resampler = Async::<f32>::new_sinc(
            f_ratio,
            1.0,
            &quality.params(),
            chunk_frames,
            channels,
            FixedAsync::Input,
        )
        .map_err(|e| SynthError::Resampler(format!("{e:#}")))?;

        let out_frames = resampler.output_frames_max();
        tracing::debug!(
            in_rate,
            out_rate,
            channels,
            chunk_frames,
            out_frames,
            ?quality,
            "resampler ready"
        );

        Ok(Self {
            resampler: Box::new(resampler),
            channels,
            chunk_frames,
            pending: Vec::with_capacity(2 * chunk_frames * channels),
            output: vec![0.0; out_frames * channels],
        })
    }

    /// Frames waiting for a complete chunk.
    pub fn pending_frames(&self) -> usize {
        self.pending.len() / self.channels
    }

    /// Feed `frames` interleaved frames from `input`, writing any output into `out`.
    ///
    /// `frames` must not exceed the chunk size. Returns the number of frames written,
    /// which is 0 while a chunk is still incomplete.
    pub fn process(
        &mut self,
        out: &mut [u8],
        input: &[u8],
        frames: usize,
    ) -> Result<usize, SynthError> {
        if frames == 0 {
            return Ok(0);
        }
        if frames > self.chunk_frames {
            return Err(SynthError::BufferTooSmall {
                needed: frames * self.channels * SAMPLE_BYTES,
                available: self.chunk_frames * self.channels * SAMPLE_BYTES,
            });
        }
        let in_samples = frames * self.channels;
        if input.len() < in_samples * SAMPLE_BYTES {
            return Err(SynthError::BufferTooSmall {
                needed: in_samples * SAMPLE_BYTES,
                available: input.len(),
            });
        }
        self.pending.extend(
            input[..in_samples * SAMPLE_BYTES]
                .chunks_exact(SAMPLE_BYTES)
                .map(|raw| f32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
        );

        let chunk_samples = self.chunk_frames * self.channels;
        if self.pending.len() < chunk_samples {
            return Ok(0);
        }
        let produced = self.run_chunk(out, self.chunk_frames)?;
        self.pending.drain(..chunk_samples);
        Ok(produced)
    }

    /// Push the incomplete remainder through the filter as a partial chunk.
    pub fn flush(&mut self, out: &mut [u8]) -> Result<usize, SynthError> {
        let frames = self.pending_frames();
        if frames == 0 {
            return Ok(0);
        }
        let produced = self.run_chunk(out, frames)?;
        self.pending.clear();
        Ok(produced)
    }

    fn run_chunk(&mut self, out: &mut [u8], frames: usize) -> Result<usize, SynthError> {
        let in_samples = frames * self.channels;
        let input_adapter =
            InterleavedSlice::new(&self.pending[..in_samples], self.channels, frames)
                .map_err(|e| SynthError::Resampler(format!("interleaved slice (input): {e:#}")))?;

        let out_capacity_frames = self.output.len() / self.channels;
        let mut output_adapter =
            InterleavedSlice::new_mut(&mut self.output, self.channels, out_capacity_frames)
                .map_err(|e| SynthError::Resampler(format!("interleaved slice (output): {e:#}")))?;

        let indexing = Indexing {
            input_offset: 0,
            output_offset: 0,
            active_channels_mask: None,
            partial_len: (frames < self.chunk_frames).then_some(frames),
        };

        let (_nbr_in, nbr_out) = self
            .resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))
            .map_err(|e| SynthError::Resampler(format!("{e:#}")))?;

        let produced = nbr_out * self.channels;
        if out.len() < produced * SAMPLE_BYTES {
            return Err(SynthError::BufferTooSmall {
                needed: produced * SAMPLE_BYTES,
                available: out.len(),
            });
        }
        for (value, raw) in self.output[..produced]
            .iter()
            .zip(out.chunks_exact_mut(SAMPLE_BYTES))
        {
            raw.copy_from_slice(&value.to_ne_bytes());
        }
        Ok(nbr_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_count_rounds_up_with_headroom() {
        assert_eq!(resample_count(48_000, 48_000, 1152), Some(1152 + RESAMPLE_HEADROOM));
        assert_eq!(resample_count(44_100, 48_000, 441), Some(480 + RESAMPLE_HEADROOM));
        assert_eq!(resample_count(3, 1, 10), Some(4 + RESAMPLE_HEADROOM));
    }

    #[test]
    fn resample_count_rejects_zero() {
        assert_eq!(resample_count(0, 48_000, 1), None);
        assert_eq!(resample_count(48_000, 0, 1), None);
        assert_eq!(resample_count(48_000, 48_000, 0), None);
    }

    #[test]
    fn quality_names_are_case_insensitive() {
        assert_eq!(ResampleQuality::by_name("FINE"), Some(ResampleQuality::Fine));
        assert_eq!(ResampleQuality::by_name("dirty"), Some(ResampleQuality::Dirty));
        assert_eq!(ResampleQuality::by_name("best"), None);
    }

    #[test]
    fn new_rejects_out_of_range_rates() {
        let err = StreamResampler::new(MAX_RESAMPLE_RATE + 1, 48_000, 2, 256, ResampleQuality::Fine)
            .err()
            .unwrap();
        assert!(matches!(err, SynthError::ResampleRange { .. }));
    }

    #[test]
    fn process_output_stays_within_count() {
        let (in_rate, out_rate, chunk) = (8_000, 44_100, 256);
        let mut rs = StreamResampler::new(in_rate, out_rate, 1, chunk, ResampleQuality::Dirty)
            .unwrap();
        let limit = resample_count(in_rate, out_rate, chunk).unwrap();
        let input: Vec<u8> = (0..chunk)
            .flat_map(|i| ((i as f32 * 0.01).sin()).to_ne_bytes())
            .collect();
        let mut out = vec![0u8; limit * SAMPLE_BYTES];
        let mut total = 0;
        for _ in 0..8 {
            let produced = rs.process(&mut out, &input, chunk).unwrap();
            assert!(produced <= limit);
            total += produced;
        }
        assert!(total > 0);
    }

    #[test]
    fn short_input_waits_for_a_full_chunk() {
        let chunk = 128;
        let mut rs = StreamResampler::new(8_000, 16_000, 2, chunk, ResampleQuality::Dirty)
            .unwrap();
        let half: Vec<u8> = vec![0u8; chunk / 2 * 2 * SAMPLE_BYTES];
        let mut out = vec![0u8; resample_count(8_000, 16_000, chunk).unwrap() * 2 * SAMPLE_BYTES];

        assert_eq!(rs.process(&mut out, &half, chunk / 2).unwrap(), 0);
        assert_eq!(rs.pending_frames(), chunk / 2);
        rs.process(&mut out, &half, chunk / 2).unwrap();
        assert_eq!(rs.pending_frames(), 0);
    }

    #[test]
    fn flush_drains_the_remainder() {
        let chunk = 128;
        let mut rs = StreamResampler::new(8_000, 16_000, 1, chunk, ResampleQuality::Dirty)
            .unwrap();
        let mut out = vec![0u8; resample_count(8_000, 16_000, chunk).unwrap() * SAMPLE_BYTES];
        let input = vec![0u8; 10 * SAMPLE_BYTES];
        rs.process(&mut out, &input, 10).unwrap();
        rs.flush(&mut out).unwrap();
        assert_eq!(rs.pending_frames(), 0);
        assert_eq!(rs.flush(&mut out).unwrap(), 0);
    }

    #[test]
    fn process_rejects_oversized_input() {
        let mut rs = StreamResampler::new(8_000, 16_000, 1, 128, ResampleQuality::Dirty).unwrap();
        let mut out = vec![0u8; 4096];
        let input = vec![0u8; 200 * SAMPLE_BYTES];
        assert!(matches!(
            rs.process(&mut out, &input, 200),
            Err(SynthError::BufferTooSmall { .. })
        ));
    }
}
