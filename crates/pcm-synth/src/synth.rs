//! The synthesis handle: signal generation plus the stateful resampler.

use crate::encoding::{Encoding, write_sample};
use crate::error::SynthError;
use crate::generator::{
    Generator, Geiger, PinkNoise, Sweep, SweepInfo, SweepSpec, WaveBank, WaveSpec, WhiteNoise,
};
use crate::resample::{ResampleQuality, StreamResampler};

/// Handle owning the active generator and resampler.
///
/// Generated samples are written in the handle's encoding with the same signal on
/// every channel. Dropping the handle releases both stages.
pub struct Synth {
    rate: u32,
    channels: usize,
    encoding: Encoding,
    table_limit: usize,
    generator: Option<Generator>,
    resampler: Option<StreamResampler>,
}

impl Synth {
    /// Create a handle producing `channels` channels at `rate` in `encoding`.
    ///
    /// `table_limit` caps the periodic lookup table in samples (0 disables tables).
    pub fn new(
        rate: u32,
        channels: usize,
        encoding: Encoding,
        table_limit: usize,
    ) -> Result<Self, SynthError> {
        if rate == 0 {
            return Err(SynthError::BadRate);
        }
        if channels == 0 {
            return Err(SynthError::NoChannels);
        }
        Ok(Self {
            rate,
            channels,
            encoding,
            table_limit,
            generator: None,
            resampler: None,
        })
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Bytes per generated frame.
    pub fn frame_size(&self) -> usize {
        self.encoding.size() * self.channels
    }

    /// Whether a generator has been configured.
    pub fn is_generating(&self) -> bool {
        self.generator.is_some()
    }

    /// Multiply the given oscillators together; an empty list plays a 440 Hz sine.
    ///
    /// Returns the periodic table length (0 for live synthesis).
    pub fn setup_waves(&mut self, waves: &[WaveSpec]) -> Result<usize, SynthError> {
        let bank = WaveBank::new(self.rate, waves);
        Ok(self.install(Generator::new(Box::new(bank), self.table_limit)))
    }

    /// Configure a repeating frequency sweep.
    pub fn setup_sweep(&mut self, spec: &SweepSpec) -> Result<(SweepInfo, usize), SynthError> {
        let (sweep, info) = Sweep::new(self.rate, *spec)?;
        let common = self.install(Generator::new(Box::new(sweep), self.table_limit));
        Ok((info, common))
    }

    pub fn setup_white(&mut self, seed: u64) -> Result<usize, SynthError> {
        Ok(self.install(Generator::new(Box::new(WhiteNoise::new(seed)), 0)))
    }

    /// Pink noise with `rows` generator rows (0 picks the default).
    pub fn setup_pink(&mut self, rows: usize, seed: u64) -> Result<usize, SynthError> {
        Ok(self.install(Generator::new(Box::new(PinkNoise::new(rows, seed)), 0)))
    }

    /// Random clicks averaging `activity` events per second.
    pub fn setup_geiger(&mut self, activity: f64, seed: u64) -> Result<usize, SynthError> {
        let geiger = Geiger::new(self.rate, activity, seed);
        Ok(self.install(Generator::new(Box::new(geiger), 0)))
    }

    /// Prepare resampling from `in_rate` to `out_rate` in chunks of `chunk_frames`.
    pub fn setup_resample(
        &mut self,
        in_rate: u32,
        out_rate: u32,
        channels: usize,
        chunk_frames: usize,
        quality: ResampleQuality,
    ) -> Result<(), SynthError> {
        self.resampler = Some(StreamResampler::new(
            in_rate,
            out_rate,
            channels,
            chunk_frames,
            quality,
        )?);
        Ok(())
    }

    /// Fill `buf` with whole frames of generated signal, returning the bytes written.
    ///
    /// Returns 0 when no generator is configured.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let Some(generator) = self.generator.as_mut() else {
            return 0;
        };
        let size = self.encoding.size();
        let frame = size * self.channels;
        let frames = buf.len() / frame;
        for out in buf[..frames * frame].chunks_exact_mut(frame) {
            let v = generator.next_sample();
            for sample in out.chunks_exact_mut(size) {
                write_sample(self.encoding, v, sample);
            }
        }
        frames * frame
    }

    /// Resample `frames` frames of interleaved `f32` bytes from `input` into `out`.
    pub fn resample(
        &mut self,
        out: &mut [u8],
        input: &[u8],
        frames: usize,
    ) -> Result<usize, SynthError> {
        self.resampler
            .as_mut()
            .ok_or(SynthError::NoResampler)?
            .process(out, input, frames)
    }

    /// Resample whatever input is still waiting for a complete chunk.
    pub fn flush_resample(&mut self, out: &mut [u8]) -> Result<usize, SynthError> {
        self.resampler
            .as_mut()
            .ok_or(SynthError::NoResampler)?
            .flush(out)
    }

    fn install(&mut self, generator: Generator) -> usize {
        let common = generator.common_period();
        self.generator = Some(generator);
        common
    }
}
