//! Block-by-block playback through a [`PipelinePlan`].

use std::io::{Read, Write};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use pcm_synth::convert::{self, hard_clip, soft_clip};
use pcm_synth::{Dither, Encoding, Synth};

use crate::config::{DITHER_SEED, SOFT_CLIP_LIMIT, SOFT_CLIP_WIDTH};
use crate::error::PlayerError;
use crate::input::Source;
use crate::plan::{ClipStage, PipelineBuffers, PipelinePlan};
use crate::sink::OutputSink;

/// Where playback stands after a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Running,
    TimeLimitReached,
    SourceExhausted,
    Interrupted,
}

/// Consecutive `block`-sized ranges covering `0..total`; the last one may be shorter.
#[derive(Clone, Debug)]
pub struct SubBlocks {
    next: usize,
    total: usize,
    block: usize,
}

impl SubBlocks {
    pub fn new(total: usize, block: usize) -> Self {
        Self {
            next: 0,
            total,
            block: block.max(1),
        }
    }
}

impl Iterator for SubBlocks {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.next >= self.total {
            return None;
        }
        let end = (self.next + self.block).min(self.total);
        let range = self.next..end;
        self.next = end;
        Some(range)
    }
}

/// Drives input through the planned stages into a sink.
pub struct Executor<'a, R> {
    plan: &'a PipelinePlan,
    buffers: &'a mut PipelineBuffers,
    synth: &'a mut Synth,
    source: Source<R>,
    sink: &'a mut dyn OutputSink,
    /// Receives a copy of every block the sink gets.
    tee: Option<&'a mut dyn Write>,
    interrupt: &'a AtomicBool,
    dither: Option<Dither>,
    time_limit: Option<u64>,
    position: u64,
    clamped: u64,
}

impl<'a, R: Read> Executor<'a, R> {
    pub fn new(
        plan: &'a PipelinePlan,
        buffers: &'a mut PipelineBuffers,
        synth: &'a mut Synth,
        source: Source<R>,
        sink: &'a mut dyn OutputSink,
        interrupt: &'a AtomicBool,
    ) -> Self {
        let dither = if plan.dither {
            Dither::new(plan.output.encoding, DITHER_SEED)
        } else {
            None
        };
        Self {
            plan,
            buffers,
            synth,
            source,
            sink,
            tee: None,
            interrupt,
            dither,
            time_limit: None,
            position: 0,
            clamped: 0,
        }
    }

    /// Stop after `limit` input samples.
    pub fn with_time_limit(mut self, limit: Option<u64>) -> Self {
        self.time_limit = limit;
        self
    }

    /// Copy every pushed block to `tee` as well.
    pub fn with_tee(mut self, tee: &'a mut dyn Write) -> Self {
        self.tee = Some(tee);
        self
    }

    /// Input samples consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Output samples clamped during conversion so far.
    pub fn clamped_samples(&self) -> u64 {
        self.clamped
    }

    /// Play blocks until the source ends, the limit is hit or an interrupt arrives.
    ///
    /// On a regular end any input still held by the resampler is played out.
    pub fn run(&mut self) -> Result<PlaybackState, PlayerError> {
        loop {
            if self.interrupt.load(Ordering::Relaxed) {
                return Ok(PlaybackState::Interrupted);
            }
            match self.play_frame()? {
                PlaybackState::Running => continue,
                PlaybackState::Interrupted => return Ok(PlaybackState::Interrupted),
                done => {
                    self.flush_resampler()?;
                    if let Some(tee) = self.tee.as_mut() {
                        tee.flush().map_err(tee_error)?;
                    }
                    return Ok(done);
                }
            }
        }
    }

    /// Acquire, process and push one block.
    pub fn play_frame(&mut self) -> Result<PlaybackState, PlayerError> {
        let mut want = self.plan.block;
        if let Some(limit) = self.time_limit {
            if self.position >= limit {
                return Ok(PlaybackState::TimeLimitReached);
            }
            want = want.min(usize::try_from(limit - self.position).unwrap_or(usize::MAX));
        }

        let got = self.acquire(want)?;
        if got == 0 {
            if self.interrupt.load(Ordering::Relaxed) {
                return Ok(PlaybackState::Interrupted);
            }
            return Ok(PlaybackState::SourceExhausted);
        }

        let plan = self.plan;
        let (in_fmt, out_fmt) = (plan.input, plan.output);
        let out_ch = out_fmt.channels;
        let in_bytes = in_fmt.bytes(got);
        let out_bytes = out_fmt.bytes(got);
        let PipelineBuffers {
            output,
            input,
            intermediate,
        } = &mut *self.buffers;

        match intermediate {
            Some(inter) => {
                let mix_enc = inter.encoding;
                let mix = &mut inter.mix[..got * out_ch * mix_enc.size()];
                let src = match input.as_deref() {
                    Some(buf) => &buf[..in_bytes],
                    None => &output[..in_bytes],
                };
                self.clamped += match &plan.mix_matrix {
                    Some(m) => convert::mix(
                        mix,
                        mix_enc,
                        out_ch,
                        src,
                        in_fmt.encoding,
                        in_fmt.channels,
                        m.gains(),
                        got,
                    )?,
                    None => convert::convert(mix, mix_enc, src, in_fmt.encoding)?,
                } as u64;
                if let Some(p) = plan.preamp.filter(|p| p.is_active()) {
                    self.clamped +=
                        convert::amplify(mix, mix_enc, got * out_ch, p.factor, p.offset)? as u64;
                }

                match (plan.resample, inter.resample.as_mut()) {
                    (Some(rplan), Some(res)) => {
                        let mix_frame = out_ch * mix_enc.size();
                        for range in SubBlocks::new(got, rplan.block) {
                            let chunk = &mix[range.start * mix_frame..range.end * mix_frame];
                            let produced = self.synth.resample(res, chunk, range.len())?;
                            if produced == 0 {
                                continue;
                            }
                            let resampled = &mut res[..produced * out_ch * Encoding::Float32.size()];
                            let out = &mut output[..out_fmt.bytes(produced)];
                            self.clamped += finish_block(
                                plan.clip,
                                self.dither.as_mut(),
                                resampled,
                                Encoding::Float32,
                                out,
                                out_fmt.encoding,
                            )?;
                            if push_output(self.sink, self.tee.as_deref_mut(), out, self.interrupt)? {
                                return Ok(PlaybackState::Interrupted);
                            }
                        }
                        self.position += got as u64;
                        return Ok(PlaybackState::Running);
                    }
                    _ => {
                        self.clamped += finish_block(
                            plan.clip,
                            self.dither.as_mut(),
                            mix,
                            mix_enc,
                            &mut output[..out_bytes],
                            out_fmt.encoding,
                        )?;
                    }
                }
            }
            None => {
                let out = &mut output[..out_bytes];
                if let Some(inbuf) = input.as_deref() {
                    let src = &inbuf[..in_bytes];
                    self.clamped += match &plan.mix_matrix {
                        Some(m) => convert::mix(
                            out,
                            out_fmt.encoding,
                            out_ch,
                            src,
                            in_fmt.encoding,
                            in_fmt.channels,
                            m.gains(),
                            got,
                        )?,
                        None => convert::convert(out, out_fmt.encoding, src, in_fmt.encoding)?,
                    } as u64;
                }
                if let Some(p) = plan.preamp.filter(|p| p.is_active()) {
                    self.clamped += convert::amplify(
                        out,
                        out_fmt.encoding,
                        got * out_ch,
                        p.factor,
                        p.offset,
                    )? as u64;
                }
                self.clamped += apply_clip(plan.clip, out, out_fmt.encoding)?;
            }
        }

        let interrupted = push_output(
            self.sink,
            self.tee.as_deref_mut(),
            &output[..out_bytes],
            self.interrupt,
        )?;
        self.position += got as u64;
        if interrupted {
            Ok(PlaybackState::Interrupted)
        } else {
            Ok(PlaybackState::Running)
        }
    }

    fn acquire(&mut self, frames: usize) -> Result<usize, PlayerError> {
        let frame = self.plan.input.frame_size();
        let buf = match self.buffers.input.as_mut() {
            Some(buf) => buf,
            None => &mut self.buffers.output,
        };
        let dst = &mut buf[..frames * frame];
        match &mut self.source {
            Source::Generator => Ok(self.synth.read(dst) / frame),
            Source::Stream(reader) => Ok(reader.read_frames(dst, frame, frames, self.interrupt)?),
        }
    }

    /// Play out input the resampler still holds back.
    fn flush_resampler(&mut self) -> Result<(), PlayerError> {
        let plan = self.plan;
        let out_fmt = plan.output;
        let Some(res) = self
            .buffers
            .intermediate
            .as_mut()
            .and_then(|inter| inter.resample.as_mut())
        else {
            return Ok(());
        };
        let produced = self.synth.flush_resample(res)?;
        if produced == 0 {
            return Ok(());
        }
        let resampled = &mut res[..produced * out_fmt.channels * Encoding::Float32.size()];
        let out = &mut self.buffers.output[..out_fmt.bytes(produced)];
        self.clamped += finish_block(
            plan.clip,
            self.dither.as_mut(),
            resampled,
            Encoding::Float32,
            out,
            out_fmt.encoding,
        )?;
        push_output(self.sink, self.tee.as_deref_mut(), out, self.interrupt)?;
        Ok(())
    }
}

/// Clip and dither `work` in place, then convert it into `out`.
fn finish_block(
    clip: Option<ClipStage>,
    dither: Option<&mut Dither>,
    work: &mut [u8],
    work_enc: Encoding,
    out: &mut [u8],
    out_enc: Encoding,
) -> Result<u64, PlayerError> {
    let clipped = apply_clip(clip, work, work_enc)?;
    if let Some(dither) = dither {
        let samples = work.len() / work_enc.size();
        dither.apply(work, work_enc, samples)?;
    }
    let clamped = convert::convert(out, out_enc, work, work_enc)?;
    if clamped > 0 {
        tracing::debug!(clamped, "samples clamped on conversion");
    }
    Ok(clipped + clamped as u64)
}

fn apply_clip(clip: Option<ClipStage>, buf: &mut [u8], enc: Encoding) -> Result<u64, PlayerError> {
    let samples = buf.len() / enc.size();
    let clipped = match clip {
        Some(ClipStage::Hard) => hard_clip(buf, enc, samples)?,
        Some(ClipStage::Soft) => soft_clip(buf, enc, samples, SOFT_CLIP_LIMIT, SOFT_CLIP_WIDTH)?,
        None => 0,
    };
    if clipped > 0 {
        tracing::debug!(clipped, "samples clipped");
    }
    Ok(clipped as u64)
}

/// Hand a block to the sink and the tee; returns whether an interrupt is pending.
fn push_output(
    sink: &mut dyn OutputSink,
    tee: Option<&mut (dyn Write + '_)>,
    buf: &[u8],
    interrupt: &AtomicBool,
) -> Result<bool, PlayerError> {
    let accepted = sink.play(buf)?;
    if accepted < buf.len() && !interrupt.load(Ordering::Relaxed) {
        return Err(PlayerError::Device(format!(
            "short write: {accepted} of {} bytes",
            buf.len()
        )));
    }
    if let Some(tee) = tee {
        tee.write_all(buf).map_err(tee_error)?;
    }
    Ok(interrupt.load(Ordering::Relaxed))
}

fn tee_error(e: std::io::Error) -> PlayerError {
    PlayerError::Device(format!("stdout copy failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_blocks_cover_the_range() {
        let ranges: Vec<Range<usize>> = SubBlocks::new(300, 128).collect();
        assert_eq!(ranges, vec![0..128, 128..256, 256..300]);
    }

    #[test]
    fn sub_blocks_of_nothing_is_empty() {
        assert_eq!(SubBlocks::new(0, 128).count(), 0);
        assert_eq!(SubBlocks::new(5, 0).count(), 5);
    }

    #[test]
    fn soft_clip_bounds_float_blocks() {
        let mut buf: Vec<u8> = [2.0f32, -0.5].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let clipped = apply_clip(Some(ClipStage::Soft), &mut buf, Encoding::Float32).unwrap();
        assert_eq!(clipped, 1);
        let first = f32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert!(first < 1.0 && first > 0.97);
    }
}
