//! CPAL output sink.
//!
//! `play()` decodes each block to `f32` and pushes it into a bounded queue. The
//! real-time callback:
//! - refills a small local buffer from the queue without blocking
//! - applies basic channel mapping when the device channel count differs
//! - converts `f32` samples to the device sample format

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use pcm_synth::convert::decode_f32;

use super::OutputSink;
use crate::device::{pick_buffer_size, pick_device, pick_output_config};
use crate::error::PlayerError;
use crate::format::AudioFormat;
use crate::queue::{SharedAudio, calc_max_buffered_samples};

/// Queue length when no buffer size was requested.
const DEFAULT_BUFFER_SECONDS: f32 = 0.5;
/// Frames pulled from the queue per callback refill.
const REFILL_MAX_FRAMES: usize = 4096;
/// Grace period for the device to play its own buffer after the queue drained.
const DRAIN_SETTLE: Duration = Duration::from_millis(150);

/// System audio output through CPAL.
pub struct CpalSink {
    device: Option<String>,
    buffer_bytes: usize,
    format: Option<AudioFormat>,
    queue: Option<Arc<SharedAudio>>,
    stream: Option<cpal::Stream>,
    scratch: Vec<f32>,
    underrun_frames: Arc<AtomicU64>,
    underrun_events: Arc<AtomicU64>,
}

impl CpalSink {
    /// `device` selects an output by name substring; `None` uses the default device.
    pub fn new(device: Option<String>) -> Self {
        Self {
            device,
            buffer_bytes: 0,
            format: None,
            queue: None,
            stream: None,
            scratch: Vec::new(),
            underrun_frames: Arc::new(AtomicU64::new(0)),
            underrun_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl OutputSink for CpalSink {
    fn name(&self) -> &str {
        "cpal"
    }

    fn set_buffer(&mut self, bytes: usize) {
        self.buffer_bytes = bytes;
    }

    fn start(&mut self, format: &AudioFormat) -> Result<(), PlayerError> {
        let host = cpal::default_host();
        let device = pick_device(&host, self.device.as_deref())?;
        let config = pick_output_config(&device, format.rate, format.channels)?;
        let mut stream_config: cpal::StreamConfig = config.clone().into();
        if let Some(buf) = pick_buffer_size(&config, None) {
            stream_config.buffer_size = buf;
        }
        match device.description() {
            Ok(desc) => tracing::info!(device = %desc, "output device"),
            Err(e) => tracing::debug!("device description unavailable: {e}"),
        }
        tracing::info!(
            rate_hz = stream_config.sample_rate,
            channels = stream_config.channels,
            sample_format = ?config.sample_format(),
            buffer_size = ?stream_config.buffer_size,
            "device output config"
        );
        if stream_config.sample_rate != format.rate {
            tracing::warn!(
                requested = format.rate,
                device = stream_config.sample_rate,
                "device does not support the output rate; playback speed will differ"
            );
        }

        let capacity = if self.buffer_bytes > 0 {
            self.buffer_bytes / format.encoding.size()
        } else {
            calc_max_buffered_samples(format.rate, format.channels, DEFAULT_BUFFER_SECONDS)
        };
        let queue = Arc::new(SharedAudio::new(format.channels, capacity));
        let stream = build_output_stream(
            &device,
            &stream_config,
            config.sample_format(),
            &queue,
            UnderrunCounters {
                frames: self.underrun_frames.clone(),
                events: self.underrun_events.clone(),
            },
        )?;
        stream
            .play()
            .map_err(|e| PlayerError::Device(format!("start stream: {e}")))?;

        self.format = Some(*format);
        self.queue = Some(queue);
        self.stream = Some(stream);
        Ok(())
    }

    fn play(&mut self, buf: &[u8]) -> Result<usize, PlayerError> {
        let (Some(queue), Some(format)) = (&self.queue, self.format) else {
            return Err(PlayerError::Device("output not started".to_string()));
        };
        decode_f32(buf, format.encoding, &mut self.scratch);
        let pushed = queue.push_blocking(&self.scratch);
        Ok(pushed * format.encoding.size())
    }

    fn buffered(&self) -> usize {
        match (&self.queue, self.format) {
            (Some(queue), Some(format)) => queue.len_frames() * format.frame_size(),
            _ => 0,
        }
    }

    fn drop_buffered(&mut self) {
        if let Some(queue) = &self.queue {
            queue.clear();
        }
    }

    fn drain(&mut self, interrupt: &AtomicBool) -> Result<(), PlayerError> {
        if let Some(queue) = &self.queue {
            if queue.wait_until_empty_or_cancel(interrupt) {
                std::thread::sleep(DRAIN_SETTLE);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), PlayerError> {
        if let Some(queue) = self.queue.take() {
            queue.close();
        }
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("pause on close: {e}");
            }
        }
        let events = self.underrun_events.load(Ordering::Relaxed);
        if events > 0 {
            tracing::debug!(
                events,
                frames = self.underrun_frames.load(Ordering::Relaxed),
                "output underruns"
            );
        }
        Ok(())
    }
}

struct UnderrunCounters {
    frames: Arc<AtomicU64>,
    events: Arc<AtomicU64>,
}

/// Build a CPAL output stream that plays audio from `queue`.
///
/// Underruns are filled with silence. The callback never waits on the queue.
fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SharedAudio>,
    counters: UnderrunCounters,
) -> Result<cpal::Stream, PlayerError> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, counters),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, counters),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, counters),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, counters),
        other => Err(PlayerError::Device(format!(
            "unsupported device sample format: {other:?}"
        ))),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SharedAudio>,
    counters: UnderrunCounters,
) -> Result<cpal::Stream, PlayerError>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = (config.channels as usize).max(1);
    let state = Mutex::new(CallbackState {
        pos: 0,
        src_channels: queue.channels(),
        src: Vec::new(),
    });
    let queue_cb = queue.clone();

    let err_fn = |err| tracing::warn!("stream error: {err}");

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                let mut st = state.lock().unwrap_or_else(PoisonError::into_inner);
                let frames = data.len() / channels_out;

                for frame in 0..frames {
                    if st.pos >= st.src.len() {
                        st.pos = 0;
                        match queue_cb.pop_up_to(REFILL_MAX_FRAMES) {
                            Some(v) => st.src = v,
                            None => {
                                st.src.clear();
                                counters.events.fetch_add(1, Ordering::Relaxed);
                                counters
                                    .frames
                                    .fetch_add((frames - frame) as u64, Ordering::Relaxed);
                                data[frame * channels_out..]
                                    .fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
                                return;
                            }
                        }
                    }
                    for ch in 0..channels_out {
                        let sample = next_sample_mapped(&mut st, channels_out, ch);
                        data[frame * channels_out + ch] =
                            <T as cpal::Sample>::from_sample::<f32>(sample);
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| PlayerError::Device(format!("build output stream: {e}")))
}

/// Samples fetched from the queue, consumed frame by frame.
struct CallbackState {
    pos: usize,
    src_channels: usize,
    src: Vec<f32>,
}

/// Read one device sample for `dst_ch`, mapping source channels onto the device.
///
/// Mono is duplicated, stereo to mono is averaged, other layouts clamp to the last
/// source channel. `pos` advances after the last device channel of a frame.
fn next_sample_mapped(st: &mut CallbackState, dst_channels: usize, dst_ch: usize) -> f32 {
    if st.pos >= st.src.len() {
        return 0.0;
    }
    let frame_start = st.pos;
    let get_src = |ch: usize, st: &CallbackState| -> f32 {
        st.src.get(frame_start + ch).copied().unwrap_or(0.0)
    };

    let out = match (st.src_channels, dst_channels) {
        (2, 1) => 0.5 * (get_src(0, st) + get_src(1, st)),
        (src, _) => get_src(dst_ch.min(src.saturating_sub(1)), st),
    };

    if dst_ch + 1 == dst_channels {
        st.pos += st.src_channels;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(src_channels: usize, src: Vec<f32>) -> CallbackState {
        CallbackState {
            pos: 0,
            src_channels,
            src,
        }
    }

    fn render(st: &mut CallbackState, dst_channels: usize, frames: usize) -> Vec<f32> {
        let mut out = Vec::new();
        for _ in 0..frames {
            for ch in 0..dst_channels {
                out.push(next_sample_mapped(st, dst_channels, ch));
            }
        }
        out
    }

    #[test]
    fn mono_is_duplicated_to_stereo() {
        let mut st = state(1, vec![0.1, 0.2]);
        assert_eq!(render(&mut st, 2, 2), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let mut st = state(2, vec![0.2, 0.4, -1.0, 1.0]);
        let out = render(&mut st, 1, 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn wider_device_repeats_last_channel() {
        let mut st = state(2, vec![0.1, 0.2]);
        assert_eq!(render(&mut st, 4, 1), vec![0.1, 0.2, 0.2, 0.2]);
    }

    #[test]
    fn exhausted_source_is_silent() {
        let mut st = state(2, vec![0.5, 0.5]);
        assert_eq!(render(&mut st, 2, 2), vec![0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn play_before_start_fails() {
        let mut sink = CpalSink::new(None);
        assert!(matches!(sink.play(&[0u8; 4]), Err(PlayerError::Device(_))));
        assert_eq!(sink.buffered(), 0);
    }
}
