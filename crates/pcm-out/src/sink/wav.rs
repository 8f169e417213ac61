use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use hound::{SampleFormat, WavSpec, WavWriter};
use pcm_synth::Encoding;

use super::OutputSink;
use crate::error::PlayerError;
use crate::format::AudioFormat;

/// RIFF WAVE file output.
///
/// Supports `s8`, `u8`, `s16`, `s24`, `s32` and `f32`. The header is completed on close,
/// also after an interrupt.
pub struct WavSink {
    path: PathBuf,
    encoding: Encoding,
    writer: Option<WavWriter<BufWriter<File>>>,
}

impl WavSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            encoding: Encoding::Signed16,
            writer: None,
        }
    }
}

fn wav_spec(format: &AudioFormat) -> Result<WavSpec, PlayerError> {
    let (bits_per_sample, sample_format) = match format.encoding {
        Encoding::Signed8 | Encoding::Unsigned8 => (8, SampleFormat::Int),
        Encoding::Signed16 => (16, SampleFormat::Int),
        Encoding::Signed24 => (24, SampleFormat::Int),
        Encoding::Signed32 => (32, SampleFormat::Int),
        Encoding::Float32 => (32, SampleFormat::Float),
        other => {
            return Err(PlayerError::Device(format!(
                "wav output does not support {other}"
            )));
        }
    };
    let channels = u16::try_from(format.channels)
        .map_err(|_| PlayerError::Device(format!("too many channels: {}", format.channels)))?;
    Ok(WavSpec {
        channels,
        sample_rate: format.rate,
        bits_per_sample,
        sample_format,
    })
}

fn wav_err(e: hound::Error) -> PlayerError {
    PlayerError::Device(format!("wav: {e}"))
}

fn read_i24(raw: &[u8]) -> i32 {
    let sign = if cfg!(target_endian = "little") {
        raw[2]
    } else {
        raw[0]
    } & 0x80;
    let ext = if sign != 0 { 0xff } else { 0x00 };
    if cfg!(target_endian = "little") {
        i32::from_le_bytes([raw[0], raw[1], raw[2], ext])
    } else {
        i32::from_be_bytes([ext, raw[0], raw[1], raw[2]])
    }
}

impl OutputSink for WavSink {
    fn name(&self) -> &str {
        "wav"
    }

    fn start(&mut self, format: &AudioFormat) -> Result<(), PlayerError> {
        let spec = wav_spec(format)?;
        let writer = WavWriter::create(&self.path, spec).map_err(wav_err)?;
        tracing::info!(path = %self.path.display(), %format, "wav output");
        self.encoding = format.encoding;
        self.writer = Some(writer);
        Ok(())
    }

    fn play(&mut self, buf: &[u8]) -> Result<usize, PlayerError> {
        let enc = self.encoding;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PlayerError::Device("output not started".to_string()))?;
        let size = enc.size();
        for raw in buf.chunks_exact(size) {
            let written = match enc {
                Encoding::Signed8 => writer.write_sample(raw[0] as i8),
                Encoding::Unsigned8 => writer.write_sample((raw[0] as i16 - 128) as i8),
                Encoding::Signed16 => writer.write_sample(i16::from_ne_bytes([raw[0], raw[1]])),
                Encoding::Signed24 => writer.write_sample(read_i24(raw)),
                Encoding::Float32 => {
                    writer.write_sample(f32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]))
                }
                _ => writer.write_sample(i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
            };
            written.map_err(wav_err)?;
        }
        Ok(buf.len() - buf.len() % size)
    }

    fn close(&mut self) -> Result<(), PlayerError> {
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(wav_err),
            None => Ok(()),
        }
    }
}
