use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::OutputSink;
use crate::error::PlayerError;
use crate::format::AudioFormat;

const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Headerless PCM written to a file, or stdout when no path (or `-`) is given.
pub struct RawSink {
    path: Option<PathBuf>,
    capacity: usize,
    writer: Option<BufWriter<Box<dyn Write>>>,
}

impl RawSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.filter(|p| p != Path::new("-")),
            capacity: DEFAULT_CAPACITY,
            writer: None,
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<Box<dyn Write>>, PlayerError> {
        self.writer
            .as_mut()
            .ok_or_else(|| PlayerError::Device("output not started".to_string()))
    }
}

impl OutputSink for RawSink {
    fn name(&self) -> &str {
        "raw"
    }

    fn set_buffer(&mut self, bytes: usize) {
        if bytes > 0 {
            self.capacity = bytes;
        }
    }

    fn start(&mut self, format: &AudioFormat) -> Result<(), PlayerError> {
        let inner: Box<dyn Write> = match &self.path {
            Some(path) => Box::new(File::create(path).map_err(|e| {
                PlayerError::Device(format!("create {}: {e}", path.display()))
            })?),
            None => Box::new(io::stdout()),
        };
        tracing::info!(path = ?self.path, %format, "raw output");
        self.writer = Some(BufWriter::with_capacity(self.capacity, inner));
        Ok(())
    }

    fn play(&mut self, buf: &[u8]) -> Result<usize, PlayerError> {
        self.writer()?
            .write_all(buf)
            .map_err(|e| PlayerError::Device(format!("write: {e}")))?;
        Ok(buf.len())
    }

    fn buffered(&self) -> usize {
        self.writer.as_ref().map_or(0, |w| w.buffer().len())
    }

    fn drop_buffered(&mut self) {
        if let Some(writer) = self.writer.take() {
            let (inner, _discarded) = writer.into_parts();
            self.writer = Some(BufWriter::with_capacity(self.capacity, inner));
        }
    }

    fn drain(&mut self, _interrupt: &std::sync::atomic::AtomicBool) -> Result<(), PlayerError> {
        self.writer()?
            .flush()
            .map_err(|e| PlayerError::Device(format!("flush: {e}")))
    }

    fn close(&mut self) -> Result<(), PlayerError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| PlayerError::Device(format!("flush: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcm_synth::Encoding;
    use std::sync::atomic::AtomicBool;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pcm-out-{}-{name}", std::process::id()))
    }

    #[test]
    fn writes_blocks_verbatim() {
        let path = temp_path("raw-verbatim");
        let mut sink = RawSink::new(Some(path.clone()));
        sink.start(&AudioFormat::new(8_000, 1, Encoding::Signed16)).unwrap();
        assert_eq!(sink.play(&[1, 2, 3, 4]).unwrap(), 4);
        sink.play(&[5, 6]).unwrap();
        sink.drain(&AtomicBool::new(false)).unwrap();
        sink.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn drop_buffered_discards_unflushed_bytes() {
        let path = temp_path("raw-drop");
        let mut sink = RawSink::new(Some(path.clone()));
        sink.start(&AudioFormat::new(8_000, 1, Encoding::Unsigned8)).unwrap();
        sink.play(&[9; 16]).unwrap();
        assert_eq!(sink.buffered(), 16);
        sink.drop_buffered();
        assert_eq!(sink.buffered(), 0);
        sink.close().unwrap();
        assert!(std::fs::read(&path).unwrap().is_empty());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn dash_means_stdout() {
        let sink = RawSink::new(Some(PathBuf::from("-")));
        assert!(sink.path.is_none());
    }
}
