use super::OutputSink;
use crate::error::PlayerError;
use crate::format::AudioFormat;

/// Accepts and discards everything, counting bytes.
#[derive(Debug, Default)]
pub struct NullSink {
    written: u64,
}

impl NullSink {
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl OutputSink for NullSink {
    fn name(&self) -> &str {
        "test"
    }

    fn start(&mut self, format: &AudioFormat) -> Result<(), PlayerError> {
        tracing::debug!(%format, "test output");
        Ok(())
    }

    fn play(&mut self, buf: &[u8]) -> Result<usize, PlayerError> {
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn close(&mut self) -> Result<(), PlayerError> {
        tracing::debug!(bytes = self.written, "test output closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcm_synth::Encoding;

    #[test]
    fn counts_discarded_bytes() {
        let mut sink = NullSink::default();
        sink.start(&AudioFormat::new(8_000, 1, Encoding::Signed16)).unwrap();
        assert_eq!(sink.play(&[0u8; 10]).unwrap(), 10);
        assert_eq!(sink.play(&[0u8; 6]).unwrap(), 6);
        assert_eq!(sink.bytes_written(), 16);
        sink.close().unwrap();
    }
}
