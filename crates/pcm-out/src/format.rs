use std::fmt;

use pcm_synth::Encoding;

/// Rate, channel count and sample encoding of an interleaved PCM stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    pub rate: u32,
    pub channels: usize,
    pub encoding: Encoding,
}

impl AudioFormat {
    pub fn new(rate: u32, channels: usize, encoding: Encoding) -> Self {
        Self {
            rate,
            channels,
            encoding,
        }
    }

    /// Bytes per frame (one sample for every channel).
    pub fn frame_size(&self) -> usize {
        self.encoding.size() * self.channels
    }

    /// Bytes needed for `frames` frames.
    pub fn bytes(&self, frames: usize) -> usize {
        frames * self.frame_size()
    }

    /// [`bytes`](Self::bytes), or `None` on overflow.
    pub fn checked_bytes(&self, frames: usize) -> Option<usize> {
        frames.checked_mul(self.frame_size())
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}",
            self.rate, self.channels, self.encoding
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_covers_all_channels() {
        let fmt = AudioFormat::new(44_100, 2, Encoding::Signed16);
        assert_eq!(fmt.frame_size(), 4);
        assert_eq!(fmt.bytes(1152), 4608);
        assert_eq!(AudioFormat::new(8_000, 3, Encoding::Signed24).frame_size(), 9);
    }

    #[test]
    fn checked_bytes_catches_overflow() {
        let fmt = AudioFormat::new(44_100, 2, Encoding::Float64);
        assert_eq!(fmt.checked_bytes(1152), Some(1152 * 16));
        assert_eq!(fmt.checked_bytes(usize::MAX / 4), None);
    }
}
