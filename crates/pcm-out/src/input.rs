use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where input frames come from.
pub enum Source<R> {
    /// Raw PCM in the input format.
    Stream(StreamReader<R>),
    /// The synthesis handle's generator.
    Generator,
}

/// Reads whole frames of raw PCM from a byte stream.
pub struct StreamReader<R> {
    inner: R,
}

impl<R: Read> StreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Fill up to `max_frames` frames of `frame_size` bytes into `buf`.
    ///
    /// Keeps reading until the request is met or the stream ends. A read
    /// interrupted by a signal is retried unless `interrupt` is set, in which
    /// case what was read so far is returned. A trailing partial frame is
    /// dropped. Returns the number of whole frames read.
    pub fn read_frames(
        &mut self,
        buf: &mut [u8],
        frame_size: usize,
        max_frames: usize,
        interrupt: &AtomicBool,
    ) -> io::Result<usize> {
        let want = (frame_size * max_frames).min(buf.len());
        let buf = &mut buf[..want];
        let mut filled = 0;
        while filled < want {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    if interrupt.load(Ordering::Relaxed) {
                        break;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(filled / frame_size.max(1))
    }
}

/// Open the raw input: a file, or stdin for `None` and `-`.
pub fn open_input(path: Option<&Path>) -> io::Result<Box<dyn Read>> {
    match path.filter(|p| *p != Path::new("-")) {
        Some(path) => Ok(Box::new(File::open(path)?)),
        None => Ok(Box::new(io::stdin().lock())),
    }
}
