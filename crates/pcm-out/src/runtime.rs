//! Player runtime.
//!
//! Resolves formats, plans the pipeline, sets up the generator and output, then
//! runs the executor. Every exit path goes through [`SinkGuard`], so the output
//! is released exactly once.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::executor::{Executor, PlaybackState};
use crate::format::AudioFormat;
use crate::input::{Source, StreamReader, open_input};
use crate::plan::setup_processing;
use crate::sink::{OutputSink, open_sink};
use crate::wavegen::setup_wavegen;

/// Play according to `config` until the input ends, the time limit is reached, or
/// `interrupt` is set.
pub fn run(config: &PlayerConfig, interrupt: Arc<AtomicBool>) -> Result<PlaybackState> {
    let generating = config.generator.generates();
    let (input, output) = config.format.resolve(generating).map_err(PlayerError::from)?;
    tracing::info!(%input, %output, generating, "formats");

    let plan = setup_processing(input, output, &config.processing).map_err(PlayerError::from)?;
    plan.log_summary();
    let mut buffers = plan.allocate()?;

    let time_limit = config.time_limit.resolve(input.rate);
    let (mut synth, setup) = setup_wavegen(
        &plan,
        &config.processing.resampler,
        &config.generator,
        time_limit,
    )?;

    let source: Source<Box<dyn Read>> = if generating {
        if let Some(path) = &config.input {
            tracing::warn!(path = %path.display(), "input file ignored while generating");
        }
        Source::Generator
    } else {
        let reader = open_input(config.input.as_deref())
            .map_err(PlayerError::from)
            .with_context(|| match &config.input {
                Some(path) => format!("open {}", path.display()),
                None => "open stdin".to_string(),
            })?;
        Source::Stream(StreamReader::new(reader))
    };

    let mut guard = SinkGuard::new(open_sink(&config.output)?);
    guard.start(&output)?;

    let mut stdout = io::stdout();
    let mut executor = Executor::new(
        &plan,
        &mut buffers,
        &mut synth,
        source,
        guard.sink(),
        &interrupt,
    )
    .with_time_limit(setup.time_limit);
    if config.output.also_stdout {
        executor = executor.with_tee(&mut stdout);
    }
    let state = executor.run()?;
    let (position, clamped) = (executor.position(), executor.clamped_samples());
    drop(executor);

    tracing::info!(?state, samples = position, clamped, "playback ended");
    if clamped > 0 {
        tracing::warn!(clamped, "samples were clamped");
    }

    match state {
        PlaybackState::Interrupted => guard.abort()?,
        _ => guard.finish(&interrupt)?,
    }
    Ok(state)
}

/// Owns the output sink and releases it on every path.
///
/// A guard that is dropped without [`finish`](SinkGuard::finish) or
/// [`abort`](SinkGuard::abort) discards buffered audio before closing.
pub struct SinkGuard {
    sink: Box<dyn OutputSink>,
    started: bool,
    released: bool,
}

impl SinkGuard {
    pub fn new(sink: Box<dyn OutputSink>) -> Self {
        Self {
            sink,
            started: false,
            released: false,
        }
    }

    pub fn start(&mut self, format: &AudioFormat) -> Result<(), PlayerError> {
        tracing::info!(driver = self.sink.name(), %format, "opening output");
        self.sink.start(format)?;
        self.started = true;
        Ok(())
    }

    pub fn sink(&mut self) -> &mut dyn OutputSink {
        self.sink.as_mut()
    }

    /// Let buffered audio play out, then close.
    pub fn finish(&mut self, interrupt: &AtomicBool) -> Result<(), PlayerError> {
        self.released = true;
        if !self.started {
            return Ok(());
        }
        if !interrupt.load(Ordering::Relaxed) && self.sink.buffered() > 0 {
            self.sink.drain(interrupt)?;
        }
        self.sink.close()
    }

    /// Discard buffered audio, then close.
    pub fn abort(&mut self) -> Result<(), PlayerError> {
        self.released = true;
        if !self.started {
            return Ok(());
        }
        self.sink.drop_buffered();
        self.sink.close()
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        if self.released || !self.started {
            return;
        }
        self.sink.drop_buffered();
        if let Err(e) = self.sink.close() {
            tracing::debug!("close after failure: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use pcm_synth::Encoding;

    #[derive(Default)]
    struct Calls(Mutex<Vec<&'static str>>);

    struct Tracked {
        calls: Arc<Calls>,
        buffered: usize,
    }

    impl Tracked {
        fn log(&self, call: &'static str) {
            self.calls.0.lock().unwrap().push(call);
        }
    }

    impl OutputSink for Tracked {
        fn name(&self) -> &str {
            "tracked"
        }
        fn start(&mut self, _format: &AudioFormat) -> Result<(), PlayerError> {
            self.log("start");
            Ok(())
        }
        fn play(&mut self, buf: &[u8]) -> Result<usize, PlayerError> {
            Ok(buf.len())
        }
        fn buffered(&self) -> usize {
            self.buffered
        }
        fn drop_buffered(&mut self) {
            self.log("drop");
        }
        fn drain(&mut self, _interrupt: &AtomicBool) -> Result<(), PlayerError> {
            self.log("drain");
            Ok(())
        }
        fn close(&mut self) -> Result<(), PlayerError> {
            self.log("close");
            Ok(())
        }
    }

    fn guard(buffered: usize) -> (SinkGuard, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let mut guard = SinkGuard::new(Box::new(Tracked {
            calls: calls.clone(),
            buffered,
        }));
        guard
            .start(&AudioFormat::new(8_000, 1, Encoding::Signed16))
            .unwrap();
        (guard, calls)
    }

    fn recorded(calls: &Calls) -> Vec<&'static str> {
        calls.0.lock().unwrap().clone()
    }

    #[test]
    fn finish_drains_buffered_audio() {
        let (mut g, calls) = guard(64);
        g.finish(&AtomicBool::new(false)).unwrap();
        drop(g);
        assert_eq!(recorded(&calls), vec!["start", "drain", "close"]);
    }

    #[test]
    fn finish_skips_drain_when_empty_or_interrupted() {
        let (mut g, calls) = guard(0);
        g.finish(&AtomicBool::new(false)).unwrap();
        assert_eq!(recorded(&calls), vec!["start", "close"]);

        let (mut g, calls) = guard(64);
        g.finish(&AtomicBool::new(true)).unwrap();
        assert_eq!(recorded(&calls), vec!["start", "close"]);
    }

    #[test]
    fn abort_drops_buffered_audio() {
        let (mut g, calls) = guard(64);
        g.abort().unwrap();
        drop(g);
        assert_eq!(recorded(&calls), vec!["start", "drop", "close"]);
    }

    #[test]
    fn dropped_guard_releases_once() {
        let (g, calls) = guard(64);
        drop(g);
        assert_eq!(recorded(&calls), vec!["start", "drop", "close"]);
    }

    #[test]
    fn generated_tone_plays_to_test_output() {
        let mut config = PlayerConfig::default();
        config.generator.source = "wave".into();
        config.generator.wave_freqs = Some("1000".into());
        config.output.driver = "test".into();
        config.time_limit.samples = Some(4410);
        let state = run(&config, Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(state, PlaybackState::TimeLimitReached);
    }

    #[test]
    fn bad_clip_mode_surfaces_player_error() {
        let mut config = PlayerConfig::default();
        config.generator.source = "white".into();
        config.output.driver = "test".into();
        config.processing.clip = "brickwall".into();
        let err = run(&config, Arc::new(AtomicBool::new(false))).unwrap_err();
        let player = err.downcast_ref::<PlayerError>().unwrap();
        assert_eq!(player.exit_code(), 135);
    }
}
