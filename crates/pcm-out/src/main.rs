//! pcm-out: play raw PCM or generated test signals.
//!
//! ## Pipeline
//! 1. **Plan**: formats are resolved and the processing chain is decided once.
//! 2. **Acquire**: blocks come from a raw PCM stream or the signal generator.
//! 3. **Process**: mix, amplify, resample, clip and convert as planned.
//! 4. **Output**: blocks go to the selected sink (CPAL device, raw file, WAV or test).
//!
//! Ctrl-C sets an interrupt flag; playback stops after the current push and
//! buffered audio is dropped instead of drained.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;
use pcm_out::cli::Args;
use pcm_out::config::PlayerConfig;
use pcm_out::error::PlayerError;
use pcm_out::{device, runtime};
use pcm_synth::Encoding;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter())),
        )
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            let code = e
                .downcast_ref::<PlayerError>()
                .map(PlayerError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(args: Args) -> Result<()> {
    if args.list_encodings {
        list_encodings();
        return Ok(());
    }
    if args.list_devices {
        device::list_devices(&cpal::default_host())?;
        return Ok(());
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = interrupt.clone();
        if let Err(e) = ctrlc::set_handler(move || interrupt.store(true, Ordering::Relaxed)) {
            tracing::warn!("signal handler not installed: {e}");
        }
    }

    let config = PlayerConfig::from(args);
    let state = runtime::run(&config, interrupt)?;
    tracing::debug!(?state, "done");
    Ok(())
}

fn list_encodings() {
    for enc in Encoding::ALL {
        println!("{:<4} {}", enc.name(), enc.long_name());
    }
}
