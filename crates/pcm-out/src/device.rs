//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL for:
//! - listing available output devices
//! - selecting either the default device or a device by substring match
//! - choosing the stream config closest to the requested output format

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::PlayerError;

/// Largest fixed device buffer we ask for, in frames.
const MAX_BUFFER_FRAMES: u32 = 16_384;

/// Pick the first output device matching `needle` (case-insensitive), or the default device.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device, PlayerError> {
    let needle = needle.map(str::trim).filter(|n| !n.is_empty());
    if let Some(needle) = needle {
        let mut devices = host
            .output_devices()
            .map_err(|e| PlayerError::Device(format!("no output devices: {e}")))?;
        return devices
            .find(|d| {
                d.description()
                    .ok()
                    .map(|n| matches_device_name(&n.name(), needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| PlayerError::Device(format!("no output device matched: {needle}")));
    }

    host.default_output_device()
        .ok_or_else(|| PlayerError::Device("no default output device".to_string()))
}

/// Choose the supported config closest to `rate` and `channels`.
///
/// Ranges with the requested channel count win; within those, the rate nearest
/// the target (preferring at or below it), then the best sample format.
pub fn pick_output_config(
    device: &cpal::Device,
    rate: u32,
    channels: usize,
) -> Result<cpal::SupportedStreamConfig, PlayerError> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| PlayerError::Device(format!("supported configs: {e}")))?;

    let mut best: Option<(Candidate, cpal::SupportedStreamConfig)> = None;
    for range in ranges {
        let chosen = pick_rate_for_range(range.min_sample_rate(), range.max_sample_rate(), rate);
        let candidate = Candidate {
            channels_match: range.channels() as usize == channels,
            exact: chosen == rate,
            below: chosen <= rate,
            rate: chosen,
            format_rank: sample_format_rank(range.sample_format()),
        };
        if best.as_ref().is_none_or(|(b, _)| candidate.is_better_than(b)) {
            best = Some((candidate, range.with_sample_rate(chosen)));
        }
    }

    best.map(|(_, cfg)| cfg)
        .ok_or_else(|| PlayerError::Device("no supported output configs".to_string()))
}

/// Fixed buffer of `wanted` frames clamped to the device range, or `None` for the
/// device default.
pub fn pick_buffer_size(
    config: &cpal::SupportedStreamConfig,
    wanted: Option<u32>,
) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            let target = wanted.unwrap_or(*max).min(MAX_BUFFER_FRAMES);
            Some(cpal::BufferSize::Fixed(target.clamp(*min, (*max).max(*min))))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Print available output devices to stdout.
pub fn list_devices(host: &cpal::Host) -> Result<(), PlayerError> {
    let devices = host
        .output_devices()
        .map_err(|e| PlayerError::Device(format!("no output devices: {e}")))?;
    for (i, d) in devices.enumerate() {
        let name = d
            .description()
            .map(|desc| desc.to_string())
            .unwrap_or_else(|_| "<unnamed>".to_string());
        match rate_span(&d) {
            Some((min, max)) => println!("#{i}: {name} ({min}-{max} Hz)"),
            None => println!("#{i}: {name}"),
        }
    }
    Ok(())
}

fn rate_span(device: &cpal::Device) -> Option<(u32, u32)> {
    let (min, max) = device
        .supported_output_configs()
        .ok()?
        .fold((u32::MAX, 0), |(lo, hi), r| {
            (lo.min(r.min_sample_rate()), hi.max(r.max_sample_rate()))
        });
    (max >= min && max > 0).then_some((min, max))
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    channels_match: bool,
    exact: bool,
    below: bool,
    rate: u32,
    format_rank: u8,
}

impl Candidate {
    fn is_better_than(&self, other: &Candidate) -> bool {
        if self.channels_match != other.channels_match {
            self.channels_match
        } else if self.exact != other.exact {
            self.exact
        } else if self.below != other.below {
            self.below
        } else if self.rate != other.rate {
            // Below the target the higher rate is closer, above it the lower one.
            if self.below {
                self.rate > other.rate
            } else {
                self.rate < other.rate
            }
        } else {
            self.format_rank < other.format_rank
        }
    }
}

fn pick_rate_for_range(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max.max(min))
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(channels_match: bool, rate: u32, target: u32, format_rank: u8) -> Candidate {
        Candidate {
            channels_match,
            exact: rate == target,
            below: rate <= target,
            rate,
            format_rank,
        }
    }

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", "USB"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", ""));
    }

    #[test]
    fn pick_rate_for_range_prefers_target_when_in_range() {
        assert_eq!(pick_rate_for_range(44_100, 96_000, 48_000), 48_000);
    }

    #[test]
    fn pick_rate_for_range_clamps() {
        assert_eq!(pick_rate_for_range(44_100, 96_000, 22_050), 44_100);
        assert_eq!(pick_rate_for_range(44_100, 96_000, 192_000), 96_000);
    }

    #[test]
    fn matching_channels_beat_exact_rate() {
        let stereo = candidate(true, 48_000, 44_100, 2);
        let mono_exact = candidate(false, 44_100, 44_100, 0);
        assert!(stereo.is_better_than(&mono_exact));
    }

    #[test]
    fn exact_rate_beats_closer_format() {
        let exact = candidate(true, 44_100, 44_100, 2);
        let other = candidate(true, 48_000, 44_100, 0);
        assert!(exact.is_better_than(&other));
    }

    #[test]
    fn nearest_rate_wins_on_each_side() {
        assert!(candidate(true, 32_000, 44_100, 0).is_better_than(&candidate(true, 22_050, 44_100, 0)));
        assert!(candidate(true, 48_000, 44_100, 0).is_better_than(&candidate(true, 96_000, 44_100, 0)));
        assert!(candidate(true, 32_000, 44_100, 0).is_better_than(&candidate(true, 48_000, 44_100, 0)));
    }

    #[test]
    fn lower_format_rank_breaks_ties() {
        let float = candidate(true, 44_100, 44_100, 0);
        let short = candidate(true, 44_100, 44_100, 2);
        assert!(float.is_better_than(&short));
        assert!(!short.is_better_than(&float));
    }
}
