use std::f64::consts::TAU;

use super::{Signal, wrap_phase};

/// Periodic waveform shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveShape {
    Flat,
    Sine,
    Square,
    Triangle,
    Sawtooth,
    Gauss,
    Pulse,
    Shot,
}

impl WaveShape {
    pub const ALL: [WaveShape; 8] = [
        WaveShape::Flat,
        WaveShape::Sine,
        WaveShape::Square,
        WaveShape::Triangle,
        WaveShape::Sawtooth,
        WaveShape::Gauss,
        WaveShape::Pulse,
        WaveShape::Shot,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WaveShape::Flat => "flat",
            WaveShape::Sine => "sine",
            WaveShape::Square => "square",
            WaveShape::Triangle => "triangle",
            WaveShape::Sawtooth => "sawtooth",
            WaveShape::Gauss => "gauss",
            WaveShape::Pulse => "pulse",
            WaveShape::Shot => "shot",
        }
    }

    pub fn by_name(name: &str) -> Option<WaveShape> {
        let needle = name.trim();
        WaveShape::ALL
            .into_iter()
            .find(|shape| shape.name().eq_ignore_ascii_case(needle))
    }

    /// Waveform value at `phase` (in turns, [0, 1)).
    pub fn value(self, phase: f64) -> f64 {
        match self {
            WaveShape::Flat => 0.0,
            WaveShape::Sine => (TAU * phase).sin(),
            WaveShape::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            WaveShape::Triangle => {
                if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                }
            }
            WaveShape::Sawtooth => {
                if phase < 0.5 {
                    2.0 * phase
                } else {
                    2.0 * phase - 2.0
                }
            }
            WaveShape::Gauss => {
                let d = phase - 0.5;
                (-d * d / (2.0 * 0.1 * 0.1)).exp()
            }
            WaveShape::Pulse => {
                if phase < 0.05 {
                    1.0
                } else {
                    0.0
                }
            }
            WaveShape::Shot => (-10.0 * phase).exp(),
        }
    }
}

/// One oscillator of a wave bank.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveSpec {
    pub shape: WaveShape,
    /// Frequency in Hz.
    pub freq: f64,
    /// Start phase in turns (non-negative).
    pub phase: f64,
    /// Run the waveform backwards in time.
    pub backwards: bool,
}

impl Default for WaveSpec {
    fn default() -> Self {
        Self {
            shape: WaveShape::Sine,
            freq: 440.0,
            phase: 0.0,
            backwards: false,
        }
    }
}

struct Oscillator {
    shape: WaveShape,
    step: f64,
    phase: f64,
    period: Option<usize>,
}

/// Product of several oscillators.
pub struct WaveBank {
    oscillators: Vec<Oscillator>,
}

impl WaveBank {
    pub fn new(rate: u32, waves: &[WaveSpec]) -> Self {
        let defaults = [WaveSpec::default()];
        let waves = if waves.is_empty() { &defaults[..] } else { waves };
        let oscillators = waves
            .iter()
            .map(|w| {
                let step = w.freq / rate as f64;
                Oscillator {
                    shape: w.shape,
                    step: if w.backwards { -step } else { step },
                    phase: wrap_phase(w.phase),
                    period: integer_period(rate, w.freq),
                }
            })
            .collect();
        Self { oscillators }
    }
}

impl Signal for WaveBank {
    fn next_sample(&mut self) -> f64 {
        let mut v = 1.0;
        for osc in &mut self.oscillators {
            v *= osc.shape.value(osc.phase);
            osc.phase = wrap_phase(osc.phase + osc.step);
        }
        v
    }

    fn period(&self) -> Option<usize> {
        self.oscillators
            .iter()
            .try_fold(1usize, |acc, osc| lcm(acc, osc.period?))
    }
}

/// Period of `freq` at `rate` when it is a whole number of samples.
fn integer_period(rate: u32, freq: f64) -> Option<usize> {
    let freq = freq.abs();
    if freq == 0.0 {
        return Some(1);
    }
    let period = rate as f64 / freq;
    let rounded = period.round();
    if rounded >= 1.0 && (period - rounded).abs() <= 1e-9 * period {
        Some(rounded as usize)
    } else {
        None
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: usize, b: usize) -> Option<usize> {
    (a / gcd(a, b)).checked_mul(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_names_roundtrip() {
        for shape in WaveShape::ALL {
            assert_eq!(WaveShape::by_name(shape.name()), Some(shape));
        }
        assert_eq!(WaveShape::by_name("SINE"), Some(WaveShape::Sine));
        assert_eq!(WaveShape::by_name("wobble"), None);
    }

    #[test]
    fn sine_quarter_phase_peaks() {
        assert!((WaveShape::Sine.value(0.25) - 1.0).abs() < 1e-12);
        assert_eq!(WaveShape::Square.value(0.75), -1.0);
        assert!((WaveShape::Triangle.value(0.25) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn integer_periods_combine_by_lcm() {
        let bank = WaveBank::new(
            48_000,
            &[
                WaveSpec { freq: 1_000.0, ..WaveSpec::default() },
                WaveSpec { freq: 1_500.0, ..WaveSpec::default() },
            ],
        );
        assert_eq!(bank.period(), Some(96));
    }

    #[test]
    fn irrational_period_is_live() {
        let bank = WaveBank::new(44_100, &[WaveSpec { freq: 441.7, ..WaveSpec::default() }]);
        assert_eq!(bank.period(), None);
    }

    #[test]
    fn backwards_runs_phase_in_reverse() {
        let rate = 8;
        let mut fwd = WaveBank::new(rate, &[WaveSpec { freq: 1.0, ..WaveSpec::default() }]);
        let mut rev = WaveBank::new(
            rate,
            &[WaveSpec { freq: 1.0, backwards: true, ..WaveSpec::default() }],
        );
        fwd.next_sample();
        rev.next_sample();
        let a = fwd.next_sample();
        let b = rev.next_sample();
        assert!((a + b).abs() < 1e-12);
    }

    #[test]
    fn empty_bank_defaults_to_sine() {
        let mut bank = WaveBank::new(44_100, &[]);
        assert_eq!(bank.next_sample(), 0.0);
        assert!(bank.next_sample() > 0.0);
    }
}
