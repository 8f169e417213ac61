use super::{Signal, WaveShape, wrap_phase};
use crate::error::SynthError;

/// Frequency curve of a sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepKind {
    Linear,
    Quadratic,
    Exponential,
}

impl SweepKind {
    /// Match on the first three letters (`lin`, `qua`, `exp`), like `linear` or `quad`.
    pub fn by_name(name: &str) -> Option<SweepKind> {
        let prefix = name.get(..3)?;
        match prefix.to_ascii_lowercase().as_str() {
            "lin" => Some(SweepKind::Linear),
            "qua" => Some(SweepKind::Quadratic),
            "exp" => Some(SweepKind::Exponential),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SweepKind::Linear => "linear",
            SweepKind::Quadratic => "quadratic",
            SweepKind::Exponential => "exponential",
        }
    }
}

/// Sweep generator parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepSpec {
    pub shape: WaveShape,
    /// Start phase in turns (non-negative).
    pub phase: f64,
    pub backwards: bool,
    pub kind: SweepKind,
    /// Start frequency in Hz.
    pub f1: f64,
    /// End frequency in Hz.
    pub f2: f64,
    /// Keep the phase running across period boundaries instead of resetting it.
    pub smooth: bool,
    /// Sweep duration in samples.
    pub duration: usize,
}

/// What a sweep setup settled on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepInfo {
    /// Samples per sweep repetition.
    pub period: usize,
    /// Phase reached at the end of one sweep.
    pub end_phase: f64,
}

/// Frequency sweep over a fixed duration, repeated.
pub struct Sweep {
    spec: SweepSpec,
    rate: f64,
    pos: usize,
    phase: f64,
    periodic: bool,
}

impl Sweep {
    pub fn new(rate: u32, spec: SweepSpec) -> Result<(Self, SweepInfo), SynthError> {
        if rate == 0 {
            return Err(SynthError::BadRate);
        }
        if spec.kind == SweepKind::Exponential && (spec.f1 <= 0.0 || spec.f2 <= 0.0) {
            return Err(SynthError::BadSweep {
                f1: spec.f1,
                f2: spec.f2,
            });
        }
        let spec = SweepSpec {
            phase: wrap_phase(spec.phase),
            duration: spec.duration.max(1),
            ..spec
        };
        let mut sweep = Self {
            spec,
            rate: rate as f64,
            pos: 0,
            phase: spec.phase,
            periodic: false,
        };

        let travel: f64 = (0..spec.duration).map(|t| sweep.step_at(t)).sum();
        let end_phase = wrap_phase(spec.phase + travel);
        let frac = travel.rem_euclid(1.0);
        sweep.periodic = !spec.smooth || frac < 1e-9 || 1.0 - frac < 1e-9;

        Ok((
            sweep,
            SweepInfo {
                period: spec.duration,
                end_phase,
            },
        ))
    }

    fn freq_at(&self, t: usize) -> f64 {
        let x = t as f64 / self.spec.duration as f64;
        let (f1, f2) = (self.spec.f1, self.spec.f2);
        match self.spec.kind {
            SweepKind::Linear => f1 + (f2 - f1) * x,
            SweepKind::Quadratic => f1 + (f2 - f1) * x * x,
            SweepKind::Exponential => f1 * (f2 / f1).powf(x),
        }
    }

    fn step_at(&self, t: usize) -> f64 {
        let step = self.freq_at(t) / self.rate;
        if self.spec.backwards { -step } else { step }
    }
}

impl Signal for Sweep {
    fn next_sample(&mut self) -> f64 {
        let v = self.spec.shape.value(self.phase);
        self.phase = wrap_phase(self.phase + self.step_at(self.pos));
        self.pos += 1;
        if self.pos == self.spec.duration {
            self.pos = 0;
            if !self.spec.smooth {
                self.phase = self.spec.phase;
            }
        }
        v
    }

    fn period(&self) -> Option<usize> {
        self.periodic.then_some(self.spec.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: SweepKind, smooth: bool) -> SweepSpec {
        SweepSpec {
            shape: WaveShape::Sine,
            phase: 0.0,
            backwards: false,
            kind,
            f1: 100.0,
            f2: 200.0,
            smooth,
            duration: 1000,
        }
    }

    #[test]
    fn kind_matches_prefix() {
        assert_eq!(SweepKind::by_name("linear"), Some(SweepKind::Linear));
        assert_eq!(SweepKind::by_name("quad"), Some(SweepKind::Quadratic));
        assert_eq!(SweepKind::by_name("EXPonential"), Some(SweepKind::Exponential));
        assert_eq!(SweepKind::by_name("cubic"), None);
        assert_eq!(SweepKind::by_name("ex"), None);
    }

    #[test]
    fn exponential_rejects_zero_start() {
        let mut s = spec(SweepKind::Exponential, true);
        s.f1 = 0.0;
        assert!(matches!(
            Sweep::new(48_000, s),
            Err(SynthError::BadSweep { .. })
        ));
    }

    #[test]
    fn hard_sweep_resets_phase_each_period() {
        let (mut sweep, info) = Sweep::new(48_000, spec(SweepKind::Linear, false)).unwrap();
        assert_eq!(info.period, 1000);
        assert_eq!(sweep.period(), Some(1000));
        let first: Vec<f64> = (0..1000).map(|_| sweep.next_sample()).collect();
        let second: Vec<f64> = (0..1000).map(|_| sweep.next_sample()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn frequency_curves_hit_endpoints() {
        let (sweep, _) = Sweep::new(48_000, spec(SweepKind::Quadratic, true)).unwrap();
        assert_eq!(sweep.freq_at(0), 100.0);
        assert!((sweep.freq_at(500) - 125.0).abs() < 1e-9);
        let (exp, _) = Sweep::new(48_000, spec(SweepKind::Exponential, true)).unwrap();
        assert!((exp.freq_at(500) - 100.0 * 2f64.sqrt()).abs() < 1e-9);
    }
}
