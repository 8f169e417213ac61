//! Test-signal generators.
//!
//! Every generator yields a mono stream of `f64` samples in the nominal range [-1, 1].
//! Signals with an exact integer period that fits the table limit are rendered once
//! into a lookup table and replayed; everything else is synthesized live.

mod noise;
mod sweep;
mod wave;

pub use noise::{Geiger, PinkNoise, WhiteNoise};
pub use sweep::{Sweep, SweepInfo, SweepKind, SweepSpec};
pub use wave::{WaveBank, WaveShape, WaveSpec};

/// A mono sample source.
pub(crate) trait Signal: Send {
    fn next_sample(&mut self) -> f64;

    /// Exact period in samples, if the signal repeats.
    fn period(&self) -> Option<usize> {
        None
    }
}

/// A configured signal, either replayed from a table or generated live.
pub(crate) struct Generator {
    signal: Box<dyn Signal>,
    table: Vec<f64>,
    pos: usize,
}

impl Generator {
    /// Wrap `signal`, rendering its period into a table when it fits `table_limit` samples.
    pub(crate) fn new(mut signal: Box<dyn Signal>, table_limit: usize) -> Self {
        let table = match signal.period() {
            Some(period) if period > 0 && period <= table_limit => {
                (0..period).map(|_| signal.next_sample()).collect()
            }
            _ => Vec::new(),
        };
        Self {
            signal,
            table,
            pos: 0,
        }
    }

    /// Length of the lookup table, 0 for live generation.
    pub(crate) fn common_period(&self) -> usize {
        self.table.len()
    }

    pub(crate) fn next_sample(&mut self) -> f64 {
        if self.table.is_empty() {
            return self.signal.next_sample();
        }
        let v = self.table[self.pos];
        self.pos = (self.pos + 1) % self.table.len();
        v
    }
}

/// Wrap a phase into [0, 1).
pub(crate) fn wrap_phase(phase: f64) -> f64 {
    let p = phase.rem_euclid(1.0);
    if p >= 1.0 { 0.0 } else { p }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        n: usize,
        period: Option<usize>,
    }

    impl Signal for Counter {
        fn next_sample(&mut self) -> f64 {
            self.n += 1;
            self.n as f64
        }

        fn period(&self) -> Option<usize> {
            self.period
        }
    }

    #[test]
    fn periodic_signal_is_tabled_and_replayed() {
        let mut g = Generator::new(Box::new(Counter { n: 0, period: Some(3) }), 10);
        assert_eq!(g.common_period(), 3);
        let out: Vec<f64> = (0..5).map(|_| g.next_sample()).collect();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 1.0, 2.0]);
    }

    #[test]
    fn long_period_falls_back_to_live() {
        let mut g = Generator::new(Box::new(Counter { n: 0, period: Some(30) }), 10);
        assert_eq!(g.common_period(), 0);
        assert_eq!(g.next_sample(), 1.0);
        assert_eq!(g.next_sample(), 2.0);
    }

    #[test]
    fn wrap_phase_stays_in_unit_interval() {
        assert_eq!(wrap_phase(1.25), 0.25);
        assert_eq!(wrap_phase(-0.25), 0.75);
        assert_eq!(wrap_phase(-1e-20), 0.0);
    }
}
