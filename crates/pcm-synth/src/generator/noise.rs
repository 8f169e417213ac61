use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Signal;

/// Row count used when pink noise is requested with 0 rows.
pub const DEFAULT_PINK_ROWS: usize = 22;
const MAX_PINK_ROWS: usize = 30;

/// Click length scale in seconds (time constant of the decay).
const GEIGER_CLICK_SECONDS: f64 = 0.0005;

/// Uniform white noise in [-1, 1).
pub struct WhiteNoise {
    rng: StdRng,
}

impl WhiteNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Signal for WhiteNoise {
    fn next_sample(&mut self) -> f64 {
        self.rng.gen_range(-1.0..1.0)
    }
}

/// Voss-McCartney pink noise.
pub struct PinkNoise {
    rng: StdRng,
    rows: Vec<f64>,
    running_sum: f64,
    counter: u64,
}

impl PinkNoise {
    pub fn new(rows: usize, seed: u64) -> Self {
        let rows = match rows {
            0 => DEFAULT_PINK_ROWS,
            n => n.min(MAX_PINK_ROWS),
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let rows: Vec<f64> = (0..rows).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let running_sum = rows.iter().sum();
        Self {
            rng,
            rows,
            running_sum,
            counter: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }
}

impl Signal for PinkNoise {
    fn next_sample(&mut self) -> f64 {
        self.counter = self.counter.wrapping_add(1);
        let row = self.counter.trailing_zeros() as usize;
        if row < self.rows.len() {
            let fresh = self.rng.gen_range(-1.0..1.0);
            self.running_sum += fresh - self.rows[row];
            self.rows[row] = fresh;
        }
        let white: f64 = self.rng.gen_range(-1.0..1.0);
        (self.running_sum + white) / (self.rows.len() + 1) as f64
    }
}

/// Random clicks at an average rate, like a Geiger counter.
pub struct Geiger {
    rng: StdRng,
    chance: f64,
    decay: f64,
    level: f64,
    polarity: f64,
}

impl Geiger {
    /// `activity` is the average number of events per second at `rate`.
    pub fn new(rate: u32, activity: f64, seed: u64) -> Self {
        let rate = rate.max(1) as f64;
        Self {
            rng: StdRng::seed_from_u64(seed),
            chance: (activity.max(0.0) / rate).min(1.0),
            decay: (-1.0 / (GEIGER_CLICK_SECONDS * rate)).exp(),
            level: 0.0,
            polarity: 1.0,
        }
    }
}

impl Signal for Geiger {
    fn next_sample(&mut self) -> f64 {
        self.level *= self.decay;
        if self.rng.r#gen::<f64>() < self.chance {
            self.level = 1.0;
            self.polarity = -self.polarity;
        }
        self.level * self.polarity
    }
}
