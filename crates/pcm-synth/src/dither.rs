//! TPDF dither ahead of integer conversion.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::convert::map_in_place;
use crate::encoding::Encoding;
use crate::error::SynthError;

/// Triangular noise of one LSB of the target encoding, added to float samples.
pub struct Dither {
    rng: StdRng,
    lsb: f64,
}

impl Dither {
    /// `None` for float targets; they keep every bit and need no dither.
    pub fn new(target: Encoding, seed: u64) -> Option<Self> {
        if target.is_float() {
            return None;
        }
        Some(Self {
            rng: StdRng::seed_from_u64(seed),
            lsb: 2f64.powi(1 - target.bits() as i32),
        })
    }

    /// Add noise to `samples` samples of the float buffer `buf`.
    pub fn apply(&mut self, buf: &mut [u8], enc: Encoding, samples: usize) -> Result<(), SynthError> {
        if !enc.is_float() {
            return Err(SynthError::NotFloat(enc));
        }
        let lsb = self.lsb;
        let rng = &mut self.rng;
        map_in_place(buf, enc, samples, |x| {
            x + (rng.r#gen::<f64>() - rng.r#gen::<f64>()) * lsb
        })?;
        Ok(())
    }
}
