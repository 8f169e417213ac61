//! Channel mixing matrix construction.

use crate::error::ConfigError;
use crate::tokenize::{Tokens, parse_number, token_count};

/// Row-major `[output][input]` channel gains.
#[derive(Clone, Debug, PartialEq)]
pub struct MixMatrix {
    inputs: usize,
    outputs: usize,
    gains: Vec<f64>,
}

impl MixMatrix {
    /// Build the matrix for `inputs` to `outputs` channels.
    ///
    /// Returns `None` when the channel counts match and no explicit list is given.
    /// Without a list, mono input is broadcast and mono output averages all inputs;
    /// any other change in channel count needs an explicit `inputs * outputs` list.
    pub fn build(
        inputs: usize,
        outputs: usize,
        list: Option<&str>,
    ) -> Result<Option<MixMatrix>, ConfigError> {
        let list = list.filter(|s| !s.is_empty());
        if inputs == outputs && list.is_none() {
            return Ok(None);
        }
        let expected = inputs * outputs;
        let gains = match token_count(list) {
            0 if inputs == 1 => vec![1.0; outputs],
            0 if outputs == 1 => vec![1.0 / inputs as f64; inputs],
            actual if actual != expected => {
                return Err(ConfigError::MixMatrixCount { expected, actual });
            }
            _ => list
                .map(|s| Tokens::new(s).map(parse_number).collect())
                .unwrap_or_default(),
        };
        Ok(Some(MixMatrix {
            inputs,
            outputs,
            gains,
        }))
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn gains(&self) -> &[f64] {
        &self.gains
    }

    pub fn row(&self, output: usize) -> &[f64] {
        &self.gains[output * self.inputs..(output + 1) * self.inputs]
    }

    /// Multiply every gain by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.gains.iter_mut().for_each(|g| *g *= factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_without_list_needs_no_matrix() {
        assert_eq!(MixMatrix::build(2, 2, None).unwrap(), None);
        assert_eq!(MixMatrix::build(2, 2, Some("")).unwrap(), None);
    }

    #[test]
    fn mono_is_broadcast() {
        let m = MixMatrix::build(1, 3, None).unwrap().unwrap();
        assert_eq!(m.gains(), &[1.0, 1.0, 1.0]);
        for oc in 0..3 {
            assert_eq!(m.row(oc).iter().sum::<f64>(), 1.0);
        }
    }

    #[test]
    fn downmix_averages() {
        let m = MixMatrix::build(4, 1, None).unwrap().unwrap();
        assert_eq!(m.gains(), &[0.25; 4]);
        assert!((m.row(0).iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn explicit_list_is_row_major() {
        let m = MixMatrix::build(3, 2, Some("1,0,0.5, 0,1,0.5")).unwrap().unwrap();
        assert_eq!((m.inputs(), m.outputs()), (3, 2));
        assert_eq!(m.row(0), &[1.0, 0.0, 0.5]);
        assert_eq!(m.row(1), &[0.0, 1.0, 0.5]);
    }

    #[test]
    fn explicit_list_on_equal_channels() {
        let m = MixMatrix::build(2, 2, Some("0,1,1,0")).unwrap().unwrap();
        assert_eq!(m.gains(), &[0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn wrong_count_is_rejected() {
        assert_eq!(
            MixMatrix::build(2, 2, Some("1,0,1")),
            Err(ConfigError::MixMatrixCount {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(
            MixMatrix::build(3, 2, None),
            Err(ConfigError::MixMatrixCount {
                expected: 6,
                actual: 0
            })
        );
    }

    #[test]
    fn empty_tokens_are_zero_gain() {
        let m = MixMatrix::build(1, 2, Some("1,")).unwrap().unwrap();
        assert_eq!(m.gains(), &[1.0, 0.0]);
    }

    #[test]
    fn scale_multiplies_gains() {
        let mut m = MixMatrix::build(1, 2, None).unwrap().unwrap();
        m.scale(0.5);
        assert_eq!(m.gains(), &[0.5, 0.5]);
    }
}
