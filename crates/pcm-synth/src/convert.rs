//! Format conversion, channel mixing, amplification and clipping.
//!
//! Every operation works in place or between interleaved byte buffers tagged with an
//! [`Encoding`]. Work happens in `f64`; the return value is the number of samples that
//! had to be clamped when writing back into an integer encoding.

use crate::encoding::{Encoding, read_sample, write_sample};
use crate::error::SynthError;

/// Gain limit in dB for [`db_to_linear`].
pub const MAX_GAIN_DB: f64 = 500.0;

/// Convert `src` (in `src_enc`) into `dst` (in `dst_enc`).
///
/// The sample count is derived from `src`; `dst` must hold at least as many samples.
pub fn convert(
    dst: &mut [u8],
    dst_enc: Encoding,
    src: &[u8],
    src_enc: Encoding,
) -> Result<usize, SynthError> {
    let samples = src.len() / src_enc.size();
    check_len(dst, samples * dst_enc.size())?;

    let mut clamped = 0;
    for (out, inp) in dst
        .chunks_exact_mut(dst_enc.size())
        .zip(src.chunks_exact(src_enc.size()))
    {
        if write_sample(dst_enc, read_sample(src_enc, inp), out) {
            clamped += 1;
        }
    }
    Ok(clamped)
}

/// Decode `src` into `f32` samples, replacing the contents of `out`.
pub fn decode_f32(src: &[u8], enc: Encoding, out: &mut Vec<f32>) {
    out.clear();
    out.extend(
        src.chunks_exact(enc.size())
            .map(|raw| read_sample(enc, raw) as f32),
    );
}

/// Mix `frames` frames of `src_channels` into `dst_channels` using a row-major
/// `[out_channel][in_channel]` gain matrix. The destination is overwritten.
#[allow(clippy::too_many_arguments)]
pub fn mix(
    dst: &mut [u8],
    dst_enc: Encoding,
    dst_channels: usize,
    src: &[u8],
    src_enc: Encoding,
    src_channels: usize,
    matrix: &[f64],
    frames: usize,
) -> Result<usize, SynthError> {
    if dst_channels == 0 || src_channels == 0 {
        return Err(SynthError::NoChannels);
    }
    if matrix.len() != dst_channels * src_channels {
        return Err(SynthError::BadMatrix {
            expected: dst_channels * src_channels,
            actual: matrix.len(),
        });
    }
    let in_frame = src_enc.size() * src_channels;
    let out_frame = dst_enc.size() * dst_channels;
    check_len(src, frames * in_frame)?;
    check_len(dst, frames * out_frame)?;

    let mut input = vec![0.0f64; src_channels];
    let mut clamped = 0;
    for f in 0..frames {
        let src_frame = &src[f * in_frame..(f + 1) * in_frame];
        for (ic, value) in input.iter_mut().enumerate() {
            let at = ic * src_enc.size();
            *value = read_sample(src_enc, &src_frame[at..at + src_enc.size()]);
        }
        let dst_frame = &mut dst[f * out_frame..(f + 1) * out_frame];
        for oc in 0..dst_channels {
            let row = &matrix[oc * src_channels..(oc + 1) * src_channels];
            let sum: f64 = row.iter().zip(&input).map(|(g, x)| g * x).sum();
            let at = oc * dst_enc.size();
            if write_sample(dst_enc, sum, &mut dst_frame[at..at + dst_enc.size()]) {
                clamped += 1;
            }
        }
    }
    Ok(clamped)
}

/// Apply `y = factor * x + offset` to `samples` samples in place.
pub fn amplify(
    buf: &mut [u8],
    enc: Encoding,
    samples: usize,
    factor: f64,
    offset: f64,
) -> Result<usize, SynthError> {
    map_in_place(buf, enc, samples, |x| factor * x + offset)
}

/// Clamp float samples to [-1, 1]. Integer buffers cannot exceed their range and report 0.
pub fn hard_clip(buf: &mut [u8], enc: Encoding, samples: usize) -> Result<usize, SynthError> {
    if !enc.is_float() {
        check_len(buf, samples * enc.size())?;
        return Ok(0);
    }
    let mut clipped = 0;
    map_in_place(buf, enc, samples, |x| {
        if x.is_nan() {
            clipped += 1;
            0.0
        } else if x > 1.0 {
            clipped += 1;
            1.0
        } else if x < -1.0 {
            clipped += 1;
            -1.0
        } else {
            x
        }
    })?;
    Ok(clipped)
}

/// Smoothly bend samples beyond `limit - width` toward `limit`.
///
/// Returns the number of samples that were reshaped (plus any clamped on write-back).
pub fn soft_clip(
    buf: &mut [u8],
    enc: Encoding,
    samples: usize,
    limit: f64,
    width: f64,
) -> Result<usize, SynthError> {
    let mut shaped = 0;
    let clamped = map_in_place(buf, enc, samples, |x| {
        let y = soft_clip_sample(x, limit, width);
        if y != x {
            shaped += 1;
        }
        y
    })?;
    Ok(shaped + clamped)
}

fn soft_clip_sample(x: f64, limit: f64, width: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    let knee = limit - width;
    if x.abs() <= knee {
        return x;
    }
    let bent = limit - width * width / (x.abs() - limit + 2.0 * width);
    bent.copysign(x)
}

/// Convert decibels to a linear factor, limited to ±[`MAX_GAIN_DB`].
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB) / 20.0)
}

/// Convert a linear factor to decibels, limited to ±[`MAX_GAIN_DB`].
pub fn linear_to_db(factor: f64) -> f64 {
    if factor <= 0.0 {
        return -MAX_GAIN_DB;
    }
    (20.0 * factor.log10()).clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
}

pub(crate) fn map_in_place(
    buf: &mut [u8],
    enc: Encoding,
    samples: usize,
    mut f: impl FnMut(f64) -> f64,
) -> Result<usize, SynthError> {
    let size = enc.size();
    check_len(buf, samples * size)?;
    let mut clamped = 0;
    for chunk in buf[..samples * size].chunks_exact_mut(size) {
        let y = f(read_sample(enc, chunk));
        if write_sample(enc, y, chunk) {
            clamped += 1;
        }
    }
    Ok(clamped)
}

fn check_len(buf: &[u8], needed: usize) -> Result<(), SynthError> {
    if buf.len() < needed {
        return Err(SynthError::BufferTooSmall {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    fn f32_values(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn s16_values(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|c| i16::from_ne_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn convert_float_to_s16_counts_clamps() {
        let src = f32_bytes(&[0.5, 1.5, -2.0, 0.0]);
        let mut dst = vec![0u8; 8];
        let clamped = convert(&mut dst, Encoding::Signed16, &src, Encoding::Float32).unwrap();
        assert_eq!(clamped, 2);
        assert_eq!(s16_values(&dst), vec![16_384, i16::MAX, i16::MIN, 0]);
    }

    #[test]
    fn convert_rejects_short_destination() {
        let src = f32_bytes(&[0.1, 0.2]);
        let mut dst = vec![0u8; 2];
        let err = convert(&mut dst, Encoding::Signed16, &src, Encoding::Float32).unwrap_err();
        assert_eq!(
            err,
            SynthError::BufferTooSmall {
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn decode_f32_reads_integer_samples() {
        let src: Vec<u8> = [16_384i16, -32_768].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let mut out = vec![9.0];
        decode_f32(&src, Encoding::Signed16, &mut out);
        assert_eq!(out, vec![0.5, -1.0]);
    }

    #[test]
    fn mix_broadcasts_mono() {
        let src = f32_bytes(&[0.25, -0.5]);
        let mut dst = vec![0u8; 16];
        mix(&mut dst, Encoding::Float32, 2, &src, Encoding::Float32, 1, &[1.0, 1.0], 2).unwrap();
        assert_eq!(f32_values(&dst), vec![0.25, 0.25, -0.5, -0.5]);
    }

    #[test]
    fn mix_averages_to_mono() {
        let src = f32_bytes(&[0.2, 0.4, -1.0, 1.0]);
        let mut dst = vec![0u8; 8];
        mix(&mut dst, Encoding::Float32, 1, &src, Encoding::Float32, 2, &[0.5, 0.5], 2).unwrap();
        let out = f32_values(&dst);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!(out[1].abs() < 1e-6);
    }

    #[test]
    fn mix_rejects_wrong_matrix_size() {
        let src = f32_bytes(&[0.0, 0.0]);
        let mut dst = vec![0u8; 8];
        let err = mix(&mut dst, Encoding::Float32, 2, &src, Encoding::Float32, 1, &[1.0], 1)
            .unwrap_err();
        assert_eq!(err, SynthError::BadMatrix { expected: 2, actual: 1 });
    }

    #[test]
    fn amplify_applies_factor_and_offset() {
        let mut buf = f32_bytes(&[0.25, -0.25]);
        amplify(&mut buf, Encoding::Float32, 2, 2.0, 0.1).unwrap();
        let out = f32_values(&buf);
        assert!((out[0] - 0.6).abs() < 1e-6);
        assert!((out[1] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn hard_clip_limits_floats_only() {
        let mut buf = f32_bytes(&[1.2, -0.3, -4.0]);
        assert_eq!(hard_clip(&mut buf, Encoding::Float32, 3).unwrap(), 2);
        assert_eq!(f32_values(&buf), vec![1.0, -0.3, -1.0]);

        let mut ints = vec![0u8; 4];
        assert_eq!(hard_clip(&mut ints, Encoding::Signed16, 2).unwrap(), 0);
    }

    #[test]
    fn soft_clip_is_continuous_and_bounded() {
        let limit = 1.0;
        let width = 0.0234;
        let knee = limit - width;
        assert_eq!(soft_clip_sample(0.5, limit, width), 0.5);
        assert!((soft_clip_sample(knee + 1e-9, limit, width) - knee).abs() < 1e-6);
        assert!(soft_clip_sample(100.0, limit, width) < limit);
        assert!(soft_clip_sample(-100.0, limit, width) > -limit);
    }

    #[test]
    fn soft_clip_counts_reshaped_samples() {
        let mut buf = f32_bytes(&[0.1, 2.0, -2.0]);
        let shaped = soft_clip(&mut buf, Encoding::Float32, 3, 1.0, 0.0234).unwrap();
        assert_eq!(shaped, 2);
        assert!(f32_values(&buf).iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn db_conversions_invert_and_limit() {
        assert!((db_to_linear(6.0) - 1.995_262).abs() < 1e-5);
        assert!((linear_to_db(db_to_linear(-12.0)) + 12.0).abs() < 1e-9);
        assert!((linear_to_db(db_to_linear(1_000.0)) - MAX_GAIN_DB).abs() < 1e-9);
    }
}
