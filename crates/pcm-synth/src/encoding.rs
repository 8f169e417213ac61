//! Sample encodings and per-sample codecs.
//!
//! All buffers in this crate are interleaved bytes in host byte order. Integer
//! encodings map onto the nominal float range [-1, 1] by scaling with
//! `2^(bits-1)`; unsigned encodings are offset by their midpoint.

use std::fmt;

/// Numeric sample format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    Signed8,
    Unsigned8,
    Signed16,
    Unsigned16,
    Signed24,
    Unsigned24,
    Signed32,
    Unsigned32,
    Float32,
    Float64,
}

impl Encoding {
    /// Every supported encoding, narrowest first.
    pub const ALL: [Encoding; 10] = [
        Encoding::Signed8,
        Encoding::Unsigned8,
        Encoding::Signed16,
        Encoding::Unsigned16,
        Encoding::Signed24,
        Encoding::Unsigned24,
        Encoding::Signed32,
        Encoding::Unsigned32,
        Encoding::Float32,
        Encoding::Float64,
    ];

    /// Bytes per sample.
    pub fn size(self) -> usize {
        match self {
            Encoding::Signed8 | Encoding::Unsigned8 => 1,
            Encoding::Signed16 | Encoding::Unsigned16 => 2,
            Encoding::Signed24 | Encoding::Unsigned24 => 3,
            Encoding::Signed32 | Encoding::Unsigned32 | Encoding::Float32 => 4,
            Encoding::Float64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Encoding::Float32 | Encoding::Float64)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Encoding::Signed8 | Encoding::Signed16 | Encoding::Signed24 | Encoding::Signed32
        )
    }

    /// Significant bits carried by one sample.
    pub fn bits(self) -> u32 {
        match self {
            Encoding::Float32 => 24,
            Encoding::Float64 => 53,
            other => (other.size() * 8) as u32,
        }
    }

    /// Short name as accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Signed8 => "s8",
            Encoding::Unsigned8 => "u8",
            Encoding::Signed16 => "s16",
            Encoding::Unsigned16 => "u16",
            Encoding::Signed24 => "s24",
            Encoding::Unsigned24 => "u24",
            Encoding::Signed32 => "s32",
            Encoding::Unsigned32 => "u32",
            Encoding::Float32 => "f32",
            Encoding::Float64 => "f64",
        }
    }

    pub fn long_name(self) -> &'static str {
        match self {
            Encoding::Signed8 => "signed 8 bit",
            Encoding::Unsigned8 => "unsigned 8 bit",
            Encoding::Signed16 => "signed 16 bit",
            Encoding::Unsigned16 => "unsigned 16 bit",
            Encoding::Signed24 => "signed 24 bit",
            Encoding::Unsigned24 => "unsigned 24 bit",
            Encoding::Signed32 => "signed 32 bit",
            Encoding::Unsigned32 => "unsigned 32 bit",
            Encoding::Float32 => "float (32 bit)",
            Encoding::Float64 => "float (64 bit)",
        }
    }

    /// Look up an encoding by short or long name (case-insensitive).
    pub fn by_name(name: &str) -> Option<Encoding> {
        let needle = name.trim();
        Encoding::ALL.into_iter().find(|enc| {
            enc.name().eq_ignore_ascii_case(needle) || enc.long_name().eq_ignore_ascii_case(needle)
        })
    }

    fn scale(self) -> f64 {
        (1u64 << (self.size() * 8 - 1)) as f64
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encoding to use for intermediate processing of `a` and `b`.
///
/// Returns `Float32` when both encodings fit into a 24-bit mantissa, `Float64` otherwise.
pub fn mix_encoding(a: Encoding, b: Encoding) -> Encoding {
    if a.bits() <= 24 && b.bits() <= 24 {
        Encoding::Float32
    } else {
        Encoding::Float64
    }
}

/// Decode one sample into the nominal float range.
pub(crate) fn read_sample(enc: Encoding, bytes: &[u8]) -> f64 {
    match enc {
        Encoding::Float32 => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        Encoding::Float64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[..8]);
            f64::from_ne_bytes(raw)
        }
        Encoding::Signed8 => bytes[0] as i8 as f64 / enc.scale(),
        Encoding::Signed16 => i16::from_ne_bytes([bytes[0], bytes[1]]) as f64 / enc.scale(),
        Encoding::Signed24 => read_i24(bytes) as f64 / enc.scale(),
        Encoding::Signed32 => {
            i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64 / enc.scale()
        }
        Encoding::Unsigned8 => (bytes[0] as f64 - enc.scale()) / enc.scale(),
        Encoding::Unsigned16 => {
            (u16::from_ne_bytes([bytes[0], bytes[1]]) as f64 - enc.scale()) / enc.scale()
        }
        Encoding::Unsigned24 => (read_u24(bytes) as f64 - enc.scale()) / enc.scale(),
        Encoding::Unsigned32 => {
            (u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64 - enc.scale())
                / enc.scale()
        }
    }
}

/// Encode one sample, returning `true` when it had to be clamped.
pub(crate) fn write_sample(enc: Encoding, value: f64, out: &mut [u8]) -> bool {
    match enc {
        Encoding::Float32 => {
            out[..4].copy_from_slice(&(value as f32).to_ne_bytes());
            false
        }
        Encoding::Float64 => {
            out[..8].copy_from_slice(&value.to_ne_bytes());
            false
        }
        _ => {
            let scale = enc.scale();
            let (min, max) = (-scale, scale - 1.0);
            let scaled = (value * scale).round();
            let (v, clamped) = if scaled.is_nan() {
                (0.0, true)
            } else if scaled < min {
                (min, true)
            } else if scaled > max {
                (max, true)
            } else {
                (scaled, false)
            };
            let v = v as i64;
            match enc {
                Encoding::Signed8 => out[0] = v as i8 as u8,
                Encoding::Unsigned8 => out[0] = (v + 128) as u8,
                Encoding::Signed16 => out[..2].copy_from_slice(&(v as i16).to_ne_bytes()),
                Encoding::Unsigned16 => {
                    out[..2].copy_from_slice(&((v + 32_768) as u16).to_ne_bytes())
                }
                Encoding::Signed24 => write_u24(v as i32 as u32, out),
                Encoding::Unsigned24 => write_u24((v + 8_388_608) as u32, out),
                Encoding::Signed32 => out[..4].copy_from_slice(&(v as i32).to_ne_bytes()),
                Encoding::Unsigned32 => {
                    out[..4].copy_from_slice(&((v + 2_147_483_648) as u32).to_ne_bytes())
                }
                Encoding::Float32 | Encoding::Float64 => unreachable!(),
            }
            clamped
        }
    }
}

fn read_u24(bytes: &[u8]) -> u32 {
    if cfg!(target_endian = "little") {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
    } else {
        u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
    }
}

fn read_i24(bytes: &[u8]) -> i32 {
    // Sign-extend from bit 23.
    ((read_u24(bytes) << 8) as i32) >> 8
}

fn write_u24(v: u32, out: &mut [u8]) {
    if cfg!(target_endian = "little") {
        out[..3].copy_from_slice(&v.to_le_bytes()[..3]);
    } else {
        out[..3].copy_from_slice(&v.to_be_bytes()[1..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_widths() {
        assert_eq!(Encoding::Signed16.size(), 2);
        assert_eq!(Encoding::Unsigned24.size(), 3);
        assert_eq!(Encoding::Float32.size(), 4);
        assert_eq!(Encoding::Float64.size(), 8);
    }

    #[test]
    fn by_name_accepts_short_and_long_names() {
        assert_eq!(Encoding::by_name("s16"), Some(Encoding::Signed16));
        assert_eq!(Encoding::by_name("F32"), Some(Encoding::Float32));
        assert_eq!(Encoding::by_name("signed 24 bit"), Some(Encoding::Signed24));
        assert_eq!(Encoding::by_name("mp3"), None);
    }

    #[test]
    fn mix_encoding_widens_for_high_resolution() {
        assert_eq!(mix_encoding(Encoding::Signed16, Encoding::Unsigned8), Encoding::Float32);
        assert_eq!(mix_encoding(Encoding::Signed24, Encoding::Float32), Encoding::Float32);
        assert_eq!(mix_encoding(Encoding::Signed32, Encoding::Signed16), Encoding::Float64);
        assert_eq!(mix_encoding(Encoding::Float64, Encoding::Float32), Encoding::Float64);
    }

    #[test]
    fn signed_24_bit_sign_extends() {
        let mut raw = [0u8; 3];
        assert!(!write_sample(Encoding::Signed24, -0.5, &mut raw));
        let back = read_sample(Encoding::Signed24, &raw);
        assert!((back + 0.5).abs() < 1e-9);
    }

    #[test]
    fn integer_writes_clamp_and_report() {
        let mut raw = [0u8; 2];
        assert!(write_sample(Encoding::Signed16, 1.5, &mut raw));
        assert_eq!(i16::from_ne_bytes(raw), i16::MAX);
        assert!(write_sample(Encoding::Signed16, -3.0, &mut raw));
        assert_eq!(i16::from_ne_bytes(raw), i16::MIN);
    }

    #[test]
    fn unsigned_midpoint_is_zero() {
        let mut raw = [0u8; 1];
        write_sample(Encoding::Unsigned8, 0.0, &mut raw);
        assert_eq!(raw[0], 128);
        assert_eq!(read_sample(Encoding::Unsigned8, &raw), 0.0);
    }
}
