use crate::error::{Error, Result};
use crate::varuint::VARUINT_MAX;

/// A single byte in `[0, 255]`. Wrapping `u8` directly would work just as
/// well; the newtype exists so the AST's field types read the same as the
/// table in the wire-format spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsignedByte(pub u8);

/// An unsigned integer capped at 2^28 - 1, encoded as LEB128.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Varuint(u32);

impl Varuint {
    pub fn new(value: u32) -> Result<Varuint> {
        if value > VARUINT_MAX {
            return Err(Error::Compiler(format!(
                "varuint {value} exceeds the 2^28 cap"
            )));
        }
        Ok(Varuint(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Frames at FPS = 50. Constructed either from a frame count or from a
/// floating-point seconds value using exact decimal arithmetic: a pure
/// `seconds * FPS` float multiply is wrong (`0.2 * 50 != 10.0` under
/// IEEE-754), so the conversion instead multiplies the decimal digits of
/// `seconds`'s shortest string representation, which is exact whenever the
/// input itself came from a terminating decimal literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration(Varuint);

pub const FPS: u32 = 50;

impl Duration {
    pub fn from_frames(frames: u32) -> Result<Duration> {
        Ok(Duration(Varuint::new(frames)?))
    }

    pub fn from_seconds(seconds: f64) -> Result<Duration> {
        if seconds < 0.0 || !seconds.is_finite() {
            return Err(Error::InvalidDuration(format!(
                "duration must be a finite, non-negative number of seconds, got {seconds}"
            )));
        }

        let rendered = format!("{seconds}");
        let (digits, scale) = match rendered.split_once('.') {
            Some((int_part, frac_part)) => (
                format!("{int_part}{frac_part}"),
                frac_part.len() as u32,
            ),
            None => (rendered.clone(), 0),
        };

        let numerator: u128 = digits.parse().map_err(|_| {
            Error::InvalidDuration(format!("could not parse {seconds} as a decimal"))
        })?;
        let denominator: u128 = 10u128.pow(scale);
        let product = numerator * FPS as u128;

        let frames = if product % denominator == 0 {
            (product / denominator) as u32
        } else {
            let exact = product as f64 / denominator as f64;
            tracing::warn!(
                seconds,
                frames = exact,
                "seconds-to-frames conversion is not an integer number of frames"
            );
            exact.round() as u32
        };

        Duration::from_frames(frames)
    }

    pub fn frames(&self) -> u32 {
        self.0.value()
    }

    pub fn as_varuint(&self) -> Varuint {
        self.0
    }

    pub fn seconds(&self) -> f64 {
        self.frames() as f64 / FPS as f64
    }
}

/// Up to seven channel indices in `[0, 6]` plus one "enable" flag, packed
/// into one byte: bit 7 is the enable flag, bits 0-6 are the channel mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelMask {
    pub enable: bool,
    pub channels: [bool; 7],
}

impl ChannelMask {
    pub fn to_byte(&self) -> u8 {
        let mut byte = if self.enable { 0x80 } else { 0x00 };
        for (i, &set) in self.channels.iter().enumerate() {
            if set {
                byte |= 1 << i;
            }
        }
        byte
    }

    pub fn from_byte(byte: u8) -> ChannelMask {
        let mut channels = [false; 7];
        for (i, slot) in channels.iter_mut().enumerate() {
            *slot = (byte & (1 << i)) != 0;
        }
        ChannelMask {
            enable: byte & 0x80 != 0,
            channels,
        }
    }
}

/// Up to seven channel indices set to 1, packed into one byte: bit 7 is
/// always 0, bits 0-6 carry the per-channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelValues {
    pub channels: [bool; 7],
}

impl ChannelValues {
    pub fn to_byte(&self) -> u8 {
        let mut byte = 0u8;
        for (i, &set) in self.channels.iter().enumerate() {
            if set {
                byte |= 1 << i;
            }
        }
        byte
    }

    pub fn from_byte(byte: u8) -> ChannelValues {
        let mut channels = [false; 7];
        for (i, slot) in channels.iter_mut().enumerate() {
            *slot = (byte & (1 << i)) != 0;
        }
        ChannelValues { channels }
    }
}
