use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// An RGB triple. Encodes as three consecutive bytes on the wire.
///
/// Instances are interned (keyed on the `(r,g,b)` triple) to cut allocation
/// cost during optimisation; interning is observable only through identity,
/// never through value semantics — `PartialEq` still compares by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RGBColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

fn intern_table() -> &'static Mutex<HashMap<(u8, u8, u8), RGBColor>> {
    static TABLE: OnceLock<Mutex<HashMap<(u8, u8, u8), RGBColor>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

impl RGBColor {
    pub const BLACK: RGBColor = RGBColor {
        red: 0,
        green: 0,
        blue: 0,
    };

    pub const WHITE: RGBColor = RGBColor {
        red: 255,
        green: 255,
        blue: 255,
    };

    /// Returns the interned instance for this triple, inserting it on first
    /// use. The returned value is a plain copy (`RGBColor` is `Copy`); the
    /// table exists only to mirror the reference implementation's allocation
    /// behaviour, not to provide pointer-identity semantics in Rust.
    pub fn cached(red: u8, green: u8, blue: u8) -> RGBColor {
        let key = (red, green, blue);
        let mut table = intern_table().lock().expect("color intern table poisoned");
        *table.entry(key).or_insert(RGBColor { red, green, blue })
    }

    pub fn gray(value: u8) -> RGBColor {
        RGBColor::cached(value, value, value)
    }

    pub fn is_black(&self) -> bool {
        self.red == 0 && self.green == 0 && self.blue == 0
    }

    pub fn is_white(&self) -> bool {
        self.red == 255 && self.green == 255 && self.blue == 255
    }

    pub fn is_gray(&self) -> bool {
        self.red == self.green && self.green == self.blue
    }

    /// Linearly interpolates between `self` and `other` at `ratio` in
    /// `[0.0, 1.0]`, rounding each channel independently.
    pub fn mix_with(&self, other: &RGBColor, ratio: f64) -> RGBColor {
        let lerp = |a: u8, b: u8| -> u8 {
            let value = a as f64 + (b as f64 - a as f64) * ratio;
            value.round().clamp(0.0, 255.0) as u8
        };
        RGBColor {
            red: lerp(self.red, other.red),
            green: lerp(self.green, other.green),
            blue: lerp(self.blue, other.blue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_black_white_gray() {
        assert!(RGBColor::cached(0, 0, 0).is_black());
        assert!(RGBColor::cached(255, 255, 255).is_white());
        assert!(RGBColor::cached(10, 10, 10).is_gray());
        assert!(!RGBColor::cached(10, 20, 10).is_gray());
    }

    #[test]
    fn cached_instances_compare_equal_by_value() {
        let a = RGBColor::cached(1, 2, 3);
        let b = RGBColor::cached(1, 2, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn mix_with_interpolates_linearly() {
        let black = RGBColor::BLACK;
        let white = RGBColor::WHITE;
        let mid = black.mix_with(&white, 0.5);
        assert_eq!(mid, RGBColor::cached(128, 128, 128));
    }
}
