use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// RGB color with 8-bit channels. Serialized as a `#RRGGBB` hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    pub fn black() -> Self {
        Color::BLACK
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 7 || !hex.starts_with('#') {
            return None;
        }

        let r = u8::from_str_radix(&hex[1..3], 16).ok()?;
        let g = u8::from_str_radix(&hex[3..5], 16).ok()?;
        let b = u8::from_str_radix(&hex[5..7], 16).ok()?;

        Some(Color { r, g, b })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Create from HSV (hue 0-360, saturation 0-1, value 0-1).
    pub fn from_hsv(h: f64, s: f64, v: f64) -> Self {
        let h = h.rem_euclid(360.0);
        let c = v * s;
        let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
        let m = v - c;

        let (r1, g1, b1) = match (h / 60.0) as u8 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        Color {
            r: ((r1 + m) * 255.0).round() as u8,
            g: ((g1 + m) * 255.0).round() as u8,
            b: ((b1 + m) * 255.0).round() as u8,
        }
    }

    /// Linear interpolation toward `target`. `t` is clamped to [0, 1].
    pub fn lerp(self, target: Color, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Color {
            r: mix(self.r, target.r),
            g: mix(self.g, target.g),
            b: mix(self.b, target.b),
        }
    }

    /// Scale brightness by a factor in [0, 1].
    pub fn scale(self, factor: f64) -> Self {
        let f = factor.clamp(0.0, 1.0);
        Color {
            r: (self.r as f64 * f).round() as u8,
            g: (self.g as f64 * f).round() as u8,
            b: (self.b as f64 * f).round() as u8,
        }
    }

    pub fn is_black(self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| D::Error::custom(format!("invalid hex color '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let c = Color::from_hex("#FF8000").unwrap();
        assert_eq!((c.r, c.g, c.b), (255, 128, 0));
        assert_eq!(c.to_hex(), "#FF8000");

        assert!(Color::from_hex("FF8000").is_none());
        assert!(Color::from_hex("#GG0000").is_none());
        assert!(Color::from_hex("#FFF").is_none());
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(Color::from_hsv(0.0, 1.0, 1.0), Color::rgb(255, 0, 0));
        assert_eq!(Color::from_hsv(60.0, 1.0, 1.0), Color::rgb(255, 255, 0));
        assert_eq!(Color::from_hsv(120.0, 1.0, 1.0), Color::rgb(0, 255, 0));
        assert_eq!(Color::from_hsv(180.0, 1.0, 1.0), Color::rgb(0, 255, 255));
        assert_eq!(Color::from_hsv(240.0, 1.0, 1.0), Color::rgb(0, 0, 255));
        assert_eq!(Color::from_hsv(300.0, 1.0, 1.0), Color::rgb(255, 0, 255));
    }

    #[test]
    fn test_hsv_wraps_and_desaturates() {
        assert_eq!(Color::from_hsv(360.0, 1.0, 1.0), Color::rgb(255, 0, 0));
        assert_eq!(Color::from_hsv(0.0, 0.0, 1.0), Color::WHITE);
        assert_eq!(Color::from_hsv(123.0, 1.0, 0.0), Color::BLACK);
    }

    #[test]
    fn test_lerp_endpoints() {
        let a = Color::rgb(0, 0, 0);
        let b = Color::rgb(200, 100, 50);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Color::rgb(100, 50, 25));
    }

    #[test]
    fn test_serde_hex_string() {
        let c: Color = serde_json::from_str("\"#0A0B0C\"").unwrap();
        assert_eq!(c, Color::rgb(10, 11, 12));
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"#0A0B0C\"");
    }
}
