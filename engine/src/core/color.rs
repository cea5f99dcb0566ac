//! Caption Colors
//!
//! RGBA color used by caption styles. Serialized as a CSS color string
//! (`#FEF08A`, `rgba(0, 0, 0, 0.7)`, `transparent`) so project files and
//! presentation layers can use the value directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// RGBA color value (0-255 channels, 0.0-1.0 alpha)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    /// Creates a new color from RGBA components
    pub fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        let a = if a.is_finite() { a.clamp(0.0, 1.0) } else { 1.0 };
        Self { r, g, b, a }
    }

    /// Creates an opaque color from RGB components
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub fn transparent() -> Self {
        Self::rgba(0, 0, 0, 0.0)
    }

    /// Returns the same color with a different alpha
    pub fn with_alpha(self, a: f64) -> Self {
        Self::rgba(self.r, self.g, self.b, a)
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// Formats as a CSS color string
    pub fn to_css(&self) -> String {
        if self.a >= 1.0 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else if self.a <= 0.0 && self.r == 0 && self.g == 0 && self.b == 0 {
            "transparent".to_string()
        } else {
            let alpha = (self.a * 1000.0).round() / 1000.0;
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::white()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// Error returned for unrecognized color strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorParseError(pub String);

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid color: {}", self.0)
    }
}

impl std::error::Error for ColorParseError {}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let lower = value.to_ascii_lowercase();
        let err = || ColorParseError(value.to_string());

        match lower.as_str() {
            "transparent" => return Ok(Self::transparent()),
            "white" => return Ok(Self::white()),
            "black" => return Ok(Self::black()),
            _ => {}
        }

        if let Some(hex) = lower.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(err);
        }

        let (body, has_alpha) = if let Some(rest) = lower.strip_prefix("rgba(") {
            (rest, true)
        } else if let Some(rest) = lower.strip_prefix("rgb(") {
            (rest, false)
        } else {
            return Err(err());
        };
        let body = body.strip_suffix(')').ok_or_else(err)?;
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();

        let expected = if has_alpha { 4 } else { 3 };
        if parts.len() != expected {
            return Err(err());
        }

        let channel = |s: &str| s.parse::<u8>().ok();
        let r = channel(parts[0]).ok_or_else(err)?;
        let g = channel(parts[1]).ok_or_else(err)?;
        let b = channel(parts[2]).ok_or_else(err)?;
        let a = if has_alpha {
            let a: f64 = parts[3].parse().map_err(|_| err())?;
            if !a.is_finite() || !(0.0..=1.0).contains(&a) {
                return Err(err());
            }
            a
        } else {
            1.0
        };

        Ok(Self::rgba(r, g, b, a))
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);

    match hex.len() {
        3 => Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(
            byte(0)?,
            byte(2)?,
            byte(4)?,
            f64::from(byte(6)?) / 255.0,
        )),
        _ => None,
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_css()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!("#FFFFFF".parse::<Color>().unwrap(), Color::white());
        assert_eq!("#fef08a".parse::<Color>().unwrap(), Color::rgb(254, 240, 138));
        assert_eq!("#000".parse::<Color>().unwrap(), Color::black());
        assert!("#12345".parse::<Color>().is_err());
        assert!("#GGGGGG".parse::<Color>().is_err());
    }

    #[test]
    fn test_parse_rgba() {
        let c: Color = "rgba(0, 0, 0, 0.7)".parse().unwrap();
        assert_eq!((c.r, c.g, c.b), (0, 0, 0));
        assert!((c.a - 0.7).abs() < 1e-9);

        let c: Color = "rgb(30, 58, 138)".parse().unwrap();
        assert_eq!(c, Color::rgb(30, 58, 138));

        assert!("rgba(0, 0, 0)".parse::<Color>().is_err());
        assert!("rgba(0, 0, 0, 1.5)".parse::<Color>().is_err());
        assert!("rgb(300, 0, 0)".parse::<Color>().is_err());
    }

    #[test]
    fn test_transparent() {
        let c: Color = "transparent".parse().unwrap();
        assert!(c.is_transparent());
        assert_eq!(c.to_css(), "transparent");
    }

    #[test]
    fn test_to_css() {
        assert_eq!(Color::white().to_css(), "#FFFFFF");
        assert_eq!(Color::rgba(0, 0, 0, 0.7).to_css(), "rgba(0, 0, 0, 0.7)");
        assert_eq!(Color::rgba(255, 0, 0, 0.0).to_css(), "rgba(255, 0, 0, 0)");
    }

    #[test]
    fn test_serde_as_css_string() {
        let json = serde_json::to_string(&Color::rgba(0, 0, 0, 0.5)).unwrap();
        assert_eq!(json, "\"rgba(0, 0, 0, 0.5)\"");

        let parsed: Color = serde_json::from_str("\"#93C5FD\"").unwrap();
        assert_eq!(parsed, Color::rgb(147, 197, 253));

        assert!(serde_json::from_str::<Color>("\"chartreuse-ish\"").is_err());
    }
}
