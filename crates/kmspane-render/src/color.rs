#![forbid(unsafe_code)]

//! Opaque RGB colors and their `#RRGGBB` text form.

use std::fmt;
use std::str::FromStr;

/// An opaque color. Alpha is always 0xFF when written to a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(0xFF, 0xFF, 0xFF);

    /// Background of the root pane.
    pub const ROOT_BACKGROUND: Self = Self::rgb(0x22, 0x22, 0x88);

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Byte layout written into a canvas pixel (little-endian XRGB).
    #[inline]
    pub const fn to_bgra(self) -> [u8; 4] {
        [self.b, self.g, self.r, 0xFF]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Reasons a `#RRGGBB` string was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseColorError {
    /// The string does not start with `#`.
    MissingHash,
    /// The string is not exactly seven bytes long.
    InvalidLength(usize),
    /// A character after `#` is not a hex digit.
    InvalidDigit(char),
}

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHash => write!(f, "color must start with '#'"),
            Self::InvalidLength(len) => {
                write!(f, "color must be 7 characters (#RRGGBB), got {len}")
            }
            Self::InvalidDigit(ch) => write!(f, "invalid hex digit {ch:?} in color"),
        }
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(hex) = s.strip_prefix('#') else {
            return Err(ParseColorError::MissingHash);
        };
        if s.len() != 7 {
            return Err(ParseColorError::InvalidLength(s.len()));
        }
        if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ParseColorError::InvalidDigit(bad));
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| ParseColorError::InvalidLength(s.len()))?;
        Ok(Self::rgb((value >> 16) as u8, (value >> 8) as u8, value as u8))
    }
}
