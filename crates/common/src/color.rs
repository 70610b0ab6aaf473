//! Color representation and packed-color codecs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// RGBA color with 8-bit components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    255
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);

    /// Default chroma-key color.
    pub const CHROMA_KEY: Color = Color::GREEN;

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse color from hex string (e.g., "#ff0000", "#f00", "#ff000080").
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();

        match hex.len() {
            3 => Some(Self::rgb(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17)),
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// Same color with a different alpha.
    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Compare the color channels only.
    #[inline]
    pub fn eq_rgb(&self, other: &Color) -> bool {
        self.r == other.r && self.g == other.g && self.b == other.b
    }

    /// Mix `self` into `bg`. `ratio == 255` gives `self`, `0` gives `bg`.
    /// The result is opaque.
    #[inline]
    pub fn mix(self, bg: Color, ratio: u8) -> Color {
        Color::rgb(
            mix_channel(self.r, bg.r, ratio),
            mix_channel(self.g, bg.g, ratio),
            mix_channel(self.b, bg.b, ratio),
        )
    }

    /// Source-over composite of `self` (with coverage `opa`) onto `bg`,
    /// taking the alpha of both into account.
    pub fn blend_over(self, bg: Color, opa: u8) -> Color {
        let src_a = mul_255(self.a, opa);
        if src_a == 255 || bg.a == 0 {
            return self.with_alpha(src_a);
        }
        if src_a == 0 {
            return bg;
        }
        if bg.a == 255 {
            return self.mix(bg, src_a);
        }

        let out_a = 255 - mul_255(255 - src_a, 255 - bg.a);
        // Weight of the source color in the result.
        let ratio = ((u32::from(src_a) * 255 + u32::from(out_a) / 2) / u32::from(out_a)) as u8;
        self.mix(bg, ratio).with_alpha(out_a)
    }

    pub fn to_rgb565(self) -> u16 {
        (u16::from(self.r >> 3) << 11) | (u16::from(self.g >> 2) << 5) | u16::from(self.b >> 3)
    }

    pub fn from_rgb565(v: u16) -> Self {
        let r = ((v >> 11) & 0x1F) as u8;
        let g = ((v >> 5) & 0x3F) as u8;
        let b = (v & 0x1F) as u8;
        Self::rgb((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
    }

    pub fn to_rgb332(self) -> u8 {
        (self.r & 0xE0) | ((self.g & 0xE0) >> 3) | (self.b >> 6)
    }

    pub fn from_rgb332(v: u8) -> Self {
        let r = v >> 5;
        let g = (v >> 2) & 0x07;
        let b = v & 0x03;
        Self::rgb(
            ((u16::from(r) * 255) / 7) as u8,
            ((u16::from(g) * 255) / 7) as u8,
            b * 85,
        )
    }
}

/// `a * b / 255`, rounded.
#[inline]
pub fn mul_255(a: u8, b: u8) -> u8 {
    ((u32::from(a) * u32::from(b) + 127) / 255) as u8
}

#[inline]
fn mix_channel(fg: u8, bg: u8, ratio: u8) -> u8 {
    let ratio = u32::from(ratio);
    ((u32::from(fg) * ratio + u32::from(bg) * (255 - ratio) + 127) / 255) as u8
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        assert_eq!(Color::from_hex("#ff0000"), Some(Color::RED));
        assert_eq!(Color::from_hex("0f0"), Some(Color::GREEN));
        assert_eq!(Color::from_hex("#00000080"), Some(Color::rgba(0, 0, 0, 128)));
        assert_eq!(Color::from_hex("#zz0000"), None);
        assert_eq!(Color::from_hex("#12345"), None);
    }

    #[test]
    fn test_mix_extremes() {
        let a = Color::rgb(200, 100, 50);
        let b = Color::rgb(0, 50, 250);
        assert_eq!(a.mix(b, 255), a);
        assert_eq!(a.mix(b, 0), b);
        assert_eq!(a.mix(a, 77), a);
    }

    #[test]
    fn test_blend_over() {
        assert_eq!(Color::RED.blend_over(Color::BLUE, 255), Color::RED);
        assert_eq!(Color::RED.blend_over(Color::BLUE, 0), Color::BLUE);
        assert_eq!(Color::RED.blend_over(Color::TRANSPARENT, 128).a, 128);

        let half = Color::RED.blend_over(Color::BLUE.with_alpha(128), 128);
        assert!(half.a > 128);
        assert!(half.r > 0 && half.b > 0);
    }

    #[test]
    fn test_rgb565_round_trip_primaries() {
        for c in [Color::RED, Color::GREEN, Color::BLUE, Color::WHITE, Color::BLACK] {
            assert_eq!(Color::from_rgb565(c.to_rgb565()), c);
        }
        assert_eq!(Color::RED.to_rgb565(), 0xF800);
    }

    #[test]
    fn test_rgb332_primaries() {
        assert_eq!(Color::RED.to_rgb332(), 0xE0);
        assert_eq!(Color::from_rgb332(0xE0), Color::RED);
        assert_eq!(Color::from_rgb332(0x03), Color::BLUE);
    }
}
