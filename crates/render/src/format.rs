//! Pixel formats and their byte layouts.

use common::Color;
use serde::{Deserialize, Serialize};

/// Bit depth of the display's native color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorDepth {
    /// 8 bit, `RRRGGGBB`.
    Rgb332,
    /// 16 bit little-endian, `RRRRRGGG GGGBBBBB`.
    Rgb565,
    /// 24 bit, stored as B, G, R.
    Rgb888,
    /// 32 bit, stored as B, G, R, X.
    #[default]
    Xrgb8888,
}

impl ColorDepth {
    /// Bytes per pixel.
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            ColorDepth::Rgb332 => 1,
            ColorDepth::Rgb565 => 2,
            ColorDepth::Rgb888 => 3,
            ColorDepth::Xrgb8888 => 4,
        }
    }

    /// Decode one pixel. `px` must hold at least [`bytes`](Self::bytes) bytes.
    #[inline]
    pub fn decode(self, px: &[u8]) -> Color {
        match self {
            ColorDepth::Rgb332 => Color::from_rgb332(px[0]),
            ColorDepth::Rgb565 => Color::from_rgb565(u16::from_le_bytes([px[0], px[1]])),
            ColorDepth::Rgb888 | ColorDepth::Xrgb8888 => Color::rgb(px[2], px[1], px[0]),
        }
    }

    /// Encode one pixel. `px` must hold at least [`bytes`](Self::bytes) bytes.
    #[inline]
    pub fn encode(self, color: Color, px: &mut [u8]) {
        match self {
            ColorDepth::Rgb332 => px[0] = color.to_rgb332(),
            ColorDepth::Rgb565 => px[..2].copy_from_slice(&color.to_rgb565().to_le_bytes()),
            ColorDepth::Rgb888 => {
                px[0] = color.b;
                px[1] = color.g;
                px[2] = color.r;
            }
            ColorDepth::Xrgb8888 => {
                px[0] = color.b;
                px[1] = color.g;
                px[2] = color.r;
                px[3] = 0xFF;
            }
        }
    }
}

impl ColorDepth {
    /// The color as it reads back after a round trip through this depth.
    pub fn quantize(self, color: Color) -> Color {
        let mut px = [0u8; 4];
        self.encode(color, &mut px);
        self.decode(&px)
    }
}

/// Layout of a raster in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    /// Opaque native color.
    Native(ColorDepth),
    /// Native color where the chroma-key color is transparent.
    NativeChromaKeyed(ColorDepth),
    /// Native color followed by one alpha byte per pixel.
    /// For 32 bit depth the alpha replaces the X byte.
    NativeAlpha(ColorDepth),
    /// B, G, R, A.
    Argb8888,
    /// Alpha only. The color comes from the caller.
    A8,
    /// A plane of native color followed by a plane of A8 with the same stride.
    NativeA8Plane(ColorDepth),
}

impl ColorFormat {
    /// Bytes per pixel in the primary plane.
    pub const fn pixel_size(self) -> usize {
        match self {
            ColorFormat::Native(d) | ColorFormat::NativeChromaKeyed(d) | ColorFormat::NativeA8Plane(d) => d.bytes(),
            ColorFormat::NativeAlpha(ColorDepth::Xrgb8888) => 4,
            ColorFormat::NativeAlpha(d) => d.bytes() + 1,
            ColorFormat::Argb8888 => 4,
            ColorFormat::A8 => 1,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            ColorFormat::NativeAlpha(_) | ColorFormat::Argb8888 | ColorFormat::A8 | ColorFormat::NativeA8Plane(_)
        )
    }

    pub const fn is_chroma_keyed(self) -> bool {
        matches!(self, ColorFormat::NativeChromaKeyed(_))
    }

    /// Offset of the byte after the primary plane, where an A8 plane starts.
    #[inline]
    pub const fn plane_offset(self, stride: usize, height: usize) -> usize {
        stride * height * self.pixel_size()
    }

    /// Total bytes needed for `height` rows of `stride` pixels.
    pub const fn buffer_size(self, stride: usize, height: usize) -> usize {
        let main = self.plane_offset(stride, height);
        match self {
            ColorFormat::NativeA8Plane(_) => main + stride * height,
            _ => main,
        }
    }

    /// Format of a layer buffer for the given native depth.
    pub const fn layer(depth: ColorDepth, with_alpha: bool) -> Self {
        if with_alpha {
            ColorFormat::NativeAlpha(depth)
        } else {
            ColorFormat::Native(depth)
        }
    }
}
