//! Read-only view of a raster.
//!
//! All offset and bounds arithmetic for reading pixels lives here so the
//! sampler never indexes raw bytes itself.

use common::geometry::Coord;
use common::{Color, CoreError, CoreResult, OPA_COVER};

use crate::format::ColorFormat;

/// A color and its opacity as read from a raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Texel {
    pub color: Color,
    pub alpha: u8,
}

impl Texel {
    pub const TRANSPARENT: Texel = Texel { color: Color::BLACK, alpha: 0 };

    #[inline]
    pub const fn new(color: Color, alpha: u8) -> Self {
        Self { color, alpha }
    }
}

/// A borrowed raster: bytes, dimensions, row stride (in pixels) and format.
#[derive(Clone, Copy, Debug)]
pub struct PixelView<'a> {
    data: &'a [u8],
    width: Coord,
    height: Coord,
    stride: usize,
    format: ColorFormat,
}

impl<'a> PixelView<'a> {
    /// Wrap `data`, checking that it covers `stride * height` pixels of `format`.
    pub fn new(data: &'a [u8], width: Coord, height: Coord, stride: usize, format: ColorFormat) -> CoreResult<Self> {
        if width < 0 || height < 0 {
            return Err(CoreError::invalid(format!("negative raster size {}x{}", width, height)));
        }
        if stride < width as usize {
            return Err(CoreError::invalid(format!("stride {} smaller than width {}", stride, width)));
        }

        let needed = format.buffer_size(stride, height as usize);
        if data.len() < needed {
            return Err(CoreError::BufferTooSmall { needed, actual: data.len() });
        }

        Ok(Self { data, width, height, stride, format })
    }

    /// View of a tightly packed raster (`stride == width`).
    pub fn packed(data: &'a [u8], width: Coord, height: Coord, format: ColorFormat) -> CoreResult<Self> {
        Self::new(data, width, height, width.max(0) as usize, format)
    }

    #[inline]
    pub fn width(&self) -> Coord {
        self.width
    }

    #[inline]
    pub fn height(&self) -> Coord {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn format(&self) -> ColorFormat {
        self.format
    }

    #[inline]
    pub fn contains(&self, x: Coord, y: Coord) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    #[inline]
    fn index(&self, x: Coord, y: Coord) -> usize {
        y as usize * self.stride + x as usize
    }

    /// Read the pixel at `(x, y)`. `recolor` is the color reported for A8 rasters.
    pub fn texel(&self, x: Coord, y: Coord, recolor: Color) -> Option<Texel> {
        if !self.contains(x, y) {
            return None;
        }

        let plane = self.format.plane_offset(self.stride, self.height as usize);
        Some(read_texel(self.data, self.format, self.index(x, y), plane, recolor))
    }
}

/// Decode pixel number `idx` of a raster. `plane` is where the A8 plane
/// starts for formats that have one.
pub(crate) fn read_texel(data: &[u8], format: ColorFormat, idx: usize, plane: usize, recolor: Color) -> Texel {
    let px_size = format.pixel_size();
    let px = &data[idx * px_size..(idx + 1) * px_size];

    match format {
        ColorFormat::Native(d) | ColorFormat::NativeChromaKeyed(d) => Texel::new(d.decode(px), OPA_COVER),
        ColorFormat::NativeAlpha(d) => Texel::new(d.decode(px), px[px_size - 1]),
        ColorFormat::Argb8888 => Texel::new(Color::rgb(px[2], px[1], px[0]), px[3]),
        ColorFormat::A8 => Texel::new(recolor.with_alpha(OPA_COVER), px[0]),
        ColorFormat::NativeA8Plane(d) => Texel::new(d.decode(px), data[plane + idx]),
    }
}

/// Encode `texel` as pixel number `idx` of a raster. The inverse of [`read_texel`].
pub(crate) fn write_texel(data: &mut [u8], format: ColorFormat, idx: usize, plane: usize, texel: Texel) {
    let px_size = format.pixel_size();
    let px = &mut data[idx * px_size..(idx + 1) * px_size];

    match format {
        ColorFormat::Native(d) | ColorFormat::NativeChromaKeyed(d) => d.encode(texel.color, px),
        ColorFormat::NativeAlpha(d) => {
            d.encode(texel.color, px);
            px[px_size - 1] = texel.alpha;
        }
        ColorFormat::Argb8888 => px.copy_from_slice(&[texel.color.b, texel.color.g, texel.color.r, texel.alpha]),
        ColorFormat::A8 => px[0] = texel.alpha,
        ColorFormat::NativeA8Plane(d) => {
            d.encode(texel.color, px);
            data[plane + idx] = texel.alpha;
        }
    }
}
