//! Owned pixel buffers.

use common::error::try_alloc_zeroed;
use common::geometry::{Coord, Rect};
use common::{Color, CoreError, CoreResult};

use crate::format::ColorFormat;
use crate::pixel_view::{write_texel, PixelView, Texel};

/// A byte buffer holding the pixels of `active_area`, which is a part of the
/// logical extent `full_area`.
///
/// Rows are packed: the stride is the width of the active area. Pixel
/// accessors take absolute coordinates.
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    data: Vec<u8>,
    format: ColorFormat,
    full_area: Rect,
    active_area: Rect,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer covering all of `full_area`.
    pub fn allocate(full_area: Rect, format: ColorFormat) -> CoreResult<Self> {
        let bytes = required_bytes(&full_area, format);
        let data = try_alloc_zeroed(bytes)?;
        Ok(Self {
            data,
            format,
            full_area,
            active_area: full_area,
        })
    }

    /// Wrap existing storage. `data` must be large enough for `active_area`.
    pub fn from_vec(data: Vec<u8>, full_area: Rect, active_area: Rect, format: ColorFormat) -> CoreResult<Self> {
        let mut buf = Self {
            data,
            format,
            full_area,
            active_area: full_area,
        };
        buf.set_active_area(active_area)?;
        Ok(buf)
    }

    #[inline]
    pub fn format(&self) -> ColorFormat {
        self.format
    }

    #[inline]
    pub fn full_area(&self) -> Rect {
        self.full_area
    }

    #[inline]
    pub fn active_area(&self) -> Rect {
        self.active_area
    }

    /// Select which part of the full area the bytes currently represent.
    pub fn set_active_area(&mut self, area: Rect) -> CoreResult<()> {
        if !area.is_in(&self.full_area) {
            return Err(CoreError::invalid(format!(
                "active area {:?} outside of full area {:?}",
                area, self.full_area
            )));
        }

        let needed = required_bytes(&area, self.format);
        if needed > self.data.len() {
            return Err(CoreError::BufferTooSmall { needed, actual: self.data.len() });
        }

        self.active_area = area;
        Ok(())
    }

    /// Change the format and the active area together.
    pub fn set_layout(&mut self, format: ColorFormat, area: Rect) -> CoreResult<()> {
        let previous = self.format;
        self.format = format;
        if let Err(err) = self.set_active_area(area) {
            self.format = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Row stride in pixels.
    #[inline]
    pub fn stride(&self) -> usize {
        self.active_area.width().max(0) as usize
    }

    /// Size of the underlying storage.
    #[inline]
    pub fn capacity_bytes(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read-only view of the active area, with `(0, 0)` at its top-left corner.
    pub fn view(&self) -> CoreResult<PixelView<'_>> {
        PixelView::new(
            &self.data,
            self.active_area.width(),
            self.active_area.height(),
            self.stride(),
            self.format,
        )
    }

    /// Zero the whole storage.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Fill the active area with an opaque color.
    pub fn fill(&mut self, color: Color) {
        let area = self.active_area;
        for y in area.y1..=area.y2 {
            for x in area.x1..=area.x2 {
                self.set_pixel(x, y, Texel::new(color, color.a));
            }
        }
    }

    /// Read the pixel at absolute `(x, y)`. A8 pixels read back black.
    pub fn texel(&self, x: Coord, y: Coord) -> Option<Texel> {
        let a = &self.active_area;
        self.view().ok()?.texel(x - a.x1, y - a.y1, Color::BLACK)
    }

    pub fn color_at(&self, x: Coord, y: Coord) -> Option<Color> {
        self.texel(x, y).map(|t| t.color)
    }

    pub fn alpha_at(&self, x: Coord, y: Coord) -> Option<u8> {
        self.texel(x, y).map(|t| t.alpha)
    }

    /// Overwrite the pixel at absolute `(x, y)`. Pixels outside the active
    /// area are ignored.
    pub fn set_pixel(&mut self, x: Coord, y: Coord, texel: Texel) {
        let Some(idx) = self.index(x, y) else {
            return;
        };
        let plane = self.format.plane_offset(self.stride(), self.active_area.height().max(0) as usize);
        write_texel(&mut self.data, self.format, idx, plane, texel);
    }

    /// Composite `color` with coverage `alpha` over the pixel at `(x, y)`.
    pub fn blend_pixel(&mut self, x: Coord, y: Coord, color: Color, alpha: u8) {
        if alpha == 0 {
            return;
        }
        let Some(existing) = self.texel(x, y) else {
            return;
        };

        let bg = existing.color.with_alpha(existing.alpha);
        let out = color.with_alpha(0xFF).blend_over(bg, alpha);
        self.set_pixel(x, y, Texel::new(out, out.a));
    }

    #[inline]
    fn index(&self, x: Coord, y: Coord) -> Option<usize> {
        let a = &self.active_area;
        if x < a.x1 || x > a.x2 || y < a.y1 || y > a.y2 {
            return None;
        }
        Some((y - a.y1) as usize * self.stride() + (x - a.x1) as usize)
    }
}

/// Bytes needed to hold `area` in `format`.
pub fn required_bytes(area: &Rect, format: ColorFormat) -> usize {
    format.buffer_size(area.width().max(0) as usize, area.height().max(0) as usize)
}
