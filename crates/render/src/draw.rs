//! Draw context and the image blit seam.
//!
//! The surrounding renderer owns a [`DrawContext`] describing where pixels go.
//! Image blits are issued through a [`DrawUnit`]; [`SoftwareDrawUnit`] is the
//! CPU implementation built on the transform sampler.

use std::fmt;
use std::sync::Arc;

use common::color::mul_255;
use common::geometry::{transformed_area, Coord, Point, Rect};
use common::{Color, CoreError, CoreResult, OPA_COVER, ZOOM_NONE};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

use crate::buffer::PixelBuffer;
use crate::format::ColorFormat;
use crate::pixel_view::{PixelView, Texel};
use crate::transform::{transform, TransformParams};

/// Shared handle to a pixel buffer being drawn into.
///
/// Two targets are equal only if they are the same buffer.
#[derive(Clone)]
pub struct DrawTarget(Arc<RwLock<PixelBuffer>>);

impl DrawTarget {
    pub fn new(buffer: PixelBuffer) -> Self {
        Self(Arc::new(RwLock::new(buffer)))
    }

    /// Stable identity of the underlying buffer for as long as it lives.
    #[inline]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn read(&self) -> RwLockReadGuard<'_, PixelBuffer> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, PixelBuffer> {
        self.0.write()
    }

    /// Number of live handles to the buffer, this one included.
    #[inline]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl PartialEq for DrawTarget {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for DrawTarget {}

impl fmt::Debug for DrawTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DrawTarget({:#x})", self.id())
    }
}

/// Where drawing operations currently write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawContext {
    pub buf: Option<DrawTarget>,
    /// Absolute area the buffer's pixels represent.
    pub buf_area: Rect,
    /// Absolute area drawing is limited to.
    pub clip_area: Rect,
    pub render_with_alpha: bool,
}

impl DrawContext {
    /// Context drawing into the whole active area of `target`.
    pub fn new(target: DrawTarget) -> Self {
        let (area, has_alpha) = {
            let buf = target.read();
            (buf.active_area(), buf.format().has_alpha())
        };
        Self {
            buf: Some(target),
            buf_area: area,
            clip_area: area,
            render_with_alpha: has_alpha,
        }
    }
}

/// An immutable source image.
#[derive(Clone, Debug)]
pub struct ImageDescriptor {
    data: Arc<[u8]>,
    width: Coord,
    height: Coord,
    stride: usize,
    format: ColorFormat,
}

impl ImageDescriptor {
    pub fn new(data: impl Into<Arc<[u8]>>, width: Coord, height: Coord, stride: usize, format: ColorFormat) -> CoreResult<Self> {
        let data = data.into();
        PixelView::new(&data, width, height, stride, format)?;
        Ok(Self { data, width, height, stride, format })
    }

    pub fn packed(data: impl Into<Arc<[u8]>>, width: Coord, height: Coord, format: ColorFormat) -> CoreResult<Self> {
        Self::new(data, width, height, width.max(0) as usize, format)
    }

    pub fn view(&self) -> CoreResult<PixelView<'_>> {
        PixelView::new(&self.data, self.width, self.height, self.stride, self.format)
    }

    /// Size of the pixel data.
    pub fn byte_size(&self) -> usize {
        self.data.len()
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
    pub fn format(&self) -> ColorFormat {
        self.format
    }
}

/// Parameters of a single image blit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDrawParams {
    pub angle: i32,
    pub zoom: u32,
    /// Relative to the image's top-left corner.
    pub pivot: Point,
    pub antialias: bool,
    pub opa: u8,
    pub chroma_key: Color,
    pub recolor: Color,
}

impl Default for ImageDrawParams {
    fn default() -> Self {
        Self {
            angle: 0,
            zoom: ZOOM_NONE,
            pivot: Point::ZERO,
            antialias: true,
            opa: OPA_COVER,
            chroma_key: Color::CHROMA_KEY,
            recolor: Color::BLACK,
        }
    }
}

impl ImageDrawParams {
    pub fn transform_params(&self) -> TransformParams {
        TransformParams {
            angle: self.angle,
            zoom: self.zoom,
            pivot: self.pivot,
            antialias: self.antialias,
            chroma_key: self.chroma_key,
            recolor: self.recolor,
        }
    }
}

/// Executes draw operations against a [`DrawContext`].
pub trait DrawUnit: Send + Sync {
    /// Blit `src`, whose untransformed top-left corner lands at `pos`.
    fn draw_image(&self, ctx: &DrawContext, src: &PixelView<'_>, pos: Point, params: &ImageDrawParams) -> CoreResult<()>;

    /// Block until every queued operation has finished.
    fn wait_for_finish(&self) {}

    fn name(&self) -> &str;
}

/// Texels sampled per batch.
const CHUNK_PIXELS: usize = 4096;

/// CPU draw unit. Draws synchronously on the calling thread.
#[derive(Debug, Default)]
pub struct SoftwareDrawUnit;

impl SoftwareDrawUnit {
    pub fn new() -> Self {
        Self
    }
}

impl DrawUnit for SoftwareDrawUnit {
    fn draw_image(&self, ctx: &DrawContext, src: &PixelView<'_>, pos: Point, params: &ImageDrawParams) -> CoreResult<()> {
        let target = ctx.buf.as_ref().ok_or_else(|| CoreError::render("draw context has no buffer"))?;
        if params.opa == 0 || params.zoom == 0 {
            return Ok(());
        }

        let mut covered = transformed_area(src.width(), src.height(), params.angle, params.zoom, params.pivot);
        covered.move_by(pos.x, pos.y);

        let mut buf = target.write();
        let Some(draw_area) = covered
            .intersect(&ctx.clip_area)
            .and_then(|a| a.intersect(&ctx.buf_area))
            .and_then(|a| a.intersect(&buf.active_area()))
        else {
            return Ok(());
        };

        trace!(?draw_area, angle = params.angle, zoom = params.zoom, "software image blit");

        let tr = params.transform_params();
        let width = draw_area.width() as usize;
        let rows_per_chunk = (CHUNK_PIXELS / width).max(1) as Coord;
        let mut texels = vec![Texel::TRANSPARENT; width * rows_per_chunk as usize];

        let mut y = draw_area.y1;
        while y <= draw_area.y2 {
            let y2 = (y + rows_per_chunk - 1).min(draw_area.y2);
            let chunk = Rect::new(draw_area.x1, y, draw_area.x2, y2);

            // The sampler works in image-relative coordinates.
            let mut rel = chunk;
            rel.move_by(-pos.x, -pos.y);
            let out = &mut texels[..chunk.size() as usize];
            transform(&rel, src, &tr, out);

            for (i, texel) in out.iter().enumerate() {
                let alpha = mul_255(texel.alpha, params.opa);
                if alpha == 0 {
                    continue;
                }
                let x = chunk.x1 + (i % width) as Coord;
                let y = chunk.y1 + (i / width) as Coord;
                buf.blend_pixel(x, y, texel.color, alpha);
            }

            y = y2 + 1;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "software"
    }
}
