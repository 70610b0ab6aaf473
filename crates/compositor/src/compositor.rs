//! Layer compositor.
//!
//! A layer redirects drawing into an off-screen buffer and later blends that
//! buffer back into the caller's target as an image.

use std::sync::Arc;

use cache::{LruCache, ResourceKey};
use common::geometry::Rect;
use common::{CoreError, ZOOM_NONE};
use parking_lot::Mutex;
use render::buffer::required_bytes;
use render::{ColorFormat, DrawContext, DrawTarget, DrawUnit, ImageDrawParams, PixelBuffer};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::allocator::{HeapAllocator, LayerAllocator};
use crate::layer::{LayerConfig, LayerContext, LayerFlags, LayerState};

/// Layer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayerError {
    #[error("layer area {0:?} is empty")]
    EmptyArea(Rect),

    #[error("failed to allocate a layer buffer of {0} bytes")]
    Alloc(usize),

    #[error("cannot {op} a layer in state {state:?}")]
    InvalidState { state: LayerState, op: &'static str },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type LayerResult<T> = Result<T, LayerError>;

/// Compositor statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositorStats {
    /// Layers successfully created.
    pub layers_created: u64,
    /// Layers that fell back to the smaller buffer.
    pub fallback_allocations: u64,
    /// Bands (or whole layers) blended back.
    pub blends: u64,
    /// Layers destroyed without a final blend.
    pub aborted: u64,
}

/// Creates, adjusts, blends and destroys layers.
pub struct Compositor {
    allocator: Arc<dyn LayerAllocator>,
    config: LayerConfig,
    stats: Mutex<CompositorStats>,
}

impl Compositor {
    pub fn new(config: LayerConfig) -> Self {
        Self::with_allocator(config, Arc::new(HeapAllocator))
    }

    pub fn with_allocator(config: LayerConfig, allocator: Arc<dyn LayerAllocator>) -> Self {
        Self {
            allocator,
            config,
            stats: Mutex::new(CompositorStats::default()),
        }
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn stats(&self) -> CompositorStats {
        self.stats.lock().clone()
    }

    /// Start a layer covering `area`.
    ///
    /// A subdividable layer gets a small buffer holding one band of rows at a
    /// time and starts with its first row active; the draw context is pointed
    /// at it by [`adjust`](Self::adjust). Any other layer gets a zeroed
    /// buffer for the whole area, swapped into `ctx` right away.
    pub fn create(&self, ctx: &mut DrawContext, area: Rect, flags: LayerFlags) -> LayerResult<LayerContext> {
        if area.width() <= 0 || area.height() <= 0 {
            return Err(LayerError::EmptyArea(area));
        }

        let depth = self.config.color_depth;
        let width = area.width() as usize;
        let alpha_px = ColorFormat::NativeAlpha(depth).pixel_size();
        let plain_px = ColorFormat::Native(depth).pixel_size();
        let format = ColorFormat::layer(depth, flags.has_alpha);
        let full_size = width * area.height() as usize * format.pixel_size();

        let layer = if flags.can_subdivide {
            // At least one row in either mode must fit.
            let row_bytes = width * alpha_px;
            let ideal = self.config.simple_buf_size.max(row_bytes).min(full_size.max(row_bytes));

            let (data, buffer_size) = match self.allocator.allocate(ideal) {
                Ok(data) => (data, ideal),
                Err(err) => {
                    let fallback = self.config.fallback_buf_size.max(row_bytes).min(ideal);
                    warn!(%err, ideal, fallback, "layer buffer allocation failed, retrying with fallback size");
                    let data = self
                        .allocator
                        .allocate(fallback)
                        .map_err(|_| LayerError::Alloc(fallback))?;
                    self.stats.lock().fallback_allocations += 1;
                    (data, fallback)
                }
            };

            let first_row = Rect::new(area.x1, area.y1, area.x2, area.y1);
            let buffer = PixelBuffer::from_vec(data, area, first_row, format)?;

            LayerContext {
                full_area: area,
                target: DrawTarget::new(buffer),
                saved: ctx.clone(),
                flags,
                state: LayerState::Created,
                max_rows_with_alpha: (buffer_size / width / alpha_px) as i32,
                max_rows_without_alpha: (buffer_size / width / plain_px) as i32,
                buffer_size,
            }
        } else {
            let data = self
                .allocator
                .allocate(full_size)
                .map_err(|_| LayerError::Alloc(full_size))?;
            let buffer = PixelBuffer::from_vec(data, area, area, format)?;
            let target = DrawTarget::new(buffer);
            let saved = ctx.clone();

            ctx.buf = Some(target.clone());
            ctx.buf_area = area;
            ctx.clip_area = area;
            ctx.render_with_alpha = flags.has_alpha;

            LayerContext {
                full_area: area,
                target,
                saved,
                flags,
                state: LayerState::Created,
                max_rows_with_alpha: area.height(),
                max_rows_without_alpha: area.height(),
                buffer_size: full_size,
            }
        };

        self.stats.lock().layers_created += 1;
        debug!(?area, ?flags, buffer_size = layer.buffer_size, "created layer");
        Ok(layer)
    }

    /// Apply `flags` to the layer and point `ctx` at its active area.
    ///
    /// For a subdividable layer the active area grows to a full band for the
    /// selected alpha mode. Turning alpha on clears the buffer. A whole-area
    /// layer that is too small for the alpha format gets a new buffer, so
    /// handles to its target stay valid. On error the layer and `ctx` are
    /// left as they were.
    pub fn adjust(&self, ctx: &mut DrawContext, layer: &mut LayerContext, flags: LayerFlags) -> LayerResult<()> {
        if !matches!(layer.state, LayerState::Created | LayerState::Adjusted) {
            return Err(LayerError::InvalidState { state: layer.state, op: "adjust" });
        }

        let format = ColorFormat::layer(self.config.color_depth, flags.has_alpha);
        let active = if layer.flags.can_subdivide {
            let y1 = layer.target.read().active_area().y1;
            layer.band_at(y1, flags.has_alpha)
        } else {
            layer.full_area
        };

        let grown = {
            let mut buf = layer.target.write();
            let grown = match buf.set_layout(format, active) {
                Ok(()) => None,
                Err(CoreError::BufferTooSmall { .. }) if !layer.flags.can_subdivide => {
                    let (buffer, size) = self.grow_buffer(layer.full_area, layer.buffer_size, format)?;
                    *buf = buffer;
                    Some(size)
                }
                Err(err) => return Err(err.into()),
            };
            if flags.has_alpha {
                buf.clear();
            }
            grown
        };

        if let Some(size) = grown {
            layer.buffer_size = size;
        }
        layer.flags.has_alpha = flags.has_alpha;

        ctx.buf = Some(layer.target.clone());
        ctx.buf_area = active;
        ctx.clip_area = active;
        ctx.render_with_alpha = flags.has_alpha;

        layer.state = LayerState::Adjusted;
        trace!(?active, has_alpha = flags.has_alpha, "adjusted layer");
        Ok(())
    }

    /// Allocate a buffer for all of `area` in `format` to replace one of
    /// `old_size` bytes, which goes back to the allocator. Returns the new
    /// buffer and its size.
    fn grow_buffer(&self, area: Rect, old_size: usize, format: ColorFormat) -> LayerResult<(PixelBuffer, usize)> {
        let needed = required_bytes(&area, format);
        let data = self.allocator.allocate(needed).map_err(|_| LayerError::Alloc(needed))?;
        let buffer = match PixelBuffer::from_vec(data, area, area, format) {
            Ok(buffer) => buffer,
            Err(err) => {
                self.allocator.release(needed);
                return Err(err.into());
            }
        };

        self.allocator.release(old_size);
        debug!(from = old_size, to = needed, "reallocated layer buffer for alpha");
        Ok((buffer, needed))
    }

    /// Restore `ctx` and draw the layer's active area into it through `unit`.
    ///
    /// Any cached texture derived from the layer buffer is dropped first.
    /// Returns after `unit` reports the draw finished.
    pub fn blend<V>(
        &self,
        ctx: &mut DrawContext,
        layer: &mut LayerContext,
        unit: &dyn DrawUnit,
        cache: &LruCache<V>,
        params: &ImageDrawParams,
    ) -> LayerResult<()> {
        if !matches!(layer.state, LayerState::Created | LayerState::Adjusted) {
            return Err(LayerError::InvalidState { state: layer.state, op: "blend" });
        }

        let key = ResourceKey::Texture { buffer_id: layer.target.id() }.to_bytes();
        if let Err(err) = cache.delete(&key) {
            warn!(%err, "could not invalidate cached layer texture");
        }

        *ctx = layer.saved.clone();

        let result = {
            let buf = layer.target.read();
            let view = buf.view()?;
            unit.draw_image(ctx, &view, buf.active_area().origin(), params)
        };
        unit.wait_for_finish();

        layer.state = LayerState::Blended;
        self.stats.lock().blends += 1;
        trace!(unit = unit.name(), "blended layer");
        result.map_err(LayerError::from)
    }

    /// Free the layer buffer. The draw context is not touched.
    ///
    /// No draw context may still point at the layer: restore the caller's
    /// context first, through [`blend`](Self::blend) or from
    /// [`LayerContext::saved_context`], as [`draw_layered`](Self::draw_layered)
    /// does on error.
    pub fn destroy(&self, mut layer: LayerContext) {
        debug_assert_eq!(
            layer.target.handle_count(),
            1,
            "layer destroyed while a draw context still points at it"
        );

        if layer.state != LayerState::Blended {
            debug!(state = ?layer.state, "destroying layer without blending");
            self.stats.lock().aborted += 1;
        }

        layer.state = LayerState::Destroyed;
        self.allocator.release(layer.buffer_size);
        debug!(area = ?layer.full_area, "destroyed layer");
    }

    /// Render `area` through a layer.
    ///
    /// `draw` is called with the context pointing at the layer, once for a
    /// whole-area layer or once per band of a subdividable one. On error the
    /// caller's context is restored and the layer discarded.
    pub fn draw_layered<V, F>(
        &self,
        ctx: &mut DrawContext,
        unit: &dyn DrawUnit,
        cache: &LruCache<V>,
        area: Rect,
        flags: LayerFlags,
        params: &ImageDrawParams,
        mut draw: F,
    ) -> LayerResult<()>
    where
        F: FnMut(&DrawContext, &dyn DrawUnit) -> Result<(), CoreError>,
    {
        // Bands can only be blended independently without a transform.
        let flags = LayerFlags {
            can_subdivide: flags.can_subdivide && params.angle == 0 && params.zoom == ZOOM_NONE,
            ..flags
        };

        let mut layer = self.create(ctx, area, flags)?;

        let result = (|| -> LayerResult<()> {
            loop {
                self.adjust(ctx, &mut layer, flags)?;
                draw(ctx, unit)?;
                self.blend(ctx, &mut layer, unit, cache, params)?;
                if !layer.next_band()? {
                    return Ok(());
                }
            }
        })();

        if result.is_err() {
            *ctx = layer.saved.clone();
        }
        self.destroy(layer);
        result
    }
}

impl LayerContext {
    /// Move a blended subdividable layer to its next band.
    ///
    /// Returns `false` once the full area has been covered.
    pub fn next_band(&mut self) -> LayerResult<bool> {
        if self.state != LayerState::Blended {
            return Err(LayerError::InvalidState { state: self.state, op: "advance" });
        }
        if !self.flags.can_subdivide {
            return Ok(false);
        }

        let y1 = self.target.read().active_area().y2 + 1;
        if y1 > self.full_area.y2 {
            return Ok(false);
        }

        let band = self.band_at(y1, self.flags.has_alpha);
        self.target.write().set_active_area(band)?;
        self.state = LayerState::Created;
        Ok(true)
    }
}
