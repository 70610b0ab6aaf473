//! Render context: the cache, compositor and draw unit shared by one renderer.

use std::sync::Arc;

use cache::{CacheError, LruCache, ResourceKey};
use common::geometry::{Coord, Rect};
use common::CoreError;
use compositor::{BudgetAllocator, Compositor, LayerError, LayerFlags};
use render::buffer::required_bytes;
use render::{mask, DrawContext, DrawTarget, DrawUnit, ImageDescriptor, ImageDrawParams, Mask, SoftwareDrawUnit};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig};

/// Engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("layer error: {0}")]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// A value held by the resource cache.
#[derive(Clone, Debug)]
pub enum Resource {
    Mask(Arc<Mask>),
    Image(ImageDescriptor),
}

impl Resource {
    /// Bytes charged against the cache capacity.
    pub fn cost(&self) -> usize {
        match self {
            Resource::Mask(mask) => mask.byte_size(),
            Resource::Image(image) => image.byte_size(),
        }
    }
}

pub type ResourceCache = LruCache<Resource>;

/// Owns the shared rendering services.
pub struct RenderContext {
    config: EngineConfig,
    cache: Arc<ResourceCache>,
    compositor: Compositor,
    draw_unit: Arc<dyn DrawUnit>,
}

impl RenderContext {
    /// Build the services described by `config`.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::with_draw_unit(config, Arc::new(SoftwareDrawUnit::new()))
    }

    /// Like [`new`](Self::new) with a custom draw unit.
    pub fn with_draw_unit(config: EngineConfig, draw_unit: Arc<dyn DrawUnit>) -> EngineResult<Self> {
        config.validate()?;

        let cache = LruCache::new(config.cache.capacity_bytes, config.cache.avg_entry_size)?
            .with_lock_timeout(config.cache.lock_timeout());

        let compositor = match config.layer.memory_budget {
            Some(budget) => Compositor::with_allocator(config.layer_config(), Arc::new(BudgetAllocator::new(budget))),
            None => Compositor::new(config.layer_config()),
        };

        info!(
            depth = ?config.color_depth,
            cache_bytes = config.cache.capacity_bytes,
            draw_unit = draw_unit.name(),
            "render context ready"
        );

        Ok(Self {
            config,
            cache: Arc::new(cache),
            compositor,
            draw_unit,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn draw_unit(&self) -> &dyn DrawUnit {
        self.draw_unit.as_ref()
    }

    /// Blit parameters carrying the configured chroma key.
    pub fn image_params(&self) -> ImageDrawParams {
        ImageDrawParams {
            chroma_key: self.config.chroma_key,
            ..ImageDrawParams::default()
        }
    }

    /// Render `area` through a layer. See [`Compositor::draw_layered`].
    pub fn draw_layered<F>(
        &self,
        ctx: &mut DrawContext,
        area: Rect,
        flags: LayerFlags,
        params: &ImageDrawParams,
        draw: F,
    ) -> EngineResult<()>
    where
        F: FnMut(&DrawContext, &dyn DrawUnit) -> Result<(), CoreError>,
    {
        self.compositor
            .draw_layered(ctx, self.draw_unit.as_ref(), &*self.cache, area, flags, params, draw)?;
        Ok(())
    }

    /// Blurred rounded-rectangle shadow mask, built once and then served
    /// from the cache.
    pub fn shadow_mask(&self, width: Coord, height: Coord, radius: Coord, blur: Coord) -> EngineResult<Arc<Mask>> {
        if width <= 0 || height <= 0 {
            return Err(CoreError::invalid(format!("shadow of empty size {}x{}", width, height)).into());
        }

        let key = ResourceKey::Shadow { width, height, radius, blur }.to_bytes();
        if let Some(Resource::Mask(mask)) = self.cache.get(&key)? {
            return Ok(mask);
        }

        let mask = Arc::new(mask::shadow(width, height, radius, blur));
        debug!(width, height, radius, blur, bytes = mask.byte_size(), "built shadow mask");
        self.store(&key, Resource::Mask(mask.clone()));
        Ok(mask)
    }

    /// Snapshot of the active area of `target` as an image, cached until
    /// the buffer is next blended as a layer.
    pub fn texture(&self, target: &DrawTarget) -> EngineResult<ImageDescriptor> {
        let key = ResourceKey::Texture { buffer_id: target.id() }.to_bytes();
        if let Some(Resource::Image(image)) = self.cache.get(&key)? {
            return Ok(image);
        }

        let image = {
            let buf = target.read();
            let area = buf.active_area();
            let bytes = required_bytes(&area, buf.format());
            ImageDescriptor::packed(buf.as_bytes()[..bytes].to_vec(), area.width(), area.height(), buf.format())?
        };
        self.store(&key, Resource::Image(image.clone()));
        Ok(image)
    }

    fn store(&self, key: &[u8], resource: Resource) {
        let cost = resource.cost();
        if let Err(err) = self.cache.set(key, resource, cost) {
            warn!(%err, cost, "resource not cached");
        }
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("draw_unit", &self.draw_unit.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Color;
    use compositor::LayerState;
    use render::{ColorDepth, ColorFormat, PixelBuffer};

    fn screen(area: Rect) -> DrawContext {
        let mut buf = PixelBuffer::allocate(area, ColorFormat::Native(ColorDepth::Xrgb8888)).unwrap();
        buf.fill(Color::WHITE);
        DrawContext::new(DrawTarget::new(buf))
    }

    fn fill_layer(ctx: &DrawContext, color: Color) -> Result<(), CoreError> {
        let target = ctx.buf.as_ref().ok_or_else(|| CoreError::render("no layer buffer"))?;
        target.write().fill(color);
        Ok(())
    }

    #[test]
    fn test_new_uses_config() {
        let rc = RenderContext::new(EngineConfig::new().with_cache(8192, 512)).unwrap();
        assert_eq!(rc.cache().capacity(), 8192);
        assert!(rc.cache().is_empty());
        assert_eq!(rc.draw_unit().name(), "software");
        assert_eq!(rc.compositor().config().color_depth, ColorDepth::Xrgb8888);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = RenderContext::new(EngineConfig::new().with_cache(0, 512));
        assert!(matches!(result, Err(EngineError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_image_params_use_chroma_key() {
        let rc = RenderContext::new(EngineConfig::new().with_chroma_key(Color::BLUE)).unwrap();
        assert_eq!(rc.image_params().chroma_key, Color::BLUE);
    }

    #[test]
    fn test_shadow_mask_is_cached() {
        let rc = RenderContext::new(EngineConfig::default()).unwrap();
        let first = rc.shadow_mask(20, 10, 4, 6).unwrap();
        assert_eq!(first.width, 32);
        assert_eq!(first.height, 22);

        let second = rc.shadow_mask(20, 10, 4, 6).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = rc.cache().stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(rc.cache().free_memory(), rc.cache().capacity() - first.byte_size());

        let other = rc.shadow_mask(20, 10, 4, 2).unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(rc.cache().len(), 2);
    }

    #[test]
    fn test_shadow_mask_too_large_to_cache() {
        let rc = RenderContext::new(EngineConfig::new().with_cache(64, 16)).unwrap();
        let mask = rc.shadow_mask(20, 20, 0, 0).unwrap();
        assert_eq!(mask.byte_size(), 400);
        assert!(rc.cache().is_empty());
    }

    #[test]
    fn test_shadow_mask_empty_size() {
        let rc = RenderContext::new(EngineConfig::default()).unwrap();
        assert!(matches!(rc.shadow_mask(0, 10, 2, 2), Err(EngineError::Core(_))));
    }

    #[test]
    fn test_layer_round_trip() {
        let rc = RenderContext::new(EngineConfig::default()).unwrap();
        let mut ctx = screen(Rect::new(0, 0, 31, 31));
        let screen_target = ctx.buf.clone().unwrap();

        let mut calls = 0;
        rc.draw_layered(
            &mut ctx,
            Rect::new(8, 8, 23, 23),
            LayerFlags::new(true, true),
            &rc.image_params(),
            |layer_ctx, _unit| {
                calls += 1;
                assert_ne!(layer_ctx.buf.as_ref(), Some(&screen_target));
                fill_layer(layer_ctx, Color::RED)
            },
        )
        .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(ctx.buf.as_ref(), Some(&screen_target));
        let buf = screen_target.read();
        assert_eq!(buf.color_at(8, 8), Some(Color::RED));
        assert_eq!(buf.color_at(23, 23), Some(Color::RED));
        assert_eq!(buf.color_at(7, 8), Some(Color::WHITE));
        assert_eq!(buf.color_at(24, 24), Some(Color::WHITE));
        assert_eq!(rc.compositor().stats().blends, 1);
    }

    #[test]
    fn test_banded_layer_through_small_buffers() {
        let config = EngineConfig::new().with_layer_buffers(64 * 4 * 4, 64 * 4);
        let rc = RenderContext::new(config).unwrap();
        let mut ctx = screen(Rect::new(0, 0, 63, 63));
        let screen_target = ctx.buf.clone().unwrap();

        let mut bands = Vec::new();
        rc.draw_layered(
            &mut ctx,
            Rect::new(0, 0, 63, 63),
            LayerFlags::new(false, true),
            &rc.image_params(),
            |layer_ctx, _unit| {
                bands.push(layer_ctx.buf_area);
                fill_layer(layer_ctx, Color::BLUE)
            },
        )
        .unwrap();

        assert!(bands.len() > 1);
        assert_eq!(bands.first().map(|b| b.y1), Some(0));
        assert_eq!(bands.last().map(|b| b.y2), Some(63));
        let buf = screen_target.read();
        assert!((0..64).all(|y| buf.color_at(0, y) == Some(Color::BLUE)));
    }

    #[test]
    fn test_blend_invalidates_cached_texture() {
        let rc = RenderContext::new(EngineConfig::default()).unwrap();
        let mut ctx = screen(Rect::new(0, 0, 15, 15));

        let mut layer_key = None;
        rc.draw_layered(
            &mut ctx,
            Rect::new(0, 0, 7, 7),
            LayerFlags::new(true, false),
            &rc.image_params(),
            |layer_ctx, _unit| {
                fill_layer(layer_ctx, Color::GREEN)?;
                let target = layer_ctx.buf.as_ref().ok_or_else(|| CoreError::render("no layer buffer"))?;
                let image = rc.texture(target).map_err(|e| CoreError::render(e.to_string()))?;
                assert_eq!((image.width(), image.height()), (8, 8));

                let key = ResourceKey::Texture { buffer_id: target.id() }.to_bytes();
                assert!(rc.cache().contains(&key));
                layer_key = Some(key);
                Ok(())
            },
        )
        .unwrap();

        let key = layer_key.unwrap();
        assert!(!rc.cache().contains(&key));
    }

    #[test]
    fn test_texture_snapshot_is_reused() {
        let rc = RenderContext::new(EngineConfig::default()).unwrap();
        let ctx = screen(Rect::new(0, 0, 3, 3));
        let target = ctx.buf.clone().unwrap();

        let first = rc.texture(&target).unwrap();
        assert_eq!(first.byte_size(), 4 * 4 * 4);
        rc.texture(&target).unwrap();
        assert_eq!(rc.cache().stats().hits, 1);
    }

    #[test]
    fn test_layer_over_budget_restores_context() {
        let config = EngineConfig::new().with_memory_budget(1024);
        let rc = RenderContext::new(config).unwrap();
        let mut ctx = screen(Rect::new(0, 0, 99, 99));
        let before = ctx.clone();

        let result = rc.draw_layered(
            &mut ctx,
            Rect::new(0, 0, 99, 99),
            LayerFlags::new(true, false),
            &rc.image_params(),
            |_, _| Ok(()),
        );

        assert!(matches!(result, Err(EngineError::Layer(LayerError::Alloc(_)))));
        assert_eq!(ctx.buf, before.buf);
        assert_eq!(ctx.clip_area, before.clip_area);
    }

    #[test]
    fn test_draw_error_propagates() {
        let rc = RenderContext::new(EngineConfig::default()).unwrap();
        let mut ctx = screen(Rect::new(0, 0, 15, 15));
        let before = ctx.clone();

        let result = rc.draw_layered(
            &mut ctx,
            Rect::new(2, 2, 9, 9),
            LayerFlags::new(true, false),
            &rc.image_params(),
            |_, _| Err(CoreError::render("widget failed")),
        );

        assert!(matches!(result, Err(EngineError::Layer(LayerError::Core(CoreError::Render(_))))));
        assert_eq!(ctx.buf, before.buf);
        assert_eq!(rc.compositor().stats().aborted, 1);
    }

    #[test]
    fn test_manual_layer_lifecycle() {
        let rc = RenderContext::new(EngineConfig::default()).unwrap();
        let mut ctx = screen(Rect::new(0, 0, 15, 15));
        let flags = LayerFlags::new(false, false);

        let mut layer = rc.compositor().create(&mut ctx, Rect::new(4, 4, 11, 11), flags).unwrap();
        rc.compositor().adjust(&mut ctx, &mut layer, flags).unwrap();
        assert_eq!(layer.state(), LayerState::Adjusted);
        fill_layer(&ctx, Color::BLACK).unwrap();

        rc.compositor()
            .blend(&mut ctx, &mut layer, rc.draw_unit(), rc.cache().as_ref(), &rc.image_params())
            .unwrap();
        assert_eq!(layer.state(), LayerState::Blended);
        rc.compositor().destroy(layer);

        let target = ctx.buf.clone().unwrap();
        assert_eq!(target.read().color_at(4, 4), Some(Color::BLACK));
        assert_eq!(target.read().color_at(3, 3), Some(Color::WHITE));
    }
}
