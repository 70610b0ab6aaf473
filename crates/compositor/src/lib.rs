//! Off-screen layer compositing.
//!
//! A layer isolates the drawing of a subtree in its own buffer, which is then
//! blended back into the caller's target as an image. Large layers without a
//! transform can be rendered through a small buffer one band of rows at a
//! time.

pub mod allocator;
pub mod compositor;
pub mod layer;

pub use self::compositor::{Compositor, CompositorStats, LayerError, LayerResult};
pub use allocator::{BudgetAllocator, HeapAllocator, LayerAllocator};
pub use layer::{
    LayerConfig, LayerContext, LayerFlags, LayerState, LAYER_SIMPLE_BUF_SIZE, LAYER_SIMPLE_FALLBACK_BUF_SIZE,
};
