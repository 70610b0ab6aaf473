//! Software rendering primitives.
//!
//! This crate handles:
//! - Pixel formats and their byte layouts
//! - Read-only raster views and owned pixel buffers
//! - The fixed-point rotate/zoom sampler
//! - A8 coverage masks (rounded rectangles, blur, shadows)
//! - The draw context and the image blit seam

pub mod buffer;
pub mod draw;
pub mod format;
pub mod mask;
pub mod pixel_view;
pub mod transform;

pub use buffer::PixelBuffer;
pub use draw::{DrawContext, DrawTarget, DrawUnit, ImageDescriptor, ImageDrawParams, SoftwareDrawUnit};
pub use format::{ColorDepth, ColorFormat};
pub use mask::Mask;
pub use pixel_view::{PixelView, Texel};
pub use transform::{transform, TransformDescriptor, TransformParams};
