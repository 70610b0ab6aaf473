//! Common types shared by the pixel compositing crates.

pub mod color;
pub mod geometry;
pub mod error;
pub mod trig;

pub use color::Color;
pub use geometry::{Coord, Point, Rect, Size};
pub use error::{CoreError, CoreResult};

/// Fully transparent opacity.
pub const OPA_TRANSP: u8 = 0;
/// 50% opacity, used by the two-tap antialiasing average.
pub const OPA_50: u8 = 127;
/// Fully opaque.
pub const OPA_COVER: u8 = 255;

/// Zoom factor meaning "no scaling".
pub const ZOOM_NONE: u32 = 256;
