//! Off-screen layers.

use common::geometry::{Coord, Rect};
use render::{ColorDepth, DrawContext, DrawTarget};
use serde::{Deserialize, Serialize};

/// Preferred buffer size of a subdividable layer.
pub const LAYER_SIMPLE_BUF_SIZE: usize = 24 * 1024;

/// Buffer size tried when [`LAYER_SIMPLE_BUF_SIZE`] cannot be allocated.
pub const LAYER_SIMPLE_FALLBACK_BUF_SIZE: usize = 3 * 1024;

/// What a layer needs from its buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayerFlags {
    /// The layer content has transparent pixels.
    pub has_alpha: bool,
    /// The layer can be rendered in row bands through a small buffer.
    pub can_subdivide: bool,
}

impl LayerFlags {
    pub fn new(has_alpha: bool, can_subdivide: bool) -> Self {
        Self { has_alpha, can_subdivide }
    }
}

/// Layer buffer sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub simple_buf_size: usize,
    pub fallback_buf_size: usize,
    pub color_depth: ColorDepth,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            simple_buf_size: LAYER_SIMPLE_BUF_SIZE,
            fallback_buf_size: LAYER_SIMPLE_FALLBACK_BUF_SIZE,
            color_depth: ColorDepth::default(),
        }
    }
}

/// Lifecycle of a layer.
///
/// `Created -> Adjusted* -> Blended -> Destroyed`. A subdividable layer goes
/// back to `Created` for each further row band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerState {
    Created,
    Adjusted,
    Blended,
    Destroyed,
}

/// An off-screen buffer and the draw context it temporarily replaces.
#[derive(Debug)]
pub struct LayerContext {
    pub(crate) full_area: Rect,
    pub(crate) target: DrawTarget,
    pub(crate) saved: DrawContext,
    pub(crate) flags: LayerFlags,
    pub(crate) state: LayerState,
    pub(crate) max_rows_with_alpha: Coord,
    pub(crate) max_rows_without_alpha: Coord,
    pub(crate) buffer_size: usize,
}

impl LayerContext {
    /// The whole area the layer covers.
    pub fn full_area(&self) -> Rect {
        self.full_area
    }

    /// The part of the full area the buffer currently holds.
    pub fn active_area(&self) -> Rect {
        self.target.read().active_area()
    }

    pub fn max_rows_with_alpha(&self) -> Coord {
        self.max_rows_with_alpha
    }

    pub fn max_rows_without_alpha(&self) -> Coord {
        self.max_rows_without_alpha
    }

    /// Rows per band for the current alpha mode.
    pub fn band_rows(&self) -> Coord {
        self.band_rows_for(self.flags.has_alpha)
    }

    fn band_rows_for(&self, has_alpha: bool) -> Coord {
        if has_alpha {
            self.max_rows_with_alpha
        } else {
            self.max_rows_without_alpha
        }
    }

    /// Size of the layer buffer in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    pub fn flags(&self) -> LayerFlags {
        self.flags
    }

    /// The layer's own buffer.
    pub fn target(&self) -> &DrawTarget {
        &self.target
    }

    /// The caller's draw context as it was when the layer was created.
    pub fn saved_context(&self) -> &DrawContext {
        &self.saved
    }

    /// Band starting at `y1` as tall as the given alpha mode allows,
    /// clamped to the full area.
    pub(crate) fn band_at(&self, y1: Coord, has_alpha: bool) -> Rect {
        let rows = self.band_rows_for(has_alpha).max(1);
        Rect::new(
            self.full_area.x1,
            y1,
            self.full_area.x2,
            (y1 + rows - 1).min(self.full_area.y2),
        )
    }
}
