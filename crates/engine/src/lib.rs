//! Pixel compositing engine.
//!
//! Ties the workspace together:
//! - Configuration loaded from JSON or built in code
//! - Log output setup
//! - A [`RenderContext`] owning the resource cache, the layer compositor and
//!   the draw unit, passed explicitly instead of living in globals

pub mod config;
pub mod context;
pub mod logging;

pub use config::{CacheSettings, ConfigError, EngineConfig, LayerSettings, LoggingConfig};
pub use context::{EngineError, EngineResult, RenderContext, Resource, ResourceCache};

/// Engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
