//! Engine configuration.

use std::time::Duration;

use common::Color;
use compositor::{LayerConfig, LAYER_SIMPLE_BUF_SIZE, LAYER_SIMPLE_FALLBACK_BUF_SIZE};
use render::ColorDepth;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Native color depth of the display.
    pub color_depth: ColorDepth,
    /// Resource cache sizing.
    pub cache: CacheSettings,
    /// Layer buffer sizing.
    pub layer: LayerSettings,
    /// Pixels of this color are transparent in chroma-keyed images.
    pub chroma_key: Color,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Resource cache settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Total cost the cache may hold, in bytes.
    pub capacity_bytes: usize,
    /// Expected entry size; sets the number of hash buckets.
    pub avg_entry_size: usize,
    /// How long cache operations wait for the lock.
    pub lock_timeout_ms: u64,
}

impl CacheSettings {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity_bytes: 4 * 1024 * 1024,
            avg_entry_size: 4 * 1024,
            lock_timeout_ms: 100,
        }
    }
}

/// Layer settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSettings {
    /// Preferred buffer size of a subdividable layer.
    pub simple_buf_size: usize,
    /// Buffer size tried when the preferred one cannot be allocated.
    pub fallback_buf_size: usize,
    /// Cap on layer bytes allocated at the same time. Unlimited when unset.
    pub memory_budget: Option<usize>,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            simple_buf_size: LAYER_SIMPLE_BUF_SIZE,
            fallback_buf_size: LAYER_SIMPLE_FALLBACK_BUF_SIZE,
            memory_budget: None,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `compositor=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl EngineConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Small cache and layer buffers for memory-constrained targets.
    pub fn low_memory() -> Self {
        Self {
            color_depth: ColorDepth::Rgb565,
            cache: CacheSettings {
                capacity_bytes: 256 * 1024,
                avg_entry_size: 1024,
                ..CacheSettings::default()
            },
            layer: LayerSettings {
                simple_buf_size: 8 * 1024,
                fallback_buf_size: 2 * 1024,
                memory_budget: Some(64 * 1024),
            },
            ..Self::default()
        }
    }

    /// Set the display color depth.
    pub fn with_color_depth(mut self, depth: ColorDepth) -> Self {
        self.color_depth = depth;
        self
    }

    /// Set the cache capacity and average entry size.
    pub fn with_cache(mut self, capacity_bytes: usize, avg_entry_size: usize) -> Self {
        self.cache.capacity_bytes = capacity_bytes;
        self.cache.avg_entry_size = avg_entry_size;
        self
    }

    /// Set the cache lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.cache.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the layer buffer sizes.
    pub fn with_layer_buffers(mut self, simple: usize, fallback: usize) -> Self {
        self.layer.simple_buf_size = simple;
        self.layer.fallback_buf_size = fallback;
        self
    }

    /// Cap the bytes of layer buffers alive at once.
    pub fn with_memory_budget(mut self, budget: usize) -> Self {
        self.layer.memory_budget = Some(budget);
        self
    }

    /// Set the chroma-key color.
    pub fn with_chroma_key(mut self, color: Color) -> Self {
        self.chroma_key = color;
        self
    }

    /// Set the log filter.
    pub fn with_log_level(mut self, level: &str) -> Self {
        self.logging.level = level.to_string();
        self
    }

    /// Check the settings for values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity_bytes == 0 {
            return Err(ConfigError::Invalid("cache capacity must be non-zero".into()));
        }
        if self.cache.avg_entry_size == 0 {
            return Err(ConfigError::Invalid("average cache entry size must be non-zero".into()));
        }
        if self.layer.fallback_buf_size > self.layer.simple_buf_size {
            return Err(ConfigError::Invalid(format!(
                "layer fallback buffer ({}) is larger than the simple buffer ({})",
                self.layer.fallback_buf_size, self.layer.simple_buf_size
            )));
        }
        Ok(())
    }

    /// Layer sizing for the compositor.
    pub fn layer_config(&self) -> LayerConfig {
        LayerConfig {
            simple_buf_size: self.layer.simple_buf_size,
            fallback_buf_size: self.layer.fallback_buf_size,
            color_depth: self.color_depth,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            color_depth: ColorDepth::Xrgb8888,
            cache: CacheSettings::default(),
            layer: LayerSettings::default(),
            chroma_key: Color::CHROMA_KEY,
            logging: LoggingConfig::default(),
        }
    }
}
