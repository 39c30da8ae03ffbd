//! Configuration for the sharer process.

use std::path::Path;
use std::time::Duration;

use cropcast_core::SessionConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SharerConfig {
    /// Capture source settings.
    pub capture: CaptureConfig,
    /// Crop selector and render settings.
    pub crop: CropConfig,
    /// Viewer delivery settings.
    pub delivery: DeliveryConfig,
    /// Screenshot autosave settings.
    pub autosave: AutosaveConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Capture source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Native width of the synthetic source in pixels.
    pub width: u32,
    /// Native height of the synthetic source in pixels.
    pub height: u32,
    /// On-screen width the stream renders into (selector space).
    pub display_width: f64,
    /// On-screen height the stream renders into (selector space).
    pub display_height: f64,
}

/// Crop selector and render configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Selector edge length in pixels.
    pub size: u32,
    /// JPEG quality for rendered crops, 1..=100.
    pub jpeg_quality: u8,
    /// Render ticks per second.
    pub tick_rate: u32,
}

/// Viewer delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Address of the cropcast-viewer process.
    pub viewer_address: String,
}

/// Screenshot autosave configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Enable the periodic autosave.
    pub enabled: bool,
    /// Directory saved frames are written into.
    pub directory: String,
    /// Interval between saves in milliseconds.
    pub interval_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            display_width: 1280.0,
            display_height: 720.0,
        }
    }
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            size: cropcast_core::DEFAULT_CROP_SIZE,
            jpeg_quality: cropcast_core::DEFAULT_JPEG_QUALITY,
            tick_rate: cropcast_core::DEFAULT_TICK_RATE,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            viewer_address: "127.0.0.1:7401".into(),
        }
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: "screenshots".into(),
            interval_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SharerConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let cfg = Self::default();
        let text = toml::to_string_pretty(&cfg)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, text)
    }

    /// Convert crop and autosave settings into a [`SessionConfig`].
    pub fn to_session_config(&self) -> SessionConfig {
        let mut session = SessionConfig::default()
            .with_crop_size(self.crop.size)
            .with_quality(self.crop.jpeg_quality)
            .with_tick_rate(self.crop.tick_rate);
        if self.autosave.enabled {
            session = session.with_screenshot_interval(Duration::from_millis(
                self.autosave.interval_ms.max(100),
            ));
        }
        session
    }
}

// ── Tests ────────────────────────────────────────────────────────
