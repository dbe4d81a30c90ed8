//! Configuration types for the sweep engine.

use crate::core_modules::region::LatLng;
use crate::core_modules::trajectory::{DEFAULT_ROW_PITCH, SpeedProfile};
use image::{Rgb, Rgba};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level engine configuration.
///
/// Every field has a default matching the reference behavior, so an empty JSON
/// object is a valid configuration. Loaded from JSON at runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Per-tick longitude step bounds (degrees per tick)
    pub speed: SpeedProfile,

    /// Latitude drop between sweep rows (degrees)
    pub row_pitch: f64,

    /// Agent count limits and appearance
    pub agents: AgentConfig,

    /// Default camera and drawing-surface size
    pub view: ViewConfig,

    /// What the terminal transition draws
    pub completion: CompletionConfig,

    /// Frame period for the interval scheduler (milliseconds)
    pub frame_interval_ms: u64,

    /// Place lookup service
    pub lookup: LookupConfig,
}

/// Agent count range and colors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub min_count: u32,
    pub max_count: u32,
    /// Selected on startup and after every reset
    pub default_count: u32,
    /// One color per agent index; must hold at least `max_count` entries
    pub palette: Vec<[u8; 3]>,
    /// Alpha of each coverage rectangle (0x33 ≈ 20%)
    pub coverage_alpha: u8,
}

/// Camera defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub default_center: LatLng,
    pub default_zoom: f64,
    /// Zoom used when jumping to a searched place
    pub place_zoom: f64,
    pub max_zoom: f64,
    /// Drawing-surface size in pixels
    pub width: u32,
    pub height: u32,
}

/// Terminal-transition appearance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Fraction of the region extent added on every side when fitting the view
    pub fit_padding: f64,
    pub message: String,
    pub outline_color: [u8; 3],
    pub outline_weight: u32,
    /// Weight of the outline drawn when a selection rectangle closes
    pub selection_weight: u32,
}

/// Place-lookup service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub endpoint: String,
    pub result_limit: u32,
    /// Suggestions are only fetched for queries at least this long
    pub min_query_len: usize,
    pub user_agent: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            speed: SpeedProfile::default(),
            row_pitch: DEFAULT_ROW_PITCH,
            agents: AgentConfig::default(),
            view: ViewConfig::default(),
            completion: CompletionConfig::default(),
            frame_interval_ms: 16,
            lookup: LookupConfig::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            min_count: 1,
            max_count: 5,
            default_count: 1,
            // red, blue, orange, purple, green
            palette: vec![[255, 0, 0], [0, 0, 255], [255, 165, 0], [128, 0, 128], [0, 128, 0]],
            coverage_alpha: 0x33,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_center: LatLng::new(20.0, 0.0),
            default_zoom: 2.0,
            place_zoom: 14.0,
            max_zoom: 19.0,
            width: 1280,
            height: 720,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            fit_padding: 0.05,
            message: "Scanning Completed: Zoomable Map".to_string(),
            outline_color: [0, 128, 0],
            outline_weight: 2,
            selection_weight: 1,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            result_limit: 5,
            min_query_len: 3,
            user_agent: concat!("swarm_sweep/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ScanConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(self.speed.min_speed > 0.0) || self.speed.max_speed < self.speed.min_speed {
            return invalid(format!(
                "speed range {}..{} must be positive and ordered",
                self.speed.min_speed, self.speed.max_speed
            ));
        }
        if !(self.row_pitch > 0.0) {
            return invalid(format!("row pitch {} must be positive", self.row_pitch));
        }

        let agents = &self.agents;
        if agents.min_count < 1 || agents.min_count > agents.max_count {
            return invalid(format!("agent range {}..={} is empty", agents.min_count, agents.max_count));
        }
        if !(agents.min_count..=agents.max_count).contains(&agents.default_count) {
            return invalid(format!("default agent count {} is outside the range", agents.default_count));
        }
        if agents.palette.len() < agents.max_count as usize {
            return invalid(format!(
                "palette has {} colors but up to {} agents are allowed",
                agents.palette.len(),
                agents.max_count
            ));
        }

        if !(self.completion.fit_padding >= 0.0) {
            return invalid("fit padding must not be negative".to_string());
        }
        if self.view.width == 0 || self.view.height == 0 {
            return invalid("view size must be non-zero".to_string());
        }
        Ok(())
    }

    /// Marker color of agent `index`.
    pub fn agent_color(&self, index: usize) -> Rgb<u8> {
        let palette = &self.agents.palette;
        if palette.is_empty() {
            return Rgb([255, 0, 0]);
        }
        Rgb(palette[index % palette.len()])
    }

    /// Translucent fill used for an agent's coverage.
    pub fn coverage_color(&self, color: Rgb<u8>) -> Rgba<u8> {
        let [r, g, b] = color.0;
        Rgba([r, g, b, self.agents.coverage_alpha])
    }

    pub fn outline_color(&self) -> Rgb<u8> {
        Rgb(self.completion.outline_color)
    }
}
