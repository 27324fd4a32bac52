//! Startup configuration for the map engine
//!
//! Everything here is loaded once from JSON and never mutated afterwards.
//! Every section has defaults that reproduce the deployed ISBN map, so an
//! empty `{}` document is a valid configuration.

use crate::core::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_PREFETCH_MARGIN, DEFAULT_ZOOM_STEP, MARKER_HIT_RADIUS,
    MARKER_TILE_COLS, MARKER_TILE_ROWS, NATIVE_RESOLUTION,
};
use crate::core::geo::Size;
use crate::core::tier::{Tier, TierRegistry};
use crate::layers::dataset::DatasetConfig;
use crate::layers::zone::{CoalesceRule, Zone, ZoneIndex};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub tiers: Vec<Tier>,
    pub zoom: ZoomConfig,
    pub canvas: Size,
    pub tiles: TileLoadingConfig,
    pub markers: MarkerConfig,
    pub zones: ZoneConfig,
    pub datasets: DatasetConfig,
    pub framerate: FrameTimingConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                Tier::image(0, 1.0, "images/all_isbns_1_50.png", 1000, 800),
                Tier::image(1, 10.0, "images/all_isbns_smaller10x.png", 10_000, 8_000),
                Tier::tiled(
                    2,
                    NATIVE_RESOLUTION,
                    (1000, 800),
                    (50, 50),
                    "tiles/tile_{col}_{row}.png",
                ),
            ],
            zoom: ZoomConfig::default(),
            canvas: Size::default(),
            tiles: TileLoadingConfig::default(),
            markers: MarkerConfig::default(),
            zones: ZoneConfig::default(),
            datasets: DatasetConfig::default(),
            framerate: FrameTimingConfig::default(),
        }
    }
}

impl MapConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("loading map config from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.registry()?;
        self.zoom.validate()?;
        if !(self.canvas.width > 0.0 && self.canvas.height > 0.0) {
            return Err(MapError::Config(format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        self.markers.validate()?;
        if !self.datasets.source_pattern.contains("{dataset}") {
            return Err(MapError::Config(format!(
                "dataset pattern '{}' has no {{dataset}} placeholder",
                self.datasets.source_pattern
            )));
        }
        Ok(())
    }

    /// Tier registry described by `tiers`.
    pub fn registry(&self) -> Result<TierRegistry> {
        TierRegistry::new(self.tiers.clone())
    }

    pub fn with_tiles(mut self, tiles: TileLoadingConfig) -> Self {
        self.tiles = tiles;
        self
    }

    pub fn with_canvas(mut self, canvas: Size) -> Self {
        self.canvas = canvas;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min: f64,
    pub max: f64,
    pub initial: f64,
    /// Factor applied per wheel notch
    pub step: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: 0.1,
            max: 1000.0,
            initial: 1.0,
            step: DEFAULT_ZOOM_STEP,
        }
    }
}

impl ZoomConfig {
    fn validate(&self) -> Result<()> {
        if !(self.min > 0.0 && self.min <= self.max) {
            return Err(MapError::Config(format!(
                "zoom range [{}, {}] is invalid",
                self.min, self.max
            )));
        }
        if self.step <= 1.0 {
            return Err(MapError::Config(format!(
                "zoom step must be greater than 1, got {}",
                self.step
            )));
        }
        Ok(())
    }
}

/// Preset tile loading behaviours
#[derive(Debug, Clone, PartialEq)]
pub enum TileLoadingProfile {
    /// Keep every tile for the whole session
    Session,
    Balanced,
    LowMemory,
    Custom(TileLoadingConfig),
}

impl TileLoadingProfile {
    pub fn resolve(&self) -> TileLoadingConfig {
        match self {
            Self::Session => TileLoadingConfig {
                cache_capacity: None,
                prefetch_margin: DEFAULT_PREFETCH_MARGIN,
            },
            Self::Balanced => TileLoadingConfig {
                cache_capacity: Some(DEFAULT_CACHE_CAPACITY),
                prefetch_margin: DEFAULT_PREFETCH_MARGIN,
            },
            Self::LowMemory => TileLoadingConfig {
                cache_capacity: Some(128),
                prefetch_margin: DEFAULT_PREFETCH_MARGIN,
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for TileLoadingProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLoadingConfig {
    /// LRU bound on cached entries; `None` keeps everything
    pub cache_capacity: Option<usize>,
    /// Extra tiles loaded around the visible window
    pub prefetch_margin: u32,
}

impl TileLoadingConfig {
    pub fn session() -> Self {
        TileLoadingProfile::Session.resolve()
    }

    pub fn bounded(capacity: usize) -> Self {
        Self {
            cache_capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn low_memory() -> Self {
        TileLoadingProfile::LowMemory.resolve()
    }
}

impl Default for TileLoadingConfig {
    fn default() -> Self {
        TileLoadingProfile::default().resolve()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Resource key pattern, `{x}`/`{y}` are the marker tile indices
    pub source_pattern: String,
    /// Native grid columns per marker tile
    pub tile_cols: u64,
    /// Native grid rows per marker tile
    pub tile_rows: u64,
    pub grid_cols: u32,
    pub grid_rows: u32,
    /// Lowest tier resolution at which markers are loaded and shown
    pub min_resolution: f64,
    pub hit_radius_px: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            source_pattern: "rarebook_tiles/rare_{x}_{y}.json".to_string(),
            tile_cols: MARKER_TILE_COLS,
            tile_rows: MARKER_TILE_ROWS,
            grid_cols: 50,
            grid_rows: 50,
            min_resolution: NATIVE_RESOLUTION,
            hit_radius_px: MARKER_HIT_RADIUS,
        }
    }
}

impl MarkerConfig {
    fn validate(&self) -> Result<()> {
        if self.tile_cols == 0 || self.tile_rows == 0 || self.grid_cols == 0 || self.grid_rows == 0 {
            return Err(MapError::Config("marker tiles and grid must be non-empty".into()));
        }
        if self.hit_radius_px < 0.0 {
            return Err(MapError::Config("marker hit radius must not be negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Explicit zone table; empty means the built-in registration groups
    pub table: Vec<Zone>,
    pub coalesce: Vec<CoalesceRule>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            table: Vec::new(),
            coalesce: CoalesceRule::defaults(),
        }
    }
}

impl ZoneConfig {
    pub fn build_index(&self) -> Result<ZoneIndex> {
        if self.table.is_empty() {
            ZoneIndex::builtin(&self.coalesce)
        } else {
            ZoneIndex::new(self.table.clone(), &self.coalesce)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTimingConfig {
    pub target_fps: u32,
}

impl FrameTimingConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.target_fps.max(1)))
    }
}

impl Default for FrameTimingConfig {
    fn default() -> Self {
        Self { target_fps: 60 }
    }
}
