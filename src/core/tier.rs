//! Resolution tiers of the rendering pyramid and the zoom → tier selection.
//!
//! A tier of resolution `r` draws each pixel over a square block of
//! `NATIVE_RESOLUTION / r` grid cells, so resolution 50 is one cell per pixel
//! and resolution 1 squeezes the whole 50 000 x 40 000 grid into 1000 x 800.

use crate::core::constants::{NATIVE_RESOLUTION, ROW_WIDTH};
use crate::core::address::Identifier;
use crate::core::geo::{Point, Size, TileKey};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// How a tier's pixels are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierKind {
    /// A single image covering the tier's full extent.
    Image {
        src: String,
        width_px: u32,
        height_px: u32,
    },
    /// A grid of equally sized tiles; `source_pattern` expands `{col}`, `{row}`
    /// and `{level}` into a resource key.
    Tiled {
        tile_width_px: u32,
        tile_height_px: u32,
        grid_cols: u32,
        grid_rows: u32,
        source_pattern: String,
    },
}

/// One discrete resolution level. Registered once at startup, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub level: u32,
    pub resolution: f64,
    #[serde(flatten)]
    pub kind: TierKind,
}

impl Tier {
    pub fn image(level: u32, resolution: f64, src: impl Into<String>, width_px: u32, height_px: u32) -> Self {
        Self {
            level,
            resolution,
            kind: TierKind::Image {
                src: src.into(),
                width_px,
                height_px,
            },
        }
    }

    pub fn tiled(
        level: u32,
        resolution: f64,
        tile_size: (u32, u32),
        grid: (u32, u32),
        source_pattern: impl Into<String>,
    ) -> Self {
        Self {
            level,
            resolution,
            kind: TierKind::Tiled {
                tile_width_px: tile_size.0,
                tile_height_px: tile_size.1,
                grid_cols: grid.0,
                grid_rows: grid.1,
                source_pattern: source_pattern.into(),
            },
        }
    }

    pub fn is_tiled(&self) -> bool {
        matches!(self.kind, TierKind::Tiled { .. })
    }

    /// Grid cells covered by one tier pixel along each axis.
    pub fn units_per_pixel(&self) -> f64 {
        NATIVE_RESOLUTION / self.resolution
    }

    pub fn pixels_per_unit(&self) -> f64 {
        self.resolution / NATIVE_RESOLUTION
    }

    /// Full pixel extent of the tier.
    pub fn extent(&self) -> Size {
        match &self.kind {
            TierKind::Image {
                width_px, height_px, ..
            } => Size::new(*width_px as f64, *height_px as f64),
            TierKind::Tiled {
                tile_width_px,
                tile_height_px,
                grid_cols,
                grid_rows,
                ..
            } => Size::new(
                (*tile_width_px as f64) * (*grid_cols as f64),
                (*tile_height_px as f64) * (*grid_rows as f64),
            ),
        }
    }

    /// `(cols, rows)` of the tier's tile grid; image tiers are a 1x1 grid.
    pub fn grid(&self) -> (u32, u32) {
        match &self.kind {
            TierKind::Image { .. } => (1, 1),
            TierKind::Tiled {
                grid_cols, grid_rows, ..
            } => (*grid_cols, *grid_rows),
        }
    }

    /// Pixel size of one tile; an image tier is a single tile.
    pub fn tile_size(&self) -> (u32, u32) {
        match &self.kind {
            TierKind::Image {
                width_px, height_px, ..
            } => (*width_px, *height_px),
            TierKind::Tiled {
                tile_width_px,
                tile_height_px,
                ..
            } => (*tile_width_px, *tile_height_px),
        }
    }

    /// Tile holding a tier pixel and the pixel's offset inside it.
    pub fn locate_pixel(&self, px: Point) -> Option<(TileKey, u32, u32)> {
        let extent = self.extent();
        if !extent.contains(&px) {
            return None;
        }
        let (tile_w, tile_h) = self.tile_size();
        let (x, y) = (px.x.floor() as u32, px.y.floor() as u32);
        Some((
            TileKey::new(self.level, x / tile_w, y / tile_h),
            x % tile_w,
            y % tile_h,
        ))
    }

    /// Resource key of a tile of this tier.
    pub fn source_for(&self, key: TileKey) -> String {
        match &self.kind {
            TierKind::Image { src, .. } => src.clone(),
            TierKind::Tiled { source_pattern, .. } => crate::tiles::source::expand_pattern(source_pattern, key),
        }
    }

    pub fn scale(&self) -> TierScale {
        TierScale::new(ROW_WIDTH, self.units_per_pixel())
    }

    fn validate(&self) -> Result<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(MapError::Config(format!(
                "tier {} has non-positive resolution {}",
                self.level, self.resolution
            )));
        }
        match &self.kind {
            TierKind::Image {
                width_px, height_px, ..
            } if *width_px == 0 || *height_px == 0 => Err(MapError::Config(format!(
                "image tier {} has an empty extent",
                self.level
            ))),
            TierKind::Tiled {
                tile_width_px,
                tile_height_px,
                grid_cols,
                grid_rows,
                ..
            } if *tile_width_px == 0 || *tile_height_px == 0 || *grid_cols == 0 || *grid_rows == 0 => {
                Err(MapError::Config(format!(
                    "tiled tier {} has a zero tile size or grid",
                    self.level
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Projection of identifiers onto the pixel rows/columns of a tier.
///
/// `row_width` is the number of identifiers per grid row; the effective number
/// of identifiers per tier pixel row is `row_width * units_per_pixel`, so it
/// must be re-derived whenever the tier changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierScale {
    pub row_width: u64,
    pub units_per_pixel: f64,
}

impl TierScale {
    pub fn new(row_width: u64, units_per_pixel: f64) -> Self {
        assert!(row_width > 0, "row width must be positive");
        assert!(units_per_pixel > 0.0, "units per pixel must be positive");
        Self {
            row_width,
            units_per_pixel,
        }
    }

    pub fn row_of(&self, id: Identifier) -> u64 {
        ((id.0 / self.row_width) as f64 / self.units_per_pixel).floor() as u64
    }

    pub fn col_of(&self, id: Identifier) -> u64 {
        ((id.0 % self.row_width) as f64 / self.units_per_pixel).floor() as u64
    }

    /// Tier pixels in one row.
    pub fn row_pixels(&self) -> u64 {
        (self.row_width as f64 / self.units_per_pixel).ceil() as u64
    }
}

/// Re-express a tier-local pan in another tier's pixel units so the address
/// under `anchor` (a screen point) stays under it.
///
/// Pure and unclamped; callers clamp to the new tier's extent afterwards.
pub fn reproject_pan(old: &Tier, new: &Tier, pan: Point, anchor: Point) -> Point {
    let ratio = old.units_per_pixel() / new.units_per_pixel();
    pan.add(&anchor).multiply(ratio).subtract(&anchor)
}

/// Immutable table of tiers ordered by resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TierRegistry {
    tiers: Vec<Tier>,
}

impl TierRegistry {
    pub fn new(mut tiers: Vec<Tier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(MapError::Config("at least one tier is required".into()));
        }
        for tier in &tiers {
            tier.validate()?;
        }
        tiers.sort_by(|a, b| a.resolution.total_cmp(&b.resolution));
        for pair in tiers.windows(2) {
            if pair[0].resolution == pair[1].resolution {
                return Err(MapError::Config(format!(
                    "tiers {} and {} share resolution {}",
                    pair[0].level, pair[1].level, pair[0].resolution
                )));
            }
        }
        let mut levels: Vec<u32> = tiers.iter().map(|t| t.level).collect();
        levels.sort_unstable();
        if levels.windows(2).any(|w| w[0] == w[1]) {
            return Err(MapError::Config("tier levels must be unique".into()));
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn by_level(&self, level: u32) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.level == level)
    }

    /// Index of the tier whose resolution is nearest to `zoom`; ties go to
    /// the lower resolution.
    pub fn select_index(&self, zoom: f64) -> usize {
        let upper = self.tiers.partition_point(|t| t.resolution < zoom);
        if upper == 0 {
            return 0;
        }
        if upper == self.tiers.len() {
            return upper - 1;
        }
        let below = zoom - self.tiers[upper - 1].resolution;
        let above = self.tiers[upper].resolution - zoom;
        if above < below {
            upper
        } else {
            upper - 1
        }
    }

    pub fn select_tier(&self, zoom: f64) -> &Tier {
        &self.tiers[self.select_index(zoom)]
    }
}
