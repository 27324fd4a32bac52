//! Sparse point annotations ("markers"), paged in on a coarse tile grid.

use crate::core::address::{to_grid, GridPosition, Identifier};
use crate::core::config::MarkerConfig;
use crate::core::geo::{Point, TileKey, TileWindow};
use crate::core::tier::Tier;
use crate::core::viewport::ViewTransform;
use crate::prelude::{Arc, Mutex};
use crate::spatial::{IndexedPoint, PointIndex};
use crate::tiles::{
    LoadError, PatternSource, ResourceFetcher, TileCache, TileSource, WindowReport,
};
use crate::MapError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::PoisonError;

/// Marker tiles live in their own cache, so they share a single key level.
const MARKER_LEVEL: u32 = 0;

/// Wire format of one marker record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    #[serde(rename = "i")]
    pub isbn13: String,
    #[serde(rename = "t", default)]
    pub title: String,
    #[serde(rename = "h", default)]
    pub holdings: u32,
    #[serde(rename = "e", default)]
    pub in_archive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub id: Identifier,
    pub title: String,
    /// Number of libraries holding the item
    pub holdings: u32,
    /// Whether an external archive has a copy
    pub in_archive: bool,
}

impl TryFrom<MarkerRecord> for Marker {
    type Error = MapError;

    fn try_from(record: MarkerRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Identifier::from_isbn13(&record.isbn13)?,
            title: record.title,
            holdings: record.holdings,
            in_archive: record.in_archive,
        })
    }
}

/// Decoded contents of one marker tile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerTile {
    pub markers: Vec<Arc<Marker>>,
}

/// Parses marker tile JSON from an inner byte fetcher. Malformed records are
/// dropped with a warning; a tile that is not a JSON array fails to decode.
pub struct MarkerTileDecoder<F> {
    inner: F,
}

impl<F> MarkerTileDecoder<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

/// Parse a marker tile body.
pub fn parse_marker_tile(url: &str, bytes: &[u8]) -> Result<MarkerTile, LoadError> {
    let values: Vec<serde_json::Value> =
        serde_json::from_slice(bytes).map_err(|e| LoadError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    let total = values.len();
    let markers: Vec<Arc<Marker>> = values
        .into_iter()
        .filter_map(|value| {
            let parsed = serde_json::from_value::<MarkerRecord>(value)
                .map_err(MapError::from)
                .and_then(Marker::try_from);
            match parsed {
                Ok(marker) => Some(Arc::new(marker)),
                Err(e) => {
                    log::warn!("skipping marker record in {}: {}", url, e);
                    None
                }
            }
        })
        .collect();
    log::debug!("{}: {} of {} marker records usable", url, markers.len(), total);
    Ok(MarkerTile { markers })
}

#[async_trait]
impl<F> ResourceFetcher for MarkerTileDecoder<F>
where
    F: ResourceFetcher<Resource = Vec<u8>>,
{
    type Resource = MarkerTile;

    async fn fetch(&self, url: &str) -> Result<MarkerTile, LoadError> {
        let bytes = self.inner.fetch(url).await?;
        parse_marker_tile(url, &bytes)
    }
}

/// Coarse tiling of the native grid used to page markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerGrid {
    /// Grid columns per marker tile
    pub tile_cols: u64,
    /// Grid rows per marker tile
    pub tile_rows: u64,
    pub grid_cols: u32,
    pub grid_rows: u32,
}

impl MarkerGrid {
    pub fn tile_of(&self, id: Identifier) -> TileKey {
        let pos = to_grid(id);
        TileKey::new(
            MARKER_LEVEL,
            (pos.col / self.tile_cols) as u32,
            (pos.row / self.tile_rows) as u32,
        )
    }

    /// Marker tiles under the screen, before margin.
    pub fn window_for(&self, transform: &ViewTransform) -> Option<TileWindow> {
        let upp = transform.units_per_pixel;
        let span = |offset: f64, extent: f64, per_tile: u64| {
            let first = (offset * upp).floor();
            let last = ((offset + extent) * upp).ceil() - 1.0;
            let per_tile = per_tile as f64;
            (
                (first / per_tile).floor() as i64,
                (last.max(first) / per_tile).floor() as i64,
            )
        };
        TileWindow::clamped(
            MARKER_LEVEL,
            span(transform.pan.x, transform.size.width, self.tile_cols),
            span(transform.pan.y, transform.size.height, self.tile_rows),
            self.grid_cols,
            self.grid_rows,
        )
    }
}

/// A marker with its screen position for the current frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedMarker {
    pub marker: Arc<Marker>,
    pub screen: Point,
}

/// Grid-space R-tree over the markers of one set of loaded marker tiles.
struct MarkerIndex {
    tiles: Vec<TileKey>,
    points: PointIndex<Arc<Marker>>,
}

fn grid_point(pos: GridPosition) -> Point {
    Point::new(pos.col as f64, pos.row as f64)
}

/// Marker overlay backed by its own [`TileCache`].
#[derive(Clone)]
pub struct MarkerLayer {
    cache: TileCache<MarkerTile>,
    grid: MarkerGrid,
    min_resolution: f64,
    hit_radius: f64,
    /// Rebuilt only when the loaded tiles under the screen change
    index: Arc<Mutex<Option<Arc<MarkerIndex>>>>,
}

impl MarkerLayer {
    pub fn new(
        config: &MarkerConfig,
        fetcher: Arc<dyn ResourceFetcher<Resource = MarkerTile>>,
        capacity: Option<usize>,
        margin: u32,
    ) -> Self {
        let source: Arc<dyn TileSource> = Arc::new(PatternSource::new(config.source_pattern.clone()));
        Self {
            cache: TileCache::new(source, fetcher, capacity, margin),
            grid: MarkerGrid {
                tile_cols: config.tile_cols,
                tile_rows: config.tile_rows,
                grid_cols: config.grid_cols,
                grid_rows: config.grid_rows,
            },
            min_resolution: config.min_resolution,
            hit_radius: config.hit_radius_px,
            index: Arc::new(Mutex::new(None)),
        }
    }

    pub fn grid(&self) -> &MarkerGrid {
        &self.grid
    }

    pub fn cache(&self) -> &TileCache<MarkerTile> {
        &self.cache
    }

    pub fn hit_radius(&self) -> f64 {
        self.hit_radius
    }

    /// Markers are only shown on tiers fine enough to resolve them.
    pub fn is_active(&self, tier: &Tier) -> bool {
        tier.resolution >= self.min_resolution
    }

    /// Load every marker tile under the screen plus margin.
    pub async fn load_visible(&self, tier: &Tier, transform: &ViewTransform) -> WindowReport {
        if !self.is_active(tier) {
            return WindowReport::default();
        }
        match self.grid.window_for(transform) {
            Some(window) => self.cache.ensure_window_loaded(&window).await,
            None => WindowReport::default(),
        }
    }

    /// Index over the loaded tiles of `window`, reused while that set of
    /// tiles stays the same.
    fn index_for(&self, window: &TileWindow) -> Option<Arc<MarkerIndex>> {
        let loaded: Vec<(TileKey, Arc<MarkerTile>)> = window
            .keys()
            .filter_map(|key| self.cache.get_if_loaded(key).map(|tile| (key, tile)))
            .collect();
        if loaded.is_empty() {
            return None;
        }
        let tiles: Vec<TileKey> = loaded.iter().map(|(key, _)| *key).collect();

        let mut cached = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = cached.as_ref().filter(|index| index.tiles == tiles) {
            return Some(Arc::clone(index));
        }
        let points = loaded
            .iter()
            .flat_map(|(_, tile)| tile.markers.iter())
            .map(|marker| IndexedPoint::new(grid_point(to_grid(marker.id)), Arc::clone(marker)))
            .collect();
        let index = Arc::new(MarkerIndex {
            tiles,
            points: PointIndex::bulk_load(points),
        });
        log::debug!(
            "indexed {} markers from {} tiles",
            index.points.len(),
            index.tiles.len()
        );
        *cached = Some(Arc::clone(&index));
        Some(index)
    }

    fn visible_index(&self, tier: &Tier, transform: &ViewTransform) -> Option<Arc<MarkerIndex>> {
        if !self.is_active(tier) {
            return None;
        }
        let window = self.grid.window_for(transform)?;
        self.index_for(&window)
    }

    /// Loaded markers that land on screen, with their screen positions,
    /// in identifier order.
    pub fn in_viewport(&self, tier: &Tier, transform: &ViewTransform) -> Vec<PlacedMarker> {
        let Some(index) = self.visible_index(tier, transform) else {
            return Vec::new();
        };
        let upp = transform.units_per_pixel;
        // One extra cell on each side covers rounding in grid_to_screen.
        let min = transform.pan.multiply(upp).subtract(&Point::new(upp, upp));
        let max = Point::new(
            (transform.pan.x + transform.size.width) * upp + upp,
            (transform.pan.y + transform.size.height) * upp + upp,
        );
        let mut placed: Vec<PlacedMarker> = index
            .points
            .query_rect(&min, &max)
            .into_iter()
            .filter_map(|item| {
                transform.address_to_screen(item.data.id).map(|screen| PlacedMarker {
                    marker: Arc::clone(&item.data),
                    screen,
                })
            })
            .collect();
        placed.sort_by_key(|p| p.marker.id);
        placed
    }

    /// Nearest visible marker within `radius` pixels of `screen`.
    pub fn find_at(
        &self,
        tier: &Tier,
        transform: &ViewTransform,
        screen: &Point,
        radius: f64,
    ) -> Option<PlacedMarker> {
        let index = self.visible_index(tier, transform)?;
        let upp = transform.units_per_pixel;
        let center = screen.add(&transform.pan).multiply(upp);
        let hit = index.points.nearest_within(&center, radius * upp)?;
        transform.address_to_screen(hit.data.id).map(|screen| PlacedMarker {
            marker: Arc::clone(&hit.data),
            screen,
        })
    }
}
