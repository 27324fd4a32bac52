//! Zoom and pan over the tier pyramid, and the per-frame screen ↔ address
//! mapping derived from them.

use crate::core::address::{to_grid, to_identifier, GridPosition, Identifier};
use crate::core::constants::{
    MINIMAP_HEIGHT, MINIMAP_MARGIN, MINIMAP_MARKER_MIN, MINIMAP_WIDTH, NATIVE_RESOLUTION, ROW_WIDTH,
    SCALE_BAR_PX, TOTAL_ROWS,
};
use crate::core::geo::{Point, Rect, Size, TileWindow};
use crate::core::tier::{reproject_pan, Tier, TierKind, TierRegistry};
use crate::prelude::Arc;
use serde::{Deserialize, Serialize};

/// Snapshot of the screen ↔ address mapping for one frame.
///
/// Forward conversions (screen → address) floor, inverse conversions
/// (address → screen) round, so hover targeting and drawing agree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Level of the tier the pan is expressed in
    pub level: u32,
    /// Continuous zoom the tier was selected from
    pub zoom: f64,
    /// Grid cells per tier pixel
    pub units_per_pixel: f64,
    /// Tier-local pixel offset of the screen origin
    pub pan: Point,
    /// Screen size in pixels
    pub size: Size,
}

impl ViewTransform {
    /// Grid cell under a screen point, clamped into the grid.
    ///
    /// Panics on a non-finite point: that is a coordinate bug upstream and
    /// must not be coerced into cell 0.
    pub fn screen_to_grid(&self, screen: &Point) -> GridPosition {
        assert!(
            screen.x.is_finite() && screen.y.is_finite(),
            "non-finite screen point ({}, {})",
            screen.x,
            screen.y
        );
        let col = ((screen.x + self.pan.x) * self.units_per_pixel).floor();
        let row = ((screen.y + self.pan.y) * self.units_per_pixel).floor();
        GridPosition::new(
            col.clamp(0.0, (ROW_WIDTH - 1) as f64) as u64,
            row.clamp(0.0, (TOTAL_ROWS - 1) as f64) as u64,
        )
    }

    pub fn screen_to_address(&self, screen: &Point) -> Identifier {
        to_identifier(self.screen_to_grid(screen))
    }

    /// Screen position of `id`, or `None` when it falls outside the screen.
    pub fn address_to_screen(&self, id: Identifier) -> Option<Point> {
        let screen = self.grid_to_screen(to_grid(id));
        self.size.contains(&screen).then_some(screen)
    }

    /// Screen position of a grid cell, unbounded.
    pub fn grid_to_screen(&self, pos: GridPosition) -> Point {
        Point::new(
            (pos.col as f64 / self.units_per_pixel - self.pan.x).round(),
            (pos.row as f64 / self.units_per_pixel - self.pan.y).round(),
        )
    }

    /// Tier pixel rows touched by the screen, inclusive.
    pub fn visible_rows(&self) -> (u64, u64) {
        let start = self.pan.y.max(0.0).floor() as u64;
        let end = (self.pan.y + self.size.height).ceil().max(1.0) as u64 - 1;
        (start, end.max(start))
    }

    /// Identifiers spanned by a scale bar of [`SCALE_BAR_PX`] at this zoom.
    pub fn scale_indicator(&self) -> ScaleIndicator {
        ScaleIndicator::at_zoom(self.zoom, SCALE_BAR_PX)
    }

    /// Minimap box in the top-right corner of the screen and the marker
    /// showing where the visible window sits in the whole grid.
    pub fn minimap(&self) -> Minimap {
        let frame_origin = Point::new(self.size.width - MINIMAP_WIDTH - MINIMAP_MARGIN, MINIMAP_MARGIN);
        let origin = self.screen_to_grid(&Point::default());
        let across = |cells: u64, total: u64, length: f64| (cells as f64 / total as f64 * length).floor();
        let visible_cols = self.size.width * self.units_per_pixel;
        let visible_rows = self.size.height * self.units_per_pixel;
        Minimap {
            frame: Rect::new(frame_origin, Size::new(MINIMAP_WIDTH, MINIMAP_HEIGHT)),
            marker: Rect::new(
                Point::new(
                    frame_origin.x + across(origin.col, ROW_WIDTH, MINIMAP_WIDTH),
                    frame_origin.y + across(origin.row, TOTAL_ROWS, MINIMAP_HEIGHT),
                ),
                Size::new(
                    (visible_cols / ROW_WIDTH as f64 * MINIMAP_WIDTH).clamp(MINIMAP_MARKER_MIN, MINIMAP_WIDTH),
                    (visible_rows / TOTAL_ROWS as f64 * MINIMAP_HEIGHT).clamp(MINIMAP_MARKER_MIN, MINIMAP_HEIGHT),
                ),
            ),
        }
    }
}

/// Label for a scale bar: `identifiers` books fit in `length_px` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleIndicator {
    pub length_px: f64,
    pub identifiers: u64,
}

impl ScaleIndicator {
    pub fn at_zoom(zoom: f64, length_px: f64) -> Self {
        Self {
            length_px,
            identifiers: (NATIVE_RESOLUTION * length_px / zoom).round() as u64,
        }
    }
}

/// Screen placement of the minimap, both rectangles in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Minimap {
    pub frame: Rect,
    pub marker: Rect,
}

/// Manages the current view of the map: zoom, pan within the active tier,
/// and screen dimensions
#[derive(Debug, Clone)]
pub struct Viewport {
    /// The current zoom level, continuous
    pub zoom: f64,
    /// The minimum allowed zoom level
    pub min_zoom: f64,
    /// The maximum allowed zoom level
    pub max_zoom: f64,
    /// Tier-local pixel offset of the screen origin
    pan: Point,
    /// The size of the viewport in pixels
    size: Size,
    tier_index: usize,
    registry: Arc<TierRegistry>,
}

impl Viewport {
    /// Creates a new viewport at the top-left of the tier selected by `zoom`
    pub fn new(registry: Arc<TierRegistry>, size: Size, zoom: f64, zoom_limits: (f64, f64)) -> Self {
        let (min_zoom, max_zoom) = zoom_limits;
        let zoom = zoom.clamp(min_zoom, max_zoom);
        let tier_index = registry.select_index(zoom);
        Self {
            zoom,
            min_zoom,
            max_zoom,
            pan: Point::default(),
            size,
            tier_index,
            registry,
        }
    }

    pub fn tier(&self) -> &Tier {
        &self.registry.tiers()[self.tier_index]
    }

    pub fn tier_index(&self) -> usize {
        self.tier_index
    }

    pub fn registry(&self) -> &Arc<TierRegistry> {
        &self.registry
    }

    pub fn pan_offset(&self) -> Point {
        self.pan
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn center(&self) -> Point {
        Point::new(self.size.width / 2.0, self.size.height / 2.0)
    }

    /// Sets the zoom level, keeping the address under `anchor` fixed when
    /// the tier changes. Returns whether the tier changed.
    ///
    /// Tiers are drawn 1:1, so a zoom change inside one tier leaves pan as is.
    pub fn set_zoom(&mut self, zoom: f64, anchor: Point) -> bool {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        let new_index = self.registry.select_index(self.zoom);
        if new_index == self.tier_index {
            return false;
        }

        let registry = Arc::clone(&self.registry);
        let old = &registry.tiers()[self.tier_index];
        let new = &registry.tiers()[new_index];
        let pan = reproject_pan(old, new, self.pan, anchor);
        log::info!(
            "tier {} (res {}) -> tier {} (res {}) at zoom {:.2}",
            old.level,
            old.resolution,
            new.level,
            new.resolution,
            self.zoom
        );

        self.tier_index = new_index;
        self.pan = self.clamp_pan(pan);
        true
    }

    /// Multiplies zoom by `factor` around `anchor`.
    pub fn zoom_by(&mut self, factor: f64, anchor: Point) -> bool {
        self.set_zoom(self.zoom * factor, anchor)
    }

    /// Moves the view by a tier-pixel delta. Returns the applied delta after
    /// clamping to the tier extent.
    pub fn pan(&mut self, dx: f64, dy: f64) -> Point {
        let before = self.pan;
        self.pan = self.clamp_pan(Point::new(self.pan.x + dx, self.pan.y + dy));
        self.pan.subtract(&before)
    }

    /// Sets pan absolutely, clamped.
    pub fn pan_to(&mut self, pan: Point) {
        self.pan = self.clamp_pan(pan);
    }

    /// Centers the screen on `id` in the current tier.
    pub fn center_on(&mut self, id: Identifier) {
        let pos = to_grid(id);
        let upp = self.tier().units_per_pixel();
        let target = Point::new(pos.col as f64 / upp, pos.row as f64 / upp);
        self.pan_to(target.subtract(&self.center()));
    }

    /// Sets the viewport size
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
        self.pan = self.clamp_pan(self.pan);
    }

    /// Sets the zoom limits
    pub fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        let anchor = self.center();
        self.set_zoom(self.zoom, anchor);
    }

    /// Keeps the visible window inside `[0, extent - size]` on each axis.
    fn clamp_pan(&self, pan: Point) -> Point {
        let extent = self.tier().extent();
        let max_x = (extent.width - self.size.width).max(0.0);
        let max_y = (extent.height - self.size.height).max(0.0);
        Point::new(pan.x.clamp(0.0, max_x), pan.y.clamp(0.0, max_y))
    }

    pub fn transform(&self) -> ViewTransform {
        ViewTransform {
            level: self.tier().level,
            zoom: self.zoom,
            units_per_pixel: self.tier().units_per_pixel(),
            pan: self.pan,
            size: self.size,
        }
    }

    pub fn screen_to_address(&self, screen: &Point) -> Identifier {
        self.transform().screen_to_address(screen)
    }

    pub fn address_to_screen(&self, id: Identifier) -> Option<Point> {
        self.transform().address_to_screen(id)
    }

    /// Tiles of the active tier that intersect the screen, before margin.
    pub fn tile_window(&self) -> Option<TileWindow> {
        let tier = self.tier();
        match &tier.kind {
            TierKind::Image { .. } => TileWindow::clamped(tier.level, (0, 0), (0, 0), 1, 1),
            TierKind::Tiled {
                tile_width_px,
                tile_height_px,
                grid_cols,
                grid_rows,
                ..
            } => {
                let span = |offset: f64, extent: f64, tile: u32| {
                    let tile = tile as f64;
                    let first = (offset / tile).floor() as i64;
                    let last = ((offset + extent) / tile).ceil() as i64 - 1;
                    (first, last.max(first))
                };
                TileWindow::clamped(
                    tier.level,
                    span(self.pan.x, self.size.width, *tile_width_px),
                    span(self.pan.y, self.size.height, *tile_height_px),
                    *grid_cols,
                    *grid_rows,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<TierRegistry> {
        Arc::new(
            TierRegistry::new(vec![
                Tier::image(0, 1.0, "overview.png", 1000, 800),
                Tier::image(1, 10.0, "zone.png", 10_000, 8_000),
                Tier::tiled(2, 50.0, (1000, 800), (50, 50), "tiles/tile_{col}_{row}.png"),
            ])
            .unwrap(),
        )
    }

    fn viewport() -> Viewport {
        Viewport::new(registry(), Size::new(1000.0, 800.0), 1.0, (0.1, 1000.0))
    }

    #[test]
    fn test_viewport_creation() {
        let viewport = viewport();
        assert_eq!(viewport.tier().level, 0);
        assert_eq!(viewport.pan_offset(), Point::new(0.0, 0.0));
        assert_eq!(viewport.zoom, 1.0);
    }

    #[test]
    fn test_tier_change_keeps_anchor_address() {
        let mut viewport = viewport();
        let anchor = Point::new(500.0, 400.0);
        let before = viewport.screen_to_address(&anchor);

        assert!(viewport.set_zoom(10.0, anchor));
        assert_eq!(viewport.tier().resolution, 10.0);
        assert_eq!(viewport.pan_offset(), Point::new(4500.0, 3600.0));

        assert_eq!(viewport.screen_to_address(&anchor), before);
        let screen = viewport.address_to_screen(before).unwrap();
        assert!(screen.distance_to(&anchor) <= 1.0);
    }

    #[test]
    fn test_zoom_within_tier_keeps_pan() {
        let mut viewport = viewport();
        viewport.set_zoom(10.0, Point::new(500.0, 400.0));
        let pan = viewport.pan_offset();
        assert!(!viewport.set_zoom(12.0, Point::new(0.0, 0.0)));
        assert_eq!(viewport.pan_offset(), pan);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut viewport = viewport();
        viewport.set_zoom(5000.0, Point::new(0.0, 0.0));
        assert_eq!(viewport.zoom, 1000.0);
        assert_eq!(viewport.tier().level, 2);
        viewport.set_zoom(0.0, Point::new(0.0, 0.0));
        assert_eq!(viewport.zoom, 0.1);
        assert_eq!(viewport.tier().level, 0);
    }

    #[test]
    fn test_pan_clamps_to_extent() {
        let mut viewport = viewport();
        // Overview extent equals the screen, so nothing moves.
        assert_eq!(viewport.pan(100.0, 100.0), Point::new(0.0, 0.0));

        viewport.set_zoom(50.0, Point::new(0.0, 0.0));
        viewport.pan(-10.0, -10.0);
        assert_eq!(viewport.pan_offset(), Point::new(0.0, 0.0));
        viewport.pan(1e9, 1e9);
        assert_eq!(viewport.pan_offset(), Point::new(49_000.0, 39_200.0));
    }

    #[test]
    fn test_screen_to_address_uses_floor() {
        let mut viewport = viewport();
        viewport.set_zoom(50.0, Point::new(0.0, 0.0));
        viewport.pan_to(Point::new(10.0, 1.0));
        // col 10, row 1 at native resolution
        assert_eq!(viewport.screen_to_address(&Point::new(0.7, 0.2)), Identifier(50_010));
        assert_eq!(viewport.address_to_screen(Identifier(50_010)), Some(Point::new(0.0, 0.0)));
        assert_eq!(viewport.address_to_screen(Identifier(0)), None);
    }

    #[test]
    fn test_overview_pixel_covers_block() {
        let viewport = viewport();
        assert_eq!(viewport.screen_to_address(&Point::new(1.0, 0.0)), Identifier(50));
        assert_eq!(viewport.screen_to_address(&Point::new(0.0, 1.0)), Identifier(50 * ROW_WIDTH));
        // Off-screen input is clamped into the grid.
        let last = viewport.screen_to_address(&Point::new(5000.0, 5000.0));
        assert_eq!(to_grid(last), GridPosition::new(ROW_WIDTH - 1, TOTAL_ROWS - 1));
    }

    #[test]
    #[should_panic(expected = "non-finite screen point")]
    fn test_non_finite_screen_point_panics() {
        viewport().screen_to_address(&Point::new(f64::NAN, 0.0));
    }

    #[test]
    fn test_tile_window() {
        let mut viewport = viewport();
        assert_eq!(viewport.tile_window().unwrap().tile_count(), 1);

        viewport.set_zoom(50.0, Point::new(0.0, 0.0));
        viewport.pan_to(Point::new(1500.0, 0.0));
        let window = viewport.tile_window().unwrap();
        assert_eq!((window.col_start, window.col_end), (1, 2));
        assert_eq!((window.row_start, window.row_end), (0, 0));

        viewport.pan_to(Point::new(2000.0, 800.0));
        let window = viewport.tile_window().unwrap();
        assert_eq!((window.col_start, window.col_end), (2, 2));
        assert_eq!((window.row_start, window.row_end), (1, 1));
    }

    #[test]
    fn test_center_on_identifier() {
        let mut viewport = viewport();
        viewport.set_zoom(50.0, Point::new(0.0, 0.0));
        let id = to_identifier(GridPosition::new(20_000, 10_000));
        viewport.center_on(id);
        assert_eq!(viewport.address_to_screen(id), Some(Point::new(500.0, 400.0)));
    }

    #[test]
    fn test_tier_change_clamps_pan_to_smaller_extent() {
        // The res 1 image is 1000x800, smaller than this screen.
        let mut viewport = Viewport::new(registry(), Size::new(2000.0, 1600.0), 10.0, (0.1, 1000.0));
        viewport.pan(5000.0, 5000.0);
        assert_eq!(viewport.pan_offset(), Point::new(5000.0, 5000.0));

        assert!(viewport.set_zoom(1.0, Point::new(1000.0, 800.0)));
        assert_eq!(viewport.tier().level, 0);
        assert_eq!(viewport.pan_offset(), Point::new(0.0, 0.0));
        assert!(viewport.tile_window().is_some());
    }

    #[test]
    fn test_scale_indicator_follows_zoom() {
        let mut viewport = viewport();
        assert_eq!(viewport.transform().scale_indicator().identifiers, 5000);
        viewport.set_zoom(10.0, Point::new(0.0, 0.0));
        assert_eq!(viewport.transform().scale_indicator().identifiers, 500);
        viewport.set_zoom(50.0, Point::new(0.0, 0.0));
        let scale = viewport.transform().scale_indicator();
        assert_eq!(scale.identifiers, 100);
        assert_eq!(scale.length_px, 100.0);
        // Continuous between tiers.
        assert_eq!(ScaleIndicator::at_zoom(40.0, 100.0).identifiers, 125);
    }

    #[test]
    fn test_minimap_tracks_visible_window() {
        let mut viewport = viewport();
        let overview = viewport.transform().minimap();
        assert_eq!(overview.frame.origin, Point::new(890.0, 10.0));
        assert_eq!(overview.frame.size, Size::new(100.0, 80.0));
        // The overview shows the whole grid.
        assert_eq!(overview.marker, overview.frame);

        viewport.set_zoom(50.0, Point::new(0.0, 0.0));
        viewport.pan_to(Point::new(25_000.0, 20_000.0));
        let native = viewport.transform().minimap();
        assert_eq!(native.marker.origin, Point::new(940.0, 50.0));
        // 1000 of 50000 columns is 2 px, raised to the minimum.
        assert_eq!(native.marker.size, Size::new(4.0, 4.0));
    }
}
