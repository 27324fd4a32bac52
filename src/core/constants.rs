//! Core constants of the ISBN address space and the deployed tile pyramid.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// First 12-digit ISBN prefix of the mapped space. Identifiers are offsets from it.
pub const BASE_ISBN: u64 = 978_000_000_000;

/// Grid cells per row of the address grid.
pub const ROW_WIDTH: u64 = 50_000;

/// Rows in the address grid (covers the 978 and 979 EAN prefixes).
pub const TOTAL_ROWS: u64 = 40_000;

/// Number of identifiers addressable by the grid.
pub const TOTAL_IDENTIFIERS: u64 = ROW_WIDTH * TOTAL_ROWS;

/// Resolution at which one tier pixel covers exactly one grid cell.
pub const NATIVE_RESOLUTION: f64 = 50.0;

/// Default tiles of margin loaded around the visible window.
pub const DEFAULT_PREFETCH_MARGIN: u32 = 1;

/// Default bound on cached tile entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Multiplicative wheel zoom step.
pub const DEFAULT_ZOOM_STEP: f64 = 1.1;

/// Marker tiles span this many grid columns.
pub const MARKER_TILE_COLS: u64 = 1_000;

/// Marker tiles span this many grid rows.
pub const MARKER_TILE_ROWS: u64 = 800;

/// Marker hit-test radius in screen pixels.
pub const MARKER_HIT_RADIUS: f64 = 8.0;

/// Length of the scale bar in screen pixels.
pub const SCALE_BAR_PX: f64 = 100.0;

/// Minimap box size in screen pixels.
pub const MINIMAP_WIDTH: f64 = 100.0;
pub const MINIMAP_HEIGHT: f64 = 80.0;

/// Gap between the minimap and the top-right screen corner.
pub const MINIMAP_MARGIN: f64 = 10.0;

/// Smallest side of the minimap's position marker.
pub const MINIMAP_MARKER_MIN: f64 = 4.0;
