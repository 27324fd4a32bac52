use serde::{Deserialize, Serialize};

/// Represents a point in screen or tier-local pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn floor(&self) -> Point {
        Point::new(self.x.floor(), self.y.floor())
    }

    pub fn round(&self) -> Point {
        Point::new(self.x.round(), self.y.round())
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether a point lies in `[0, width) x [0, height)`.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= 0.0 && point.x < self.width && point.y >= 0.0 && point.y < self.height
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::new(1000.0, 800.0)
    }
}

/// Axis-aligned rectangle in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }
}

/// Cache key of one tile: the tier level plus its column/row in that tier's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub level: u32,
    pub col: u32,
    pub row: u32,
}

impl TileKey {
    pub fn new(level: u32, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }
}

/// Inclusive block of tiles of one tier, bounded by the tier's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileWindow {
    pub level: u32,
    pub col_start: u32,
    pub col_end: u32,
    pub row_start: u32,
    pub row_end: u32,
    pub grid_cols: u32,
    pub grid_rows: u32,
}

impl TileWindow {
    /// Window covering tile-space `[col_start, col_end] x [row_start, row_end]`,
    /// clamped into the grid. Returns `None` for an empty grid.
    pub fn clamped(
        level: u32,
        cols: (i64, i64),
        rows: (i64, i64),
        grid_cols: u32,
        grid_rows: u32,
    ) -> Option<Self> {
        if grid_cols == 0 || grid_rows == 0 {
            return None;
        }
        let clamp_col = |c: i64| c.clamp(0, grid_cols as i64 - 1) as u32;
        let clamp_row = |r: i64| r.clamp(0, grid_rows as i64 - 1) as u32;
        let (c0, c1) = (clamp_col(cols.0), clamp_col(cols.1));
        let (r0, r1) = (clamp_row(rows.0), clamp_row(rows.1));
        Some(Self {
            level,
            col_start: c0.min(c1),
            col_end: c0.max(c1),
            row_start: r0.min(r1),
            row_end: r0.max(r1),
            grid_cols,
            grid_rows,
        })
    }

    /// Grow by `margin` tiles on every side, staying inside the grid.
    pub fn expand(&self, margin: u32) -> Self {
        Self {
            col_start: self.col_start.saturating_sub(margin),
            col_end: (self.col_end.saturating_add(margin)).min(self.grid_cols - 1),
            row_start: self.row_start.saturating_sub(margin),
            row_end: (self.row_end.saturating_add(margin)).min(self.grid_rows - 1),
            ..*self
        }
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        key.level == self.level
            && (self.col_start..=self.col_end).contains(&key.col)
            && (self.row_start..=self.row_end).contains(&key.row)
    }

    /// Tiles in the window; never zero.
    pub fn tile_count(&self) -> usize {
        ((self.col_end - self.col_start + 1) as usize) * ((self.row_end - self.row_start + 1) as usize)
    }

    /// Keys in row-major order.
    pub fn keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        (self.row_start..=self.row_end).flat_map(move |row| {
            (self.col_start..=self.col_end).map(move |col| TileKey::new(self.level, col, row))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_clamps_to_grid() {
        let window = TileWindow::clamped(2, (-3, 4), (48, 60), 50, 50).unwrap();
        assert_eq!((window.col_start, window.col_end), (0, 4));
        assert_eq!((window.row_start, window.row_end), (48, 49));
        assert_eq!(window.tile_count(), 10);
    }

    #[test]
    fn test_expand_respects_edges() {
        let window = TileWindow::clamped(0, (0, 1), (0, 0), 3, 2).unwrap().expand(1);
        assert_eq!((window.col_start, window.col_end), (0, 2));
        assert_eq!((window.row_start, window.row_end), (0, 1));
        assert_eq!(window.keys().count(), 6);
    }

    #[test]
    fn test_size_contains_is_half_open() {
        let size = Size::new(10.0, 5.0);
        assert!(size.contains(&Point::new(0.0, 0.0)));
        assert!(size.contains(&Point::new(9.9, 4.9)));
        assert!(!size.contains(&Point::new(10.0, 1.0)));
        assert!(!size.contains(&Point::new(1.0, -0.1)));
    }
}
