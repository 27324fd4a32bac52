use crate::core::geo::Point;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// A payload placed at a point, indexed via an R-tree
#[derive(Debug, Clone)]
pub struct IndexedPoint<T> {
    pub position: Point,
    pub data: T,
}

impl<T> IndexedPoint<T> {
    pub fn new(position: Point, data: T) -> Self {
        Self { position, data }
    }
}

// --- rstar integration -------------------------------------------------------------------------

impl<T> RTreeObject for IndexedPoint<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.position.x, self.position.y])
    }
}

impl<T> PointDistance for IndexedPoint<T> {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position.x - point[0];
        let dy = self.position.y - point[1];
        dx * dx + dy * dy
    }
}

/// Static R-tree over points, built once from a complete set
pub struct PointIndex<T> {
    rtree: RTree<IndexedPoint<T>>,
}

impl<T> PointIndex<T> {
    /// Build in one pass, which packs the tree better than repeated inserts.
    pub fn bulk_load(items: Vec<IndexedPoint<T>>) -> Self {
        Self {
            rtree: RTree::bulk_load(items),
        }
    }

    /// Closest item no further than `radius` from `center`.
    pub fn nearest_within(&self, center: &Point, radius: f64) -> Option<&IndexedPoint<T>> {
        let query = [center.x, center.y];
        self.rtree
            .nearest_neighbor(&query)
            .filter(|item| item.distance_2(&query) <= radius * radius)
    }

    /// Items inside the axis-aligned rectangle `[min, max]`.
    pub fn query_rect(&self, min: &Point, max: &Point) -> Vec<&IndexedPoint<T>> {
        let envelope = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        self.rtree.locate_in_envelope(&envelope).collect()
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }
}
