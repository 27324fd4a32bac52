pub mod index;

pub use index::{IndexedPoint, PointIndex};
