pub mod countries;
pub mod dataset;
pub mod marker;
pub mod zone;

pub use dataset::{Dataset, DatasetConfig, DatasetLayer, DatasetOverlay};
pub use marker::{Marker, MarkerLayer, MarkerTile, PlacedMarker};
pub use zone::{CoalesceRule, ProjectedZone, Zone, ZoneIndex};
