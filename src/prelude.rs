//! Prelude module for common isbnmap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use isbnmap::prelude::*;`

pub use crate::core::{
    address::{checksum, Identifier},
    config::{MapConfig, MarkerConfig, TileLoadingConfig, TileLoadingProfile, ZoneConfig},
    geo::{Point, Rect, Size, TileKey, TileWindow},
    map::{Frame, FramePlan, MapSession, ViewMode},
    tier::{Tier, TierKind, TierRegistry},
    viewport::{Minimap, ScaleIndicator, ViewTransform, Viewport},
};

pub use crate::input::events::{EventHandled, GestureEvent, MapEvent};

pub use crate::layers::{
    dataset::{Dataset, DatasetConfig, DatasetLayer},
    marker::{Marker, MarkerLayer, PlacedMarker},
    zone::{ProjectedZone, Zone, ZoneIndex},
};

pub use crate::tiles::{Availability, HttpFetcher, LoadError, RasterTile, ResourceFetcher, TileCache, TileSource};

#[cfg(feature = "tokio-runtime")]
pub use crate::tiles::FileFetcher;

pub use crate::runtime::{DisposalToken, FrameScheduler};
pub use crate::traits::{CacheStats, FrameRenderer};

pub use crate::{Error as MapError, Result};

pub use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
