//! # isbnmap
//!
//! Viewport, tier and tile-cache engine for a pannable, zoomable map of the
//! ISBN-13 space. Two billion identifiers are laid out on a 50 000-wide grid
//! and shown through a small set of resolution tiers: a few pre-rendered
//! overview images and one tiled tier at native resolution.
//!
//! The engine owns view state and data loading; drawing is left to a
//! [`FrameRenderer`] supplied by the host.

pub mod core;
pub mod input;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod spatial;
pub mod tiles;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    address::Identifier,
    config::MapConfig,
    map::{Frame, MapSession, ViewMode},
    tier::{Tier, TierRegistry},
    viewport::{ViewTransform, Viewport},
};

pub use input::events::{GestureEvent, MapEvent};

pub use layers::{dataset::DatasetLayer, marker::MarkerLayer, zone::ZoneIndex};

pub use runtime::{DisposalToken, FrameScheduler};

pub use tiles::{LoadError, TileCache};

pub use traits::FrameRenderer;

/// Install an `env_logger` backend reading `RUST_LOG`, defaulting to `info`
/// for this crate. Later calls are no-ops.
#[cfg(feature = "debug")]
pub fn init_debug_logging() {
    let installed = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("isbnmap=info"))
        .format_timestamp_millis()
        .try_init()
        .is_ok();
    if installed {
        log::debug!("debug logging enabled");
    }
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Error type alias for convenience
pub type Error = MapError;
