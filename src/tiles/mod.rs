pub mod cache;
pub mod loader;
pub mod source;

// Re-exports for convenience
pub use cache::{TileCache, TileLoad, TileStatus, WindowReport};
pub use loader::{Availability, HttpFetcher, JsonDecoder, LoadError, RasterTile, ResourceFetcher};
pub use source::{PatternSource, TierSource, TileSource};

#[cfg(feature = "tokio-runtime")]
pub use loader::FileFetcher;
#[cfg(feature = "raster")]
pub use loader::RasterDecoder;
