//! Shared trait abstractions at the seams between the engine and its host

use crate::core::map::Frame;
use crate::Result;

/// Draws composed frames. Implemented by whatever owns the canvas.
pub trait FrameRenderer: Send + Sync {
    fn render(&self, frame: &Frame) -> Result<()>;

    /// Called once when the scheduler stops
    fn shutdown(&self) {}
}

impl<F> FrameRenderer for F
where
    F: Fn(&Frame) -> Result<()> + Send + Sync,
{
    fn render(&self, frame: &Frame) -> Result<()> {
        self(frame)
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Loads started, including retries
    pub fetches: u64,
    pub failures: u64,
    pub evictions: u64,
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
