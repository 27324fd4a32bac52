//! Resource fetchers injected into [`TileCache`](super::cache::TileCache).
//!
//! Byte fetchers (`HttpFetcher`, `FileFetcher`) are wrapped by decoders
//! (`RasterDecoder`, `JsonDecoder`) to produce the cached resource type.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Failure of a single resource load. Cloneable so one in-flight load can
/// report the same failure to every awaiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("failed to decode {url}: {message}")]
    Decode { url: String, message: String },
}

/// Fetch and decode the resource identified by `url`.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    type Resource: Send + Sync + 'static;

    async fn fetch(&self, url: &str) -> Result<Self::Resource, LoadError>;
}

#[async_trait]
impl<F: ResourceFetcher + ?Sized> ResourceFetcher for Arc<F> {
    type Resource = F::Resource;

    async fn fetch(&self, url: &str) -> Result<Self::Resource, LoadError> {
        (**self).fetch(url).await
    }
}

/// Shared async HTTP client for tile and marker fetching
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("isbnmap/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .pool_max_idle_per_host(16)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("falling back to default HTTP client: {e}");
            reqwest::Client::new()
        })
});

/// Fetches bytes over HTTP, resolving keys against a base URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.is_empty() && !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url }
    }

    fn resolve(&self, key: &str) -> String {
        if key.starts_with("http://") || key.starts_with("https://") {
            key.to_string()
        } else {
            format!("{}{}", self.base_url, key.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    type Resource = Vec<u8>;

    async fn fetch(&self, key: &str) -> Result<Vec<u8>, LoadError> {
        let url = self.resolve(key);
        log::debug!("GET {url}");
        let network = |e: reqwest::Error| LoadError::Network {
            url: url.clone(),
            message: e.to_string(),
        };
        let resp = HTTP_CLIENT.get(&url).send().await.map_err(network)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LoadError::NotFound(url.clone()));
        }
        if !resp.status().is_success() {
            return Err(LoadError::Network {
                url: url.clone(),
                message: format!("HTTP {}", resp.status()),
            });
        }
        let bytes = resp.bytes().await.map_err(network)?;
        Ok(bytes.to_vec())
    }
}

/// Reads resources from a local directory.
#[cfg(feature = "tokio-runtime")]
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: std::path::PathBuf,
}

#[cfg(feature = "tokio-runtime")]
impl FileFetcher {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(feature = "tokio-runtime")]
#[async_trait]
impl ResourceFetcher for FileFetcher {
    type Resource = Vec<u8>;

    async fn fetch(&self, key: &str) -> Result<Vec<u8>, LoadError> {
        let path = self.root.join(key.trim_start_matches('/'));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LoadError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(LoadError::Network {
                url: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Decoded RGBA raster tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterTile {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RasterTile {
    /// RGBA of the pixel at `(x, y)`, `None` outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.rgba.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn availability_at(&self, x: u32, y: u32) -> Option<Availability> {
        self.pixel(x, y)
            .and_then(|[r, g, b, _]| Availability::classify(r, g, b))
    }
}

/// Holding state painted into coverage rasters: red cells are known but
/// missing, green cells are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Absent,
    Available,
}

impl Availability {
    /// Strongly red or strongly green pixels classify; anything else is
    /// blank or blended.
    pub fn classify(r: u8, g: u8, b: u8) -> Option<Self> {
        if r > 200 && g < 100 && b < 100 {
            Some(Availability::Absent)
        } else if g > 200 && r < 100 && b < 100 {
            Some(Availability::Available)
        } else {
            None
        }
    }
}

/// Decodes PNG/JPEG bytes from an inner byte fetcher into [`RasterTile`]s.
#[cfg(feature = "raster")]
pub struct RasterDecoder<F> {
    inner: F,
}

#[cfg(feature = "raster")]
impl<F> RasterDecoder<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

#[cfg(feature = "raster")]
#[async_trait]
impl<F> ResourceFetcher for RasterDecoder<F>
where
    F: ResourceFetcher<Resource = Vec<u8>>,
{
    type Resource = RasterTile;

    async fn fetch(&self, url: &str) -> Result<RasterTile, LoadError> {
        let bytes = self.inner.fetch(url).await?;
        let img = image::load_from_memory(&bytes).map_err(|e| LoadError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let rgba = img.to_rgba8();
        Ok(RasterTile {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }
}

/// Parses JSON bytes from an inner byte fetcher into `T`.
pub struct JsonDecoder<F, T> {
    inner: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> JsonDecoder<F, T> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> ResourceFetcher for JsonDecoder<F, T>
where
    F: ResourceFetcher<Resource = Vec<u8>>,
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Resource = T;

    async fn fetch(&self, url: &str) -> Result<T, LoadError> {
        let bytes = self.inner.fetch(url).await?;
        serde_json::from_slice(&bytes).map_err(|e| LoadError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
