//! Per-dataset coverage overlays for the overview tier.
//!
//! Each dataset (a source of known ISBNs) has a pre-rendered image at the
//! overview resolution where held identifiers are green and known but
//! missing ones red. One dataset at a time is highlighted; the catalog comes
//! from an `all_books.json` style list.

use crate::core::geo::TileKey;
use crate::core::tier::Tier;
use crate::prelude::Arc;
use crate::tiles::{JsonDecoder, LoadError, RasterTile, ResourceFetcher, TileCache, TileSource};
use serde::{Deserialize, Serialize};

/// One entry of the dataset catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub prefix: String,
    pub name: String,
    /// Identifiers the dataset holds
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Resource key pattern, `{dataset}` is the dataset prefix
    pub source_pattern: String,
    /// Prefix shown when a requested one is not in the catalog
    pub fallback: String,
    /// Tier level the overlay images are drawn at
    pub level: u32,
    pub catalog: Vec<Dataset>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            source_pattern: "images/all_isbns_{dataset}_1_50.png".to_string(),
            fallback: "md5".to_string(),
            level: 0,
            catalog: Vec::new(),
        }
    }
}

/// Fetch a catalog list through a byte fetcher.
pub async fn load_catalog<F>(fetcher: F, url: &str) -> Result<Vec<Dataset>, LoadError>
where
    F: ResourceFetcher<Resource = Vec<u8>>,
{
    let catalog = JsonDecoder::<F, Vec<Dataset>>::new(fetcher).fetch(url).await?;
    log::info!("loaded {} datasets from {}", catalog.len(), url);
    Ok(catalog)
}

/// Maps the `col` of a dataset key to that dataset's image.
struct DatasetSource {
    pattern: String,
    prefixes: Vec<String>,
}

impl TileSource for DatasetSource {
    fn url(&self, key: TileKey) -> String {
        match self.prefixes.get(key.col as usize) {
            Some(prefix) => self.pattern.replace("{dataset}", prefix),
            None => {
                log::warn!("no dataset at index {}", key.col);
                String::new()
            }
        }
    }
}

/// Highlighted dataset for a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOverlay {
    pub prefix: String,
    #[serde(skip)]
    pub image: Arc<RasterTile>,
}

/// Catalog plus a cache of overlay images, one per dataset.
#[derive(Clone)]
pub struct DatasetLayer {
    catalog: Arc<Vec<Dataset>>,
    /// Catalog prefixes, then the fallback when the catalog lacks it
    prefixes: Arc<Vec<String>>,
    fallback: String,
    level: u32,
    images: TileCache<RasterTile>,
}

impl DatasetLayer {
    pub fn new(config: &DatasetConfig, fetcher: Arc<dyn ResourceFetcher<Resource = RasterTile>>) -> Self {
        let mut prefixes: Vec<String> = config.catalog.iter().map(|d| d.prefix.clone()).collect();
        if !prefixes.contains(&config.fallback) {
            prefixes.push(config.fallback.clone());
        }
        let source = DatasetSource {
            pattern: config.source_pattern.clone(),
            prefixes: prefixes.clone(),
        };
        Self {
            catalog: Arc::new(config.catalog.clone()),
            prefixes: Arc::new(prefixes),
            fallback: config.fallback.clone(),
            level: config.level,
            // A handful of images; keep them all.
            images: TileCache::new(Arc::new(source), fetcher, None, 0),
        }
    }

    pub fn catalog(&self) -> &[Dataset] {
        &self.catalog
    }

    pub fn get(&self, prefix: &str) -> Option<&Dataset> {
        self.catalog.iter().find(|d| d.prefix == prefix)
    }

    /// The prefix actually shown for a request: itself when catalogued,
    /// otherwise the fallback.
    pub fn resolve<'a>(&'a self, prefix: &'a str) -> &'a str {
        if self.get(prefix).is_some() {
            prefix
        } else {
            &self.fallback
        }
    }

    /// Overlays only belong on their configured tier.
    pub fn shown_on(&self, tier: &Tier) -> bool {
        tier.level == self.level
    }

    fn key_for(&self, prefix: &str) -> Option<TileKey> {
        let index = self.prefixes.iter().position(|p| p == prefix)?;
        Some(TileKey::new(self.level, index as u32, 0))
    }

    /// Load the overlay image of a resolved prefix. A failed load leaves the
    /// overlay out of the frame.
    pub async fn load(&self, prefix: &str) -> Option<DatasetOverlay> {
        let key = self.key_for(prefix)?;
        match self.images.request(key).await {
            Ok(image) => Some(DatasetOverlay {
                prefix: prefix.to_string(),
                image,
            }),
            Err(err) => {
                log::warn!("dataset overlay {} unavailable: {}", prefix, err);
                None
            }
        }
    }

    pub fn images(&self) -> &TileCache<RasterTile> {
        &self.images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingFetcher {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ResourceFetcher for RecordingFetcher {
        type Resource = RasterTile;

        async fn fetch(&self, url: &str) -> Result<RasterTile, LoadError> {
            self.urls.lock().unwrap().push(url.to_string());
            if url.contains("missing") {
                return Err(LoadError::NotFound(url.to_string()));
            }
            Ok(RasterTile {
                width: 1,
                height: 1,
                rgba: vec![0, 255, 0, 255],
            })
        }
    }

    struct Bytes(&'static [u8]);

    #[async_trait::async_trait]
    impl ResourceFetcher for Bytes {
        type Resource = Vec<u8>;

        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, LoadError> {
            Ok(self.0.to_vec())
        }
    }

    fn config() -> DatasetConfig {
        DatasetConfig {
            catalog: vec![
                Dataset {
                    prefix: "cerlalc".into(),
                    name: "CERLALC".into(),
                    count: 1_523_433,
                    color: None,
                },
                Dataset {
                    prefix: "missing".into(),
                    name: "Gone".into(),
                    count: 0,
                    color: None,
                },
            ],
            ..DatasetConfig::default()
        }
    }

    #[test]
    fn test_unknown_prefix_falls_back() {
        let layer = DatasetLayer::new(&config(), Arc::new(RecordingFetcher::default()));
        assert_eq!(layer.resolve("cerlalc"), "cerlalc");
        assert_eq!(layer.resolve("nope"), "md5");
        assert_eq!(layer.get("cerlalc").map(|d| d.count), Some(1_523_433));
        assert!(layer.shown_on(&Tier::image(0, 1.0, "o.png", 1000, 800)));
        assert!(!layer.shown_on(&Tier::image(1, 10.0, "z.png", 10_000, 8_000)));
    }

    #[tokio::test]
    async fn test_overlay_urls_follow_prefix() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let layer = DatasetLayer::new(&config(), fetcher.clone());

        let overlay = layer.load("cerlalc").await.unwrap();
        assert_eq!(overlay.prefix, "cerlalc");
        assert_eq!(overlay.image.availability_at(0, 0), Some(crate::tiles::Availability::Available));
        assert!(layer.load("md5").await.is_some());
        assert!(layer.load("missing").await.is_none());
        assert!(layer.load("not-catalogued").await.is_none());

        // Loaded overlays are cached.
        layer.load("cerlalc").await.unwrap();
        assert_eq!(
            *fetcher.urls.lock().unwrap(),
            vec![
                "images/all_isbns_cerlalc_1_50.png",
                "images/all_isbns_md5_1_50.png",
                "images/all_isbns_missing_1_50.png",
            ]
        );
    }

    #[tokio::test]
    async fn test_catalog_json() {
        let body = br#"[
            {"prefix": "md5", "name": "All books", "count": 10, "color": "rgb(0,0,0)"},
            {"prefix": "isbndb", "name": "ISBNdb", "count": 5}
        ]"#;
        let catalog = load_catalog(Bytes(body), "all_books.json").await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].color.as_deref(), Some("rgb(0,0,0)"));
        assert_eq!(catalog[1].prefix, "isbndb");

        assert!(matches!(
            load_catalog(Bytes(b"{}"), "all_books.json").await,
            Err(LoadError::Decode { .. })
        ));
    }
}
