use isbnmap::core::address::checksum;
use isbnmap::core::geo::{Point, Size, TileKey, TileWindow};
use isbnmap::layers::marker::MarkerTileDecoder;
use isbnmap::prelude::*;
use isbnmap::tiles::PatternSource;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// End-to-end scenarios driving a session the way a host application would:
/// gestures in, frames out.
#[cfg(test)]
mod integration_tests {
    use super::*;

    /// In-memory byte store keyed by resource path
    #[derive(Clone, Default)]
    struct MemoryStore {
        files: Arc<HashMap<String, Vec<u8>>>,
        fetches: Arc<AtomicUsize>,
    }

    impl MemoryStore {
        fn with(files: Vec<(&str, String)>) -> Self {
            Self {
                files: Arc::new(
                    files
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.into_bytes()))
                        .collect(),
                ),
                fetches: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl ResourceFetcher for MemoryStore {
        type Resource = Vec<u8>;

        async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, LoadError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.files
                .get(url)
                .cloned()
                .ok_or_else(|| LoadError::NotFound(url.to_string()))
        }
    }

    /// Every raster request succeeds with a 1x1 tile
    #[derive(Default)]
    struct PlainRasters {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ResourceFetcher for PlainRasters {
        type Resource = RasterTile;

        async fn fetch(&self, _url: &str) -> std::result::Result<RasterTile, LoadError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(RasterTile {
                width: 1,
                height: 1,
                rgba: vec![255; 4],
            })
        }
    }

    fn marker_store() -> MemoryStore {
        let near = checksum(Identifier(20 * 50_000 + 10));
        let far = checksum(Identifier(700 * 50_000 + 900));
        MemoryStore::with(vec![(
            "rarebook_tiles/rare_0_0.json",
            format!(
                r#"[{{"i": "{near}", "t": "Herbal", "h": 2}},
                    {{"i": "{far}", "t": "Psalter", "h": 1, "e": true}}]"#
            ),
        )])
    }

    fn session_with(store: MemoryStore) -> (MapSession, Arc<PlainRasters>) {
        let rasters = Arc::new(PlainRasters::default());
        let session = MapSession::new(
            &MapConfig::default(),
            rasters.clone(),
            Arc::new(MarkerTileDecoder::new(store)),
        )
        .unwrap();
        (session, rasters)
    }

    /// Zooming across a tier boundary keeps the anchored address in place
    #[test]
    fn test_tier_switch_keeps_anchor() {
        let registry = Arc::new(MapConfig::default().registry().unwrap());
        let mut viewport = Viewport::new(registry, Size::new(1000.0, 800.0), 1.0, (0.1, 1000.0));
        let anchor = Point::new(500.0, 400.0);
        let before = viewport.screen_to_address(&anchor);

        assert!(viewport.set_zoom(10.0, anchor));
        assert_eq!(viewport.tier().resolution, 10.0);
        assert_eq!(viewport.pan_offset(), Point::new(4500.0, 3600.0));

        assert_eq!(viewport.screen_to_address(&anchor), before);
    }

    /// Zone lookup and projection for the built-in registration groups
    #[test]
    fn test_builtin_zones_cover_english_block() {
        let index = ZoneConfig::default().build_index().unwrap();
        let english = index.zone_at(Identifier(150_000_000)).unwrap();
        assert_eq!(english.label, "English");
        assert_eq!(english.id_start, Identifier(0));
        assert_eq!(english.id_end, Identifier(200_000_000));

        let tier = MapConfig::default().registry().unwrap().select_tier(1.0).clone();
        let projected = ZoneIndex::project(english, &tier.scale());
        assert_eq!((projected.start_row, projected.end_row), (0, 79));
        assert_eq!((projected.start_col, projected.end_col), (0, 999));
    }

    /// Concurrent requests for one key share a single fetch
    #[tokio::test]
    async fn test_cache_deduplicates_requests() {
        let store = MemoryStore::with(vec![("t/1_2.bin", "abc".to_string())]);
        let cache: TileCache<Vec<u8>> = TileCache::new(
            Arc::new(PatternSource::new("t/{col}_{row}.bin")),
            Arc::new(store.clone()),
            None,
            0,
        );
        let key = TileKey::new(0, 1, 2);
        let (a, b, c) = futures::join!(cache.request(key), cache.request(key), cache.request(key));

        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().as_slice(), b"abc");
        assert!(b.is_ok() && c.is_ok());
        assert_eq!(cache.stats().fetches, 1);
    }

    /// A window with missing tiles still settles
    #[tokio::test]
    async fn test_window_settles_with_missing_tiles() {
        let store = MemoryStore::with(vec![("t/0_0.bin", "x".to_string())]);
        let cache: TileCache<Vec<u8>> =
            TileCache::new(Arc::new(PatternSource::new("t/{col}_{row}.bin")), Arc::new(store), Some(16), 0);
        let window = TileWindow::clamped(0, (0, 1), (0, 1), 10, 10).unwrap();

        let report = cache.ensure_window_loaded(&window).await;
        assert_eq!(report.requested, 4);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.failed, 3);
        assert!(cache.get_if_loaded(TileKey::new(0, 0, 0)).is_some());
        assert!(cache.get_if_loaded(TileKey::new(0, 1, 1)).is_none());
    }

    /// Full interaction: zoom into the tiled tier, hover a marker, drag, and
    /// compose frames along the way
    #[tokio::test]
    async fn test_session_zoom_hover_and_frame() {
        let (session, rasters) = session_with(marker_store());

        let overview = session.frame().await;
        assert_eq!(overview.mode, ViewMode::Overview { level: 0 });
        assert!(overview.visible_markers.is_empty());
        assert_eq!(overview.marker_report.requested, 0);

        session.zoom_to(50.0, Point::new(0.0, 0.0));
        assert_eq!(session.mode(), ViewMode::Tiled { level: 2 });
        let tiled = session.frame().await;
        assert_eq!(tiled.visible_tiles.len(), 1);
        assert_eq!(tiled.visible_markers.len(), 2);
        assert!(tiled
            .visible_markers
            .iter()
            .any(|m| m.screen == Point::new(10.0, 20.0)));
        // Overview image plus the native window with margin.
        assert_eq!(rasters.fetches.load(Ordering::SeqCst), 1 + 4);

        session.process_events();
        session.handle_gesture(GestureEvent::Hover {
            position: Point::new(12.0, 18.0),
        });
        match session.process_events().pop() {
            Some(MapEvent::Hover { marker: Some(marker), zone, .. }) => {
                assert_eq!(marker.title, "Herbal");
                assert_eq!(zone.as_deref(), Some("English"));
            }
            other => panic!("expected marker hover, got {:?}", other),
        }

        session.handle_gesture(GestureEvent::PanStart {
            position: Point::new(500.0, 400.0),
        });
        session.handle_gesture(GestureEvent::PanMove {
            delta: Point::new(-500.0, -300.0),
        });
        session.handle_gesture(GestureEvent::PanEnd);
        let names: Vec<_> = session.process_events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["movestart", "viewchanged", "moveend"]);

        let moved = session.frame().await;
        assert_eq!(moved.transform.pan, Point::new(500.0, 300.0));
        assert!(moved
            .visible_markers
            .iter()
            .all(|m| m.screen != Point::new(10.0, 20.0)));
    }

    /// Markers that fail to load leave the frame usable
    #[tokio::test]
    async fn test_missing_marker_tiles_do_not_block_frames() {
        let (session, _) = session_with(MemoryStore::default());
        session.zoom_to(50.0, Point::new(0.0, 0.0));

        let frame = session.frame().await;
        assert!(frame.visible_markers.is_empty());
        assert_eq!(frame.marker_report.failed, frame.marker_report.requested);
        assert_eq!(frame.visible_tiles.len(), 1);
    }

    /// The identifier under the pointer survives a tier switch
    #[tokio::test]
    async fn test_current_identifier_across_tiers() {
        let (session, _) = session_with(MemoryStore::default());
        session.handle_gesture(GestureEvent::Hover {
            position: Point::new(300.0, 100.0),
        });
        let hovered = session.current_identifier().unwrap();
        assert_eq!(hovered, Identifier(5000 * 50_000 + 15_000));

        for _ in 0..40 {
            session.handle_gesture(GestureEvent::Zoom {
                delta: -1.0,
                position: Point::new(300.0, 100.0),
            });
        }
        assert_eq!(session.mode(), ViewMode::Tiled { level: 2 });
        assert_eq!(session.current_identifier(), Some(hovered));
        assert_eq!(session.current_isbn13(), Some(checksum(hovered)));
    }
}
