//! Map session: viewport state, view-mode transitions and frame composition.
//!
//! Gestures mutate the session synchronously under a short lock. Frames are
//! composed from a snapshot ([`FramePlan`]) whose loads run without the lock,
//! so input keeps updating the view while tiles are in flight.

use crate::core::address::{checksum, Identifier};
use crate::core::config::MapConfig;
use crate::core::geo::{Point, TileKey, TileWindow};
use crate::core::tier::Tier;
use crate::core::viewport::{Minimap, ScaleIndicator, ViewTransform, Viewport};
use crate::input::events::{EventHandled, EventManager, GestureEvent, MapEvent};
use crate::layers::dataset::{DatasetLayer, DatasetOverlay};
use crate::layers::marker::{MarkerLayer, MarkerTile, PlacedMarker};
use crate::layers::zone::{ProjectedZone, Zone, ZoneIndex};
use crate::prelude::{Arc, HashMap, Mutex};
use crate::tiles::{Availability, RasterTile, ResourceFetcher, TierSource, TileCache, WindowReport};
use crate::Result;
use serde::Serialize;
use std::sync::{MutexGuard, PoisonError};

/// Interaction mode, one per kind of tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ViewMode {
    /// A single pre-rendered image covers the tier
    Overview { level: u32 },
    /// The tier is paged in as a tile grid; markers are live
    Tiled { level: u32 },
}

/// Read-only datasets a mode consults while handling input.
pub struct ModeContext<'a> {
    pub zones: &'a ZoneIndex,
    pub markers: &'a MarkerLayer,
}

/// Mutable session state guarded by the session lock.
pub struct SessionState {
    viewport: Viewport,
    mode: ViewMode,
    events: EventManager,
    current: Option<Identifier>,
    highlighted: Option<Zone>,
    /// Resolved prefix of the highlighted dataset
    dataset: Option<String>,
    drag_origin: Option<Point>,
    zoom_step: f64,
    dirty: bool,
}

impl SessionState {
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_origin.is_some()
    }

    fn view_changed(&mut self) {
        self.dirty = true;
        self.events.emit(MapEvent::ViewChanged {
            zoom: self.viewport.zoom,
            pan: self.viewport.pan_offset(),
        });
    }
}

impl ViewMode {
    pub fn for_tier(tier: &Tier) -> Self {
        if tier.is_tiled() {
            ViewMode::Tiled { level: tier.level }
        } else {
            ViewMode::Overview { level: tier.level }
        }
    }

    pub fn level(&self) -> u32 {
        match self {
            ViewMode::Overview { level } | ViewMode::Tiled { level } => *level,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewMode::Overview { .. } => "overview",
            ViewMode::Tiled { .. } => "tiled",
        }
    }

    pub fn shows_markers(&self) -> bool {
        matches!(self, ViewMode::Tiled { .. })
    }

    pub fn enter(self, state: &mut SessionState) {
        log::info!("entering {} view at level {}", self.name(), self.level());
        state.dirty = true;
    }

    pub fn exit(self, state: &mut SessionState) {
        log::info!("leaving {} view at level {}", self.name(), self.level());
        state.highlighted = None;
        state.drag_origin = None;
    }

    /// Drag by a screen delta; the content follows the pointer.
    pub fn handle_pan(self, state: &mut SessionState, delta: Point) -> EventHandled {
        let applied = state.viewport.pan(-delta.x, -delta.y);
        if applied.x == 0.0 && applied.y == 0.0 {
            return EventHandled::NotHandled;
        }
        state.view_changed();
        EventHandled::Handled
    }

    /// Wheel zoom around `position`: negative delta zooms in by one step.
    pub fn handle_zoom(self, state: &mut SessionState, delta: f64, position: Point) -> EventHandled {
        let factor = if delta < 0.0 {
            state.zoom_step
        } else if delta > 0.0 {
            1.0 / state.zoom_step
        } else {
            return EventHandled::NotHandled;
        };
        let before = state.viewport.zoom;
        state.viewport.zoom_by(factor, position);
        if state.viewport.zoom == before {
            return EventHandled::NotHandled;
        }
        state.view_changed();
        EventHandled::Handled
    }

    pub fn handle_hover(self, state: &mut SessionState, ctx: &ModeContext<'_>, position: Point) -> EventHandled {
        let identifier = state.viewport.screen_to_address(&position);
        let zone = ctx.zones.zone_at(identifier).cloned();
        let marker = if self.shows_markers() {
            let tier = state.viewport.tier();
            ctx.markers
                .find_at(tier, &state.viewport.transform(), &position, ctx.markers.hit_radius())
                .map(|placed| (*placed.marker).clone())
        } else {
            None
        };

        if state.highlighted != zone {
            state.dirty = true;
        }
        state.current = Some(identifier);
        state.highlighted = zone.clone();
        state.events.emit(MapEvent::Hover {
            identifier,
            isbn13: checksum(identifier),
            zone: zone.map(|z| z.label),
            marker,
        });
        EventHandled::Handled
    }

    pub fn handle_double_click(self, state: &mut SessionState, position: Point) -> EventHandled {
        let identifier = state.viewport.screen_to_address(&position);
        log::debug!("activate {} in {} view", identifier, self.name());
        state.events.emit(MapEvent::Activate {
            identifier,
            isbn13: checksum(identifier),
        });
        EventHandled::Handled
    }
}

/// Shared handle to one interactive map. Clones share state.
#[derive(Clone)]
pub struct MapSession {
    state: Arc<Mutex<SessionState>>,
    tiles: TileCache<RasterTile>,
    markers: MarkerLayer,
    datasets: DatasetLayer,
    zones: Arc<ZoneIndex>,
}

impl MapSession {
    pub fn new(
        config: &MapConfig,
        tile_fetcher: Arc<dyn ResourceFetcher<Resource = RasterTile>>,
        marker_fetcher: Arc<dyn ResourceFetcher<Resource = MarkerTile>>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(config.registry()?);
        let zones = Arc::new(config.zones.build_index()?);
        let datasets = DatasetLayer::new(&config.datasets, Arc::clone(&tile_fetcher));
        let tiles = TileCache::new(
            Arc::new(TierSource::new(Arc::clone(&registry))),
            tile_fetcher,
            config.tiles.cache_capacity,
            config.tiles.prefetch_margin,
        );
        let markers = MarkerLayer::new(
            &config.markers,
            marker_fetcher,
            config.tiles.cache_capacity,
            config.tiles.prefetch_margin,
        );

        let viewport = Viewport::new(
            registry,
            config.canvas,
            config.zoom.initial,
            (config.zoom.min, config.zoom.max),
        );
        let mode = ViewMode::for_tier(viewport.tier());
        let mut state = SessionState {
            viewport,
            mode,
            events: EventManager::new(),
            current: None,
            highlighted: None,
            dataset: None,
            drag_origin: None,
            zoom_step: config.zoom.step,
            dirty: true,
        };
        mode.enter(&mut state);
        log::info!(
            "map session ready: {} tiers, {} zones",
            state.viewport.registry().len(),
            zones.len()
        );

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            tiles,
            markers,
            datasets,
            zones,
        })
    }

    /// Session over a byte fetcher, decoding rasters and marker JSON.
    #[cfg(feature = "raster")]
    pub fn with_fetcher<F>(config: &MapConfig, fetcher: F) -> Result<Self>
    where
        F: ResourceFetcher<Resource = Vec<u8>> + Clone + 'static,
    {
        use crate::layers::marker::MarkerTileDecoder;
        use crate::tiles::RasterDecoder;

        Self::new(
            config,
            Arc::new(RasterDecoder::new(fetcher.clone())),
            Arc::new(MarkerTileDecoder::new(fetcher)),
        )
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one gesture. View state is updated before this returns.
    pub fn handle_gesture(&self, event: GestureEvent) -> EventHandled {
        let mut state = self.lock();
        let mode = state.mode;
        let ctx = ModeContext {
            zones: &self.zones,
            markers: &self.markers,
        };
        let handled = match event {
            GestureEvent::Zoom { delta, position } => mode.handle_zoom(&mut state, delta, position),
            GestureEvent::PanStart { position } => {
                state.drag_origin = Some(position);
                let pan = state.viewport.pan_offset();
                state.events.emit(MapEvent::MoveStart { pan });
                EventHandled::Handled
            }
            GestureEvent::PanMove { delta } if state.drag_origin.is_some() => mode.handle_pan(&mut state, delta),
            GestureEvent::PanMove { .. } => {
                log::trace!("pan move without a drag in progress");
                EventHandled::NotHandled
            }
            GestureEvent::PanEnd => match state.drag_origin.take() {
                Some(_) => {
                    let pan = state.viewport.pan_offset();
                    state.events.emit(MapEvent::MoveEnd { pan });
                    EventHandled::Handled
                }
                None => EventHandled::NotHandled,
            },
            GestureEvent::Hover { position } => mode.handle_hover(&mut state, &ctx, position),
            GestureEvent::DoubleClick { position } => mode.handle_double_click(&mut state, position),
            GestureEvent::Resize { size } => {
                state.viewport.set_size(size);
                state.view_changed();
                EventHandled::Handled
            }
        };
        Self::sync_mode(&mut state);
        handled
    }

    /// Zoom programmatically, as a wheel would around `anchor`.
    pub fn zoom_to(&self, zoom: f64, anchor: Point) {
        let mut state = self.lock();
        state.viewport.set_zoom(zoom, anchor);
        state.view_changed();
        Self::sync_mode(&mut state);
    }

    /// Center the view on an identifier in the current tier.
    pub fn center_on(&self, id: Identifier) {
        let mut state = self.lock();
        state.viewport.center_on(id);
        state.current = Some(id);
        state.view_changed();
    }

    /// Swap modes when the viewport moved into another tier.
    fn sync_mode(state: &mut SessionState) {
        let tier = state.viewport.tier();
        let (level, resolution) = (tier.level, tier.resolution);
        let next = ViewMode::for_tier(tier);
        let previous = state.mode;
        if previous.level() == level {
            return;
        }
        previous.exit(state);
        state.mode = next;
        next.enter(state);
        state.events.emit(MapEvent::TierChanged {
            from_level: previous.level(),
            to_level: level,
            resolution,
        });
    }

    /// Highlight a dataset on the overview tier, or clear it with `None`.
    /// Uncatalogued prefixes fall back to the configured default. Returns
    /// the prefix now shown.
    pub fn highlight_dataset(&self, prefix: Option<&str>) -> Option<String> {
        let resolved = prefix.map(|p| self.datasets.resolve(p).to_string());
        let mut state = self.lock();
        if state.dataset != resolved {
            log::debug!("dataset highlight {:?} -> {:?}", state.dataset, resolved);
            state.dataset = resolved.clone();
            state.dirty = true;
        }
        resolved
    }

    pub fn highlighted_dataset(&self) -> Option<String> {
        self.lock().dataset.clone()
    }

    pub fn on<F>(&self, event_name: &'static str, callback: F)
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.lock().events.on(event_name, callback);
    }

    pub fn process_events(&self) -> Vec<MapEvent> {
        self.lock().events.process_events()
    }

    pub fn pending_events(&self) -> usize {
        self.lock().events.pending_events()
    }

    pub fn viewport(&self) -> Viewport {
        self.lock().viewport.clone()
    }

    pub fn mode(&self) -> ViewMode {
        self.lock().mode
    }

    /// Identifier last under the pointer; survives tier switches.
    pub fn current_identifier(&self) -> Option<Identifier> {
        self.lock().current
    }

    pub fn current_isbn13(&self) -> Option<String> {
        self.current_identifier().map(checksum)
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Clear and return the dirty flag.
    pub fn take_dirty(&self) -> bool {
        std::mem::take(&mut self.lock().dirty)
    }

    pub fn tiles(&self) -> &TileCache<RasterTile> {
        &self.tiles
    }

    pub fn markers(&self) -> &MarkerLayer {
        &self.markers
    }

    pub fn zones(&self) -> &ZoneIndex {
        &self.zones
    }

    pub fn datasets(&self) -> &DatasetLayer {
        &self.datasets
    }

    /// Snapshot what the next frame needs. The lock is released on return.
    pub fn plan_frame(&self) -> FramePlan {
        let state = self.lock();
        FramePlan {
            tier: state.viewport.tier().clone(),
            mode: state.mode,
            transform: state.viewport.transform(),
            window: state.viewport.tile_window(),
            highlighted: state.highlighted.clone(),
            dataset: state.dataset.clone(),
            tiles: self.tiles.clone(),
            markers: self.markers.clone(),
            datasets: self.datasets.clone(),
            zones: Arc::clone(&self.zones),
        }
    }

    /// Plan and load the frame for the current view.
    pub async fn frame(&self) -> Frame {
        self.plan_frame().load().await
    }
}

/// Everything needed to compose one frame, detached from the session.
pub struct FramePlan {
    tier: Tier,
    mode: ViewMode,
    transform: ViewTransform,
    window: Option<TileWindow>,
    highlighted: Option<Zone>,
    dataset: Option<String>,
    tiles: TileCache<RasterTile>,
    markers: MarkerLayer,
    datasets: DatasetLayer,
    zones: Arc<ZoneIndex>,
}

impl FramePlan {
    pub fn tier(&self) -> &Tier {
        &self.tier
    }

    pub fn window(&self) -> Option<&TileWindow> {
        self.window.as_ref()
    }

    /// Wait for every tile and marker tile of the plan to settle, then
    /// compose the frame. Failed tiles are left out.
    pub async fn load(self) -> Frame {
        let tile_load = async {
            match &self.window {
                Some(window) => self.tiles.ensure_window_loaded(window).await,
                None => WindowReport::default(),
            }
        };
        let marker_load = async {
            if self.mode.shows_markers() {
                self.markers.load_visible(&self.tier, &self.transform).await
            } else {
                WindowReport::default()
            }
        };
        let dataset_load = async {
            match &self.dataset {
                Some(prefix) if self.datasets.shown_on(&self.tier) => self.datasets.load(prefix).await,
                _ => None,
            }
        };
        let (tile_report, marker_report, dataset) = futures::join!(tile_load, marker_load, dataset_load);

        let visible_tiles: HashMap<TileKey, Arc<RasterTile>> = self
            .window
            .iter()
            .flat_map(|window| window.keys())
            .filter_map(|key| self.tiles.get_if_loaded(key).map(|tile| (key, tile)))
            .collect();

        let scale = self.tier.scale();
        let (row_start, row_end) = self.transform.visible_rows();
        let visible_zones = self.zones.ranges_overlapping(row_start, row_end, &scale);
        let visible_markers = if self.mode.shows_markers() {
            self.markers.in_viewport(&self.tier, &self.transform)
        } else {
            Vec::new()
        };
        let highlighted_zone = self
            .highlighted
            .as_ref()
            .map(|zone| ZoneIndex::project(zone, &scale));

        log::debug!(
            "frame at level {}: {} tiles ({} failed), {} zones, {} markers",
            self.tier.level,
            visible_tiles.len(),
            tile_report.failed,
            visible_zones.len(),
            visible_markers.len()
        );

        Frame {
            tier: self.tier,
            mode: self.mode,
            visible_tiles,
            visible_zones,
            visible_markers,
            transform: self.transform,
            highlighted_zone,
            dataset,
            tile_report,
            marker_report,
        }
    }
}

/// What the renderer draws for one frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub tier: Tier,
    pub mode: ViewMode,
    pub visible_tiles: HashMap<TileKey, Arc<RasterTile>>,
    pub visible_zones: Vec<ProjectedZone>,
    pub visible_markers: Vec<PlacedMarker>,
    pub transform: ViewTransform,
    pub highlighted_zone: Option<ProjectedZone>,
    /// Coverage image of the highlighted dataset, drawn over the base tier
    pub dataset: Option<DatasetOverlay>,
    pub tile_report: WindowReport,
    pub marker_report: WindowReport,
}

impl Frame {
    pub fn scale_indicator(&self) -> ScaleIndicator {
        self.transform.scale_indicator()
    }

    pub fn minimap(&self) -> Minimap {
        self.transform.minimap()
    }

    /// Held or missing state painted under a screen point. Reads the dataset
    /// overlay when one is shown, the base raster otherwise.
    pub fn availability_at(&self, screen: &Point) -> Option<Availability> {
        let (key, x, y) = self.tier.locate_pixel(screen.add(&self.transform.pan))?;
        match &self.dataset {
            Some(overlay) => overlay.image.availability_at(x, y),
            None => self.visible_tiles.get(&key)?.availability_at(x, y),
        }
    }
}
