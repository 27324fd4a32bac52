use crate::core::address::Identifier;
use crate::core::geo::{Point, Size};
use crate::layers::marker::Marker;
use crate::prelude::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Normalized gesture events, produced by an external input layer that has
/// already translated wheel, mouse and touch input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureEvent {
    /// Wheel notch or pinch; negative `delta` zooms in
    Zoom { delta: f64, position: Point },
    /// Start of drag operation
    PanStart { position: Point },
    /// Drag in progress, screen-pixel delta since the last move
    PanMove { delta: Point },
    /// End of drag operation
    PanEnd,
    /// Pointer moved over the map
    Hover { position: Point },
    DoubleClick { position: Point },
    /// Canvas resized
    Resize { size: Size },
}

impl GestureEvent {
    /// Gets the primary position associated with this event, if any
    pub fn position(&self) -> Option<Point> {
        match self {
            GestureEvent::Zoom { position, .. }
            | GestureEvent::PanStart { position }
            | GestureEvent::Hover { position }
            | GestureEvent::DoubleClick { position } => Some(*position),
            _ => None,
        }
    }

    /// Whether handling this event can move the view
    pub fn moves_view(&self) -> bool {
        matches!(
            self,
            GestureEvent::Zoom { .. } | GestureEvent::PanMove { .. } | GestureEvent::Resize { .. }
        )
    }
}

/// Whether an event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventHandled {
    Handled,
    NotHandled,
}

/// Map event types that can be emitted by the map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEvent {
    /// Zoom or pan changed
    ViewChanged { zoom: f64, pan: Point },
    /// Zoom crossed into another tier
    TierChanged {
        from_level: u32,
        to_level: u32,
        resolution: f64,
    },
    /// Pan started
    MoveStart { pan: Point },
    /// Pan ended
    MoveEnd { pan: Point },
    /// Pointer is over an identifier
    Hover {
        identifier: Identifier,
        isbn13: String,
        zone: Option<String>,
        marker: Option<Marker>,
    },
    /// Double click on an identifier; following the link is up to the host
    Activate {
        identifier: Identifier,
        isbn13: String,
    },
}

impl MapEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MapEvent::ViewChanged { .. } => "viewchanged",
            MapEvent::TierChanged { .. } => "tierchanged",
            MapEvent::MoveStart { .. } => "movestart",
            MapEvent::MoveEnd { .. } => "moveend",
            MapEvent::Hover { .. } => "hover",
            MapEvent::Activate { .. } => "activate",
        }
    }
}

/// Event listener callback type
pub type EventCallback = Box<dyn Fn(&MapEvent) + Send + Sync>;

/// Events kept before the oldest undrained one is dropped
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Queue of emitted map events plus listeners keyed by event name
pub struct EventManager {
    listeners: HashMap<&'static str, Vec<EventCallback>>,
    event_queue: VecDeque<MapEvent>,
    capacity: usize,
    dropped: u64,
}

impl Default for EventManager {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            listeners: HashMap::default(),
            event_queue: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Register an event listener
    pub fn on<F>(&mut self, event_name: &'static str, callback: F)
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.listeners
            .entry(event_name)
            .or_default()
            .push(Box::new(callback));
    }

    /// Emit an event to the queue. A full queue drops its oldest event.
    pub fn emit(&mut self, event: MapEvent) {
        if self.event_queue.len() >= self.capacity {
            self.event_queue.pop_front();
            self.dropped += 1;
            if self.dropped == 1 {
                log::debug!("event queue full at {}, dropping oldest events", self.capacity);
            }
        }
        self.event_queue.push_back(event);
    }

    /// Drain the queue, notifying listeners in emission order
    pub fn process_events(&mut self) -> Vec<MapEvent> {
        let events: Vec<_> = self.event_queue.drain(..).collect();
        for event in &events {
            if let Some(callbacks) = self.listeners.get(event.name()) {
                for callback in callbacks {
                    callback(event);
                }
            }
        }
        events
    }

    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Events lost to the capacity bound since creation
    pub fn dropped_events(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_gesture_json_shape() {
        let zoom: GestureEvent =
            serde_json::from_str(r#"{"type": "zoom", "delta": -1, "position": {"x": 500, "y": 400}}"#)
                .unwrap();
        assert_eq!(
            zoom,
            GestureEvent::Zoom {
                delta: -1.0,
                position: Point::new(500.0, 400.0)
            }
        );
        let end: GestureEvent = serde_json::from_str(r#"{"type": "pan_end"}"#).unwrap();
        assert_eq!(end, GestureEvent::PanEnd);
    }

    #[test]
    fn test_gesture_position() {
        let hover = GestureEvent::Hover {
            position: Point::new(50.0, 75.0),
        };
        assert_eq!(hover.position(), Some(Point::new(50.0, 75.0)));
        assert!(!hover.moves_view());
        assert_eq!(GestureEvent::PanEnd.position(), None);
    }

    #[test]
    fn test_event_manager_dispatch() {
        let mut manager = EventManager::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        manager.on("activate", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.emit(MapEvent::MoveStart {
            pan: Point::default(),
        });
        manager.emit(MapEvent::Activate {
            identifier: Identifier(0),
            isbn13: "9780000000002".into(),
        });
        assert_eq!(manager.pending_events(), 2);

        let events = manager.process_events();
        assert_eq!(events.len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(manager.pending_events(), 0);
    }

    #[test]
    fn test_undrained_queue_keeps_newest_events() {
        let mut manager = EventManager::with_capacity(3);
        for i in 0..10u64 {
            manager.emit(MapEvent::Activate {
                identifier: Identifier(i),
                isbn13: String::new(),
            });
        }
        assert_eq!(manager.pending_events(), 3);
        assert_eq!(manager.dropped_events(), 7);

        let ids: Vec<_> = manager
            .process_events()
            .into_iter()
            .map(|e| match e {
                MapEvent::Activate { identifier, .. } => identifier.0,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec![7, 8, 9]);
    }
}
