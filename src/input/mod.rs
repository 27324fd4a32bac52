pub mod events;

// Re-export the essential types
pub use events::{EventCallback, EventHandled, EventManager, GestureEvent, MapEvent};
