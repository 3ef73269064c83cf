//! WebSocket endpoint for live job events.
//!
//! Each connection subscribes to the shared [`EventBroadcaster`] and
//! receives every job event as a JSON text frame, plus periodic Ping
//! frames to keep idle connections alive.
//!
//! [`EventBroadcaster`]: ffbuilder_events::EventBroadcaster

mod handler;

pub use handler::ws_handler;
