//! ffbuilder live event fan-out.
//!
//! - [`EventBroadcaster`]: the set of connected observers; every published
//!   event is pushed to each of them.
//! - [`JobEvent`]: the envelope describing job progress and termination.

pub mod broadcaster;
pub mod event;

pub use broadcaster::{EventBroadcaster, ObserverId, Subscription};
pub use event::{EventKind, JobEvent};
