//! Domain types shared by every ffbuilder crate.
//!
//! Zero internal dependencies: this crate holds the job identifiers, the
//! job kind/state enums, request parameter validation, and the FFmpeg
//! command builder. Nothing here touches processes or the network.

pub mod error;
pub mod ffmpeg;
pub mod job;
pub mod params;
pub mod types;
