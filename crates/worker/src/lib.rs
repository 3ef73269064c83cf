//! Job registry and subprocess runner.
//!
//! [`JobRunner`] spawns the external tool for each accepted request, keeps
//! the job in the [`JobRegistry`] while it runs, and turns its output and
//! exit status into events on the shared broadcaster.

pub mod registry;
pub mod runner;

pub use registry::{JobHandle, JobRegistry, JobSummary};
pub use runner::JobRunner;
