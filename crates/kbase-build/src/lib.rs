//! kbase-build
//!
//! Turns a source directory into a published index. Vector strategies stage
//! their output under `staging/` and only move it into place once complete;
//! the mode marker is always the last file written.

pub mod checkpoint;
pub mod error;
pub mod orchestrator;

pub use checkpoint::Checkpoint;
pub use error::{BuildError, StrategyFailure};
pub use orchestrator::{BuildReport, Builder};
