//! kbase-engine
//!
//! Read side of the knowledge base. Detects which index a build published,
//! loads it and answers queries. Retrieval never surfaces errors to callers:
//! failures are logged and degrade to an empty result list or a substring scan.

pub mod engine;

pub use engine::{EngineStats, RetrievalEngine};
