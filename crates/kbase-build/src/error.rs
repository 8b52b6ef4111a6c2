use thiserror::Error;

use kbase_core::config::BuildStrategy;

#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: BuildStrategy,
    pub reason: String,
}

impl std::fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No source documents found under {0}")]
    NoDocuments(String),

    #[error("Failed to list source documents: {0:#}")]
    Source(anyhow::Error),

    #[error("All build strategies failed: {}", .attempts.iter().map(|a| a.to_string()).collect::<Vec<_>>().join("; "))]
    AllStrategiesFailed { attempts: Vec<StrategyFailure> },

    /// The per-run file limit was reached; a checkpoint was flushed and the
    /// next run resumes from it.
    #[error("Build paused after {processed} files ({remaining} remaining); run again to resume")]
    Paused { processed: usize, remaining: usize },
}
