//! Metric Sink Port (Driven Port)
//!
//! Where a finished poll result goes. Sinks only see gauges, so emitting
//! the same result twice must produce the same sample set.

use async_trait::async_trait;

use crate::domain::poll::PollResult;

/// Metric sink errors. Callers log them; they never stop the exporter.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing the metrics file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Target path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Port for publishing a poll result.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Publish the rates and balances of one cycle.
    async fn emit(&self, result: &PollResult) -> Result<(), SinkError>;
}
