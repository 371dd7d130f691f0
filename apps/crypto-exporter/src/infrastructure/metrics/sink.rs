//! Metric sinks: an in-memory snapshot for the HTTP endpoint and a
//! node-exporter text file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::render_poll_result;
use crate::application::ports::{MetricSink, SinkError};
use crate::domain::poll::PollResult;

/// Keeps the latest rendering for `/metrics`.
#[derive(Debug, Default)]
pub struct SnapshotSink {
    body: RwLock<String>,
}

impl SnapshotSink {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest rendering; empty before the first cycle.
    #[must_use]
    pub fn render(&self) -> String {
        self.body.read().clone()
    }
}

#[async_trait]
impl MetricSink for SnapshotSink {
    async fn emit(&self, result: &PollResult) -> Result<(), SinkError> {
        let body = render_poll_result(result);
        *self.body.write() = body;
        Ok(())
    }
}

/// Writes `{prom_folder}/{instance}_exporter.prom` for the node-exporter
/// text file collector.
///
/// The file is replaced atomically (write to a temporary file in the same
/// directory, then rename), so the collector never reads a partial file.
#[derive(Debug, Clone)]
pub struct TextfileSink {
    path: PathBuf,
}

impl TextfileSink {
    /// Create a sink for a target path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Write {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl MetricSink for TextfileSink {
    async fn emit(&self, result: &PollResult) -> Result<(), SinkError> {
        let body = render_poll_result(result);
        let temp = self.temp_path();

        tokio::fs::write(&temp, body.as_bytes())
            .await
            .map_err(|e| self.write_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.write_error(e))?;

        debug!(path = %self.path.display(), bytes = body.len(), "Wrote metrics file");
        Ok(())
    }
}
