//! Append-only record of every answered query
//!
//! Each record is one JSON object per line. Writers append a complete line
//! with a single write, so concurrent requests never interleave records.

pub mod ports;

pub use ports::{InteractionLogEntry, InteractionLogger};

#[cfg(any(test, feature = "test-mocks"))]
pub use ports::MockInteractionLogger;

use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// JSON-lines file sink
pub struct JsonlInteractionLogger {
    path: PathBuf,
}

impl JsonlInteractionLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl InteractionLogger for JsonlInteractionLogger {
    async fn log(&self, entry: InteractionLogEntry) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        }

        let mut line = serde_json::to_string(&entry).context("Failed to encode log entry")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        file.flush().await?;

        Ok(())
    }
}
