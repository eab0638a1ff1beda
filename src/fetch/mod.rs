// src/fetch/mod.rs

pub mod cache;
pub mod sheets;

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::IngestError;
use crate::process::RawBatch;

pub use cache::CachedLoader;
pub use sheets::SheetSource;

/// Anything that can hand over the raw sheet batches.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> Result<Vec<RawBatch>, IngestError>;

    /// Short human description for logs.
    fn describe(&self) -> String;
}

#[async_trait]
impl DataSource for Box<dyn DataSource> {
    async fn load(&self) -> Result<Vec<RawBatch>, IngestError> {
        (**self).load().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Local CSV files, one batch per file.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    files: Vec<(String, PathBuf)>,
}

impl CsvFileSource {
    /// `files` pairs a tag with the path to read.
    pub fn new(files: Vec<(String, PathBuf)>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl DataSource for CsvFileSource {
    #[instrument(level = "info", skip(self), fields(files = self.files.len()))]
    async fn load(&self) -> Result<Vec<RawBatch>, IngestError> {
        let mut out = Vec::with_capacity(self.files.len());
        for (tag, path) in &self.files {
            let bytes = tokio::fs::read(path).await.map_err(|source| IngestError::Io {
                path: path.clone(),
                source,
            })?;
            let batch = RawBatch::from_csv_reader(tag.as_str(), bytes.as_slice()).map_err(
                |source| IngestError::Csv {
                    tag: tag.clone(),
                    source,
                },
            )?;
            debug!(tag = %tag, rows = batch.len(), "read csv file");
            out.push(batch);
        }
        Ok(out)
    }

    fn describe(&self) -> String {
        let paths: Vec<String> = self
            .files
            .iter()
            .map(|(_, p)| p.display().to_string())
            .collect();
        format!("csv files [{}]", paths.join(", "))
    }
}

/// Batches already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    batches: Vec<RawBatch>,
}

impl StaticSource {
    pub fn new(batches: Vec<RawBatch>) -> Self {
        Self { batches }
    }
}

#[async_trait]
impl DataSource for StaticSource {
    async fn load(&self) -> Result<Vec<RawBatch>, IngestError> {
        Ok(self.batches.clone())
    }

    fn describe(&self) -> String {
        format!("{} in-memory batches", self.batches.len())
    }
}
