//! Events from a JSON file in The Odds API shape

use super::{ingest, Ingest, OddsSource};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OddsSource for FileSource {
    async fn fetch_events(&self) -> Result<Ingest> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let records: Vec<Value> = serde_json::from_str(&raw)?;
        info!("Loaded {} events from {}", records.len(), self.path.display());
        Ok(ingest(records))
    }
}
