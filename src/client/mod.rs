//! Odds retrieval
//!
//! This module provides the sources the scanner pulls events from:
//! - The Odds API: live pre-match odds over HTTP
//! - JSON files in the same shape, for offline runs and replays
//!
//! Raw provider records are validated once here and turned into
//! [`Event`]s; records that cannot be used are reported per event.

mod file;
mod odds_api;

pub use file::FileSource;
pub use odds_api::{
    collect_sport_results, ingest, ApiBookmaker, ApiEvent, ApiMarket, ApiOutcome, OddsApiClient,
    Sport,
};

use crate::error::Result;
use crate::types::Event;
use async_trait::async_trait;

/// An event that failed validation at ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEvent {
    pub event_id: String,
    pub reason: String,
}

/// A part of a source (e.g. one sport) that could not be fetched
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

/// Validated events plus the records and source parts that failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ingest {
    pub events: Vec<Event>,
    pub rejected: Vec<RejectedEvent>,
    pub failed_sources: Vec<SourceFailure>,
}

impl Ingest {
    pub fn extend(&mut self, other: Ingest) {
        self.events.extend(other.events);
        self.rejected.extend(other.rejected);
        self.failed_sources.extend(other.failed_sources);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.rejected.is_empty() && self.failed_sources.is_empty()
    }
}

/// Anything that can supply events to scan
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OddsSource: Send + Sync {
    async fn fetch_events(&self) -> Result<Ingest>;
}
