//! Odds scanning
//!
//! Pulls events from an [`OddsSource`] and runs them through the arbitrage
//! pipeline. Ingestion rejections and failed source parts are folded into
//! the batch report so every record a source produced is accounted for.

#[cfg(test)]
mod tests;

use crate::arbitrage::{ArbitragePipeline, BatchReport};
use crate::client::OddsSource;
use crate::config::ScannerConfig;
use crate::error::Result;
use crate::types::{ArbitrageOpportunity, Event};
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Running totals across scans
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub total_scans: u64,
    pub events_analyzed: u64,
    pub opportunities_found: u64,
    pub failures: u64,
}

/// Events fetched in one scan with their results
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub events: Vec<Event>,
    pub report: BatchReport,
}

/// Scanner over one odds source
pub struct Scanner<S: OddsSource> {
    source: S,
    pipeline: ArbitragePipeline,
    stats: Arc<RwLock<ScanStats>>,
}

impl<S: OddsSource> Scanner<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pipeline: ArbitragePipeline::new(),
            stats: Arc::new(RwLock::new(ScanStats::default())),
        }
    }

    /// Fetch and evaluate one batch.
    ///
    /// A source failure is returned as an error, never as an empty report.
    pub async fn scan(&self, total_stake: Option<f64>) -> Result<BatchReport> {
        Ok(self.scan_batch(total_stake).await?.report)
    }

    /// Like [`Scanner::scan`], also returning the events that were evaluated
    pub async fn scan_batch(&self, total_stake: Option<f64>) -> Result<ScanOutput> {
        let ingested = self.source.fetch_events().await?;
        info!(
            "[Scanner] Fetched {} events ({} rejected)",
            ingested.events.len(),
            ingested.rejected.len()
        );

        let mut report = self.pipeline.scan(&ingested.events, total_stake);
        for rejected in ingested.rejected {
            report.record_failure(rejected.event_id, rejected.reason);
        }
        for failed in ingested.failed_sources {
            report.record_failure(failed.source, failed.reason);
        }

        {
            let mut stats = self.stats.write().await;
            stats.total_scans += 1;
            stats.events_analyzed += report.events_analyzed() as u64;
            stats.opportunities_found += report.opportunity_count() as u64;
            stats.failures += report.failures().count() as u64;
        }

        if report.has_failures() {
            warn!(
                "[Scanner] {} events could not be evaluated",
                report.failures().count()
            );
        }

        Ok(ScanOutput {
            events: ingested.events,
            report,
        })
    }

    pub async fn stats(&self) -> ScanStats {
        *self.stats.read().await
    }
}

/// Opportunities at or above `min_profit_pct`, most profitable first
pub fn alertable(report: &BatchReport, min_profit_pct: f64) -> Vec<ArbitrageOpportunity> {
    let mut opps: Vec<ArbitrageOpportunity> = report
        .opportunities()
        .filter(|(opp, _)| opp.percent() >= min_profit_pct)
        .map(|(opp, _)| opp.clone())
        .collect();

    opps.sort_by(|a, b| b.margin.total_cmp(&a.margin));
    opps
}

/// Wait before the next scan in `run` mode.
///
/// With `daily_run_at` set, waits for the next occurrence of that UTC time.
/// Otherwise the first scan runs immediately and later ones every
/// `scan_interval_secs`.
pub fn next_delay(config: &ScannerConfig, now: DateTime<Utc>, first: bool) -> Duration {
    match config.daily_run_at {
        Some(at) => (next_daily_run(now, at) - now).to_std().unwrap_or_default(),
        None if first => Duration::ZERO,
        None => Duration::from_secs(config.scan_interval_secs),
    }
}

/// Next instant strictly after `now` whose UTC time of day is `at`
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}
