//! Arbitrage detection pipeline
//!
//! Per event: aggregate best odds -> detect arbitrage -> allocate stakes.
//! Every stage is pure; events are evaluated independently and a batch
//! always yields one report per event.

pub mod aggregator;
pub mod allocator;
pub mod detector;


pub use aggregator::{Aggregation, Ineligible, OddsAggregator};
pub use allocator::StakeAllocator;
pub use detector::{ArbitrageDetector, Detection};

use crate::types::{ArbitrageOpportunity, Event, StakePlan};
use tracing::{info, warn};

/// What happened to one event
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Opportunity {
        opportunity: ArbitrageOpportunity,
        /// Present when a total stake was requested
        plan: Option<StakePlan>,
    },
    NoOpportunity {
        inverse_sum: f64,
    },
    NotEligible(Ineligible),
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventReport {
    pub event_id: String,
    pub outcome: EventOutcome,
}

/// Per-event results of scanning a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub reports: Vec<EventReport>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event_id: impl Into<String>, outcome: EventOutcome) {
        self.reports.push(EventReport {
            event_id: event_id.into(),
            outcome,
        });
    }

    /// Record an event that could not be evaluated
    pub fn record_failure(&mut self, event_id: impl Into<String>, reason: impl Into<String>) {
        self.push(
            event_id,
            EventOutcome::Failed {
                reason: reason.into(),
            },
        );
    }

    pub fn events_analyzed(&self) -> usize {
        self.reports.len()
    }

    pub fn opportunities(&self) -> impl Iterator<Item = (&ArbitrageOpportunity, Option<&StakePlan>)> {
        self.reports.iter().filter_map(|r| match &r.outcome {
            EventOutcome::Opportunity { opportunity, plan } => Some((opportunity, plan.as_ref())),
            _ => None,
        })
    }

    pub fn opportunity_count(&self) -> usize {
        self.opportunities().count()
    }

    /// (event id, reason) for every failed event
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.reports.iter().filter_map(|r| match &r.outcome {
            EventOutcome::Failed { reason } => Some((r.event_id.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn into_opportunities(self) -> Vec<(ArbitrageOpportunity, Option<StakePlan>)> {
        self.reports
            .into_iter()
            .filter_map(|r| match r.outcome {
                EventOutcome::Opportunity { opportunity, plan } => Some((opportunity, plan)),
                _ => None,
            })
            .collect()
    }

    /// Append another report's entries
    pub fn merge(&mut self, other: BatchReport) {
        self.reports.extend(other.reports);
    }
}

/// Aggregator, detector and allocator wired together
#[derive(Debug, Clone, Copy, Default)]
pub struct ArbitragePipeline {
    aggregator: OddsAggregator,
    detector: ArbitrageDetector,
    allocator: StakeAllocator,
}

impl ArbitragePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one event through the pipeline
    pub fn evaluate(&self, event: &Event, total_stake: Option<f64>) -> EventOutcome {
        let best_odds = match self.aggregator.aggregate(event) {
            Aggregation::Eligible(map) => map,
            Aggregation::NotEligible(reason) => return EventOutcome::NotEligible(reason),
        };

        let opportunity = match self.detector.detect(event, best_odds) {
            Detection::Opportunity(opp) => opp,
            Detection::NoArbitrage { inverse_sum } => {
                return EventOutcome::NoOpportunity { inverse_sum }
            }
        };

        let plan = match total_stake {
            Some(stake) => match self.allocator.allocate(&opportunity, stake) {
                Ok(plan) => Some(plan),
                Err(e) => {
                    warn!("Error allocating stakes for {}: {}", event.id(), e);
                    return EventOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            },
            None => None,
        };

        EventOutcome::Opportunity { opportunity, plan }
    }

    /// Evaluate every event, one report entry each
    pub fn scan(&self, events: &[Event], total_stake: Option<f64>) -> BatchReport {
        let mut report = BatchReport::new();
        for event in events {
            report.push(event.id(), self.evaluate(event, total_stake));
        }

        info!(
            "Processed {} games, found {} arbitrage opportunities",
            report.events_analyzed(),
            report.opportunity_count()
        );

        report
    }
}

/// Scan a batch of events, optionally computing stake plans
pub fn scan_events(events: &[Event], total_stake: Option<f64>) -> BatchReport {
    ArbitragePipeline::new().scan(events, total_stake)
}
