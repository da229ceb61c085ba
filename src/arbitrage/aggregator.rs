//! Best-odds aggregation across bookmakers

use crate::types::{BestOddsMap, Event, OutcomeOdds};
use tracing::{debug, warn};

/// Why an event cannot be checked for arbitrage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    /// The event carries no bookmaker quotes
    NoBookmakers,
    /// Quotes exist but none survived validation
    NoValidOdds,
    /// Number of distinct outcome labels is not two
    OutcomeCount(usize),
}

impl std::fmt::Display for Ineligible {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ineligible::NoBookmakers => write!(f, "no bookmakers"),
            Ineligible::NoValidOdds => write!(f, "no valid head-to-head odds"),
            Ineligible::OutcomeCount(n) => write!(f, "{} distinct outcomes, need 2", n),
        }
    }
}

/// Result of aggregating an event's quotes
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Eligible(BestOddsMap),
    NotEligible(Ineligible),
}

/// Reduces per-bookmaker quotes to the best odds per outcome label
#[derive(Debug, Clone, Copy, Default)]
pub struct OddsAggregator;

impl OddsAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Collect the best head-to-head odds for every outcome label.
    ///
    /// Labels keep first-seen order. A later bookmaker only replaces the
    /// current best when its odds are strictly higher.
    pub fn best_odds(&self, event: &Event) -> Vec<OutcomeOdds> {
        let mut best: Vec<OutcomeOdds> = Vec::new();

        for quote in event.bookmakers() {
            for market in quote.markets.iter().filter(|m| m.is_head_to_head()) {
                for price in &market.outcomes {
                    let candidate = OutcomeOdds::new(price.name.as_str(), price.price, quote.key.as_str());
                    if let Err(e) = candidate.validate() {
                        warn!("Skipping quote in event {}: {}", event.id(), e);
                        continue;
                    }

                    match best.iter_mut().find(|b| b.outcome == candidate.outcome) {
                        Some(current) if candidate.odds > current.odds => *current = candidate,
                        Some(_) => {}
                        None => best.push(candidate),
                    }
                }
            }
        }

        best
    }

    /// Aggregate an event into a two-outcome best-odds map
    pub fn aggregate(&self, event: &Event) -> Aggregation {
        if event.bookmakers().is_empty() {
            debug!("Event {} has no bookmakers", event.id());
            return Aggregation::NotEligible(Ineligible::NoBookmakers);
        }

        let best = self.best_odds(event);
        let count = best.len();
        if count == 0 {
            return Aggregation::NotEligible(Ineligible::NoValidOdds);
        }

        let mut entries = best.into_iter();
        match (entries.next(), entries.next(), entries.next()) {
            (Some(first), Some(second), None) => match BestOddsMap::new(first, second) {
                Ok(map) => Aggregation::Eligible(map),
                // unreachable: entries are validated and grouped by label
                Err(e) => {
                    warn!("Event {}: {}", event.id(), e);
                    Aggregation::NotEligible(Ineligible::NoValidOdds)
                }
            },
            _ => {
                debug!("Event {} has {} distinct outcomes, skipping", event.id(), count);
                Aggregation::NotEligible(Ineligible::OutcomeCount(count))
            }
        }
    }
}
