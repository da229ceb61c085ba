//! Arbitrage detection over best odds

use crate::types::{ArbitrageOpportunity, BestOddsMap, Event};
use chrono::Utc;
use tracing::info;

/// Outcome of checking a best-odds map
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Opportunity(ArbitrageOpportunity),
    NoArbitrage { inverse_sum: f64 },
}

impl Detection {
    pub fn opportunity(self) -> Option<ArbitrageOpportunity> {
        match self {
            Detection::Opportunity(opp) => Some(opp),
            Detection::NoArbitrage { .. } => None,
        }
    }
}

/// Decides whether best odds lock in a profit
#[derive(Debug, Clone, Copy, Default)]
pub struct ArbitrageDetector;

impl ArbitrageDetector {
    pub fn new() -> Self {
        Self
    }

    /// An arbitrage exists iff Σ 1/odds < 1, compared at full precision
    pub fn detect(&self, event: &Event, best_odds: BestOddsMap) -> Detection {
        let inverse_sum = best_odds.inverse_sum();
        if inverse_sum >= 1.0 {
            return Detection::NoArbitrage { inverse_sum };
        }

        let opp = ArbitrageOpportunity {
            event: event.summary(),
            best_odds,
            inverse_sum,
            margin: 1.0 - inverse_sum,
            detected_at: Utc::now(),
        };

        info!(
            "Found arbitrage: {} - {:.2}% profit",
            event.matchup(),
            opp.percent()
        );

        Detection::Opportunity(opp)
    }
}
